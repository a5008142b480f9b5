// src/picker.rs
//
// 截图后弹出的小工具条：复制 / 保存 / 重新选择 / 取消。
// 只负责返回用户的选择，不做任何投递。

use std::rc::Rc;

use anyhow::{Result, anyhow};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::capture::FrameCapturer;
use crate::config::PickerConfig;
use crate::geometry::{Point, Rect};
use crate::session::ActionPicker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionChoice {
    Copy,
    Save,
    Retry,
    Cancel,
}

impl ActionChoice {
    pub const ALL: [ActionChoice; 4] =
        [ActionChoice::Copy, ActionChoice::Save, ActionChoice::Retry, ActionChoice::Cancel];

    pub fn label(self) -> &'static str {
        match self {
            ActionChoice::Copy => "COPY",
            ActionChoice::Save => "SAVE",
            ActionChoice::Retry => "RETRY",
            ActionChoice::Cancel => "CANCEL",
        }
    }
}

const SHORTCUTS: [(Key, ActionChoice); 6] = [
    (Key::C, ActionChoice::Copy),
    (Key::Enter, ActionChoice::Copy),
    (Key::NumPadEnter, ActionChoice::Copy),
    (Key::S, ActionChoice::Save),
    (Key::R, ActionChoice::Retry),
    (Key::Escape, ActionChoice::Cancel),
];

pub fn choice_for_key(key: Key) -> Option<ActionChoice> {
    SHORTCUTS.iter().find(|(k, _)| *k == key).map(|&(_, choice)| choice)
}

// 工具条布局
const PADDING: i32 = 8;
const BUTTON_W: u32 = 84;
const BUTTON_H: u32 = 28;
const FONT_SCALE: usize = 2;

pub const TOOLBAR_W: u32 =
    PADDING as u32 + ActionChoice::ALL.len() as u32 * (BUTTON_W + PADDING as u32);
pub const TOOLBAR_H: u32 = BUTTON_H + 2 * PADDING as u32;

const BACKGROUND: u32 = 0xF0F0F0;
const BUTTON_FACE: u32 = 0xFFFFFF;
const BUTTON_EDGE: u32 = 0xADADAD;
const HOVER_FACE: u32 = 0xE5F1FB;
const HOVER_EDGE: u32 = 0x0078D7;
const TEXT: u32 = 0x202020;

fn button_rect(index: usize) -> Rect {
    let x = PADDING + index as i32 * (BUTTON_W as i32 + PADDING);
    Rect::new(x, PADDING, BUTTON_W, BUTTON_H)
}

/// 工具条本地坐标下命中的按钮
pub fn button_at(p: Point) -> Option<ActionChoice> {
    ActionChoice::ALL
        .iter()
        .enumerate()
        .find(|(i, _)| button_rect(*i).contains(p))
        .map(|(_, &choice)| choice)
}

/// 默认放在选区左下角的下方；右边或下边放不下时，分别往左挪或改放到选区上方，
/// 最后再夹紧到虚拟屏幕之内。
pub fn place_picker(selection: Rect, size: (u32, u32), screen: Rect, gap: i32) -> Point {
    let (w, h) = (size.0 as i32, size.1 as i32);
    let mut p = Point::new(selection.x, selection.bottom() + gap);

    let dx = p.x + w - screen.right();
    if dx > 0 {
        p.x -= dx + gap;
    }
    let dy = p.y + h - screen.bottom();
    if dy > 0 {
        p.y = (selection.y - h - gap).max(screen.y);
    }

    p.x = p.x.min(screen.right() - w).max(screen.x);
    p.y = p.y.min(screen.bottom() - h).max(screen.y);
    p
}

/// 按下和松开落在同一个按钮上才算一次点击
#[derive(Debug, Default)]
pub struct ClickTracker {
    down: bool,
    pressed_on: Option<ActionChoice>,
}

impl ClickTracker {
    pub fn feed(&mut self, hovered: Option<ActionChoice>, down: bool) -> Option<ActionChoice> {
        let clicked = match (self.down, down) {
            (false, true) => {
                self.pressed_on = hovered;
                None
            }
            (true, false) => self.pressed_on.take().filter(|&c| Some(c) == hovered),
            _ => None,
        };
        self.down = down;
        clicked
    }
}

pub fn draw_toolbar(buffer: &mut [u32], hovered: Option<ActionChoice>) {
    let width = TOOLBAR_W as usize;
    buffer.fill(BACKGROUND);

    for (i, &choice) in ActionChoice::ALL.iter().enumerate() {
        let r = button_rect(i);
        let (face, edge) = if hovered == Some(choice) {
            (HOVER_FACE, HOVER_EDGE)
        } else {
            (BUTTON_FACE, BUTTON_EDGE)
        };
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                let border = x == r.x || y == r.y || x == r.right() - 1 || y == r.bottom() - 1;
                buffer[y as usize * width + x as usize] = if border { edge } else { face };
            }
        }

        let label = choice.label();
        let text_w = text_width(label) as i32;
        let text_h = (GLYPH_H * FONT_SCALE) as i32;
        let origin = Point::new(r.x + (r.w as i32 - text_w) / 2, r.y + (r.h as i32 - text_h) / 2);
        draw_text(buffer, width, origin, label);
    }
}

/// minifb 窗口版本的工具条
pub struct ToolbarPicker {
    capturer: Rc<dyn FrameCapturer>,
    config: PickerConfig,
}

impl ToolbarPicker {
    pub fn new(capturer: Rc<dyn FrameCapturer>, config: PickerConfig) -> Self {
        ToolbarPicker { capturer, config }
    }

    fn show(&self, selection: Rect) -> Result<ActionChoice> {
        let screen = self.capturer.virtual_screen().unwrap_or_else(|e| {
            log::warn!("virtual screen unknown, placing toolbar unclamped: {e}");
            let below = TOOLBAR_H + self.config.gap as u32;
            selection.union(&Rect::new(selection.x, selection.bottom(), TOOLBAR_W, below))
        });
        let at = place_picker(selection, (TOOLBAR_W, TOOLBAR_H), screen, self.config.gap);

        let (w, h) = (TOOLBAR_W as usize, TOOLBAR_H as usize);
        let mut window = Window::new(
            "snipmini",
            w,
            h,
            WindowOptions {
                borderless: true,
                title: false,
                resize: false,
                topmost: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("无法创建工具条窗口: {e}"))?;
        window.set_position(at.x as isize, at.y as isize);
        window.set_target_fps(60);

        let mut buffer = vec![0; w * h];
        let mut hovered = None;
        let mut clicks = ClickTracker::default();
        draw_toolbar(&mut buffer, hovered);

        while window.is_open() {
            let pressed = window.get_keys_pressed(KeyRepeat::No);
            if let Some(choice) = pressed.into_iter().find_map(choice_for_key) {
                return Ok(choice);
            }

            let now_hovered = window
                .get_mouse_pos(MouseMode::Discard)
                .and_then(|(x, y)| button_at(Point::new(x as i32, y as i32)));
            let down = window.get_mouse_down(MouseButton::Left);
            if let Some(choice) = clicks.feed(now_hovered, down) {
                return Ok(choice);
            }

            if now_hovered != hovered {
                hovered = now_hovered;
                draw_toolbar(&mut buffer, hovered);
            }
            window
                .update_with_buffer(&buffer, w, h)
                .map_err(|e| anyhow!("工具条刷新失败: {e}"))?;
        }

        // 窗口被关掉等同于取消
        Ok(ActionChoice::Cancel)
    }
}

impl ActionPicker for ToolbarPicker {
    fn choose(&mut self, selection: Rect) -> ActionChoice {
        match self.show(selection) {
            Ok(choice) => {
                log::debug!("picked {:?}", choice);
                choice
            }
            Err(e) => {
                log::warn!("toolbar failed, treating as cancel: {e}");
                ActionChoice::Cancel
            }
        }
    }
}

// 5x7 点阵字体，只包含按钮上用到的字母
const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;

const GLYPHS: [(char, [u8; GLYPH_H]); 12] = [
    ('A', [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('E', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('L', [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('N', [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
    ('O', [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('R', [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('V', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
    ('Y', [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
];

fn glyph(c: char) -> Option<&'static [u8; GLYPH_H]> {
    GLYPHS.iter().find(|(g, _)| *g == c).map(|(_, rows)| rows)
}

fn text_width(text: &str) -> usize {
    let n = text.chars().count();
    if n == 0 { 0 } else { n * GLYPH_W * FONT_SCALE + (n - 1) * FONT_SCALE }
}

fn draw_text(buffer: &mut [u32], width: usize, origin: Point, text: &str) {
    let height = buffer.len() / width;
    let advance = ((GLYPH_W + 1) * FONT_SCALE) as i32;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let gx = origin.x + i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                for sy in 0..FONT_SCALE {
                    for sx in 0..FONT_SCALE {
                        let x = gx + (col * FONT_SCALE + sx) as i32;
                        let y = origin.y + (row * FONT_SCALE + sy) as i32;
                        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
                            buffer[y as usize * width + x as usize] = TEXT;
                        }
                    }
                }
            }
        }
    }
}
