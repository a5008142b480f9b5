// src/selection.rs
//
// 全屏覆盖层：铺满整个虚拟屏幕的置顶无边框窗口，采样鼠标/键盘，
// 把采样变成离散事件交给 `Selection` 状态机，并画出选区反馈。

use std::rc::Rc;
use std::thread;

use anyhow::{Result, anyhow};
use image::RgbaImage;
use minifb::{CursorStyle, Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::capture::FrameCapturer;
use crate::config::SelectorConfig;
use crate::geometry::{Point, Rect};
use crate::selection_logic::{Selection, SelectionEvent};
use crate::session::RegionSelector;

const WHITE: u32 = 0xFFFFFF;
/// 背景截图失败时的底色
const FALLBACK_BACKDROP: u32 = 0x202020;

/// 一帧的输入采样，坐标已经换算成虚拟屏幕坐标
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSample {
    pub pos: Option<Point>,
    pub primary: bool,
    pub secondary: bool,
    pub escape: bool,
    pub closed: bool,
}

/// 通过前后两帧的按键状态找出按下/松开的边沿
#[derive(Debug, Default)]
pub struct InputEdges {
    primary: bool,
    secondary: bool,
    last_pos: Option<Point>,
}

impl InputEdges {
    pub fn feed(&mut self, sample: &InputSample, events: &mut Vec<SelectionEvent>) {
        if sample.escape || sample.closed {
            events.push(SelectionEvent::Escape);
        }

        let pos = sample.pos.or(self.last_pos);
        if let Some(p) = pos {
            match (self.primary, sample.primary) {
                (false, true) => events.push(SelectionEvent::PrimaryDown(p)),
                (true, true) if sample.pos.is_some() && sample.pos != self.last_pos => {
                    events.push(SelectionEvent::PointerMove(p))
                }
                (true, false) => events.push(SelectionEvent::PrimaryUp(p)),
                _ => {}
            }
        }
        // 右键在松开时算一次点击
        if self.secondary && !sample.secondary {
            events.push(SelectionEvent::SecondaryClick);
        }

        self.primary = sample.primary;
        self.secondary = sample.secondary;
        self.last_pos = pos;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub border: u32,
    pub fill_alpha: u8,
}

/// 先铺上变暗的背景，再在选区内画半透明填充和白色边框。
/// `selection` 是窗口本地坐标，可能部分在窗口外。
pub fn draw_overlay(
    buffer: &mut [u32],
    dimmed: &[u32],
    clear: &[u32],
    width: usize,
    height: usize,
    selection: Option<Rect>,
    style: &OverlayStyle,
) {
    buffer.copy_from_slice(dimmed);

    let Some(sel) = selection else { return };
    let window = Rect::new(0, 0, width as u32, height as u32);
    let Some(visible) = sel.intersect(&window) else { return };

    let b = style.border as i32;
    for y in visible.y..visible.bottom() {
        let base = y as usize * width;
        for x in visible.x..visible.right() {
            let idx = base + x as usize;
            let on_border =
                x < sel.x + b || x >= sel.right() - b || y < sel.y + b || y >= sel.bottom() - b;
            buffer[idx] = if on_border { WHITE } else { blend_white(clear[idx], style.fill_alpha) };
        }
    }
}

fn blend_white(pix: u32, alpha: u8) -> u32 {
    let a = alpha as u32;
    let mix = |c: u32| c + (255 - c) * a / 255;
    let r = mix((pix >> 16) & 0xFF);
    let g = mix((pix >> 8) & 0xFF);
    let b = mix(pix & 0xFF);
    (r << 16) | (g << 8) | b
}

fn dim(pix: u32, percent: u8) -> u32 {
    let p = percent.min(100) as u32;
    let r = ((pix >> 16) & 0xFF) * p / 100;
    let g = ((pix >> 8) & 0xFF) * p / 100;
    let b = (pix & 0xFF) * p / 100;
    (r << 16) | (g << 8) | b
}

/// RGBA 截图转换成 minifb 需要的 0RGB 缓冲区，尺寸不符的部分用底色补齐
fn to_0rgb(image: Option<&RgbaImage>, width: usize, height: usize) -> Vec<u32> {
    let mut out = vec![FALLBACK_BACKDROP; width * height];
    if let Some(img) = image {
        for (x, y, px) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            if x < width && y < height {
                let [r, g, b, _] = px.0;
                out[y * width + x] = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            }
        }
    }
    out
}

/// 一次性的覆盖层，`run` 结束时窗口随之销毁
pub struct Overlay {
    window: Window,
    origin: Point,
    width: usize,
    height: usize,
    dimmed: Vec<u32>,
    clear: Vec<u32>,
    buffer: Vec<u32>,
    selection: Selection,
    style: OverlayStyle,
}

impl Overlay {
    pub fn open(
        screen: Rect,
        background: Option<&RgbaImage>,
        config: &SelectorConfig,
    ) -> Result<Self> {
        let (width, height) = (screen.w as usize, screen.h as usize);
        let mut window = Window::new(
            "snipmini",
            width,
            height,
            WindowOptions {
                borderless: true,
                title: false,
                resize: false,
                topmost: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("无法创建覆盖层窗口: {e}"))?;
        window.set_position(screen.x as isize, screen.y as isize);
        window.set_cursor_style(CursorStyle::Crosshair);
        window.set_target_fps(60);

        let clear = to_0rgb(background, width, height);
        let dimmed = clear.iter().map(|&p| dim(p, config.dim_percent)).collect();
        log::debug!("overlay opened over {:?}", screen);

        Ok(Overlay {
            window,
            origin: screen.origin(),
            width,
            height,
            dimmed,
            clear,
            buffer: vec![0; width * height],
            selection: Selection::new(config.min_size),
            style: OverlayStyle { border: config.border_width, fill_alpha: config.fill_alpha },
        })
    }

    fn sample(&self) -> InputSample {
        let pos = self
            .window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| self.origin.offset(x as i32, y as i32));
        InputSample {
            pos,
            primary: self.window.get_mouse_down(MouseButton::Left),
            secondary: self.window.get_mouse_down(MouseButton::Right),
            escape: self.window.is_key_pressed(Key::Escape, KeyRepeat::No),
            closed: !self.window.is_open(),
        }
    }

    fn present(&mut self) -> Result<()> {
        let local = self.selection.visible_rect().map(|r| r.to_local(self.origin));
        draw_overlay(
            &mut self.buffer,
            &self.dimmed,
            &self.clear,
            self.width,
            self.height,
            local,
            &self.style,
        );
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("覆盖层刷新失败: {e}"))
    }

    /// 模态循环，直到选区完成或取消
    pub fn run(mut self) -> Result<Option<Rect>> {
        self.present()?;
        let mut edges = InputEdges::default();
        let mut events = Vec::new();

        while !self.selection.is_done() {
            edges.feed(&self.sample(), &mut events);
            let mut dirty = false;
            for event in events.drain(..) {
                dirty |= self.selection.handle(event);
            }
            if dirty {
                self.present()?;
            } else {
                self.window.update();
            }
        }

        Ok(self.selection.outcome().flatten())
    }
}

/// 每次调用都新建一个覆盖层，避免残留的选区和焦点问题
pub struct OverlaySelector {
    capturer: Rc<dyn FrameCapturer>,
    config: SelectorConfig,
}

impl OverlaySelector {
    pub fn new(capturer: Rc<dyn FrameCapturer>, config: SelectorConfig) -> Self {
        OverlaySelector { capturer, config }
    }
}

impl RegionSelector for OverlaySelector {
    fn select(&mut self) -> Result<Option<Rect>> {
        let screen = self.capturer.virtual_screen()?;
        let snapshot = match self.capturer.capture(screen) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("no backdrop for overlay: {e}");
                None
            }
        };
        let overlay = Overlay::open(screen, snapshot.as_ref().map(|f| f.image()), &self.config)?;
        drop(snapshot);

        let picked = overlay.run()?;
        // 等合成器把覆盖层真正撤掉，否则边框可能被截进去
        if picked.is_some() && !self.config.settle.is_zero() {
            thread::sleep(self.config.settle);
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pos: (i32, i32), primary: bool) -> InputSample {
        InputSample { pos: Some(Point::new(pos.0, pos.1)), primary, ..InputSample::default() }
    }

    #[test]
    fn edges_turn_samples_into_drag_events() {
        let mut edges = InputEdges::default();
        let mut events = Vec::new();
        edges.feed(&sample((5, 5), false), &mut events);
        edges.feed(&sample((10, 10), true), &mut events);
        edges.feed(&sample((10, 10), true), &mut events);
        edges.feed(&sample((40, -3), true), &mut events);
        edges.feed(&sample((41, -2), false), &mut events);
        assert_eq!(
            events,
            vec![
                SelectionEvent::PrimaryDown(Point::new(10, 10)),
                SelectionEvent::PointerMove(Point::new(40, -3)),
                SelectionEvent::PrimaryUp(Point::new(41, -2)),
            ]
        );
    }

    #[test]
    fn release_without_position_uses_last_known_point() {
        let mut edges = InputEdges::default();
        let mut events = Vec::new();
        edges.feed(&sample((1, 2), true), &mut events);
        edges.feed(&InputSample::default(), &mut events);
        assert_eq!(events.last(), Some(&SelectionEvent::PrimaryUp(Point::new(1, 2))));
    }

    #[test]
    fn right_click_escape_and_close_cancel() {
        let mut edges = InputEdges::default();
        let mut events = Vec::new();
        edges.feed(&InputSample { secondary: true, ..InputSample::default() }, &mut events);
        assert!(events.is_empty());
        edges.feed(&InputSample::default(), &mut events);
        assert_eq!(events, vec![SelectionEvent::SecondaryClick]);

        events.clear();
        edges.feed(&InputSample { escape: true, ..InputSample::default() }, &mut events);
        edges.feed(&InputSample { closed: true, ..InputSample::default() }, &mut events);
        assert_eq!(events, vec![SelectionEvent::Escape, SelectionEvent::Escape]);
    }

    #[test]
    fn overlay_draws_border_and_fill_in_local_frame() {
        let (w, h) = (20, 20);
        let dimmed = vec![0x101010; w * h];
        let clear = vec![0x000000; w * h];
        let mut buf = vec![0; w * h];
        let style = OverlayStyle { border: 2, fill_alpha: 51 };
        // 虚拟屏幕原点在 (-100, -50)，选区换算到窗口本地坐标
        let sel = Rect::new(-96, -46, 10, 8).to_local(Point::new(-100, -50));
        draw_overlay(&mut buf, &dimmed, &clear, w, h, Some(sel), &style);

        assert_eq!(buf[0], 0x101010);
        assert_eq!(buf[4 * w + 4], WHITE);
        assert_eq!(buf[5 * w + 13], WHITE);
        assert_eq!(buf[8 * w + 8], 0x333333);
        assert_eq!(buf[12 * w + 14], 0x101010);
    }

    #[test]
    fn overlay_clips_selection_outside_window() {
        let (w, h) = (8, 8);
        let dimmed = vec![1; w * h];
        let clear = vec![0; w * h];
        let mut buf = vec![0; w * h];
        let style = OverlayStyle { border: 1, fill_alpha: 0 };
        draw_overlay(&mut buf, &dimmed, &clear, w, h, Some(Rect::new(-4, -4, 100, 100)), &style);
        assert!(buf.iter().all(|&p| p == 0));
        draw_overlay(&mut buf, &dimmed, &clear, w, h, Some(Rect::new(50, 50, 3, 3)), &style);
        assert!(buf.iter().all(|&p| p == 1));
    }

    #[test]
    fn backdrop_conversion_pads_and_dims() {
        let img = RgbaImage::from_pixel(2, 1, image::Rgba([200, 100, 50, 255]));
        let buf = to_0rgb(Some(&img), 3, 1);
        assert_eq!(buf, vec![0xC86432, 0xC86432, FALLBACK_BACKDROP]);
        assert_eq!(dim(0xC86432, 50), 0x643219);
    }
}
