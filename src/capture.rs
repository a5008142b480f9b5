// src/capture.rs
//
// 从屏幕取像素：按选区跨越的每个显示器分别截图，再拼成选区大小的位图。

use std::cell::Cell;

use image::imageops::{self, FilterType};
use image::{GenericImage, GenericImageView, RgbaImage};
use xcap::Monitor;

use crate::geometry::{self, Rect};

thread_local! {
    static LIVE_FRAMES: Cell<usize> = const { Cell::new(0) };
}

/// 当前线程上还没释放的截图数量
pub fn live_frames() -> usize {
    LIVE_FRAMES.with(Cell::get)
}

/// 一次截图的结果：独占的 RGBA 像素 + 它来自的虚拟屏幕矩形。
/// 像素内存在 drop 时释放，且只会释放一次。
pub struct CapturedFrame {
    rect: Rect,
    pixels: RgbaImage,
}

impl CapturedFrame {
    pub fn new(rect: Rect, pixels: RgbaImage) -> Self {
        debug_assert_eq!((rect.w, rect.h), pixels.dimensions());
        LIVE_FRAMES.with(|n| n.set(n.get() + 1));
        CapturedFrame { rect, pixels }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        LIVE_FRAMES.with(|n| n.set(n.get().saturating_sub(1)));
        let Rect { x, y, w, h } = self.rect;
        log::debug!("released {w}x{h} frame at ({x}, {y})");
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame").field("rect", &self.rect).finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No monitor found")]
    NoMonitor,

    #[error("Capture region {0:?} is empty")]
    EmptyRegion(Rect),

    #[error("Capture region {0:?} is not on any monitor")]
    OffScreen(Rect),

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
}

/// 屏幕像素来源
pub trait FrameCapturer {
    /// 所有显示器的并集
    fn virtual_screen(&self) -> Result<Rect, CaptureError>;

    /// 截取 `rect` 处的像素，返回的帧大小与 `rect` 完全一致
    fn capture(&self, rect: Rect) -> Result<CapturedFrame, CaptureError>;
}

/// 单个显示器的截图，`bounds` 是它在虚拟屏幕里的位置
pub struct Tile {
    pub bounds: Rect,
    pub image: RgbaImage,
}

/// 把各显示器的截图拼成 `rect` 大小的位图，没有显示器覆盖的地方保持透明黑色。
///
/// 显示器边界是逻辑坐标，截图是物理像素，两者比例不是 1 时按比例取像素再缩放回选区大小。
pub fn compose(rect: Rect, tiles: &[Tile]) -> RgbaImage {
    let mut out = RgbaImage::new(rect.w, rect.h);
    for tile in tiles {
        let Some(overlap) = rect.intersect(&tile.bounds) else { continue };
        let Some((src_x, src_y, src_w, src_h)) = pixel_region(tile, overlap) else {
            continue;
        };
        let view = tile.image.view(src_x, src_y, src_w, src_h);
        let dst_x = (overlap.x - rect.x) as u32;
        let dst_y = (overlap.y - rect.y) as u32;
        let copied = if (src_w, src_h) == (overlap.w, overlap.h) {
            out.copy_from(&*view, dst_x, dst_y)
        } else {
            // 最近邻，不引入截图里没有的颜色
            let scaled = imageops::resize(&*view, overlap.w, overlap.h, FilterType::Nearest);
            out.copy_from(&scaled, dst_x, dst_y)
        };
        if let Err(e) = copied {
            log::warn!("skipping monitor tile at {:?}: {e}", tile.bounds);
        }
    }
    out
}

/// `overlap` 在这块截图里对应的像素区域 (x, y, w, h)
fn pixel_region(tile: &Tile, overlap: Rect) -> Option<(u32, u32, u32, u32)> {
    let (img_w, img_h) = tile.image.dimensions();
    if tile.bounds.is_empty() || img_w == 0 || img_h == 0 {
        return None;
    }
    let scale_x = f64::from(img_w) / f64::from(tile.bounds.w);
    let scale_y = f64::from(img_h) / f64::from(tile.bounds.h);
    let to_px = |logical: i32, scale: f64, limit: u32| {
        ((f64::from(logical) * scale).round() as u32).min(limit)
    };

    let left = to_px(overlap.x - tile.bounds.x, scale_x, img_w);
    let top = to_px(overlap.y - tile.bounds.y, scale_y, img_h);
    let right = to_px(overlap.right() - tile.bounds.x, scale_x, img_w);
    let bottom = to_px(overlap.bottom() - tile.bounds.y, scale_y, img_h);
    (right > left && bottom > top).then(|| (left, top, right - left, bottom - top))
}

/// 基于 xcap 的实现
#[derive(Debug, Default)]
pub struct XcapCapturer;

impl XcapCapturer {
    fn monitors() -> Result<Vec<(Rect, Monitor)>, CaptureError> {
        let enumeration = |e: xcap::XCapError| CaptureError::MonitorEnumeration(e.to_string());
        let monitors = Monitor::all().map_err(enumeration)?;
        if monitors.is_empty() {
            return Err(CaptureError::NoMonitor);
        }
        monitors
            .into_iter()
            .map(|m| {
                let bounds = Rect::new(
                    m.x().map_err(enumeration)?,
                    m.y().map_err(enumeration)?,
                    m.width().map_err(enumeration)?,
                    m.height().map_err(enumeration)?,
                );
                Ok((bounds, m))
            })
            .collect()
    }
}

impl FrameCapturer for XcapCapturer {
    fn virtual_screen(&self) -> Result<Rect, CaptureError> {
        let monitors = Self::monitors()?;
        geometry::virtual_screen(monitors.iter().map(|(bounds, _)| bounds))
            .ok_or(CaptureError::NoMonitor)
    }

    fn capture(&self, rect: Rect) -> Result<CapturedFrame, CaptureError> {
        if rect.is_empty() {
            return Err(CaptureError::EmptyRegion(rect));
        }

        let mut tiles = Vec::new();
        for (bounds, monitor) in Self::monitors()? {
            if rect.intersect(&bounds).is_none() {
                continue;
            }
            let shot = monitor
                .capture_image()
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
            // xcap 用的 image 版本和我们的不同，按原始字节转换
            let (w, h) = (shot.width(), shot.height());
            let image = RgbaImage::from_raw(w, h, shot.into_raw())
                .ok_or_else(|| CaptureError::CaptureFailed("转换失败".to_string()))?;
            tiles.push(Tile { bounds, image });
        }
        if tiles.is_empty() {
            return Err(CaptureError::OffScreen(rect));
        }

        log::debug!("composing {:?} from {} monitor(s)", rect, tiles.len());
        Ok(CapturedFrame::new(rect, compose(rect, &tiles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn compose_spans_negative_origin_monitors() {
        let tiles = [
            Tile { bounds: Rect::new(-100, 0, 100, 50), image: solid(100, 50, 10) },
            Tile { bounds: Rect::new(0, 0, 100, 50), image: solid(100, 50, 200) },
        ];
        let rect = Rect::new(-20, 10, 40, 20);
        let out = compose(rect, &tiles);
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));
        assert_eq!(out.get_pixel(19, 19), &Rgba([10, 10, 10, 255]));
        assert_eq!(out.get_pixel(20, 0), &Rgba([200, 200, 200, 255]));
        assert_eq!(out.get_pixel(39, 19), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn compose_leaves_gaps_transparent() {
        let tiles = [Tile { bounds: Rect::new(0, 0, 10, 10), image: solid(10, 10, 99) }];
        let out = compose(Rect::new(5, 5, 10, 10), &tiles);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(4, 4), &Rgba([99, 99, 99, 255]));
        assert_eq!(out.get_pixel(5, 5), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn compose_scales_down_oversized_tiles() {
        // 2 倍缩放：逻辑 100x100，截图 200x200，物理 x >= 100 的一半是 200
        let mut image = solid(200, 200, 10);
        for (x, _, px) in image.enumerate_pixels_mut() {
            if x >= 100 {
                *px = Rgba([200, 200, 200, 255]);
            }
        }
        let tiles = [Tile { bounds: Rect::new(0, 0, 100, 100), image }];

        let out = compose(Rect::new(60, 0, 20, 20), &tiles);
        assert_eq!(out.dimensions(), (20, 20));
        assert!(out.pixels().all(|px| *px == Rgba([200, 200, 200, 255])));

        let out = compose(Rect::new(40, 10, 20, 20), &tiles);
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));
        assert_eq!(out.get_pixel(9, 19), &Rgba([10, 10, 10, 255]));
        assert_eq!(out.get_pixel(10, 0), &Rgba([200, 200, 200, 255]));
        assert_eq!(out.get_pixel(19, 19), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn compose_scales_up_smaller_tile_images() {
        let tiles = [Tile { bounds: Rect::new(0, 0, 100, 100), image: solid(50, 50, 7) }];
        let out = compose(Rect::new(40, 40, 20, 20), &tiles);
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(0, 0), &Rgba([7, 7, 7, 255]));
        assert_eq!(out.get_pixel(19, 19), &Rgba([7, 7, 7, 255]));
    }

    #[test]
    fn compose_copies_unscaled_tiles_pixel_for_pixel() {
        let image = RgbaImage::from_fn(10, 10, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let tiles = [Tile { bounds: Rect::new(-10, -10, 10, 10), image }];
        let out = compose(Rect::new(-7, -6, 4, 3), &tiles);
        assert_eq!(out.get_pixel(0, 0), &Rgba([3, 4, 0, 255]));
        assert_eq!(out.get_pixel(3, 2), &Rgba([6, 6, 0, 255]));
    }

    #[test]
    fn frames_are_counted_until_dropped() {
        let before = live_frames();
        let frame = CapturedFrame::new(Rect::new(-5, -5, 3, 2), RgbaImage::new(3, 2));
        assert_eq!(live_frames(), before + 1);
        assert_eq!(frame.rect(), Rect::new(-5, -5, 3, 2));
        assert_eq!((frame.width(), frame.height()), (3, 2));
        drop(frame);
        assert_eq!(live_frames(), before);
    }
}
