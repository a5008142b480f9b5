// src/save.rs
//
// 另存为：弹出保存对话框，按扩展名决定编码格式（PNG / JPEG / BMP）。

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use image::{DynamicImage, ImageFormat};

use crate::capture::CapturedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    /// 不认识或没有扩展名时按 PNG 处理
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp" => SaveFormat::Bmp,
            _ => SaveFormat::Png,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            SaveFormat::Png => ImageFormat::Png,
            SaveFormat::Jpeg => ImageFormat::Jpeg,
            SaveFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResult {
    Saved(PathBuf),
    /// 用户关掉了保存对话框
    Dismissed,
}

/// 保存截图的外部协作者，不负责截图的生命周期
pub trait FileSaver {
    fn save(&mut self, frame: &CapturedFrame) -> Result<SaveResult, SaveError>;
}

pub fn default_file_name(now: NaiveDateTime) -> String {
    format!("snip-{}.png", now.format("%Y%m%d-%H%M%S"))
}

/// 用户没写扩展名时自动补上 .png
pub fn with_default_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() { path } else { path.with_extension("png") }
}

pub fn save_frame(frame: &CapturedFrame, path: &Path) -> Result<SaveFormat, SaveError> {
    let format = SaveFormat::from_path(path);
    match format {
        // JPEG 不支持透明通道
        SaveFormat::Jpeg => DynamicImage::ImageRgba8(frame.image().clone())
            .to_rgb8()
            .save_with_format(path, format.image_format())?,
        _ => frame.image().save_with_format(path, format.image_format())?,
    }
    Ok(format)
}

/// 基于 rfd 保存对话框的实现
#[derive(Debug, Default)]
pub struct DialogSaver;

impl FileSaver for DialogSaver {
    fn save(&mut self, frame: &CapturedFrame) -> Result<SaveResult, SaveError> {
        let picked = rfd::FileDialog::new()
            .set_title("保存截图")
            .add_filter("PNG", &["png"])
            .add_filter("JPEG", &["jpg", "jpeg"])
            .add_filter("BMP", &["bmp"])
            .set_file_name(default_file_name(Local::now().naive_local()))
            .save_file();
        let Some(path) = picked else {
            log::info!("save dialog dismissed");
            return Ok(SaveResult::Dismissed);
        };

        let path = with_default_extension(path);
        let format = save_frame(frame, &path)?;
        log::info!("saved {}x{} {:?} to {}", frame.width(), frame.height(), format, path.display());
        Ok(SaveResult::Saved(path))
    }
}
