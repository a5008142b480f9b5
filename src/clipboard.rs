// src/clipboard.rs
//
// 把截图放进系统剪贴板。剪贴板是全系统共享的资源，经常被别的进程短暂占用，
// 所以一次失败不算失败：有限次数地重试，每次之间等一下。

use std::borrow::Cow;
use std::thread;
use std::time::Duration;

use arboard::{Clipboard, ImageData};

use crate::capture::CapturedFrame;
use crate::config::ClipboardConfig;

/// 交给剪贴板的 RGBA 像素，和截图不共享内存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

impl ClipboardImage {
    /// 每次尝试都重新拷一份，剪贴板拿到的内存和调用方的截图互不影响
    pub fn copy_of(frame: &CapturedFrame) -> Self {
        let image = frame.image();
        ClipboardImage {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: image.as_raw().to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard is busy: {0}")]
    Busy(String),

    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to set clipboard image: {0}")]
    Transfer(String),
}

/// 剪贴板的最小操作集合
pub trait ClipboardSink {
    fn clear(&mut self) -> Result<(), ClipboardError>;

    /// 图像所有权交给剪贴板
    fn set_image(&mut self, image: ClipboardImage) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone)]
pub struct ClipboardDelivery {
    attempts: u32,
    backoff: Duration,
}

impl ClipboardDelivery {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        ClipboardDelivery { attempts: attempts.max(1), backoff }
    }

    pub fn from_config(config: &ClipboardConfig) -> Self {
        Self::new(config.attempts, config.backoff)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 成功一次就立刻返回 true；全部尝试都失败才返回 false
    pub fn deliver(&self, sink: &mut dyn ClipboardSink, frame: &CapturedFrame) -> bool {
        for attempt in 1..=self.attempts {
            let image = ClipboardImage::copy_of(frame);
            match sink.clear().and_then(|()| sink.set_image(image)) {
                Ok(()) => {
                    log::info!(
                        "copied {}x{} image to clipboard (attempt {attempt})",
                        frame.width(),
                        frame.height()
                    );
                    return true;
                }
                Err(e) => {
                    log::warn!("clipboard attempt {attempt}/{} failed: {e}", self.attempts);
                    if attempt < self.attempts && !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                }
            }
        }
        log::error!("giving up on clipboard after {} attempts", self.attempts);
        false
    }
}

/// 基于 arboard 的实现。被占用时在内部再重试几次，相当于带超时地等待剪贴板所有权。
pub struct ArboardClipboard {
    clipboard: Option<Clipboard>,
    retries: u32,
    delay: Duration,
}

impl ArboardClipboard {
    pub fn new(config: &ClipboardConfig) -> Self {
        ArboardClipboard {
            clipboard: None,
            retries: config.acquire_retries.max(1),
            delay: config.acquire_delay,
        }
    }

    fn with_clipboard<T>(
        &mut self,
        op: impl FnMut(&mut Clipboard) -> Result<T, arboard::Error>,
    ) -> Result<T, ClipboardError> {
        retry_occupied(&mut self.clipboard, Clipboard::new, op, self.retries, self.delay)
    }
}

/// 必要时用 `open` 打开剪贴板再执行 `op`。打开或执行时被占用就等 `delay` 再试，
/// 一共最多 `retries` 次；其它错误立刻返回，执行出错时丢掉句柄，下次重新打开。
fn retry_occupied<C, T>(
    handle: &mut Option<C>,
    mut open: impl FnMut() -> Result<C, arboard::Error>,
    mut op: impl FnMut(&mut C) -> Result<T, arboard::Error>,
    retries: u32,
    delay: Duration,
) -> Result<T, ClipboardError> {
    let mut last = None;
    for attempt in 1..=retries {
        if attempt > 1 && !delay.is_zero() {
            thread::sleep(delay);
        }
        if handle.is_none() {
            match open() {
                Ok(cb) => *handle = Some(cb),
                Err(arboard::Error::ClipboardOccupied) => {
                    last = Some(ClipboardError::Busy("occupied while opening".to_string()));
                    continue;
                }
                Err(e) => return Err(ClipboardError::Unavailable(e.to_string())),
            }
        }
        let Some(cb) = handle.as_mut() else { continue };
        match op(cb) {
            Ok(v) => return Ok(v),
            Err(arboard::Error::ClipboardOccupied) => {
                last = Some(ClipboardError::Busy(arboard::Error::ClipboardOccupied.to_string()));
            }
            Err(e) => {
                *handle = None;
                return Err(ClipboardError::Transfer(e.to_string()));
            }
        }
    }
    Err(last.unwrap_or_else(|| ClipboardError::Busy("no attempts made".to_string())))
}

impl ClipboardSink for ArboardClipboard {
    fn clear(&mut self) -> Result<(), ClipboardError> {
        self.with_clipboard(|cb| cb.clear())
    }

    fn set_image(&mut self, image: ClipboardImage) -> Result<(), ClipboardError> {
        self.with_clipboard(|cb| {
            cb.set_image(ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Borrowed(image.bytes.as_slice()),
            })
        })
    }
}
