// src/session.rs
//
// 一次完整的截图流程：选区 -> 截图 -> 选择动作 -> 投递，选“重新选择”就回到选区。
// 截图在每条出口上都会被释放（所有权 + Drop，panic 展开时也一样）。

use std::rc::Rc;

use anyhow::Result;

use crate::capture::{self, CapturedFrame, FrameCapturer};
use crate::clipboard::{ClipboardDelivery, ClipboardSink};
use crate::geometry::Rect;
use crate::notify::{Notice, Notifier};
use crate::picker::ActionChoice;
use crate::save::{FileSaver, SaveResult};

/// 区域选择：Some(rect) 表示完成，None 表示用户取消
pub trait RegionSelector {
    fn select(&mut self) -> Result<Option<Rect>>;
}

/// 截图后的动作选择，被直接关掉时返回 Cancel
pub trait ActionPicker {
    fn choose(&mut self, selection: Rect) -> ActionChoice;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    DeliveredClipboard,
    DeliveredFile,
    Aborted,
}

enum Step {
    Done(SessionOutcome),
    Reselect,
}

pub struct CaptureSession {
    selector: Box<dyn RegionSelector>,
    capturer: Rc<dyn FrameCapturer>,
    picker: Box<dyn ActionPicker>,
    clipboard: Box<dyn ClipboardSink>,
    saver: Box<dyn FileSaver>,
    notifier: Rc<dyn Notifier>,
    delivery: ClipboardDelivery,
}

impl CaptureSession {
    pub fn new(
        selector: Box<dyn RegionSelector>,
        capturer: Rc<dyn FrameCapturer>,
        picker: Box<dyn ActionPicker>,
        clipboard: Box<dyn ClipboardSink>,
        saver: Box<dyn FileSaver>,
        notifier: Rc<dyn Notifier>,
        delivery: ClipboardDelivery,
    ) -> Self {
        CaptureSession { selector, capturer, picker, clipboard, saver, notifier, delivery }
    }

    pub fn run(&mut self) -> SessionOutcome {
        let mut round = 0u32;
        let outcome = loop {
            round += 1;
            log::debug!("capture round {round}");

            let rect = match self.selector.select() {
                Ok(Some(rect)) => rect,
                Ok(None) => {
                    log::info!("selection cancelled");
                    break SessionOutcome::Aborted;
                }
                Err(e) => {
                    log::error!("region selector failed: {e:#}");
                    break SessionOutcome::Aborted;
                }
            };

            let frame = match self.capturer.capture(rect) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("capture of {rect:?} failed: {e}");
                    break SessionOutcome::Aborted;
                }
            };

            match self.choose_and_deliver(frame) {
                Step::Done(outcome) => break outcome,
                Step::Reselect => continue,
            }
        };

        log::info!("session finished after {round} round(s): {outcome:?}");
        log::debug!("live frames on this thread: {}", capture::live_frames());
        outcome
    }

    /// `frame` 的所有权在这里结束
    fn choose_and_deliver(&mut self, frame: CapturedFrame) -> Step {
        let choice = self.picker.choose(frame.rect());
        log::debug!("{choice:?} chosen for {:?}", frame.rect());

        let step = match choice {
            ActionChoice::Copy => {
                if self.delivery.deliver(self.clipboard.as_mut(), &frame) {
                    Step::Done(SessionOutcome::DeliveredClipboard)
                } else {
                    // 不自动重来，让用户自己决定
                    let attempts = self.delivery.attempts();
                    self.notifier.notify(&Notice::ClipboardExhausted { attempts });
                    Step::Done(SessionOutcome::Aborted)
                }
            }
            ActionChoice::Save => match self.saver.save(&frame) {
                Ok(SaveResult::Saved(path)) => {
                    log::info!("screenshot saved to {}", path.display());
                    Step::Done(SessionOutcome::DeliveredFile)
                }
                Ok(SaveResult::Dismissed) => Step::Done(SessionOutcome::Aborted),
                Err(e) => {
                    self.notifier.notify(&Notice::SaveFailed(e.to_string()));
                    Step::Done(SessionOutcome::Aborted)
                }
            },
            ActionChoice::Retry => Step::Reselect,
            ActionChoice::Cancel => Step::Done(SessionOutcome::Aborted),
        };

        drop(frame);
        step
    }
}
