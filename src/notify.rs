// src/notify.rs
//
// 给用户看的提示。只管弹出来，不关心返回值。

use rfd::{MessageButtons, MessageDialog, MessageLevel};

use crate::app::Trigger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    HotkeyUnavailable { hotkey: String, reason: String },
    ClipboardExhausted { attempts: u32 },
    SaveFailed(String),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::HotkeyUnavailable { .. } => "snipmini",
            Notice::ClipboardExhausted { .. } => "复制失败",
            Notice::SaveFailed(_) => "错误",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::HotkeyUnavailable { hotkey, reason } => format!(
                "快捷键 {hotkey} 注册失败（可能被其它程序占用）：{reason}\n\
                 snipmini 会继续在后台运行：执行 `snipmini {}` 开始截图，`snipmini {}` 退出。",
                Trigger::Capture.command(),
                Trigger::Quit.command(),
            ),
            Notice::ClipboardExhausted { attempts } => {
                format!("无法复制到剪贴板（已尝试 {attempts} 次），请再试一次。")
            }
            Notice::SaveFailed(reason) => format!("保存失败:\n{reason}"),
        }
    }

    fn level(&self) -> MessageLevel {
        match self {
            Notice::HotkeyUnavailable { .. } => MessageLevel::Warning,
            _ => MessageLevel::Error,
        }
    }
}

pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

/// 用 rfd 的消息框提示
#[derive(Debug, Default)]
pub struct DialogNotifier;

impl Notifier for DialogNotifier {
    fn notify(&self, notice: &Notice) {
        log::warn!("{}: {}", notice.title(), notice.message());
        let _ = MessageDialog::new()
            .set_level(notice.level())
            .set_title(notice.title())
            .set_description(notice.message())
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}
