// src/app.rs
//
// 进程级的根对象：持有全局快捷键注册和一次截图流程需要的所有协作者。
// 快捷键和命令 socket 发来的触发信号都走同一个循环，同一时间只跑一个流程。

use std::rc::Rc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};
use global_hotkey::GlobalHotKeyEvent;

use crate::capture::{FrameCapturer, XcapCapturer};
use crate::clipboard::{ArboardClipboard, ClipboardDelivery};
use crate::config::SnipConfig;
use crate::hotkey::HotkeyBinding;
use crate::notify::{DialogNotifier, Notice, Notifier};
use crate::picker::ToolbarPicker;
use crate::pump::EventPump;
use crate::save::DialogSaver;
use crate::selection::OverlaySelector;
use crate::session::{CaptureSession, SessionOutcome};

/// 等触发信号时，隔多久处理一次系统消息
const PUMP_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Capture,
    Quit,
}

impl Trigger {
    /// 命令行和命令 socket 上用的名字
    pub fn command(self) -> &'static str {
        match self {
            Trigger::Capture => "capture",
            Trigger::Quit => "quit",
        }
    }

    pub fn parse(command: &str) -> Option<Self> {
        let command = command.trim();
        [Trigger::Capture, Trigger::Quit]
            .into_iter()
            .find(|t| t.command().eq_ignore_ascii_case(command))
    }
}

pub struct App {
    session: CaptureSession,
    hotkey: Option<HotkeyBinding>,
    tx: Sender<Trigger>,
    rx: Receiver<Trigger>,
}

impl App {
    /// 快捷键注册失败不致命：提示一次，之后靠命令 socket 触发
    pub fn start(config: SnipConfig, tx: Sender<Trigger>, rx: Receiver<Trigger>) -> Self {
        let notifier: Rc<dyn Notifier> = Rc::new(DialogNotifier);
        let hotkey = match HotkeyBinding::register(&config.hotkey) {
            Ok(binding) => Some(binding),
            Err(e) => {
                log::warn!("global hotkey unavailable: {e}");
                let hotkey = config.hotkey.clone();
                notifier.notify(&Notice::HotkeyUnavailable { hotkey, reason: e.to_string() });
                None
            }
        };

        let capturer: Rc<dyn FrameCapturer> = Rc::new(XcapCapturer);
        let session = CaptureSession::new(
            Box::new(OverlaySelector::new(capturer.clone(), config.selector.clone())),
            capturer.clone(),
            Box::new(ToolbarPicker::new(capturer, config.picker.clone())),
            Box::new(ArboardClipboard::new(&config.clipboard)),
            Box::new(DialogSaver),
            notifier,
            ClipboardDelivery::from_config(&config.clipboard),
        );
        Self::with_session(session, hotkey, tx, rx)
    }

    pub fn with_session(
        session: CaptureSession,
        hotkey: Option<HotkeyBinding>,
        tx: Sender<Trigger>,
        rx: Receiver<Trigger>,
    ) -> Self {
        App { session, hotkey, tx, rx }
    }

    pub fn has_hotkey(&self) -> bool {
        self.hotkey.is_some()
    }

    /// 给命令 socket 之类的外部入口用
    pub fn triggers(&self) -> Sender<Trigger> {
        self.tx.clone()
    }

    fn is_our_hotkey(&self, event: &GlobalHotKeyEvent) -> bool {
        self.hotkey.as_ref().is_some_and(|binding| binding.matches(event))
    }

    /// 阻塞直到收到 Quit。必须在注册快捷键的线程上调用，
    /// 等待期间不断用 `pump` 处理系统消息，快捷键事件才会到达。
    pub fn run(&mut self, pump: &mut dyn EventPump) {
        let hotkey_events = GlobalHotKeyEvent::receiver();
        log::info!("ready (hotkey {})", if self.has_hotkey() { "active" } else { "unavailable" });

        loop {
            pump.dispatch_pending();
            let trigger = select! {
                recv(self.rx) -> msg => msg.ok(),
                recv(hotkey_events) -> msg => {
                    msg.ok().filter(|ev| self.is_our_hotkey(ev)).map(|_| Trigger::Capture)
                }
                default(PUMP_INTERVAL) => None,
            };
            match trigger {
                Some(Trigger::Capture) => {
                    let outcome = self.capture_once();
                    // 流程进行中按下的快捷键不再触发新的流程
                    let stale = hotkey_events.try_iter().count();
                    if stale > 0 {
                        log::debug!("dropped {stale} hotkey event(s) queued during the session");
                    }
                    log::debug!("session outcome {outcome:?}");
                }
                Some(Trigger::Quit) => break,
                None => {}
            }
        }
        log::info!("shutting down");
    }

    pub fn capture_once(&mut self) -> SessionOutcome {
        self.session.run()
    }
}
