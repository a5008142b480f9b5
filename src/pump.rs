// src/pump.rs
//
// 全局快捷键的系统事件要靠创建它的线程（主线程）上跑着的消息循环才能送到。
// 主循环每隔一小段时间就来这里把积压的系统消息处理掉。

/// 处理当前线程上积压的系统消息，不阻塞
pub trait EventPump {
    fn dispatch_pending(&mut self);
}

/// 当前平台的消息循环
#[derive(Debug, Default)]
pub struct PlatformPump;

impl PlatformPump {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        macos::prepare();
        PlatformPump
    }
}

impl EventPump for PlatformPump {
    #[cfg(target_os = "windows")]
    fn dispatch_pending(&mut self) {
        win32::dispatch_pending();
    }

    #[cfg(target_os = "macos")]
    fn dispatch_pending(&mut self) {
        macos::dispatch_pending();
    }

    // X11 下 global-hotkey 自己开线程收事件
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn dispatch_pending(&mut self) {}
}

#[cfg(target_os = "windows")]
mod win32 {
    use ::windows::Win32::Foundation::HWND;
    use ::windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, MSG, PM_REMOVE, PeekMessageW, TranslateMessage,
    };

    /// WM_HOTKEY 投递到 global-hotkey 的隐藏窗口，这里把它分发出去
    pub fn dispatch_pending() {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy, NSEventMask};
    use objc2_foundation::{MainThreadMarker, NSDate, NSDefaultRunLoopMode};

    /// 不在 Dock 里出现
    pub fn prepare() {
        let Some(mtm) = MainThreadMarker::new() else {
            log::warn!("event pump created off the main thread, hotkey events will not arrive");
            return;
        };
        let app = NSApplication::sharedApplication(mtm);
        app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
        unsafe { app.finishLaunching() };
    }

    /// Carbon 快捷键事件随 NSApp 的事件队列一起分发
    pub fn dispatch_pending() {
        let Some(mtm) = MainThreadMarker::new() else { return };
        let app = NSApplication::sharedApplication(mtm);
        let now = NSDate::distantPast();
        unsafe {
            while let Some(event) = app.nextEventMatchingMask_untilDate_inMode_dequeue(
                NSEventMask::Any,
                Some(&now),
                NSDefaultRunLoopMode,
                true,
            ) {
                app.sendEvent(&event);
            }
            app.updateWindows();
        }
    }
}
