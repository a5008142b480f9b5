// src/hotkey.rs

use std::str::FromStr;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid hotkey {0:?}: {1}")]
    Parse(String, String),

    #[error("hotkey manager unavailable: {0}")]
    Manager(String),

    #[error("{0}")]
    Register(String),
}

pub fn parse_hotkey(combo: &str) -> Result<HotKey, HotkeyError> {
    HotKey::from_str(combo).map_err(|e| HotkeyError::Parse(combo.to_string(), e.to_string()))
}

/// 进程内唯一的全局快捷键，drop 时注销
pub struct HotkeyBinding {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    combo: String,
}

impl HotkeyBinding {
    pub fn register(combo: &str) -> Result<Self, HotkeyError> {
        let hotkey = parse_hotkey(combo)?;
        let manager = GlobalHotKeyManager::new().map_err(|e| HotkeyError::Manager(e.to_string()))?;
        manager.register(hotkey).map_err(|e| HotkeyError::Register(e.to_string()))?;
        log::info!("registered global hotkey {combo}");
        Ok(HotkeyBinding { manager, hotkey, combo: combo.to_string() })
    }

    pub fn matches(&self, event: &GlobalHotKeyEvent) -> bool {
        event.id() == self.hotkey.id() && event.state() == HotKeyState::Pressed
    }
}

impl Drop for HotkeyBinding {
    fn drop(&mut self) {
        match self.manager.unregister(self.hotkey) {
            Ok(()) => log::debug!("unregistered global hotkey {}", self.combo),
            Err(e) => log::warn!("failed to unregister hotkey {}: {e}", self.combo),
        }
    }
}
