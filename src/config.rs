// src/config.rs
//
// 运行参数：全部有内置默认值，可以用环境变量临时覆盖，不做持久化。

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOTKEY: &str = "ctrl+shift+KeyS";

#[derive(Debug, Clone, PartialEq)]
pub struct SnipConfig {
    /// global-hotkey 格式，例如 `ctrl+shift+KeyS`
    pub hotkey: String,
    pub selector: SelectorConfig,
    pub picker: PickerConfig,
    pub clipboard: ClipboardConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// 宽或高小于这个值的拖拽视为误点
    pub min_size: u32,
    pub border_width: u32,
    pub fill_alpha: u8,
    /// 背景变暗后保留的亮度（百分比）
    pub dim_percent: u8,
    /// 覆盖层关闭后、截图前的等待时间
    pub settle: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickerConfig {
    pub gap: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardConfig {
    pub attempts: u32,
    pub backoff: Duration,
    /// 剪贴板被其它进程占用时，单次尝试内部的重试次数和间隔
    pub acquire_retries: u32,
    pub acquire_delay: Duration,
}

impl Default for SnipConfig {
    fn default() -> Self {
        SnipConfig {
            hotkey: DEFAULT_HOTKEY.to_string(),
            selector: SelectorConfig::default(),
            picker: PickerConfig::default(),
            clipboard: ClipboardConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            min_size: 2,
            border_width: 2,
            fill_alpha: 50,
            dim_percent: 60,
            settle: Duration::from_millis(40),
        }
    }
}

impl Default for PickerConfig {
    fn default() -> Self {
        PickerConfig { gap: 8 }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        ClipboardConfig {
            attempts: 8,
            backoff: Duration::from_millis(80),
            acquire_retries: 10,
            acquire_delay: Duration::from_millis(50),
        }
    }
}

impl SnipConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = SnipConfig::default();
        let d = &config;

        let hotkey = lookup("SNIPMINI_HOTKEY")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| d.hotkey.clone());
        let min_size = parse_or(&lookup, "SNIPMINI_MIN_SELECTION", d.selector.min_size);
        let settle = millis_or(&lookup, "SNIPMINI_SETTLE_MS", d.selector.settle);
        let attempts = parse_or(&lookup, "SNIPMINI_CLIPBOARD_ATTEMPTS", d.clipboard.attempts);
        let backoff = millis_or(&lookup, "SNIPMINI_CLIPBOARD_BACKOFF_MS", d.clipboard.backoff);
        let acquire_retries =
            parse_or(&lookup, "SNIPMINI_CLIPBOARD_ACQUIRE_RETRIES", d.clipboard.acquire_retries);
        let acquire_delay =
            millis_or(&lookup, "SNIPMINI_CLIPBOARD_ACQUIRE_DELAY_MS", d.clipboard.acquire_delay);

        config.hotkey = hotkey;
        // 至少 1 像素，否则 0x0 也能“选中”
        config.selector.min_size = min_size.max(1);
        config.selector.settle = settle;
        config.clipboard.attempts = attempts.max(1);
        config.clipboard.backoff = backoff;
        config.clipboard.acquire_retries = acquire_retries.max(1);
        config.clipboard.acquire_delay = acquire_delay;
        config
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("ignoring {key}={raw:?}, keeping {default:?}");
                default
            }
        },
    }
}

fn millis_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    let ms = parse_or(lookup, key, default.as_millis() as u64);
    Duration::from_millis(ms)
}
