#![windows_subsystem = "windows"]

use std::io;

use anyhow::Result;

mod app;
mod capture;
mod clipboard;
mod config;
mod geometry;
mod hotkey;
mod notify;
mod picker;
mod pump;
mod save;
mod selection;
mod selection_logic;
mod session;
mod trigger_socket;

use app::{App, Trigger};
use config::SnipConfig;
use pump::PlatformPump;

/// 这次启动要做什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    /// 常驻，等快捷键或命令
    Resident,
    /// 截一次就退出
    Once,
    /// 把命令交给已经在跑的实例
    Forward(Trigger),
}

fn parse_launch(args: impl IntoIterator<Item = String>) -> Launch {
    let mut launch = Launch::Resident;
    for arg in args {
        if arg == "--once" {
            launch = Launch::Once;
        } else if let Some(trigger) = Trigger::parse(&arg) {
            return Launch::Forward(trigger);
        } else {
            log::warn!("ignoring unknown argument {arg:?}");
        }
    }
    launch
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let launch = parse_launch(std::env::args().skip(1));
    if let Launch::Forward(trigger) = launch {
        match trigger_socket::send(trigger) {
            Ok(()) => {
                log::info!("sent {} to the running instance", trigger.command());
                return Ok(());
            }
            Err(e) if trigger == Trigger::Quit => {
                log::warn!("no running instance to stop: {e}");
                return Ok(());
            }
            // 没有常驻实例就自己截一次
            Err(e) => log::info!("no running instance ({e}), capturing once"),
        }
    }

    let config = SnipConfig::from_env();
    log::debug!("{config:?}");
    let (tx, rx) = crossbeam_channel::unbounded();

    let mut once = launch != Launch::Resident;
    let mut listener = None;
    if !once {
        match trigger_socket::listen(tx.clone()) {
            Ok(l) => listener = Some(l),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                log::warn!("snipmini is already running: {e}");
                return Ok(());
            }
            Err(e) => log::warn!("trigger socket unavailable: {e}"),
        }
    }

    let mut pump = PlatformPump::new();
    let mut app = App::start(config, tx.clone(), rx);
    if !once && !app.has_hotkey() && listener.is_none() {
        // 两个入口都没有，常驻也无法再被唤起
        log::warn!("no hotkey and no trigger socket, capturing once");
        once = true;
    }
    if once {
        tx.send(Trigger::Capture)?;
        tx.send(Trigger::Quit)?;
    }
    app.run(&mut pump);
    drop(listener);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(args: &[&str]) -> Launch {
        parse_launch(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn launch_modes() {
        assert_eq!(launch(&[]), Launch::Resident);
        assert_eq!(launch(&["--once"]), Launch::Once);
        assert_eq!(launch(&["capture"]), Launch::Forward(Trigger::Capture));
        assert_eq!(launch(&["--once", "quit"]), Launch::Forward(Trigger::Quit));
        assert_eq!(launch(&["--verbose"]), Launch::Resident);
    }
}
