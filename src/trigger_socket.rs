// src/trigger_socket.rs
//
// 常驻进程的命令入口：`snipmini capture` / `snipmini quit` 连到已经在跑的实例，
// 写一行命令就断开。Unix 上是用户目录下的 Unix socket，其它平台是本机回环端口。
// 快捷键注册失败时，这是唯一的触发方式。

use std::io::{self, Read, Write};
use std::thread;

use crossbeam_channel::Sender;

use crate::app::Trigger;

/// 逐个读取连接发来的命令，转给主循环。出错的连接跳过，不影响后面的
pub fn serve<S: Read>(incoming: impl IntoIterator<Item = io::Result<S>>, tx: &Sender<Trigger>) {
    for stream in incoming {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("trigger socket accept failed: {e}");
                continue;
            }
        };
        let mut payload = String::new();
        if let Err(e) = stream.read_to_string(&mut payload) {
            log::warn!("trigger socket read failed: {e}");
            continue;
        }
        let Some(trigger) = Trigger::parse(&payload) else {
            log::warn!("unknown trigger command {:?}", payload.trim());
            continue;
        };
        log::info!("received {trigger:?} from trigger socket");
        // 主循环已经退出
        if tx.send(trigger).is_err() {
            break;
        }
    }
}

fn write_command(mut stream: impl Write, trigger: Trigger) -> io::Result<()> {
    stream.write_all(trigger.command().as_bytes())?;
    stream.flush()
}

#[cfg(unix)]
pub use unix::{TriggerListener, listen, send};

#[cfg(not(unix))]
pub use loopback::{TriggerListener, listen, send};

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::{Path, PathBuf};

    use super::*;

    /// 优先放在 XDG_RUNTIME_DIR，没有就放临时目录并带上用户名
    pub fn socket_path() -> PathBuf {
        if let Some(dir) = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from) {
            if dir.is_dir() {
                return dir.join("snipmini.sock");
            }
        }
        let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
        std::env::temp_dir().join(format!("snipmini-{user}.sock"))
    }

    /// 持有期间 socket 文件存在，drop 时删掉
    #[derive(Debug)]
    pub struct TriggerListener {
        path: PathBuf,
    }

    impl Drop for TriggerListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub fn listen(tx: Sender<Trigger>) -> io::Result<TriggerListener> {
        listen_at(socket_path(), tx)
    }

    /// 已有实例在监听时返回 AddrInUse；残留的 socket 文件会被清理掉
    pub fn listen_at(path: PathBuf, tx: Sender<Trigger>) -> io::Result<TriggerListener> {
        let listener = match UnixListener::bind(&path) {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                if UnixStream::connect(&path).is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!("another instance is listening on {}", path.display()),
                    ));
                }
                std::fs::remove_file(&path)?;
                UnixListener::bind(&path)?
            }
            Err(e) => return Err(e),
        };
        log::info!("listening for triggers on {}", path.display());
        thread::Builder::new()
            .name("trigger-socket".to_string())
            .spawn(move || serve(listener.incoming(), &tx))?;
        Ok(TriggerListener { path })
    }

    pub fn send(trigger: Trigger) -> io::Result<()> {
        send_to(&socket_path(), trigger)
    }

    pub fn send_to(path: &Path, trigger: Trigger) -> io::Result<()> {
        write_command(UnixStream::connect(path)?, trigger)
    }
}

#[cfg(not(unix))]
mod loopback {
    use std::io;
    use std::net::{Ipv4Addr, TcpListener, TcpStream};

    use super::*;

    const PORT: u16 = 47319;

    #[derive(Debug)]
    pub struct TriggerListener;

    pub fn listen(tx: Sender<Trigger>) -> io::Result<TriggerListener> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, PORT))?;
        log::info!("listening for triggers on 127.0.0.1:{PORT}");
        thread::Builder::new()
            .name("trigger-socket".to_string())
            .spawn(move || serve(listener.incoming(), &tx))?;
        Ok(TriggerListener)
    }

    pub fn send(trigger: Trigger) -> io::Result<()> {
        write_command(TcpStream::connect((Ipv4Addr::LOCALHOST, PORT))?, trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    fn conn(payload: &str) -> io::Result<Cursor<Vec<u8>>> {
        Ok(Cursor::new(payload.as_bytes().to_vec()))
    }

    #[test]
    fn forwards_known_commands_and_skips_the_rest() {
        let (tx, rx) = unbounded();
        let incoming = vec![
            conn("capture\n"),
            Err(io::Error::other("reset")),
            conn("screenshot please"),
            conn("  QUIT "),
        ];
        serve(incoming, &tx);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [Trigger::Capture, Trigger::Quit]);
    }

    #[test]
    fn stops_when_the_main_loop_is_gone() {
        let (tx, rx) = unbounded();
        drop(rx);
        // 不会卡住也不会 panic
        serve(vec![conn("capture"), conn("capture")], &tx);
    }

    #[test]
    fn commands_round_trip_through_the_wire_format() {
        for trigger in [Trigger::Capture, Trigger::Quit] {
            let mut wire = Vec::new();
            write_command(&mut wire, trigger).unwrap();
            let (tx, rx) = unbounded();
            serve(vec![Ok(Cursor::new(wire))], &tx);
            assert_eq!(rx.try_recv().unwrap(), trigger);
        }
    }

    #[cfg(unix)]
    #[test]
    fn running_instance_receives_commands_over_the_socket() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipmini.sock");
        let (tx, rx) = unbounded();
        let listener = unix::listen_at(path.clone(), tx.clone()).unwrap();

        unix::send_to(&path, Trigger::Capture).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Trigger::Capture);

        // 第二个实例不能抢走同一个 socket
        let second = unix::listen_at(path.clone(), tx).unwrap_err();
        assert_eq!(second.kind(), io::ErrorKind::AddrInUse);

        drop(listener);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn stale_socket_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipmini.sock");
        // 绑定后立刻丢掉监听者，留下没人接的 socket 文件
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let (tx, _rx) = unbounded();
        let _listener = unix::listen_at(path.clone(), tx).unwrap();
        unix::send_to(&path, Trigger::Quit).unwrap();
    }
}
