//! Process topology (§4.6.1): a primary process that forks N worker
//! processes sharing one listening socket via `SO_REUSEPORT`, restarts any
//! worker that exits unexpectedly, and forwards shutdown signals down to
//! its children.
//!
//! `socket2` and `nix` are the standard ecosystem crates for the
//! low-level socket option control and POSIX signal delivery this
//! topology needs.

use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::process::{Child, Command};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Internal argument carrying the inherited listening socket's file
/// descriptor down to a re-exec'd worker (§4.6.1). Never set by an operator.
const WORKER_MARKER: &str = "--worker";
const FD_MARKER: &str = "--fd";

/// Binds the shared listening socket with `SO_REUSEPORT` so every forked
/// worker — each of which rebinds the same address — lets the kernel
/// load-balance accepted connections across them.
pub fn bind_shared_listener(addr: &SocketAddr) -> io::Result<Socket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;
    Ok(socket)
}

/// Runs the primary process: binds the shared listener, forks
/// `config.worker_count()` workers (each the current binary re-executed
/// with `--worker --fd <n>`), restarts any worker that exits unexpectedly,
/// and forwards `SIGTERM`/`SIGINT` to every live child before exiting.
///
/// The primary serves no requests itself.
pub async fn run_primary(config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.socket_addr().parse()?;
    let listener = bind_shared_listener(&addr)?;
    let listen_fd = listener.as_raw_fd();

    // `socket2::Socket::new` sets `SOCK_CLOEXEC` by default; clear it once
    // here so every forked worker's `exec` inherits the fd instead of it
    // being silently closed at exec time.
    clear_cloexec(listen_fd)?;

    let worker_count = config.worker_count();
    info!(workers = worker_count, address = %addr, "primary process starting workers");

    let exe = std::env::current_exe()?;
    let mut children: Vec<Child> = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        children.push(spawn_worker(&exe, config, listen_fd)?);
    }

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("primary received SIGTERM, forwarding to workers");
                break;
            }
            _ = sigint.recv() => {
                info!("primary received SIGINT, forwarding to workers");
                break;
            }
            _ = reap_dead_workers(&mut children, &exe, config, listen_fd) => {}
        }
    }

    for child in &children {
        let pid = Pid::from_raw(child.id() as i32);
        if let Err(err) = signal::kill(pid, Signal::SIGTERM) {
            warn!(pid = child.id(), error = %err, "failed to signal worker");
        }
    }

    for mut child in children {
        let _ = child.wait();
    }

    info!("all workers exited, primary shutting down");
    Ok(())
}

/// Polls for exited children roughly once a second and respawns them,
/// matching the primary's "restart any worker that exits unexpectedly"
/// duty (§4.6.1). A worker that exited because the primary itself is
/// shutting down is never observed here — the primary breaks out of its
/// select loop on the signal branch first.
async fn reap_dead_workers(
    children: &mut Vec<Child>,
    exe: &std::path::Path,
    config: &ServerConfig,
    listen_fd: RawFd,
) {
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let mut i = 0;
    while i < children.len() {
        match children[i].try_wait() {
            Ok(Some(status)) => {
                warn!(pid = children[i].id(), ?status, "worker exited, restarting");
                children.remove(i);
                match spawn_worker(exe, config, listen_fd) {
                    Ok(child) => children.push(child),
                    Err(err) => warn!(error = %err, "failed to respawn worker"),
                }
            }
            Ok(None) => i += 1,
            Err(err) => {
                warn!(error = %err, "failed to poll worker status");
                i += 1;
            }
        }
    }
}

fn spawn_worker(exe: &std::path::Path, config: &ServerConfig, listen_fd: RawFd) -> io::Result<Child> {
    let mut command = Command::new(exe);
    command
        .arg(WORKER_MARKER)
        .arg("true")
        .arg(FD_MARKER)
        .arg(listen_fd.to_string())
        .arg("--port")
        .arg(config.port.to_string())
        .arg("--host")
        .arg(&config.host)
        .arg("--database-url")
        .arg(&config.database_url)
        .arg("--database-ssl")
        .arg(config.database_ssl.to_string())
        .arg("--db-pool-min")
        .arg(config.db_pool_min.to_string())
        .arg("--db-pool-max")
        .arg(config.db_pool_max.to_string())
        .arg("--log-level")
        .arg(&config.log_level)
        .arg("--etl-batch-size")
        .arg(config.etl_batch_size.to_string())
        .arg("--etl-retry-attempts")
        .arg(config.etl_retry_attempts.to_string())
        .arg("--etl-retry-delay-ms")
        .arg(config.etl_retry_delay_ms.to_string())
        .arg("--etl-flush-delay-ms")
        .arg(config.etl_flush_delay_ms.to_string())
        .arg("--search-max-candidates")
        .arg(config.search_max_candidates.to_string());

    command.spawn()
}

/// Clears `FD_CLOEXEC` on `fd` so it survives the child's `exec`.
fn clear_cloexec(fd: RawFd) -> io::Result<()> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map_err(io::Error::from)?;
    Ok(())
}

/// Builds the worker's listener: if the process was launched with an
/// inherited `--fd` (the normal, primary-forked case), wraps that raw
/// descriptor directly — no second `bind` needed, since the primary already
/// owns the `SO_REUSEPORT` socket. If no fd was inherited (the process was
/// launched standalone, e.g. for a single-process local run), the worker
/// binds its own `SO_REUSEPORT` socket at the same address so a future
/// sibling worker launched the same way can still share the port.
pub fn worker_listener(config: &ServerConfig) -> io::Result<std::net::TcpListener> {
    let socket = match config.fd {
        Some(fd) => unsafe { Socket::from_raw_fd(fd) },
        None => {
            let addr: SocketAddr = config
                .socket_addr()
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            bind_shared_listener(&addr)?
        }
    };
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_shared_listener_accepts_ipv4_loopback() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_shared_listener(&addr).expect("bind should succeed");
        assert!(socket.local_addr().is_ok());
    }

    #[test]
    fn two_listeners_can_share_the_same_port_with_reuseport() {
        let first = bind_shared_listener(&"127.0.0.1:0".parse().unwrap()).unwrap();
        let bound: SocketAddr = first.local_addr().unwrap().as_socket().unwrap();
        let second = bind_shared_listener(&bound);
        assert!(second.is_ok(), "SO_REUSEPORT should allow a second bind to the same address");
    }
}
