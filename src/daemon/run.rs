//! Daemon runner (single-binary mode).
//!
//! `sd daemon run` starts the background service.

use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::api::DaemonInfo;
use crate::config::Config;
use crate::daemon::bus::BusLimits;
use crate::daemon::engine::{EngineOptions, ReservationEngine};
use crate::daemon::heartbeat::Heartbeat;
use crate::daemon::ipc::{self, IPC_PROTOCOL_VERSION, IpcError};
use crate::daemon::ops::OpError;
use crate::daemon::server::handle_connection;
use crate::{Result, paths};

/// Run the daemon in the current process.
///
/// Returns once a shutdown request or signal arrives.
pub fn run_daemon(config: Config) -> Result<()> {
    let _dir = ipc::ensure_socket_dir().map_err(crate::Error::Ipc)?;
    let socket = ipc::socket_path();
    let meta_path = ipc::meta_path();

    // If another daemon is already listening, exit quietly.
    if UnixStream::connect(&socket).is_ok() {
        eprintln!("daemon already running on {socket:?}");
        return Ok(());
    }

    // Remove stale socket file.
    let _ = std::fs::remove_file(&socket);

    let listener = UnixListener::bind(&socket).map_err(IpcError::from)?;
    let _ = std::fs::set_permissions(&socket, std::fs::Permissions::from_mode(0o600));
    tracing::info!(socket = %socket.display(), "daemon listening");

    // Write daemon metadata for client version checks.
    let meta = DaemonInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol_version: IPC_PROTOCOL_VERSION,
        pid: std::process::id(),
    };
    let _ = std::fs::write(
        &meta_path,
        serde_json::to_vec(&meta).unwrap_or_else(|_| b"{}".to_vec()),
    );
    let _ = std::fs::set_permissions(&meta_path, std::fs::Permissions::from_mode(0o600));

    // Graceful shutdown on SIGINT/SIGTERM or an IPC shutdown request.
    let shutdown = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown));

    let hours = config.desk.hours().map_err(crate::Error::Config)?;
    let engine = ReservationEngine::open(
        hours,
        BusLimits {
            max_subscribers: config.limits.max_subscribers,
            queue_events: config.limits.subscriber_queue_events,
        },
        EngineOptions {
            snapshot_path: paths::snapshot_path(),
            ledger_root: paths::ledger_dir(),
            names_path: paths::names_path(),
            admin_password: config.admin.password.clone(),
            visible_days: config.desk.visible_days,
        },
    )
    .map_err(|e| crate::Error::Op(OpError::from(e)))?;
    let engine = Arc::new(engine);

    let heartbeat = Heartbeat::spawn(
        engine.bus(),
        Duration::from_secs(config.limits.heartbeat_secs.max(1)),
    );

    // Non-blocking accept so both signal flags and IPC shutdown are seen
    // promptly.
    listener.set_nonblocking(true).map_err(IpcError::from)?;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let engine = Arc::clone(&engine);
                let shutdown = Arc::clone(&shutdown);
                std::thread::spawn(move || handle_connection(engine, stream, shutdown));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }

    tracing::info!("daemon shutting down");
    heartbeat.stop();
    let _ = std::fs::remove_file(&socket);
    let _ = std::fs::remove_file(&meta_path);
    Ok(())
}
