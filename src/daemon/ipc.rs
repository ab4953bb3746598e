//! IPC protocol types and codec.
//!
//! Protocol: newline-delimited JSON (ndjson) over Unix socket.
//!
//! Request format: `{"op": "book", ...}\n`
//! Response format: `{"ok": ...}\n` or `{"err": {"code": "...", "message": "..."}}\n`
//!
//! A `subscribe` request is acked like any other and then turns the
//! connection into a stream of `StreamEvent` frames.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{
    DaemonStatus, DayBookings, DaysOutput, NamesOutput, ReloadOutput, SlotsOutput, SubscribeInfo,
};
use crate::core::{ClockTick, ErrorCode};
use crate::daemon::ops::{BookOutput, CancelOutput, ExtractOutput, OpError};
use crate::error::{Effect, Transience};

pub const IPC_PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Request
// =============================================================================

/// IPC request (mutation or query).
///
/// Required-but-absent fields surface as `missing_field` from the engine,
/// not as a parse error, so they stay `Option` here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Claim a free slot.
    Book {
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        booked_by: Option<String>,
        #[serde(default)]
        kiosk: bool,
    },

    /// Cancel (or complete) an existing booking.
    Cancel {
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        is_admin: bool,
        #[serde(default)]
        reason: Option<String>,
    },

    /// Administrative forced removal by raw slot key.
    Extract {
        #[serde(default)]
        slot_key: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },

    /// All live bookings for one day.
    Bookings {
        #[serde(default)]
        date: Option<String>,
    },

    /// Upcoming bookable days.
    Days {
        #[serde(default)]
        count: Option<usize>,
    },

    /// The slot grid.
    Slots,

    /// Server wall-clock snapshot.
    Now,

    /// Display-name roster.
    Names,

    /// Re-read the roster file and swap it in.
    ReloadNames,

    /// Test an admin password before claiming `is_admin`.
    AdminVerify {
        #[serde(default)]
        password: Option<String>,
    },

    /// Turn this connection into an event stream for one day.
    Subscribe {
        #[serde(default)]
        date: Option<String>,
    },

    Status,
    Ping,
    Shutdown,
}

// =============================================================================
// Response
// =============================================================================

/// IPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ok { ok: ResponsePayload },
    Err { err: ErrorPayload },
}

impl Response {
    pub fn ok(payload: ResponsePayload) -> Self {
        Response::Ok { ok: payload }
    }

    pub fn err(error: impl Into<ErrorPayload>) -> Self {
        Response::Err { err: error.into() }
    }
}

/// Successful response payload.
///
/// Untagged: decoding tries variants in order, so more-specific shapes come
/// first (untagged deserialization ignores unknown fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Cancelled(CancelOutput),
    Extracted(ExtractOutput),
    Booked(BookOutput),
    Bookings(DayBookings),
    Days(DaysOutput),
    Slots(SlotsOutput),
    Names(NamesOutput),
    Reloaded(ReloadOutput),
    Status(DaemonStatus),
    Time(ClockTick),
    Subscribed(SubscribeInfo),
    Verified,
    Pong,
    ShuttingDown,
}

/// Error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<OpError> for ErrorPayload {
    fn from(e: OpError) -> Self {
        let details = serde_json::json!({
            "retryable": e.transience().is_retryable(),
            "effect": e.effect().as_str(),
        });
        ErrorPayload {
            code: e.code().to_string(),
            message: e.to_string(),
            details: Some(details),
        }
    }
}

impl From<IpcError> for ErrorPayload {
    fn from(e: IpcError) -> Self {
        let details = serde_json::json!({
            "retryable": e.transience().is_retryable(),
            "effect": e.effect().as_str(),
        });
        ErrorPayload {
            code: e.code().to_string(),
            message: e.to_string(),
            details: Some(details),
        }
    }
}

// =============================================================================
// IpcError
// =============================================================================

/// IPC-specific errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IpcError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client disconnected")]
    Disconnected,

    #[error("daemon unavailable: {0}")]
    DaemonUnavailable(String),
}

impl IpcError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IpcError::Parse(_) => ErrorCode::ParseError,
            IpcError::Io(_) => ErrorCode::IoError,
            IpcError::Disconnected => ErrorCode::Disconnected,
            IpcError::DaemonUnavailable(_) => ErrorCode::DaemonUnavailable,
        }
    }

    /// Whether retrying the IPC operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            IpcError::DaemonUnavailable(_) | IpcError::Io(_) | IpcError::Disconnected => {
                Transience::Retryable
            }
            IpcError::Parse(_) => Transience::Permanent,
        }
    }

    /// What we know about side effects when this IPC error is returned.
    pub fn effect(&self) -> Effect {
        match self {
            IpcError::Io(_) | IpcError::Disconnected => Effect::Unknown,
            IpcError::DaemonUnavailable(_) | IpcError::Parse(_) => Effect::None,
        }
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Encode a request to bytes (one ndjson line).
pub fn encode_request(req: &Request) -> Result<Vec<u8>, IpcError> {
    let mut bytes = serde_json::to_vec(req)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Encode a response to bytes (one ndjson line).
pub fn encode_response(resp: &Response) -> Result<Vec<u8>, IpcError> {
    let mut bytes = serde_json::to_vec(resp)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a request from a line.
pub fn decode_request(line: &str) -> Result<Request, IpcError> {
    Ok(serde_json::from_str(line)?)
}

/// Decode a response from a line.
pub fn decode_response(line: &str) -> Result<Response, IpcError> {
    Ok(serde_json::from_str(line)?)
}

/// Send a response over a stream.
pub fn send_response(stream: &mut UnixStream, resp: &Response) -> Result<(), IpcError> {
    let bytes = encode_response(resp)?;
    stream.write_all(&bytes)?;
    Ok(())
}

/// Read requests from a stream.
pub fn read_requests(stream: UnixStream) -> impl Iterator<Item = Result<Request, IpcError>> {
    let reader = BufReader::new(stream);
    reader.lines().map(|line| {
        let line = line?;
        decode_request(&line)
    })
}

// =============================================================================
// Socket path
// =============================================================================

/// Get the directory that will contain the daemon socket.
pub fn socket_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SLOTDESK_RUNTIME_DIR")
        && !dir.trim().is_empty()
    {
        PathBuf::from(dir)
    } else if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(dir).join("slotdesk")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".slotdesk")
    } else {
        std::env::temp_dir().join(format!("slotdesk-{}", std::process::id()))
    }
}

/// Ensure the socket directory exists and is user-private.
pub fn ensure_socket_dir() -> Result<PathBuf, IpcError> {
    let dir = socket_dir();
    fs::create_dir_all(&dir)?;

    let mode = fs::metadata(&dir)?.permissions().mode() & 0o777;
    if mode != 0o700 {
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    Ok(dir)
}

/// Get the daemon socket path.
pub fn socket_path() -> PathBuf {
    socket_dir().join("daemon.sock")
}

/// Get the daemon metadata path.
pub fn meta_path() -> PathBuf {
    socket_dir().join("daemon.meta.json")
}

// =============================================================================
// Client
// =============================================================================

/// Connect to the daemon socket.
pub fn connect() -> Result<UnixStream, IpcError> {
    let path = socket_path();
    UnixStream::connect(&path).map_err(|e| {
        IpcError::DaemonUnavailable(format!(
            "no daemon at {} ({e}); start one with `sd daemon run`",
            path.display()
        ))
    })
}

/// One-shot request/response exchange with the daemon.
pub fn send_request(req: &Request) -> Result<Response, IpcError> {
    let mut stream = connect()?;
    let bytes = encode_request(req)?;
    stream.write_all(&bytes)?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Err(IpcError::Disconnected);
    }
    decode_response(line.trim_end())
}
