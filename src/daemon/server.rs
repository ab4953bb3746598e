//! Connection handling: request-parallel workers over a shared engine.
//!
//! Every connection gets its own thread against the shared
//! `ReservationEngine`; there is no global serializing loop. The store,
//! ledger, and bus defend their own invariants internally, so concurrent
//! handlers cannot violate at-most-one-booking-per-slot or audit ordering.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::RecvTimeoutError;

use crate::api::DaemonStatus;
use crate::daemon::bus::BusSubscription;
use crate::daemon::engine::{BookParams, CancelParams, ExtractParams, ReservationEngine};
use crate::daemon::ipc::{
    self, IpcError, Request, Response, ResponsePayload, send_response,
};

/// What a dispatched request turns into.
pub enum Dispatch {
    /// Plain request/response.
    Respond(Response),
    /// Ack, then the connection becomes an event stream.
    Stream {
        ack: Response,
        subscription: BusSubscription,
    },
    /// Ack, then the daemon winds down.
    Shutdown(Response),
}

/// Map one request onto the engine.
pub fn dispatch(engine: &ReservationEngine, request: Request) -> Dispatch {
    match request {
        Request::Book {
            date,
            time,
            device_id,
            booked_by,
            kiosk,
        } => Dispatch::Respond(respond(
            engine
                .book(BookParams {
                    date,
                    time,
                    device_id,
                    booked_by,
                    kiosk,
                })
                .map(ResponsePayload::Booked),
        )),

        Request::Cancel {
            date,
            time,
            device_id,
            is_admin,
            reason,
        } => Dispatch::Respond(respond(
            engine
                .cancel(CancelParams {
                    date,
                    time,
                    device_id,
                    is_admin,
                    reason,
                })
                .map(ResponsePayload::Cancelled),
        )),

        Request::Extract { slot_key, reason } => Dispatch::Respond(respond(
            engine
                .extract(ExtractParams { slot_key, reason })
                .map(ResponsePayload::Extracted),
        )),

        Request::Bookings { date } => Dispatch::Respond(respond(
            engine.bookings_for_day(date).map(ResponsePayload::Bookings),
        )),

        Request::Days { count } => {
            Dispatch::Respond(Response::ok(ResponsePayload::Days(engine.days(count))))
        }

        Request::Slots => {
            Dispatch::Respond(Response::ok(ResponsePayload::Slots(engine.slots())))
        }

        Request::Now => Dispatch::Respond(Response::ok(ResponsePayload::Time(engine.now()))),

        Request::Names => {
            Dispatch::Respond(Response::ok(ResponsePayload::Names(engine.names())))
        }

        Request::ReloadNames => Dispatch::Respond(respond(
            engine.reload_names().map(ResponsePayload::Reloaded),
        )),

        Request::AdminVerify { password } => Dispatch::Respond(respond(
            engine.admin_verify(password).map(|()| ResponsePayload::Verified),
        )),

        Request::Subscribe { date } => match engine.subscribe(date) {
            Ok((info, subscription)) => Dispatch::Stream {
                ack: Response::ok(ResponsePayload::Subscribed(info)),
                subscription,
            },
            Err(err) => Dispatch::Respond(Response::err(err)),
        },

        Request::Status => Dispatch::Respond(Response::ok(ResponsePayload::Status(
            DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                pid: std::process::id(),
                bookings: engine.booked_count(),
                subscribers: engine.subscriber_count(),
            },
        ))),

        Request::Ping => Dispatch::Respond(Response::ok(ResponsePayload::Pong)),

        Request::Shutdown => Dispatch::Shutdown(Response::ok(ResponsePayload::ShuttingDown)),
    }
}

fn respond(result: Result<ResponsePayload, crate::daemon::ops::OpError>) -> Response {
    match result {
        Ok(payload) => Response::ok(payload),
        Err(err) => Response::err(err),
    }
}

/// Serve one connection until it closes, the daemon shuts down, or the
/// client upgrades to a subscription stream.
pub fn handle_connection(
    engine: Arc<ReservationEngine>,
    stream: UnixStream,
    shutdown: Arc<AtomicBool>,
) {
    let reader = match stream.try_clone() {
        Ok(clone) => clone,
        Err(err) => {
            tracing::warn!("failed to clone connection: {err}");
            return;
        }
    };
    let mut writer = stream;

    for request in ipc::read_requests(reader) {
        let request = match request {
            Ok(request) => request,
            Err(IpcError::Io(_)) => break,
            Err(err) => {
                if send_response(&mut writer, &Response::err(err)).is_err() {
                    break;
                }
                continue;
            }
        };

        match dispatch(&engine, request) {
            Dispatch::Respond(response) => {
                if send_response(&mut writer, &response).is_err() {
                    break;
                }
            }
            Dispatch::Stream { ack, subscription } => {
                if send_response(&mut writer, &ack).is_ok() {
                    stream_events(&mut writer, subscription, &shutdown);
                }
                // the connection is consumed by the stream
                break;
            }
            Dispatch::Shutdown(response) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = send_response(&mut writer, &response);
                // nudge the acceptor out of its wait
                let _ = UnixStream::connect(ipc::socket_path());
                break;
            }
        }
    }
}

/// Forward bus events to the client as ndjson frames until it disconnects
/// or the daemon shuts down. A departed client is detected by the failed
/// write and torn down silently.
fn stream_events(
    writer: &mut UnixStream,
    subscription: BusSubscription,
    shutdown: &AtomicBool,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        match subscription.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => {
                let mut bytes = match serde_json::to_vec(&event) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!("failed to encode stream event: {err}");
                        continue;
                    }
                };
                bytes.push(b'\n');
                if writer.write_all(&bytes).is_err() {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
