//! Stateful service side: store, ledger, bus, orchestration, IPC.

pub mod bus;
pub mod engine;
pub mod heartbeat;
pub mod ipc;
pub mod ledger;
pub mod names;
pub mod ops;
pub mod run;
pub mod server;
pub mod store;

pub use bus::{BusError, BusLimits, BusSubscription, NotificationBus};
pub use engine::{BookParams, CancelParams, EngineOptions, ExtractParams, ReservationEngine};
pub use heartbeat::Heartbeat;
pub use ipc::{IpcError, Request, Response, ResponsePayload};
pub use ledger::{AuditEntry, AuditLedger, LedgerError};
pub use names::{DisplayNameRoster, RosterError};
pub use ops::{BookOutput, CancelOutput, ExtractOutput, OpError};
pub use run::run_daemon;
pub use store::{SlotStore, StoreError};
