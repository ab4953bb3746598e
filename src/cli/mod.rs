//! CLI surface for slotdesk.
//!
//! Thin command tree over the daemon IPC: every subcommand except
//! `daemon run` is a client of the socket.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};

use clap::{ArgAction, Parser, Subcommand, builder::BoolishValueParser};

use crate::Result;
use crate::daemon::ipc::{self, Request, Response};
use crate::{config, daemon};

mod device;
mod render;

pub use device::client_device_id;

// =============================================================================
// Entry + global options
// =============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "sd",
    version,
    about = "Service desk slot reservations",
    infer_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Machine-readable JSON output (default: false; use `--json` for scripting).
    #[arg(
        long,
        global = true,
        default_value_t = false,
        num_args = 0..=1,
        value_parser = BoolishValueParser::new()
    )]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Daemon management.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Book a slot: `sd book 2025-11-03 09:00 --name Ana`.
    Book {
        date: String,
        time: String,
        #[arg(short, long)]
        name: String,
        /// Device token; defaults to this machine's cached token.
        #[arg(long)]
        device: Option<String>,
        /// Mark as a kiosk booking (admin-only cancellation).
        #[arg(long, default_value_t = false)]
        kiosk: bool,
    },

    /// Cancel a booking you own (or any, with --admin).
    Cancel {
        date: String,
        time: String,
        #[arg(long)]
        device: Option<String>,
        #[arg(long, default_value_t = false)]
        admin: bool,
        /// Record the removal as `completed` instead of `cancelled`.
        #[arg(long, default_value_t = false)]
        completed: bool,
    },

    /// Force-remove a booking by slot key, with audit.
    Extract {
        slot_key: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// List bookings for a day.
    List { date: String },

    /// Upcoming bookable days.
    Days {
        #[arg(long)]
        count: Option<usize>,
    },

    /// The slot grid.
    Slots,

    /// Stream booking changes and clock ticks for a day.
    Watch { date: String },

    /// Display-name roster.
    Names,

    /// Re-read the display-name roster file.
    ReloadNames,

    /// Check an admin password.
    AdminVerify { password: String },

    /// Daemon status.
    Status,

    /// Liveness check.
    Ping,

    /// Ask the daemon to shut down.
    Shutdown,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Run,
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

// =============================================================================
// Dispatch
// =============================================================================

pub fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    let request = match cli.command {
        Command::Daemon {
            command: DaemonCommand::Run,
        } => {
            let cfg = config::load_or_init();
            return daemon::run_daemon(cfg);
        }

        Command::Watch { date } => return watch(date, json),

        Command::Book {
            date,
            time,
            name,
            device,
            kiosk,
        } => Request::Book {
            date: Some(date),
            time: Some(time),
            device_id: Some(device.unwrap_or_else(client_device_id)),
            booked_by: Some(name),
            kiosk,
        },

        Command::Cancel {
            date,
            time,
            device,
            admin,
            completed,
        } => Request::Cancel {
            date: Some(date),
            time: Some(time),
            device_id: Some(device.unwrap_or_else(client_device_id)),
            is_admin: admin,
            reason: completed.then(|| "completed".to_string()),
        },

        Command::Extract { slot_key, reason } => Request::Extract {
            slot_key: Some(slot_key),
            reason,
        },

        Command::List { date } => Request::Bookings { date: Some(date) },
        Command::Days { count } => Request::Days { count },
        Command::Slots => Request::Slots,
        Command::Names => Request::Names,
        Command::ReloadNames => Request::ReloadNames,
        Command::AdminVerify { password } => Request::AdminVerify {
            password: Some(password),
        },
        Command::Status => Request::Status,
        Command::Ping => Request::Ping,
        Command::Shutdown => Request::Shutdown,
    };

    let response = ipc::send_request(&request)?;
    render::response(&response, json);
    if matches!(response, Response::Err { .. }) {
        std::process::exit(2);
    }
    Ok(())
}

/// Subscribe and print the event stream until the daemon goes away or the
/// user interrupts.
fn watch(date: String, json: bool) -> Result<()> {
    let mut stream = ipc::connect()?;
    let bytes = ipc::encode_request(&Request::Subscribe { date: Some(date) })
        .map_err(crate::Error::Ipc)?;
    stream.write_all(&bytes).map_err(ipc::IpcError::from)?;

    let reader = stream.try_clone().map_err(ipc::IpcError::from)?;
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let n = reader.read_line(&mut line).map_err(ipc::IpcError::from)?;
    if n == 0 {
        return Err(crate::Error::Ipc(ipc::IpcError::Disconnected));
    }
    let ack = ipc::decode_response(line.trim_end()).map_err(crate::Error::Ipc)?;
    render::response(&ack, json);
    if matches!(ack, Response::Err { .. }) {
        std::process::exit(2);
    }

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(ipc::IpcError::from)?;
        if n == 0 {
            // daemon closed the stream
            return Ok(());
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        if json {
            println!("{trimmed}");
            continue;
        }
        match serde_json::from_str::<crate::api::StreamEvent>(trimmed) {
            Ok(event) => render::stream_event(&event),
            Err(err) => tracing::warn!("unreadable stream frame: {err}"),
        }
    }
}
