//! Human-readable rendering of IPC responses.

use crate::api::StreamEvent;
use crate::daemon::ipc::{Response, ResponsePayload};

pub fn response(response: &Response, json: bool) {
    if json {
        match serde_json::to_string(response) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to render response: {err}"),
        }
        return;
    }

    match response {
        Response::Err { err } => {
            eprintln!("error[{}]: {}", err.code, err.message);
        }
        Response::Ok { ok } => payload(ok),
    }
}

fn payload(payload: &ResponsePayload) {
    match payload {
        ResponsePayload::Booked(out) => println!("booked {}", out.key),
        ResponsePayload::Cancelled(out) => {
            println!("{} {} (audit: {})", out.reason, out.key, out.ledger_file);
        }
        ResponsePayload::Extracted(out) => {
            println!("{} {} (audit: {})", out.reason, out.key, out.ledger_file);
        }
        ResponsePayload::Bookings(day) => {
            if day.bookings.is_empty() {
                println!("no bookings on {}", day.date);
                return;
            }
            for (time, booking) in &day.bookings {
                let kiosk = if booking.kiosk { "  [kiosk]" } else { "" };
                println!("{time}  {}{kiosk}", booking.booked_by);
            }
        }
        ResponsePayload::Days(out) => {
            for day in &out.days {
                println!("{}  {}", day.date, day.label);
            }
        }
        ResponsePayload::Slots(out) => {
            let rendered: Vec<String> = out.slots.iter().map(|s| s.to_string()).collect();
            println!("{}", rendered.join(" "));
        }
        ResponsePayload::Names(out) => {
            for name in &out.names {
                println!("{name}");
            }
        }
        ResponsePayload::Reloaded(out) => println!("reloaded {} names", out.count),
        ResponsePayload::Status(status) => {
            println!(
                "slotdesk {} (pid {}): {} bookings, {} subscribers",
                status.version, status.pid, status.bookings, status.subscribers
            );
        }
        ResponsePayload::Time(tick) => println!("{}", tick.iso),
        ResponsePayload::Subscribed(info) => println!("watching {}", info.date),
        // unit payloads are indistinguishable after untagged decoding; a
        // bare ok covers them all
        ResponsePayload::Verified | ResponsePayload::Pong | ResponsePayload::ShuttingDown => {
            println!("ok");
        }
    }
}

pub fn stream_event(event: &StreamEvent) {
    match event {
        StreamEvent::Slot(slot) => {
            let who = slot
                .record
                .as_ref()
                .map(|r| r.booked_by.as_str())
                .unwrap_or("-");
            println!("{} {} {} {}", slot.date, slot.time, slot.action, who);
        }
        StreamEvent::Tick(tick) => {
            println!(
                "tick {:02}:{:02}:{:02}",
                tick.hours, tick.minutes, tick.seconds
            );
        }
    }
}
