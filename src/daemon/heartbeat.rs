//! Fixed-interval wall-clock heartbeat.
//!
//! Publishes a clock snapshot to every bus subscriber for client display
//! synchronization. Delivery is best-effort; nothing downstream depends on
//! it for correctness.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::core::ClockTick;
use crate::daemon::bus::NotificationBus;

pub struct Heartbeat {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn(bus: NotificationBus, interval: Duration) -> Self {
        let (stop, stop_rx) = crossbeam::channel::bounded::<()>(1);
        let handle = thread::spawn(move || {
            let ticker = crossbeam::channel::tick(interval);
            loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        if let Err(err) = bus.publish_tick(ClockTick::now()) {
                            tracing::warn!("heartbeat publish failed: {err}");
                        }
                    }
                    recv(stop_rx) -> _ => return,
                }
            }
        });
        Self { stop, handle }
    }

    /// Stop the ticker and wait for the thread to exit.
    pub fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SlotDate;
    use crate::daemon::bus::BusLimits;

    #[test]
    fn ticks_arrive_and_stop_is_clean() {
        let bus = NotificationBus::new(BusLimits::default());
        let sub = bus.subscribe(SlotDate::parse("2025-11-03").unwrap()).unwrap();

        let heartbeat = Heartbeat::spawn(bus.clone(), Duration::from_millis(20));
        let event = sub.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, crate::api::StreamEvent::Tick(_)));
        heartbeat.stop();
    }
}
