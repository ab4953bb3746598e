//! Notification bus: per-day topic fan-out of booking changes, plus the
//! clock heartbeat delivered to every subscriber.
//!
//! Publishing never blocks on a slow consumer: a subscriber whose queue is
//! full is dropped with a recorded reason, and a departed subscriber is
//! pruned silently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use thiserror::Error;

use crate::api::{SlotEvent, StreamEvent};
use crate::core::{ClockTick, SlotDate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusLimits {
    pub max_subscribers: usize,
    pub queue_events: usize,
}

impl Default for BusLimits {
    fn default() -> Self {
        Self {
            max_subscribers: 64,
            queue_events: 256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    SubscriberLagged,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("subscriber limit reached ({max_subscribers})")]
    SubscriberLimitReached { max_subscribers: usize },
    #[error("bus lock poisoned")]
    LockPoisoned,
}

/// Handle held by one subscribed viewer. Dropping it unsubscribes.
pub struct BusSubscription {
    id: u64,
    topic: SlotDate,
    receiver: Receiver<StreamEvent>,
    lagged: Arc<AtomicBool>,
    bus: NotificationBus,
}

impl BusSubscription {
    pub fn topic(&self) -> SlotDate {
        self.topic
    }

    pub fn try_recv(&self) -> Result<StreamEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StreamEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        self.lagged
            .load(Ordering::Acquire)
            .then_some(DropReason::SubscriberLagged)
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<Mutex<BusState>>,
}

impl NotificationBus {
    pub fn new(limits: BusLimits) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusState {
                limits,
                next_subscriber_id: 1,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    /// Register interest in one day's booking changes (plus clock ticks).
    pub fn subscribe(&self, topic: SlotDate) -> Result<BusSubscription, BusError> {
        let mut state = self.lock_state()?;
        if state.subscribers.len() >= state.limits.max_subscribers {
            return Err(BusError::SubscriberLimitReached {
                max_subscribers: state.limits.max_subscribers,
            });
        }

        let (sender, receiver) = crossbeam::channel::bounded(state.limits.queue_events);
        let lagged = Arc::new(AtomicBool::new(false));
        let id = state.next_subscriber_id;
        state.next_subscriber_id = state.next_subscriber_id.saturating_add(1);
        state.subscribers.insert(
            id,
            SubscriberState {
                topic,
                sender,
                lagged: Arc::clone(&lagged),
            },
        );

        Ok(BusSubscription {
            id,
            topic,
            receiver,
            lagged,
            bus: self.clone(),
        })
    }

    /// Deliver a booking change to every subscriber of its date.
    pub fn publish_slot(&self, event: SlotEvent) -> Result<(), BusError> {
        self.publish(Some(event.date), StreamEvent::Slot(event))
    }

    /// Deliver the heartbeat snapshot to every subscriber on every topic.
    pub fn publish_tick(&self, tick: ClockTick) -> Result<(), BusError> {
        self.publish(None, StreamEvent::Tick(tick))
    }

    pub fn subscriber_count(&self) -> Result<usize, BusError> {
        Ok(self.lock_state()?.subscribers.len())
    }

    fn publish(&self, topic: Option<SlotDate>, event: StreamEvent) -> Result<(), BusError> {
        let mut state = self.lock_state()?;
        let mut departed = Vec::new();
        for (id, subscriber) in &state.subscribers {
            if let Some(topic) = topic
                && subscriber.topic != topic
            {
                continue;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    subscriber.lagged.store(true, Ordering::Release);
                    tracing::debug!(subscriber = id, "dropping lagged subscriber");
                    departed.push(*id);
                }
                Err(TrySendError::Disconnected(_)) => {
                    departed.push(*id);
                }
            }
        }
        for id in departed {
            state.subscribers.remove(&id);
        }
        Ok(())
    }

    fn unsubscribe(&self, id: u64) {
        if let Ok(mut state) = self.inner.lock() {
            state.subscribers.remove(&id);
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, BusState>, BusError> {
        self.inner.lock().map_err(|_| BusError::LockPoisoned)
    }
}

struct BusState {
    limits: BusLimits,
    next_subscriber_id: u64,
    subscribers: BTreeMap<u64, SubscriberState>,
}

struct SubscriberState {
    topic: SlotDate,
    sender: Sender<StreamEvent>,
    lagged: Arc<AtomicBool>,
}
