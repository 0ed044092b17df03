//! Single-slot correlation between a compute request and the
//! `averageColor` event that answers it.
//!
//! State moves `Idle -> Awaiting -> Fulfilled -> Idle`; a timed-out or
//! cancelled request goes straight back to `Idle`. Every transition happens
//! under one mutex, so an event racing a timeout is either delivered to the
//! waiting request or dropped, never left behind for the next one.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

use super::message::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRequest {
    Idle,
    Awaiting,
    Fulfilled(Rgb),
}

#[derive(Debug)]
pub struct ColorCorrelator {
    state: Mutex<ColorRequest>,
    ready: Notify,
}

impl Default for ColorCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorCorrelator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ColorRequest::Idle),
            ready: Notify::new(),
        }
    }

    pub fn state(&self) -> ColorRequest {
        *self.lock()
    }

    /// Open a request. Anything left in the slot is discarded.
    pub fn begin(&self) -> PendingColor<'_> {
        *self.lock() = ColorRequest::Awaiting;
        PendingColor { correlator: self }
    }

    /// Deliver a result. Returns `false` when nobody is waiting and the result was dropped.
    pub fn offer(&self, color: Rgb) -> bool {
        let mut state = self.lock();
        match *state {
            ColorRequest::Awaiting => {
                *state = ColorRequest::Fulfilled(color);
                drop(state);
                self.ready.notify_waiters();
                true
            }
            ColorRequest::Idle | ColorRequest::Fulfilled(_) => false,
        }
    }

    fn finish(&self) -> Option<Rgb> {
        let mut state = self.lock();
        let previous = std::mem::replace(&mut *state, ColorRequest::Idle);
        match previous {
            ColorRequest::Fulfilled(color) => Some(color),
            ColorRequest::Idle | ColorRequest::Awaiting => None,
        }
    }

    fn fulfilled(&self) -> Option<Rgb> {
        match *self.lock() {
            ColorRequest::Fulfilled(color) => Some(color),
            ColorRequest::Idle | ColorRequest::Awaiting => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ColorRequest> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open request. Dropping it without waiting resets the slot to `Idle`.
#[derive(Debug)]
pub struct PendingColor<'a> {
    correlator: &'a ColorCorrelator,
}

impl PendingColor<'_> {
    /// Wait up to `timeout` for the result; the slot is `Idle` again when this returns.
    pub async fn wait(self, timeout: Duration) -> Option<Rgb> {
        let correlator = self.correlator;
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = correlator.ready.notified();
                if correlator.fulfilled().is_some() {
                    return;
                }
                notified.await;
            }
        })
        .await;
        correlator.finish()
    }
}

impl Drop for PendingColor<'_> {
    fn drop(&mut self) {
        let mut state = self.correlator.lock();
        if matches!(*state, ColorRequest::Awaiting) {
            *state = ColorRequest::Idle;
        }
    }
}
