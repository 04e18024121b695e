//! Single-flight guard for cache refreshes.
//!
//! At most one scan runs at a time across both resource kinds. A caller
//! takes a [`FlightTicket`] with [`SingleFlight::try_begin`]; while the ticket
//! is alive every further attempt fails. Dropping the ticket (when the worker
//! finishes, panics, or is never spawned) returns the guard to idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Idle/in-flight state machine with a test-and-set entry.
#[derive(Clone, Debug, Default)]
pub struct SingleFlight {
    in_flight: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves Idle → InFlight. Returns `None` if a flight is already running.
    pub fn try_begin(&self) -> Option<FlightTicket> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightTicket {
                in_flight: self.in_flight.clone(),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof of holding the flight. Releases it on drop.
#[derive(Debug)]
#[must_use = "dropping the ticket ends the flight immediately"]
pub struct FlightTicket {
    in_flight: Arc<AtomicBool>,
}

impl Drop for FlightTicket {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
