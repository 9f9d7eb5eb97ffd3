//! Capacity ledger: the hard seat ceiling of one event.

use serde::{Deserialize, Serialize};

use seatwise_core::DomainError;

use crate::error::AdmissionError;

/// Capacity and free seats of one event.
///
/// Both counters are stored; `seats_available` is adjusted by one per
/// admission or release instead of being recounted from registrations.
/// Invariant: `0 <= seats_available <= capacity`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLedger {
    capacity: u32,
    seats_available: u32,
}

impl SeatLedger {
    /// A fresh ledger with every seat free.
    pub fn open(capacity: u32) -> Result<Self, AdmissionError> {
        if capacity == 0 {
            return Err(AdmissionError::invalid_capacity("capacity must be a positive integer"));
        }
        Ok(Self {
            capacity,
            seats_available: capacity,
        })
    }

    /// Rebuild a ledger from recorded counters, clamping seats into range.
    pub fn restore(capacity: u32, seats_available: u32) -> Self {
        Self {
            capacity,
            seats_available: seats_available.min(capacity),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn seats_available(&self) -> u32 {
        self.seats_available
    }

    /// Seats currently held by confirmed registrations.
    pub fn seats_taken(&self) -> u32 {
        self.capacity - self.seats_available
    }

    pub fn is_full(&self) -> bool {
        self.seats_available == 0
    }

    /// Raise the ceiling to `new_capacity`, granting exactly the difference as
    /// new free seats. Returns that difference.
    ///
    /// Lowering capacity is rejected and leaves the ledger untouched.
    pub fn increase_capacity(&mut self, new_capacity: u32) -> Result<u32, AdmissionError> {
        if new_capacity < self.capacity {
            return Err(AdmissionError::invalid_capacity(format!(
                "capacity can only be increased (current: {}, requested: {new_capacity})",
                self.capacity
            )));
        }

        let delta = new_capacity - self.capacity;
        self.capacity = new_capacity;
        self.seats_available = self.seats_available.saturating_add(delta).min(new_capacity);
        Ok(delta)
    }

    /// Take one seat.
    pub fn debit_seat(&mut self) -> Result<(), AdmissionError> {
        if self.seats_available == 0 {
            return Err(AdmissionError::NoSeatsAvailable);
        }
        self.seats_available -= 1;
        Ok(())
    }

    /// Give one seat back. Never exceeds capacity.
    pub fn credit_seat(&mut self) {
        self.seats_available = (self.seats_available + 1).min(self.capacity);
    }

    /// Check the ledger against the number of confirmed registrations.
    pub fn check_against(&self, confirmed: usize) -> Result<(), DomainError> {
        if self.seats_available > self.capacity {
            return Err(DomainError::invariant(format!(
                "seats_available {} exceeds capacity {}",
                self.seats_available, self.capacity
            )));
        }
        if self.seats_taken() as usize != confirmed {
            return Err(DomainError::invariant(format!(
                "{} seats taken but {confirmed} confirmed registrations",
                self.seats_taken()
            )));
        }
        Ok(())
    }
}
