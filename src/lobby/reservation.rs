//! Host-side slot accounting

use crate::config::HostSlotPolicy;

/// Reservation was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("Lobby is full ({reserved}/{max})")]
    LobbyFull { reserved: u32, max: u32 },
    #[error("Host unavailable")]
    HostUnavailable,
}

/// Reserved slot counter, `0 <= reserved <= max`
///
/// Only a grant increments it and only an explicit unregister decrements it.
/// Disconnects never touch it.
#[derive(Debug, Clone)]
pub struct SlotLedger {
    reserved: u32,
    max: u32,
}

impl SlotLedger {
    pub fn new(max: u32, policy: HostSlotPolicy) -> Self {
        let reserved = match policy {
            HostSlotPolicy::Handshake => 0,
            HostSlotPolicy::PreReserved => 1.min(max),
        };
        Self { reserved, max }
    }

    /// Reserve one slot, returning the new reserved count
    pub fn try_reserve(&mut self) -> Result<u32, ReservationError> {
        if self.reserved >= self.max {
            return Err(ReservationError::LobbyFull {
                reserved: self.reserved,
                max: self.max,
            });
        }
        self.reserved += 1;
        Ok(self.reserved)
    }

    /// Release one slot; never goes below zero
    pub fn release(&mut self) -> u32 {
        self.reserved = self.reserved.saturating_sub(1);
        self.reserved
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_full(&self) -> bool {
        self.reserved >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_up_to_max() {
        let mut ledger = SlotLedger::new(4, HostSlotPolicy::Handshake);
        for expected in 1..=4 {
            assert_eq!(ledger.try_reserve(), Ok(expected));
        }
        assert_eq!(
            ledger.try_reserve(),
            Err(ReservationError::LobbyFull { reserved: 4, max: 4 })
        );
        assert!(ledger.is_full());
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut ledger = SlotLedger::new(2, HostSlotPolicy::Handshake);
        assert_eq!(ledger.release(), 0);
        ledger.try_reserve().unwrap();
        assert_eq!(ledger.release(), 0);
    }

    #[test]
    fn test_pre_reserved_host_slot() {
        let mut ledger = SlotLedger::new(2, HostSlotPolicy::PreReserved);
        assert_eq!(ledger.reserved(), 1);
        assert_eq!(ledger.try_reserve(), Ok(2));
        assert!(ledger.try_reserve().is_err());
    }
}
