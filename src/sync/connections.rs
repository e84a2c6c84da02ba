//! Connection accounting shared between the BLE stack context and the
//! update cycle.

use core::sync::atomic::{AtomicU32, Ordering};

/// Number of active peer connections.
///
/// Connect / disconnect events arrive from the BLE stack's own context;
/// readers only ever take a best-effort snapshot. The counter floors at
/// zero, so a duplicated or spurious disconnect can never drive it
/// negative.
#[derive(Debug, Default)]
pub struct ConnectionCount {
    active: AtomicU32,
}

impl ConnectionCount {
    pub const fn new() -> Self {
        Self {
            active: AtomicU32::new(0),
        }
    }

    /// Record a new connection. Returns the count after the increment.
    pub fn on_connect(&self) -> u32 {
        self.active.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Record a disconnection. Returns the count after the decrement
    /// (0 if there was nothing to decrement).
    pub fn on_disconnect(&self) -> u32 {
        match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spurious_disconnect_floors_at_zero() {
        let count = ConnectionCount::new();
        assert_eq!(count.on_connect(), 1);
        assert_eq!(count.on_connect(), 2);
        assert_eq!(count.on_disconnect(), 1);
        assert_eq!(count.on_disconnect(), 0);
        assert_eq!(count.on_disconnect(), 0);
        assert_eq!(count.count(), 0);
        assert!(!count.is_connected());
    }

    #[test]
    fn concurrent_connects_and_disconnects_balance() {
        use std::sync::Arc;
        use std::thread;

        let count = Arc::new(ConnectionCount::new());
        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let count = Arc::clone(&count);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        count.on_connect();
                        count.on_disconnect();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(count.count(), 0);
    }
}
