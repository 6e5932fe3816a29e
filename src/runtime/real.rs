//! The real value behind a struct mock.
//!
//! Mocks of structs and enums can wrap a real instance so `call_through`
//! stubs have something to forward to. The slot is shared by clones of the
//! mock, like [`MockState`](super::MockState).

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub struct RealSlot<T> {
    value: Arc<Mutex<Option<T>>>,
}

impl<T> RealSlot<T> {
    pub fn empty() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// Replace the real instance, returning the previous one.
    pub fn set(&self, value: T) -> Option<T> {
        self.value.lock().replace(value)
    }

    pub fn is_present(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Run `body` against the real instance. `None` when the slot is empty.
    ///
    /// The lock is held for the duration of `body`; a forwarded call that
    /// re-enters the same mock through call-through would deadlock.
    pub fn with<R>(&self, body: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.value.lock().as_mut().map(body)
    }

    /// Move the real instance out, leaving the slot empty.
    ///
    /// Used by async call-through so no guard lives across an await point.
    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    /// Put back a value obtained from [`take`](Self::take) unless another
    /// one was set meanwhile.
    pub fn restore(&self, value: T) {
        let mut slot = self.value.lock();
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

impl<T> Clone for RealSlot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Default for RealSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for RealSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealSlot")
            .field("present", &self.is_present())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarding_mutates_shared_value() {
        let slot = RealSlot::with_value(vec![1, 2]);
        let clone = slot.clone();
        clone.with(|items| items.push(3));
        assert_eq!(slot.with(|items| items.len()), Some(3));
    }

    #[test]
    fn test_empty_slot_forwards_nothing() {
        let slot: RealSlot<String> = RealSlot::default();
        assert!(!slot.is_present());
        assert_eq!(slot.with(|value| value.len()), None);
    }

    #[test]
    fn test_take_and_restore() {
        let slot = RealSlot::with_value(String::from("real"));
        let value = slot.take().unwrap();
        assert!(!slot.is_present());
        slot.restore(value);
        assert_eq!(slot.take().as_deref(), Some("real"));

        slot.set(String::from("new"));
        slot.restore(String::from("stale"));
        assert_eq!(slot.take().as_deref(), Some("new"));
    }
}
