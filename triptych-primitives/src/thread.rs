//! Process-unique integral thread identities.
//!
//! Control words track the write-lock owner as a signed 32-bit value, so OS
//! thread identities are mapped to small positive integers: each thread gets
//! one from a global counter the first time it asks, then caches it in a
//! thread-local. `-1` is reserved to mean "no owner".

use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicI32, Ordering};

/// A bus-assigned thread identity.
///
/// Valid ids are positive; [`BusThreadId::NONE`] (`-1`) marks the absence of
/// an owner in shared control words.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BusThreadId(i32);

impl BusThreadId {
    /// Sentinel for "no thread".
    pub const NONE: BusThreadId = BusThreadId(-1);

    /// Reconstruct an id from its raw control-word value.
    ///
    /// Returns `None` for values that are neither a valid id nor the
    /// [`NONE`](Self::NONE) sentinel.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Self::NONE),
            id if id > 0 => Some(Self(id)),
            _ => None,
        }
    }

    /// Raw value as stored in a control word.
    #[inline]
    pub fn get(self) -> i32 {
        self.0
    }

    /// True if this is the "no thread" sentinel.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == -1
    }
}

impl fmt::Display for BusThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "t{}", self.0)
        }
    }
}

static NEXT_THREAD_ID: AtomicI32 = AtomicI32::new(1);

thread_local! {
    static CURRENT: Cell<i32> = const { Cell::new(0) };
}

/// The calling thread's bus identity, allocated on first use.
pub fn current_thread_id() -> BusThreadId {
    CURRENT.with(|cell| {
        let cached = cell.get();
        if cached != 0 {
            return BusThreadId(cached);
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        assert!(id > 0, "bus thread id space exhausted");
        cell.set(id);
        BusThreadId(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_within_a_thread() {
        let a = current_thread_id();
        let b = current_thread_id();
        assert_eq!(a, b);
        assert!(a.get() > 0);
    }

    #[test]
    fn ids_differ_across_threads() {
        let here = current_thread_id();
        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn raw_roundtrip() {
        assert_eq!(BusThreadId::from_raw(-1), Some(BusThreadId::NONE));
        assert_eq!(BusThreadId::from_raw(7).map(BusThreadId::get), Some(7));
        assert_eq!(BusThreadId::from_raw(0), None);
        assert_eq!(BusThreadId::from_raw(-2), None);
    }
}
