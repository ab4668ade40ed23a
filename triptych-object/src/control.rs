//! The seven-word atomic control region.
//!
//! Word order is fixed so that any two attachments of the same regions agree
//! on the layout:
//!
//! | word | name                    | meaning                                     |
//! |------|-------------------------|---------------------------------------------|
//! | 0    | `published_slot`        | most recently published slot, `-1` if none  |
//! | 1    | `seq`                   | publish counter, unsigned, wraps mod 2³²    |
//! | 2    | `next_ticket`           | next write ticket to hand out               |
//! | 3    | `serving_ticket`        | ticket currently admitted to write          |
//! | 4    | `write_owner_thread_id` | lock holder's thread id, `-1` if free       |
//! | 5    | `write_reentrance_depth`| owner's depth, ≥1 while held                |
//! | 6    | `fatal_writer_died`     | sticky poison flag                          |

use triptych_primitives::BusThreadId;
use triptych_primitives::sync::{AtomicI32, Ordering};

/// Number of control words.
pub const CONTROL_WORDS: usize = 7;

/// The control words of one shared object.
///
/// Publishes store `published_slot` then `seq`, both `Release`; readers load
/// `seq`, `published_slot`, `seq` again, all `Acquire`, so a reader observing
/// a sequence number is guaranteed the slot word has caught up.
#[repr(C)]
pub struct ControlBlock {
    published_slot: AtomicI32,
    seq: AtomicI32,
    next_ticket: AtomicI32,
    serving_ticket: AtomicI32,
    write_owner: AtomicI32,
    write_depth: AtomicI32,
    fatal_writer_died: AtomicI32,
}

#[cfg(not(loom))]
const _: () = assert!(core::mem::size_of::<ControlBlock>() == CONTROL_WORDS * 4);

impl ControlBlock {
    /// A fresh control block: nothing published, all counters zero, lock
    /// free.
    pub fn new() -> Self {
        Self {
            published_slot: AtomicI32::new(-1),
            seq: AtomicI32::new(0),
            next_ticket: AtomicI32::new(0),
            serving_ticket: AtomicI32::new(0),
            write_owner: AtomicI32::new(-1),
            write_depth: AtomicI32::new(0),
            fatal_writer_died: AtomicI32::new(0),
        }
    }

    /// Most recently published slot index, or `-1` before the first publish.
    #[inline]
    pub fn published_slot(&self) -> i32 {
        self.published_slot.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_published_slot(&self, slot: i32) {
        self.published_slot.store(slot, Ordering::Release);
    }

    /// Publish counter. Unsigned semantics, wrapping modulo 2³².
    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq.load(Ordering::Acquire) as u32
    }

    #[inline]
    pub(crate) fn store_seq(&self, seq: u32) {
        self.seq.store(seq as i32, Ordering::Release);
    }

    /// Hand out the next write ticket.
    #[inline]
    pub(crate) fn take_ticket(&self) -> u32 {
        self.next_ticket.fetch_add(1, Ordering::AcqRel) as u32
    }

    /// Ticket currently admitted to write.
    #[inline]
    pub fn serving_ticket(&self) -> u32 {
        self.serving_ticket.load(Ordering::Acquire) as u32
    }

    /// Admit the next queued ticket.
    #[inline]
    pub(crate) fn advance_serving(&self) {
        self.serving_ticket.fetch_add(1, Ordering::AcqRel);
    }

    /// Current lock owner, or [`BusThreadId::NONE`].
    #[inline]
    pub fn owner(&self) -> BusThreadId {
        BusThreadId::from_raw(self.write_owner.load(Ordering::Acquire))
            .unwrap_or(BusThreadId::NONE)
    }

    #[inline]
    pub(crate) fn set_owner(&self, owner: BusThreadId) {
        self.write_owner.store(owner.get(), Ordering::Release);
    }

    /// Reentrance depth of the current owner.
    #[inline]
    pub fn depth(&self) -> i32 {
        self.write_depth.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_depth(&self, depth: i32) {
        self.write_depth.store(depth, Ordering::Release);
    }

    /// True once the writer-died flag has been set. Sticky.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.fatal_writer_died.load(Ordering::Acquire) != 0
    }

    /// Set the sticky writer-died flag. Never cleared.
    #[inline]
    pub(crate) fn poison(&self) {
        self.fatal_writer_died.store(1, Ordering::Release);
    }

    /// Snapshot of all seven words, index-ordered. Diagnostic only: the words
    /// are loaded one at a time.
    pub fn words(&self) -> [i32; CONTROL_WORDS] {
        [
            self.published_slot.load(Ordering::Acquire),
            self.seq.load(Ordering::Acquire),
            self.next_ticket.load(Ordering::Acquire),
            self.serving_ticket.load(Ordering::Acquire),
            self.write_owner.load(Ordering::Acquire),
            self.write_depth.load(Ordering::Acquire),
            self.fatal_writer_died.load(Ordering::Acquire),
        ]
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_block_words() {
        let block = ControlBlock::new();
        assert_eq!(block.words(), [-1, 0, 0, 0, -1, 0, 0]);
        assert_eq!(block.published_slot(), -1);
        assert!(block.owner().is_none());
        assert!(!block.is_poisoned());
    }

    #[test]
    fn tickets_are_dispensed_in_order() {
        let block = ControlBlock::new();
        assert_eq!(block.take_ticket(), 0);
        assert_eq!(block.take_ticket(), 1);
        assert_eq!(block.take_ticket(), 2);
        assert_eq!(block.serving_ticket(), 0);
        block.advance_serving();
        assert_eq!(block.serving_ticket(), 1);
    }

    #[test]
    fn seq_wraps_with_unsigned_semantics() {
        let block = ControlBlock::new();
        block.store_seq(u32::MAX);
        assert_eq!(block.seq(), u32::MAX);
        block.store_seq(block.seq().wrapping_add(1));
        assert_eq!(block.seq(), 0);
    }

    #[test]
    fn poison_is_sticky() {
        let block = ControlBlock::new();
        block.poison();
        assert!(block.is_poisoned());
        // There is deliberately no API to clear the flag.
        assert_eq!(block.words()[6], 1);
    }
}
