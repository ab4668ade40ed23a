//! The shared object core: slot ring, seqlock reads, ticket writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use triptych_primitives::{BusThreadId, SharedRegion, current_thread_id};

use crate::control::ControlBlock;
use crate::error::{ConfigError, WriteError};
use crate::notify::{self, Subscription, Updates};
use crate::wait::{self, WaitOptions};

/// Number of slots in the data region.
///
/// Three, not two: while the writer mutates slot `(seq + 1) mod 3`, both the
/// published slot and its predecessor stay untouched, so a reader's worst
/// case is one torn observation corrected on a single retry. Not tunable.
pub const SLOT_COUNT: usize = 3;

/// Bounded retries for a torn read before giving up for this poll.
const READ_RETRIES: usize = 4;

/// Configuration for an untyped shared object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectConfig {
    /// Size of one record in bytes. Must be positive.
    pub byte_length: usize,
}

/// The shared control plane of one object: the seven atomic words plus the
/// process-local parking spot for queued writers.
///
/// Every handle attached to the same object shares one `ControlRegion`.
pub struct ControlRegion {
    pub(crate) block: ControlBlock,
    pub(crate) waiters: Notify,
    poll_micros: AtomicU64,
}

impl ControlRegion {
    fn new() -> Self {
        Self {
            block: ControlBlock::new(),
            waiters: Notify::new(),
            poll_micros: AtomicU64::new(wait::DEFAULT_POLL_INTERVAL.as_micros() as u64),
        }
    }

    /// The seven control words.
    pub fn block(&self) -> &ControlBlock {
        &self.block
    }
}

/// Transportable metadata that lets another thread attach to an existing
/// object. Cloning is cheap; clones keep the shared regions alive.
#[derive(Clone)]
pub struct SharedObjectDescriptor {
    pub id: String,
    pub byte_length: usize,
    pub slot_count: usize,
    pub data_region: SharedRegion,
    pub control_region: Arc<ControlRegion>,
}

impl std::fmt::Debug for SharedObjectDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedObjectDescriptor")
            .field("id", &self.id)
            .field("byte_length", &self.byte_length)
            .field("slot_count", &self.slot_count)
            .finish()
    }
}

/// A consistent snapshot of the latest published record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    seq: u32,
    bytes: Box<[u8]>,
}

impl Snapshot {
    /// Sequence number of the publish this snapshot came from.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The record bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A handle to a triple-buffered shared object.
///
/// Handles are cheap to clone; all clones (and all handles built from the
/// same [`SharedObjectDescriptor`]) address the same slots and control words.
#[derive(Clone)]
pub struct SharedObject {
    id: String,
    byte_length: usize,
    data: SharedRegion,
    ctl: Arc<ControlRegion>,
    channel: String,
}

impl SharedObject {
    /// Create a fresh object: zeroed slots, nothing published, lock free.
    pub fn create(id: impl Into<String>, config: ObjectConfig) -> Result<Self, ConfigError> {
        if config.byte_length == 0 {
            return Err(ConfigError::ZeroByteLength);
        }
        let id = id.into();
        tracing::debug!(id = %id, byte_length = config.byte_length, "creating shared object");
        Ok(Self {
            channel: notify::channel_name(&id),
            id,
            byte_length: config.byte_length,
            data: SharedRegion::zeroed(SLOT_COUNT * config.byte_length),
            ctl: Arc::new(ControlRegion::new()),
        })
    }

    /// Attach to an existing object through its descriptor.
    pub fn from_descriptor(descriptor: SharedObjectDescriptor) -> Self {
        debug_assert_eq!(descriptor.slot_count, SLOT_COUNT);
        debug_assert_eq!(
            descriptor.data_region.len(),
            descriptor.slot_count * descriptor.byte_length
        );
        Self {
            channel: notify::channel_name(&descriptor.id),
            id: descriptor.id,
            byte_length: descriptor.byte_length,
            data: descriptor.data_region,
            ctl: descriptor.control_region,
        }
    }

    /// A descriptor other threads can attach through.
    pub fn descriptor(&self) -> SharedObjectDescriptor {
        SharedObjectDescriptor {
            id: self.id.clone(),
            byte_length: self.byte_length,
            slot_count: SLOT_COUNT,
            data_region: self.data.clone(),
            control_region: self.ctl.clone(),
        }
    }

    /// The object's id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Size of one record in bytes.
    #[inline]
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Name of the object's notification channel.
    #[inline]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The shared control words (read-only accessors).
    #[inline]
    pub fn control(&self) -> &ControlBlock {
        &self.ctl.block
    }

    /// Current write-lock owner, or [`BusThreadId::NONE`].
    #[inline]
    pub fn owner(&self) -> BusThreadId {
        self.ctl.block.owner()
    }

    /// True once the object has been poisoned by writer death.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.ctl.block.is_poisoned()
    }

    /// Tunables for the write-side ticket wait, shared by all handles.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_micros(self.ctl.poll_micros.load(Ordering::Relaxed)),
        }
    }

    /// Replace the write-side wait tunables for all handles of this object.
    pub fn set_wait_options(&self, options: WaitOptions) {
        self.ctl
            .poll_micros
            .store(options.poll_interval.as_micros() as u64, Ordering::Relaxed);
    }

    /// Read the latest fully-published record without blocking.
    ///
    /// Returns `None` before the first publish, and transiently under extreme
    /// write pressure (a torn read survives [`READ_RETRIES`] retries only if
    /// a publish lands inside every attempt); callers may simply poll again.
    pub fn read_latest(&self) -> Option<Snapshot> {
        let block = &self.ctl.block;
        for _ in 0..=READ_RETRIES {
            let seq_before = block.seq();
            let slot = block.published_slot();
            if slot < 0 {
                return None;
            }

            let mut bytes = vec![0u8; self.byte_length].into_boxed_slice();
            // SAFETY: a concurrent publish may be mutating another slot; the
            // copy is only trusted once the sequence check below passes, which
            // proves this slot was stable for the whole copy.
            unsafe {
                self.data
                    .region()
                    .copy_out(slot as usize * self.byte_length, &mut bytes)
            };

            if block.seq() == seq_before {
                return Some(Snapshot {
                    seq: seq_before,
                    bytes,
                });
            }
        }
        None
    }

    /// Join the write queue and acquire the write lock.
    ///
    /// Writers are admitted strictly in ticket order. The returned guard may
    /// be held across `.await` points; call [`WriteGuard::publish`] to commit,
    /// or drop the guard to abort without publishing.
    pub async fn begin_write(&self) -> Result<WriteGuard<'_>, WriteError> {
        let me = current_thread_id();
        let block = &self.ctl.block;

        if block.is_poisoned() {
            return Err(WriteError::Poisoned);
        }
        if block.owner() == me {
            return Err(WriteError::Reentrant);
        }

        let ticket = block.take_ticket();
        let poll_interval = self.wait_options().poll_interval;
        wait::await_turn(block, &self.ctl.waiters, ticket, poll_interval).await?;

        block.set_owner(me);
        block.set_depth(1);

        let seq = block.seq().wrapping_add(1);
        Ok(WriteGuard {
            object: self,
            seq,
            slot: seq as usize % SLOT_COUNT,
            publish_on_release: false,
        })
    }

    /// Acquire the write lock, run `f` on the working slot, and publish if it
    /// succeeds.
    ///
    /// On callback error the write is aborted: the lock is released, nothing
    /// is published, and the next writer overwrites the partial slot.
    pub async fn request_write<R, E>(
        &self,
        f: impl FnOnce(&mut WriteGuard<'_>) -> Result<R, E>,
    ) -> Result<R, WriteError>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut guard = self.begin_write().await?;
        match f(&mut guard) {
            Ok(value) => {
                guard.publish()?;
                Ok(value)
            }
            Err(e) => Err(WriteError::Callback(e.into())),
        }
    }

    /// Invoke `callback` after each successful publish. Dropping the returned
    /// [`Subscription`] unsubscribes.
    pub fn subscribe(&self, callback: impl Fn() + Send + 'static) -> Subscription {
        notify::subscribe_channel(&self.channel, callback)
    }

    /// A pull-style stream of publish notifications.
    pub fn updates(&self) -> Updates {
        notify::updates_for_channel(&self.channel)
    }

    /// Record that `thread` died. If it held this object's write lock, the
    /// object becomes permanently poisoned: ownership is cleared, queued
    /// writers are woken so they can fail fast, and every future write fails
    /// with [`WriteError::Poisoned`]. Idempotent; a no-op for non-owners.
    pub fn mark_writer_thread_died(&self, thread: BusThreadId) {
        let block = &self.ctl.block;
        if thread.is_none() || block.owner() != thread {
            return;
        }
        tracing::error!(
            id = %self.id,
            thread = %thread,
            "write-lock owner died; poisoning object"
        );
        block.poison();
        block.set_owner(BusThreadId::NONE);
        block.set_depth(0);
        self.ctl.waiters.notify_waiters();
    }
}

impl std::fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedObject")
            .field("id", &self.id)
            .field("byte_length", &self.byte_length)
            .field("seq", &self.ctl.block.seq())
            .field("poisoned", &self.ctl.block.is_poisoned())
            .finish()
    }
}

/// Exclusive access to the next slot while the write lock is held.
///
/// Created by [`SharedObject::begin_write`]. [`publish`](WriteGuard::publish)
/// commits the slot; dropping without publishing aborts the write. Either way
/// the lock is released and the next queued writer is admitted.
pub struct WriteGuard<'a> {
    object: &'a SharedObject,
    seq: u32,
    slot: usize,
    publish_on_release: bool,
}

impl std::fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("seq", &self.seq)
            .field("slot", &self.slot)
            .field("publish_on_release", &self.publish_on_release)
            .finish()
    }
}

impl WriteGuard<'_> {
    /// The sequence number this write will publish as.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The working slot's bytes.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the write lock makes this thread the slot's only accessor,
        // and the guard's borrow of the object keeps the region alive.
        unsafe {
            self.object
                .data
                .region()
                .slice_mut(self.slot * self.object.byte_length, self.object.byte_length)
        }
    }

    /// The working slot's bytes, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `bytes`, plus the exclusive borrow of the guard.
        unsafe {
            self.object
                .data
                .region()
                .slice_mut(self.slot * self.object.byte_length, self.object.byte_length)
        }
    }

    /// Copy the latest published record into the working slot, so a partial
    /// update starts from the current state. Returns `false` before the
    /// first publish.
    pub fn copy_from_latest(&mut self) -> bool {
        let published = self.object.ctl.block.published_slot();
        if published < 0 {
            return false;
        }
        let published = published as usize;
        debug_assert_ne!(published, self.slot);
        let len = self.object.byte_length;
        // SAFETY: the published slot is distinct from the working slot and
        // cannot be republished while this guard holds the write lock.
        unsafe {
            self.object
                .data
                .region()
                .copy_between(published * len, self.slot * len, len)
        };
        true
    }

    /// Atomically publish the working slot and release the lock.
    ///
    /// Fails with [`WriteError::Poisoned`] (publishing nothing) if the object
    /// was poisoned after acquisition.
    pub fn publish(mut self) -> Result<u32, WriteError> {
        let block = &self.object.ctl.block;
        if block.is_poisoned() {
            return Err(WriteError::Poisoned);
        }
        // Publish order matters: readers check `seq` last.
        block.set_published_slot(self.slot as i32);
        block.store_seq(self.seq);
        self.publish_on_release = true;
        Ok(self.seq)
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let ctl = &self.object.ctl;
        if ctl.block.is_poisoned() {
            // Death marking already reset the lock words; queued writers only
            // need another chance to observe the poison.
            ctl.waiters.notify_waiters();
            return;
        }
        ctl.block.set_depth(0);
        ctl.block.set_owner(BusThreadId::NONE);
        ctl.block.advance_serving();
        ctl.waiters.notify_waiters();
        if self.publish_on_release {
            notify::publish(&self.object.channel);
        }
    }
}
