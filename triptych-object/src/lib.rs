//! Triple-buffered shared objects.
//!
//! A [`SharedObject`] is a fixed-size record shared between threads through a
//! three-slot ring and a seven-word atomic control region:
//!
//! - **Reads** ([`SharedObject::read_latest`]) are wait-free sequence-locked
//!   snapshots: two atomic loads around a byte copy, retried on a torn
//!   observation, never blocking.
//! - **Writes** ([`SharedObject::begin_write`]) are serialized through a
//!   ticket lock with strict FIFO admission; the [`WriteGuard`] may be held
//!   across `.await` points and publishes atomically on
//!   [`WriteGuard::publish`].
//! - **Notifications** fan out through a process-wide broadcast channel per
//!   object id ([`channel_name`]), one message per successful publish.
//! - **Writer death** poisons the object permanently
//!   ([`SharedObject::mark_writer_thread_died`]); readers keep the last
//!   published record, writers fail fast.
//!
//! [`TypedSharedObject`] layers a compiled [`Layout`](triptych_schema::Layout)
//! on top for named-field reads and partial updates.

mod control;
mod error;
mod notify;
mod object;
mod typed;
mod wait;

pub use control::{CONTROL_WORDS, ControlBlock};
pub use error::{ConfigError, WriteError};
pub use notify::{Subscription, Updates, channel_name, subscribe_channel, updates_for_channel};
pub use object::{
    ControlRegion, ObjectConfig, SLOT_COUNT, SharedObject, SharedObjectDescriptor, Snapshot,
    WriteGuard,
};
pub use typed::{Record, TypedSharedObject, TypedWriteGuard};
pub use wait::WaitOptions;
