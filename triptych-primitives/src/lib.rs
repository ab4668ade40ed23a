//! Substrate for the triptych object bus.
//!
//! This crate holds the pieces everything else is built on:
//!
//! - [`Region`] / [`SharedRegion`]: offset-addressed byte regions shared
//!   between threads, with the backing allocation kept alive by the handle
//! - [`sync`]: atomics that swap to `loom` equivalents under `--cfg loom`
//! - [`BusThreadId`] / [`current_thread_id`]: process-unique integral thread
//!   identities small enough to live in a shared control word

pub mod region;
pub mod sync;
pub mod thread;

pub use region::{Region, SharedRegion};
pub use thread::{BusThreadId, current_thread_id};
