//! triptych - a shared-memory inter-thread object bus.
//!
//! Cooperating threads (one producer per object, many consumers) exchange
//! fixed-size typed records through triple-buffered shared slots: lock-free
//! sequence-checked reads, ticket-serialized FIFO writes, and per-object
//! change notifications, with no per-update payload copies through a message
//! channel.
//!
//! Users should depend on this crate rather than the individual component
//! crates.
//!
//! # The pieces
//!
//! - [`SharedObject`] / [`TypedSharedObject`]: the triple-buffered record
//!   itself, raw or schema-typed
//! - [`Schema`] / [`Layout`] / [`record!`]: declarative field layouts and
//!   typed values
//! - [`SharedRuntime`] / [`MessagePort`]: host/peer attachment, descriptor
//!   bootstrap, and writer-death propagation

// Core shared object surface.
pub use triptych_object::{
    CONTROL_WORDS, ConfigError, ControlBlock, ControlRegion, ObjectConfig, Record, SLOT_COUNT,
    SharedObject, SharedObjectDescriptor, Snapshot, Subscription, TypedSharedObject,
    TypedWriteGuard, Updates, WaitOptions, WriteError, WriteGuard, channel_name,
    subscribe_channel, updates_for_channel,
};

// Schema and typed values.
pub use triptych_schema::{
    FieldKind, FieldShape, Layout, Scalar, ScalarArray, ScalarType, Schema, SchemaError,
    SchemaTypeError, Value, Values, read_snapshot, write_fields,
};
pub use triptych_schema::record;

// Runtime, bootstrap, and endpoints.
pub use triptych_runtime::{
    BusMessage, Disconnected, Endpoint, FatalCallback, FatalError, MessagePort, RuntimeError,
    SetupData, SharedRuntime, install_parent_port, take_parent_port,
};

// Thread identity.
pub use triptych_primitives::{BusThreadId, current_thread_id};
