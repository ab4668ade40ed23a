//! Host/peer coordination for triptych shared objects.
//!
//! The host side owns the object registry and attaches peer threads over a
//! duplex message endpoint; peers hydrate their object table from the
//! bootstrap descriptors and stay subscribed to later creations. Three
//! message shapes cross the boundary (see [`BusMessage`]); the transport is
//! pluggable (see [`Endpoint`]).
//!
//! ```ignore
//! // Host thread
//! let runtime = SharedRuntime::host();
//! let telemetry = runtime.create_typed("telemetry", &schema)?;
//! let (host_port, peer_port) = MessagePort::pair();
//! // ... hand peer_port to the spawned thread ...
//! runtime.attach_worker("renderer", host_port, None).await?;
//!
//! // Peer thread
//! let runtime = SharedRuntime::worker(peer_port).await?;
//! let telemetry = runtime.open_typed("telemetry", &schema)?;
//! ```

mod endpoint;
mod error;
mod runtime;

pub use endpoint::{
    BusMessage, Disconnected, Endpoint, MessagePort, SetupData, install_parent_port,
    take_parent_port,
};
pub use error::RuntimeError;
pub use runtime::{FatalCallback, FatalError, SharedRuntime};
