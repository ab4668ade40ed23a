//! The host ↔ peer message channel.
//!
//! Exactly three message shapes cross the boundary ([`BusMessage`]); the
//! transport behind them is anything with a post/receive pair. The concrete
//! in-process transport is [`MessagePort`] (two linked halves of a duplex
//! channel); custom transports implement [`Endpoint`]. A spawned peer thread
//! can also pick up its port implicitly through
//! [`install_parent_port`] / [`take_parent_port`].

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use triptych_object::SharedObjectDescriptor;
use triptych_primitives::BusThreadId;

/// Opaque per-worker setup payload, delivered in `init`. Workers downcast to
/// the concrete type they were handed.
pub type SetupData = Arc<dyn Any + Send + Sync>;

/// The three bootstrap message shapes.
#[derive(Clone)]
pub enum BusMessage {
    /// Host → peer, exactly once at attach time.
    Init {
        shared_objects: Vec<SharedObjectDescriptor>,
        setup_data: Option<SetupData>,
    },
    /// Peer → host, acknowledging `init`. Carries the peer thread's identity
    /// so the host can later map a dead worker to the objects it owned.
    Ready { thread_id: BusThreadId },
    /// Host → peer, once per object created after the peer attached.
    SharedObjectCreated { shared_object: SharedObjectDescriptor },
}

impl fmt::Debug for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusMessage::Init {
                shared_objects,
                setup_data,
            } => f
                .debug_struct("Init")
                .field("shared_objects", &shared_objects.len())
                .field("has_setup_data", &setup_data.is_some())
                .finish(),
            BusMessage::Ready { thread_id } => {
                f.debug_struct("Ready").field("thread_id", thread_id).finish()
            }
            BusMessage::SharedObjectCreated { shared_object } => f
                .debug_struct("SharedObjectCreated")
                .field("id", &shared_object.id)
                .finish(),
        }
    }
}

/// The far side of the channel is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint disconnected")
    }
}

impl std::error::Error for Disconnected {}

/// A duplex message endpoint: post outward, receive inward.
///
/// The receiver can be taken exactly once; the runtime takes it and owns
/// message delivery from then on.
pub trait Endpoint: Send + Sync + 'static {
    /// Send a message to the far side.
    fn post(&self, message: BusMessage) -> Result<(), Disconnected>;

    /// Take the inbound receiver. Returns `None` if it was already taken.
    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<BusMessage>>;
}

/// One half of an in-process duplex channel pair.
pub struct MessagePort {
    tx: mpsc::UnboundedSender<BusMessage>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<BusMessage>>>,
}

impl MessagePort {
    /// Create two linked ports: what one posts, the other receives.
    pub fn pair() -> (MessagePort, MessagePort) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                tx: a_tx,
                rx: Mutex::new(Some(a_rx)),
            },
            MessagePort {
                tx: b_tx,
                rx: Mutex::new(Some(b_rx)),
            },
        )
    }
}

impl Endpoint for MessagePort {
    fn post(&self, message: BusMessage) -> Result<(), Disconnected> {
        self.tx.send(message).map_err(|_| Disconnected)
    }

    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<BusMessage>> {
        self.rx.lock().expect("port receiver lock").take()
    }
}

impl fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePort").finish()
    }
}

thread_local! {
    static PARENT_PORT: RefCell<Option<MessagePort>> = const { RefCell::new(None) };
}

/// Make `port` the calling thread's parent endpoint.
///
/// A host environment spawning a peer thread hands it the port this way; the
/// peer then attaches with
/// [`SharedRuntime::worker_from_parent`](crate::SharedRuntime::worker_from_parent)
/// without naming an endpoint.
pub fn install_parent_port(port: MessagePort) {
    PARENT_PORT.with(|slot| *slot.borrow_mut() = Some(port));
}

/// Take the calling thread's parent endpoint, if one was installed.
pub fn take_parent_port() -> Option<MessagePort> {
    PARENT_PORT.with(|slot| slot.borrow_mut().take())
}
