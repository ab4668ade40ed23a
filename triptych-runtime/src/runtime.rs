//! The process-wide coordinator.
//!
//! A [`SharedRuntime`] plays one of two roles:
//!
//! - **Host**: owns the creation-ordered object registry, attaches workers
//!   (shipping them every existing descriptor in `init`), broadcasts
//!   `shared-object-created` for later creations, and propagates worker death
//!   to every object the dead thread's write lock covered.
//! - **Worker**: hydrates its object table from the `init` descriptors,
//!   replies `ready`, then keeps listening for `shared-object-created`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use triptych_object::{ObjectConfig, SharedObject, SharedObjectDescriptor, TypedSharedObject};
use triptych_primitives::{BusThreadId, current_thread_id};
use triptych_schema::Schema;

use crate::endpoint::{BusMessage, Endpoint, MessagePort, SetupData, take_parent_port};
use crate::error::RuntimeError;

/// Emitted once when a dead worker's thread held write locks: every object it
/// poisoned, by id.
#[derive(Clone, Debug)]
pub struct FatalError {
    pub worker: String,
    pub poisoned: Vec<String>,
}

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "worker `{}` died holding write locks on: {}",
            self.worker,
            self.poisoned.join(", ")
        )
    }
}

impl std::error::Error for FatalError {}

/// Callback invoked when a worker death poisons objects.
pub type FatalCallback = Arc<dyn Fn(&FatalError) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Host,
    Worker,
}

struct WorkerState {
    endpoint: Arc<dyn Endpoint>,
    thread_id: BusThreadId,
    died: bool,
}

#[derive(Default)]
struct Registry {
    order: Vec<String>,
    map: HashMap<String, SharedObject>,
}

impl Registry {
    fn insert(&mut self, object: SharedObject) -> Result<(), RuntimeError> {
        let id = object.id().to_string();
        if self.map.contains_key(&id) {
            return Err(RuntimeError::DuplicateObject { id });
        }
        self.order.push(id.clone());
        self.map.insert(id, object);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<SharedObject> {
        self.map.get(id).cloned()
    }

    fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    fn descriptors(&self) -> Vec<SharedObjectDescriptor> {
        self.order
            .iter()
            .map(|id| self.map[id].descriptor())
            .collect()
    }

    fn objects(&self) -> Vec<SharedObject> {
        self.order.iter().map(|id| self.map[id].clone()).collect()
    }
}

struct RuntimeInner {
    role: Role,
    objects: Mutex<Registry>,
    workers: Mutex<HashMap<String, WorkerState>>,
    fatal_callbacks: Mutex<Vec<FatalCallback>>,
    setup_data: Option<SetupData>,
    // Keeps the worker's side of the channel alive; when the worker runtime
    // drops, the host's monitor observes the closure as a death.
    _endpoint: Option<Arc<dyn Endpoint>>,
}

/// A handle to the process-wide shared-object coordinator. Cloning is cheap;
/// clones share state.
#[derive(Clone)]
pub struct SharedRuntime {
    inner: Arc<RuntimeInner>,
}

impl SharedRuntime {
    /// Create an empty runtime in host mode.
    pub fn host() -> SharedRuntime {
        SharedRuntime {
            inner: Arc::new(RuntimeInner {
                role: Role::Host,
                objects: Mutex::new(Registry::default()),
                workers: Mutex::new(HashMap::new()),
                fatal_callbacks: Mutex::new(Vec::new()),
                setup_data: None,
                _endpoint: None,
            }),
        }
    }

    /// Attach to a host over `endpoint`: suspends until `init` arrives,
    /// hydrates the local object table, replies `ready`, and keeps listening
    /// for later object creations.
    ///
    /// The wait for `init` is unbounded; the host ships it before the peer's
    /// code normally runs.
    pub async fn worker(endpoint: MessagePort) -> Result<SharedRuntime, RuntimeError> {
        Self::worker_on(endpoint).await
    }

    /// [`worker`](Self::worker) over any [`Endpoint`] implementation.
    pub async fn worker_on(endpoint: impl Endpoint) -> Result<SharedRuntime, RuntimeError> {
        let endpoint: Arc<dyn Endpoint> = Arc::new(endpoint);
        let mut rx = endpoint
            .take_receiver()
            .ok_or_else(|| RuntimeError::Handshake("endpoint receiver already taken".into()))?;

        let (shared_objects, setup_data) = match rx.recv().await {
            Some(BusMessage::Init {
                shared_objects,
                setup_data,
            }) => (shared_objects, setup_data),
            Some(other) => {
                return Err(RuntimeError::Handshake(format!(
                    "expected init, got {other:?}"
                )));
            }
            None => return Err(RuntimeError::Handshake("endpoint closed before init".into())),
        };

        let mut registry = Registry::default();
        for descriptor in shared_objects {
            registry.insert(SharedObject::from_descriptor(descriptor))?;
        }

        endpoint
            .post(BusMessage::Ready {
                thread_id: current_thread_id(),
            })
            .map_err(|e| RuntimeError::Handshake(e.to_string()))?;

        let runtime = SharedRuntime {
            inner: Arc::new(RuntimeInner {
                role: Role::Worker,
                objects: Mutex::new(registry),
                workers: Mutex::new(HashMap::new()),
                fatal_callbacks: Mutex::new(Vec::new()),
                setup_data,
                _endpoint: Some(endpoint),
            }),
        };

        let listener = runtime.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    BusMessage::SharedObjectCreated { shared_object } => {
                        let id = shared_object.id.clone();
                        let object = SharedObject::from_descriptor(shared_object);
                        let mut objects = listener.inner.objects.lock().expect("registry lock");
                        if objects.insert(object).is_ok() {
                            tracing::debug!(id = %id, "shared object registered from host");
                        } else {
                            tracing::warn!(id = %id, "duplicate shared-object-created ignored");
                        }
                    }
                    other => {
                        tracing::warn!(msg = ?other, "unexpected message from host");
                    }
                }
            }
        });

        Ok(runtime)
    }

    /// [`worker`](Self::worker) using the thread-local parent endpoint
    /// installed by the spawning host environment.
    pub async fn worker_from_parent() -> Result<SharedRuntime, RuntimeError> {
        let port = take_parent_port().ok_or_else(|| {
            RuntimeError::Handshake("no parent endpoint installed for this thread".into())
        })?;
        Self::worker_on(port).await
    }

    /// True if this runtime is the host.
    pub fn is_host(&self) -> bool {
        self.inner.role == Role::Host
    }

    fn require_host(&self, operation: &'static str) -> Result<(), RuntimeError> {
        if self.is_host() {
            Ok(())
        } else {
            Err(RuntimeError::HostOnly { operation })
        }
    }

    /// Attach a worker under `name`: ships `init` with every existing
    /// descriptor plus `setup_data`, awaits `ready`, then monitors the
    /// endpoint for death.
    pub async fn attach_worker(
        &self,
        name: impl Into<String>,
        endpoint: impl Endpoint,
        setup_data: Option<SetupData>,
    ) -> Result<(), RuntimeError> {
        self.require_host("attach_worker")?;
        let name = name.into();
        if self
            .inner
            .workers
            .lock()
            .expect("workers lock")
            .contains_key(&name)
        {
            return Err(RuntimeError::DuplicateWorker { name });
        }

        let endpoint: Arc<dyn Endpoint> = Arc::new(endpoint);
        let shared_objects = self
            .inner
            .objects
            .lock()
            .expect("registry lock")
            .descriptors();
        endpoint
            .post(BusMessage::Init {
                shared_objects,
                setup_data,
            })
            .map_err(|e| RuntimeError::Handshake(e.to_string()))?;

        let mut rx = endpoint
            .take_receiver()
            .ok_or_else(|| RuntimeError::Handshake("endpoint receiver already taken".into()))?;
        let thread_id = match rx.recv().await {
            Some(BusMessage::Ready { thread_id }) => thread_id,
            Some(other) => {
                return Err(RuntimeError::Handshake(format!(
                    "expected ready, got {other:?}"
                )));
            }
            None => {
                return Err(RuntimeError::Handshake(
                    "endpoint closed before ready".into(),
                ));
            }
        };

        {
            let mut workers = self.inner.workers.lock().expect("workers lock");
            if workers.contains_key(&name) {
                return Err(RuntimeError::DuplicateWorker { name });
            }
            workers.insert(
                name.clone(),
                WorkerState {
                    endpoint,
                    thread_id,
                    died: false,
                },
            );
        }
        tracing::debug!(worker = %name, thread = %thread_id, "worker attached");

        // Workers send nothing after ready; the channel closing means the
        // worker is gone.
        let runtime = self.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                tracing::warn!(worker = %name, msg = ?message, "unexpected message from worker");
            }
            runtime.worker_died(&name);
        });

        Ok(())
    }

    /// Create and register an untyped object, broadcasting its descriptor to
    /// every attached worker.
    pub fn create_object(
        &self,
        id: impl Into<String>,
        config: ObjectConfig,
    ) -> Result<SharedObject, RuntimeError> {
        self.require_host("create_shared_object")?;
        let object = SharedObject::create(id, config)?;
        self.register_and_broadcast(object.clone())?;
        Ok(object)
    }

    /// Create and register a typed object sized by `schema`, broadcasting its
    /// descriptor to every attached worker.
    pub fn create_typed(
        &self,
        id: impl Into<String>,
        schema: &Schema,
    ) -> Result<TypedSharedObject, RuntimeError> {
        self.require_host("create_shared_object")?;
        let typed = TypedSharedObject::create(id, schema)?;
        self.register_and_broadcast(typed.object().clone())?;
        Ok(typed)
    }

    fn register_and_broadcast(&self, object: SharedObject) -> Result<(), RuntimeError> {
        self.inner
            .objects
            .lock()
            .expect("registry lock")
            .insert(object.clone())?;

        let descriptor = object.descriptor();
        let workers = self.inner.workers.lock().expect("workers lock");
        for (name, state) in workers.iter() {
            if state.died {
                continue;
            }
            let message = BusMessage::SharedObjectCreated {
                shared_object: descriptor.clone(),
            };
            if state.endpoint.post(message).is_err() {
                tracing::warn!(worker = %name, id = %object.id(), "worker unreachable for object broadcast");
            }
        }
        Ok(())
    }

    /// Look up a registered object.
    pub fn open_object(&self, id: &str) -> Result<SharedObject, RuntimeError> {
        self.inner
            .objects
            .lock()
            .expect("registry lock")
            .get(id)
            .ok_or_else(|| RuntimeError::UnknownObject { id: id.to_string() })
    }

    /// Look up a registered object and attach a schema to it.
    pub fn open_typed(&self, id: &str, schema: &Schema) -> Result<TypedSharedObject, RuntimeError> {
        let object = self.open_object(id)?;
        Ok(TypedSharedObject::new(object, schema)?)
    }

    /// Registered object ids, in creation order.
    pub fn object_ids(&self) -> Vec<String> {
        self.inner.objects.lock().expect("registry lock").ids()
    }

    /// The opaque setup payload delivered in this worker's `init`.
    pub fn setup_data(&self) -> Option<SetupData> {
        self.inner.setup_data.clone()
    }

    /// Register a callback for worker-death fatal errors.
    pub fn on_fatal(&self, callback: FatalCallback) {
        self.inner
            .fatal_callbacks
            .lock()
            .expect("fatal callback lock")
            .push(callback);
    }

    /// Record that the named worker's thread terminated.
    ///
    /// Every object whose write lock the dead thread held is poisoned, and
    /// one [`FatalError`] naming them all is delivered to the callbacks
    /// registered with [`on_fatal`](Self::on_fatal). Called automatically
    /// when a worker's endpoint closes; host environments that join threads
    /// themselves may also call it directly. Idempotent per worker.
    pub fn worker_died(&self, name: &str) {
        let thread_id = {
            let mut workers = self.inner.workers.lock().expect("workers lock");
            match workers.get_mut(name) {
                Some(state) if !state.died => {
                    state.died = true;
                    state.thread_id
                }
                _ => return,
            }
        };

        let mut poisoned = Vec::new();
        for object in self.inner.objects.lock().expect("registry lock").objects() {
            if object.owner() == thread_id {
                object.mark_writer_thread_died(thread_id);
                poisoned.push(object.id().to_string());
            }
        }

        if poisoned.is_empty() {
            tracing::debug!(worker = %name, "worker exited clean");
            return;
        }

        let fatal = FatalError {
            worker: name.to_string(),
            poisoned,
        };
        tracing::error!(worker = %name, poisoned = ?fatal.poisoned, "worker died holding write locks");
        let callbacks = self
            .inner
            .fatal_callbacks
            .lock()
            .expect("fatal callback lock")
            .clone();
        for callback in callbacks {
            callback(&fatal);
        }
    }
}

impl std::fmt::Debug for SharedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRuntime")
            .field("role", &self.inner.role)
            .field("objects", &self.object_ids())
            .finish()
    }
}
