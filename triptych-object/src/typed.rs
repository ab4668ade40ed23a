//! Typed shared objects: a compiled layout over the raw slot ring.

use triptych_schema::{Layout, Schema, Values, read_snapshot, write_fields};

use crate::error::{ConfigError, WriteError};
use crate::notify::{Subscription, Updates};
use crate::object::{ObjectConfig, SharedObject, SharedObjectDescriptor, WriteGuard};

/// The latest published record, decoded field by field.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub seq: u32,
    pub values: Values,
}

/// A [`SharedObject`] with a compiled [`Layout`]: named-field reads, partial
/// updates, and the same locking, ordering, and notification behavior as the
/// raw object.
#[derive(Clone)]
pub struct TypedSharedObject {
    object: SharedObject,
    layout: Layout,
}

impl TypedSharedObject {
    /// Create a fresh object sized by the schema's layout.
    pub fn create(id: impl Into<String>, schema: &Schema) -> Result<Self, ConfigError> {
        let layout = Layout::compile(schema)?;
        let object = SharedObject::create(
            id,
            ObjectConfig {
                byte_length: layout.byte_length(),
            },
        )?;
        Ok(Self { object, layout })
    }

    /// Attach a schema to an existing object. The layout's byte length must
    /// match the object's record size.
    pub fn new(object: SharedObject, schema: &Schema) -> Result<Self, ConfigError> {
        let layout = Layout::compile(schema)?;
        if layout.byte_length() != object.byte_length() {
            return Err(ConfigError::SizeMismatch {
                object: object.byte_length(),
                layout: layout.byte_length(),
            });
        }
        Ok(Self { object, layout })
    }

    /// Attach to an existing object through its descriptor.
    pub fn from_descriptor(
        descriptor: SharedObjectDescriptor,
        schema: &Schema,
    ) -> Result<Self, ConfigError> {
        Self::new(SharedObject::from_descriptor(descriptor), schema)
    }

    /// The underlying raw object.
    #[inline]
    pub fn object(&self) -> &SharedObject {
        &self.object
    }

    /// The compiled layout.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Decode the latest published record, or `None` before the first
    /// publish.
    pub fn read(&self) -> Option<Record> {
        self.object.read_latest().map(|snapshot| Record {
            seq: snapshot.seq(),
            values: read_snapshot(&self.layout, snapshot.bytes(), 0),
        })
    }

    /// Acquire the write lock with the working slot seeded from the latest
    /// published record, so unwritten fields carry forward.
    pub async fn begin_write(&self) -> Result<TypedWriteGuard<'_>, WriteError> {
        let mut guard = self.object.begin_write().await?;
        guard.copy_from_latest();
        Ok(TypedWriteGuard {
            guard,
            layout: &self.layout,
        })
    }

    /// Apply a partial update and publish it.
    ///
    /// Fields absent from `values` keep their current value; a schema type
    /// error aborts the write with nothing published.
    pub async fn write(&self, values: &Values) -> Result<u32, WriteError> {
        let mut guard = self.begin_write().await?;
        guard.set(values)?;
        guard.publish()
    }

    /// Acquire the write lock, run `f` on the typed guard, and publish if it
    /// succeeds. Callback errors abort the write.
    pub async fn request_write<R, E>(
        &self,
        f: impl FnOnce(&mut TypedWriteGuard<'_>) -> Result<R, E>,
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

    /// Invoke `callback` after each successful publish.
    pub fn subscribe(&self, callback: impl Fn() + Send + 'static) -> Subscription {
        self.object.subscribe(callback)
    }

    /// A pull-style stream of publish notifications.
    pub fn updates(&self) -> Updates {
        self.object.updates()
    }
}

impl std::fmt::Debug for TypedSharedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedSharedObject")
            .field("id", &self.object.id())
            .field("byte_length", &self.object.byte_length())
            .finish()
    }
}

/// A [`WriteGuard`] with typed field access.
///
/// The working slot starts as a copy of the latest published record;
/// [`view`](TypedWriteGuard::view) shows the fields as they stand before (or
/// between) updates, and [`set`](TypedWriteGuard::set) applies partial
/// updates in place.
pub struct TypedWriteGuard<'a> {
    guard: WriteGuard<'a>,
    layout: &'a Layout,
}

impl TypedWriteGuard<'_> {
    /// The sequence number this write will publish as.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.guard.seq()
    }

    /// Decode the working slot's current field values.
    pub fn view(&self) -> Values {
        read_snapshot(self.layout, self.guard.bytes(), 0)
    }

    /// Apply a partial update to the working slot. On error nothing is
    /// written.
    pub fn set(&mut self, values: &Values) -> Result<(), WriteError> {
        write_fields(self.layout, self.guard.bytes_mut(), 0, values)?;
        Ok(())
    }

    /// The raw working slot.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.guard.bytes_mut()
    }

    /// Atomically publish the working slot and release the lock.
    pub fn publish(self) -> Result<u32, WriteError> {
        self.guard.publish()
    }
}
