//! Process-wide descriptor registry with init-once semantics.

use super::MessageDescriptor;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, trace};

/// Source of message descriptors consumed by the codec.
///
/// Implemented by [`DescriptorRegistry`] and
/// [`SchemaSet`](super::SchemaSet); implement it to plug in other schema
/// sources.
pub trait DescriptorProvider: Send + Sync {
    /// Returns the descriptor of the named message type
    fn message_descriptor(&self, name: &str) -> Result<Arc<MessageDescriptor>>;
}

/// Thread-safe map from message type name to its published descriptor.
///
/// Each name is published at most once; every later lookup returns the same
/// `Arc`.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: Mutex<HashMap<String, Arc<MessageDescriptor>>>,
}

impl DescriptorRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static DescriptorRegistry {
        static GLOBAL: OnceLock<DescriptorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DescriptorRegistry::new)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<MessageDescriptor>>>> {
        self.descriptors
            .lock()
            .map_err(|e| Error::internal(format!("descriptor registry lock poisoned: {e}")))
    }

    /// Returns the descriptor registered under `name`, building and
    /// publishing it first if needed.
    ///
    /// `build` runs without the lock held so it may register nested types.
    /// When two callers race on the same name the first published
    /// descriptor wins and the other build result is dropped.
    pub fn get_or_register<F>(&self, name: &str, build: F) -> Result<Arc<MessageDescriptor>>
    where
        F: FnOnce() -> Result<MessageDescriptor>,
    {
        if let Some(existing) = self.lock()?.get(name) {
            trace!("Descriptor cache hit for {}", name);
            return Ok(Arc::clone(existing));
        }

        let built = build()?;
        if built.name() != name {
            return Err(Error::descriptor_build(format!(
                "builder for '{}' produced descriptor named '{}'",
                name,
                built.name()
            )));
        }

        let mut descriptors = self.lock()?;
        let published = descriptors
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Registered descriptor {}", name);
                Arc::new(built)
            });
        Ok(Arc::clone(published))
    }

    /// Publishes an already-built descriptor, keeping any existing one
    pub fn register(&self, descriptor: MessageDescriptor) -> Result<Arc<MessageDescriptor>> {
        let name = descriptor.name().to_string();
        self.get_or_register(&name, move || Ok(descriptor))
    }

    /// Looks up a published descriptor
    pub fn get(&self, name: &str) -> Result<Option<Arc<MessageDescriptor>>> {
        Ok(self.lock()?.get(name).cloned())
    }

    /// Checks whether a descriptor is published under `name`
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(name))
    }

    /// Names of all published descriptors, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Number of published descriptors
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Checks if the registry is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl DescriptorProvider for DescriptorRegistry {
    fn message_descriptor(&self, name: &str) -> Result<Arc<MessageDescriptor>> {
        self.get(name)?
            .ok_or_else(|| Error::message_not_found(name))
    }
}
