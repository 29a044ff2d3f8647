// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Translator instances and their process-wide registry.
//!
//! Each isolated network namespace gets its own translator instance, holding
//! the configuration store (and, in the full system, the pool4/BIB/session
//! tables) the packet path uses for that namespace. The registry owns one
//! reference per instance; admin and packet-path code take further
//! references via [`InstanceRegistry::get`] and release them with
//! [`InstanceRegistry::put`]. An instance leaves the registry when its count
//! reaches zero, under the registry lock, so teardown never races an
//! enumeration.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cfg::{ConfigError, ConfigStore};

/// Identity of a translator instance: the network namespace it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub u32);

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "netns {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// An instance with the same namespace identity is already registered.
    AlreadyExists(NamespaceId),
    /// No registered instance has this namespace identity.
    NotFound(NamespaceId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyExists(ns) => {
                write!(f, "a translator instance already exists in {}", ns)
            }
            RegistryError::NotFound(ns) => {
                write!(f, "no translator instance exists in {}", ns)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// One translator instance.
///
/// The refcount gates registry membership: it starts at 1 (the registry's
/// reference, taken by [`InstanceRegistry::add`]) and the entry is removed
/// when a [`InstanceRegistry::put`] drops it to zero. Memory is `Arc`-owned,
/// so handles obtained before removal stay valid until dropped.
pub struct TranslatorInstance {
    ns: NamespaceId,
    refs: AtomicUsize,
    config: ConfigStore,
}

impl TranslatorInstance {
    /// Build an instance with default configuration, ready for `add`.
    pub fn new(ns: NamespaceId) -> Result<Arc<Self>, ConfigError> {
        Ok(Arc::new(Self {
            ns,
            refs: AtomicUsize::new(1),
            config: ConfigStore::new()?,
        }))
    }

    pub fn ns(&self) -> NamespaceId {
        self.ns
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }
}

impl fmt::Debug for TranslatorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorInstance")
            .field("ns", &self.ns)
            .field("refs", &self.refs.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for TranslatorInstance {
    fn drop(&mut self) {
        log::debug!("instance: destroyed translator for {}", self.ns);
    }
}

/// Process-wide registry of live translator instances, one per namespace.
pub struct InstanceRegistry {
    instances: Mutex<HashMap<NamespaceId, Arc<TranslatorInstance>>>,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh instance. Its refcount (1) becomes the registry's
    /// reference.
    pub fn add(&self, instance: Arc<TranslatorInstance>) -> Result<(), RegistryError> {
        let mut instances = self.instances.lock();
        if instances.contains_key(&instance.ns) {
            return Err(RegistryError::AlreadyExists(instance.ns));
        }
        log::info!("instance: registered translator for {}", instance.ns);
        instances.insert(instance.ns, instance);
        Ok(())
    }

    /// Atomically swap the instance registered for a namespace (wholesale
    /// configuration reload) without disturbing other instances. The old
    /// entry loses the registry's reference; handles already taken via
    /// `get` stay valid until `put`.
    pub fn replace(&self, instance: Arc<TranslatorInstance>) -> Result<(), RegistryError> {
        let mut instances = self.instances.lock();
        let old = match instances.get(&instance.ns) {
            Some(old) => Arc::clone(old),
            None => return Err(RegistryError::NotFound(instance.ns)),
        };
        log::info!("instance: replaced translator for {}", instance.ns);
        instances.insert(instance.ns, instance);
        Self::release_locked(&mut instances, &old);
        Ok(())
    }

    /// Take a reference to the instance serving a namespace.
    pub fn get(&self, ns: NamespaceId) -> Option<Arc<TranslatorInstance>> {
        let instances = self.instances.lock();
        instances.get(&ns).map(|instance| {
            // Every mapped entry holds at least the registry's reference
            // while the lock is free, so this never revives a dead count.
            let previous = instance.refs.fetch_add(1, Ordering::Relaxed);
            debug_assert!(previous > 0);
            Arc::clone(instance)
        })
    }

    /// Release a reference. At zero the instance leaves the registry.
    pub fn put(&self, instance: &TranslatorInstance) {
        let mut instances = self.instances.lock();
        Self::release_locked(&mut instances, instance);
    }

    /// Drop one reference while holding the map lock. The count cannot be
    /// observed at zero by `get` (which also takes the lock), so a final
    /// release and a lookup never interleave. Removal checks identity: a
    /// stale handle whose namespace has since been taken over by another
    /// instance must not detach the successor.
    fn release_locked(
        instances: &mut HashMap<NamespaceId, Arc<TranslatorInstance>>,
        instance: &TranslatorInstance,
    ) {
        if instance.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mapped = instances
                .get(&instance.ns)
                .is_some_and(|entry| std::ptr::eq(entry.as_ref(), instance));
            if mapped {
                instances.remove(&instance.ns);
            }
        }
    }

    /// Enumerate live instances, propagating the callback's first error and
    /// short-circuiting. The set of instances is stable for the duration of
    /// one call; no other ordering is guaranteed.
    pub fn foreach<E>(
        &self,
        mut callback: impl FnMut(&TranslatorInstance) -> Result<(), E>,
    ) -> Result<(), E> {
        let instances = self.instances.lock();
        for instance in instances.values() {
            callback(instance)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    #[test]
    fn add_rejects_duplicate_namespace() {
        let registry = InstanceRegistry::new();
        let ns = NamespaceId(1);
        registry
            .add(TranslatorInstance::new(ns).expect("defaults"))
            .expect("first add");
        assert_eq!(
            registry
                .add(TranslatorInstance::new(ns).expect("defaults"))
                .unwrap_err(),
            RegistryError::AlreadyExists(ns)
        );
    }

    #[test]
    fn replace_requires_existing_instance() {
        let registry = InstanceRegistry::new();
        let ns = NamespaceId(2);
        assert_eq!(
            registry
                .replace(TranslatorInstance::new(ns).expect("defaults"))
                .unwrap_err(),
            RegistryError::NotFound(ns)
        );

        registry
            .add(TranslatorInstance::new(ns).expect("defaults"))
            .expect("add");
        let replacement = TranslatorInstance::new(ns).expect("defaults");
        replacement
            .config()
            .set(
                crate::cfg::FieldId::MinIpv6Mtu as u16,
                &1500u16.to_ne_bytes(),
            )
            .expect("valid update");
        registry.replace(replacement).expect("replace");

        let live = registry.get(ns).expect("present");
        assert_eq!(live.config().get().min_ipv6_mtu, 1500);
        registry.put(&live);
    }

    #[test]
    fn replace_does_not_disturb_other_instances() {
        let registry = InstanceRegistry::new();
        registry
            .add(TranslatorInstance::new(NamespaceId(1)).expect("defaults"))
            .expect("add");
        registry
            .add(TranslatorInstance::new(NamespaceId(2)).expect("defaults"))
            .expect("add");

        registry
            .replace(TranslatorInstance::new(NamespaceId(1)).expect("defaults"))
            .expect("replace");
        assert_eq!(registry.len(), 2);
        assert!(registry.get(NamespaceId(2)).is_some());
    }

    #[test]
    fn refcount_lifecycle_destroys_exactly_once() {
        let registry = InstanceRegistry::new();
        let ns = NamespaceId(3);

        let instance = TranslatorInstance::new(ns).expect("defaults");
        let weak: Weak<TranslatorInstance> = Arc::downgrade(&instance);
        registry.add(Arc::clone(&instance)).expect("add");

        let handle = registry.get(ns).expect("present"); // refs: 2
        registry.put(&handle); // refs: 1
        registry.put(&instance); // refs: 0, leaves the registry

        // Gone from enumeration...
        let mut visited = 0;
        registry
            .foreach(|_| -> Result<(), ()> {
                visited += 1;
                Ok(())
            })
            .expect("enumerate");
        assert_eq!(visited, 0);
        assert!(registry.get(ns).is_none());

        // ...and destroyed once the last handle drops.
        drop(handle);
        drop(instance);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn stale_handle_put_does_not_remove_successor() {
        let registry = InstanceRegistry::new();
        let ns = NamespaceId(9);

        let old = TranslatorInstance::new(ns).expect("defaults");
        let weak = Arc::downgrade(&old);
        registry.add(Arc::clone(&old)).expect("add");
        let held = registry.get(ns).expect("present"); // old refs: 2
        drop(old);

        // The namespace is taken over; the displaced entry keeps only the
        // held handle's reference.
        registry
            .replace(TranslatorInstance::new(ns).expect("defaults"))
            .expect("replace");
        assert!(format!("{:?}", &*held).contains("refs: 1"));

        // Releasing the stale handle drops the old instance to zero but must
        // leave the successor registered.
        registry.put(&held);
        drop(held);
        assert!(weak.upgrade().is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(ns).is_some());
    }

    #[test]
    fn final_put_races_concurrent_gets_without_resurrection() {
        use std::thread;

        let registry = Arc::new(InstanceRegistry::new());
        let ns = NamespaceId(7);

        for _ in 0..200 {
            let instance = TranslatorInstance::new(ns).expect("defaults");
            registry.add(Arc::clone(&instance)).expect("add");

            let reader = {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    while let Some(handle) = registry.get(ns) {
                        registry.put(&handle);
                    }
                })
            };

            registry.put(&instance); // the registry's reference
            reader.join().expect("reader thread");

            // Whatever the interleaving, the teardown sticks: the namespace
            // is free for the next round.
            assert!(registry.get(ns).is_none());
            assert!(registry.is_empty());
        }
    }

    #[test]
    fn foreach_short_circuits_on_first_error() {
        let registry = InstanceRegistry::new();
        for ns in 0..3 {
            registry
                .add(TranslatorInstance::new(NamespaceId(ns)).expect("defaults"))
                .expect("add");
        }

        let mut visited = 0;
        let err = registry
            .foreach(|_| {
                visited += 1;
                Err("stop")
            })
            .unwrap_err();
        assert_eq!(err, "stop");
        assert_eq!(visited, 1);
    }

    #[test]
    fn instances_are_isolated() {
        let registry = InstanceRegistry::new();
        registry
            .add(TranslatorInstance::new(NamespaceId(1)).expect("defaults"))
            .expect("add");
        registry
            .add(TranslatorInstance::new(NamespaceId(2)).expect("defaults"))
            .expect("add");

        let first = registry.get(NamespaceId(1)).expect("present");
        let second = registry.get(NamespaceId(2)).expect("present");

        first
            .config()
            .set(crate::cfg::FieldId::NewTos as u16, &[0x2E])
            .expect("valid update");

        assert_eq!(first.config().get().new_tos, 0x2E);
        assert_eq!(second.config().get().new_tos, 0);

        registry.put(&first);
        registry.put(&second);
    }
}
