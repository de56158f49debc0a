//! Entity identity: the key and reference-counted handle types every
//! tracked instance is addressed by, plus the change-notification hook
//! used by the subscription change-detection strategy.

use derive_more::Display;
use std::{
    cell::RefCell,
    fmt::Debug,
    hash::Hash,
    rc::{Rc, Weak},
};

///
/// EntityDescriptor
///
/// Opaque handle identifying a logical table: a mapping's entity type
/// plus whatever table id distinguishes it from siblings of the same
/// shape. Two descriptors are equal iff they name the same table.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display("{name}")]
pub struct EntityDescriptor {
    name: &'static str,
}

impl EntityDescriptor {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

///
/// Handle
///
/// Shared, interior-mutable ownership of one live entity instance.
/// Identity (for the `tracked` map and for cross-table dependency
/// resolution) is reference equality on this handle, not value equality
/// of the entity.
///

pub type Handle<E> = Rc<RefCell<E>>;

/// Stable identity for a `Handle<E>`, usable as a map key. Two handles
/// produce the same id iff they are `Rc::ptr_eq`.
#[must_use]
pub fn handle_id<E>(handle: &Handle<E>) -> usize {
    Rc::as_ptr(handle).cast::<()>() as usize
}

///
/// Entity
///
/// Implemented by every type the session can track. `Key` is the
/// primary-key representation the mapping extracts; cloning an entity
/// must be deep enough to detect later field mutations against the
/// clone (the snapshot change-detection strategy depends on this).
///

pub trait Entity: Clone + 'static {
    type Key: Clone + Debug + Eq + Hash;

    /// The logical table this entity belongs to.
    const DESCRIPTOR: EntityDescriptor;

    /// Extract this instance's primary key.
    fn key(&self) -> Self::Key;
}

///
/// DependencyRef
///
/// A type-erased reference to another tracked (or potentially tracked)
/// entity, as returned by `Mapping::depending_entities` /
/// `Mapping::dependent_entities`. Carries just enough to look the
/// referenced instance up among currently tracked items: which table it
/// lives in, and the handle identity.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DependencyRef {
    pub descriptor: EntityDescriptor,
    pub id: usize,
}

impl DependencyRef {
    #[must_use]
    pub fn of<D: Entity>(handle: &Handle<D>) -> Self {
        Self {
            descriptor: D::DESCRIPTOR,
            id: handle_id(handle),
        }
    }
}

///
/// Notifier
///
/// Helper an `Entity` implementation embeds to support the subscription
/// change-detection strategy. A mutator method calls `fire()` just
/// before applying a change; the session's table subscribes exactly
/// once per instance (invariant 3 of spec §3) and only acts on the
/// signal while the item is still `PossibleUpdate`.
///

#[derive(Default)]
pub struct Notifier {
    callback: RefCell<Option<Weak<dyn Fn()>>>,
}

impl Notifier {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callback: RefCell::new(None),
        }
    }

    /// True iff a subscription is currently attached.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.callback
            .borrow()
            .as_ref()
            .is_some_and(|cb| cb.strong_count() > 0)
    }

    /// Attach the single subscription for this instance's lifetime.
    pub fn subscribe(&self, callback: &Rc<dyn Fn()>) {
        *self.callback.borrow_mut() = Some(Rc::downgrade(callback));
    }

    /// Signal "about to change." No-op if nothing (or a dropped
    /// subscription) is attached.
    pub fn fire(&self) {
        if let Some(callback) = self.callback.borrow().as_ref().and_then(Weak::upgrade) {
            callback();
        }
    }
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

///
/// ChangeNotify
///
/// Implemented by entities that support the subscription change-
/// detection strategy (as opposed to snapshot-and-compare). Entities
/// that don't implement this always use the snapshot strategy.
///

pub trait ChangeNotify {
    fn notifier(&self) -> &Notifier;
}
