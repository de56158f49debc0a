//! The mapping port (spec §4.A): a read-only façade over external
//! mapping metadata. The session consumes this; it never inspects an
//! entity's fields itself beyond calling through this trait.

use crate::entity::DependencyRef;

///
/// Mapping
///
/// One implementation per entity type, supplied by the surrounding
/// application's mapping layer (schema/metadata, out of scope here;
/// spec §1).
///

pub trait Mapping<E> {
    /// Field-wise compare between a live instance and its snapshot.
    fn is_modified(&self, current: &E, original: &E) -> bool;

    /// Entities this instance depends on (its foreign-key targets).
    /// Referenced instances the mapping can't resolve to a live handle
    /// (not currently loaded/tracked) are simply omitted — only
    /// dependencies reachable through the mapping's own object graph
    /// are reportable, per spec §4.A.
    fn depending_entities(&self, instance: &E) -> Vec<DependencyRef> {
        let _ = instance;
        Vec::new()
    }

    /// Entities that depend on this instance.
    fn dependent_entities(&self, instance: &E) -> Vec<DependencyRef> {
        let _ = instance;
        Vec::new()
    }
}
