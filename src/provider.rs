//! The provider port (spec §4.B): CRUD access to the underlying store
//! for one entity type, transaction scoping, and raw row execution.
//! All external; the session only calls through these traits.

use crate::entity::Handle;

/// A provider-raised failure, boxed so the session can pass it through
/// unchanged (spec §7: "propagates out of `do_transacted`... nothing
/// else is added by the session").
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

///
/// ProviderTable
///
/// CRUD-capable table for one entity type, as exposed by
/// `Provider::get_table` in the source design (spec §4.B). The session
/// never talks to storage directly outside this trait.
///

pub trait ProviderTable<E> {
    fn get_by_id(&self, key: &E::Key) -> Option<E>
    where
        E: crate::entity::Entity;

    fn insert(&self, instance: &E) -> Result<(), ProviderError>;
    fn update(&self, instance: &E) -> Result<(), ProviderError>;
    fn insert_or_update(&self, instance: &E) -> Result<(), ProviderError>;
    fn delete(&self, instance: &E) -> Result<(), ProviderError>;
}

///
/// Provider
///
/// Top-level collaborator the session drives a commit through.
/// `do_transacted` must roll back entirely on `Err`.
///

pub trait Provider {
    fn do_transacted(
        &self,
        work: impl FnOnce() -> Result<(), ProviderError>,
    ) -> Result<(), ProviderError>;
}

///
/// QueryExecutor
///
/// Streaming row source for one entity type. `Row` is whatever shape
/// the external query executor/result reader produces (spec §4.B); the
/// session's job is only to wrap the projector (`Row -> E`), not to
/// understand `Row` itself.
///

pub trait QueryExecutor<Row> {
    type Iter: Iterator<Item = Row>;

    fn execute(&self, command: &str, params: &[crate::value::Param]) -> Self::Iter;
}

/// An opaque handle identifying the external live instance a `Handle<D>`
/// should be resolved against, for providers that hand back foreign
/// references by key rather than by already-interned handle. Most
/// providers won't need this; it exists so `ProviderTable` stays
/// storage-shaped rather than session-shaped.
pub type ForeignHandle<D> = Handle<D>;
