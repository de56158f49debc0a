//! The `db` module groups the components that sit directly on top of
//! the generic primitives (`entity`, `action`, `tracked`, `topo`,
//! `mapping`, `provider`): the per-entity-type session table, the
//! intercepting provider/query facade, and the session that ties
//! every table together for commit.

use crate::{
    action::SubmitAction,
    entity::{DependencyRef, EntityDescriptor},
    error::SessionError,
};

pub mod intercept;
pub mod session;
pub mod table;

pub use session::Session;
pub use table::SessionTable;

///
/// AnySessionTable
///
/// Object-safe facade every `SessionTable<E, M, P>` implements, letting
/// `Session` drive commit across heterogeneous entity types without
/// being generic over them (spec §4.G). Operates on type-erased
/// `usize` handle ids (see `entity::handle_id`) rather than `Handle<E>`
/// directly, since `E` is exactly what this trait must hide.
///

pub trait AnySessionTable {
    /// The logical table this implementation tracks.
    fn descriptor(&self) -> EntityDescriptor;

    /// Ids (in first-tracked order) of every instance with a non-`None`
    /// submit action, as of right now.
    fn pending_ids(&self) -> Vec<usize>;

    /// Whether `id` currently has a non-`None` submit action.
    fn is_pending(&self, id: usize) -> bool;

    /// `(depends_on, dependents)` for the tracked item `id`, or two
    /// empty vectors if `id` is not tracked.
    fn dependency_refs(&self, id: usize) -> (Vec<DependencyRef>, Vec<DependencyRef>);

    /// The commit action `id` currently resolves to (`PossibleUpdate`
    /// resolved against the mapping's modification check). Used to
    /// decide which side of `dependency_refs` constrains its commit
    /// order (spec §4.G step 3).
    fn resolved_action(&self, id: usize) -> SubmitAction;

    /// If another tracked item in this table shares `id`'s key and is
    /// pending `Delete`, that item's id (spec §3 invariant 5, §8 S4).
    fn conflicting_delete_id(&self, id: usize) -> Option<usize>;

    /// Submit `id`'s resolved action to the provider. Returns whether a
    /// provider call was actually made (`false` for `None`/unresolved
    /// `PossibleUpdate`).
    fn submit_one(&self, id: usize) -> Result<bool, SessionError>;

    /// Advance `id` past a successful `submit_one` into its next
    /// resting state (removed, for `Delete`; re-armed `PossibleUpdate`,
    /// otherwise).
    fn accept_one(&self, id: usize);
}
