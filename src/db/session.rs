//! The session (spec §4.G): a registry of per-entity-type tables plus
//! the `submit_changes` commit orchestration that topologically orders
//! pending items across all of them and drives them through the
//! provider.

use crate::{
    db::AnySessionTable,
    entity::EntityDescriptor,
    error::SessionError,
    obs::{emit, with_session_sink, SessionEvent, SessionSink},
    provider::Provider,
    topo,
};
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

struct RegisteredTable {
    /// The concrete `Rc<SessionTable<E, M, P>>`, for typed retrieval by
    /// callers who already know `E`/`M`/`P`.
    typed: Rc<dyn Any>,
    /// The same table, upcast to the object-safe commit interface.
    any: Rc<dyn AnySessionTable>,
}

/// One pending item, identified across the whole session by which
/// table it lives in plus its handle id within that table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct PendingItem {
    table: EntityDescriptor,
    id: usize,
}

///
/// Session
///
/// Owns one `SessionTable` per entity type and coordinates a single
/// dependency-ordered commit across all of them (spec §4.G). Not
/// `Sync`: a session belongs to one thread, consistent with spec §5.
///

pub struct Session<Prov: Provider> {
    provider: Prov,
    tables: RefCell<HashMap<EntityDescriptor, RegisteredTable>>,
    debug: bool,
}

impl<Prov: Provider> Session<Prov> {
    #[must_use]
    pub fn new(provider: Prov) -> Self {
        Self {
            provider,
            tables: RefCell::new(HashMap::new()),
            debug: false,
        }
    }

    /// Enable verbose event emission (spec §12; ambient configuration
    /// surface). Whether "verbose" changes anything is up to whatever
    /// `SessionSink` the caller installs — this flag is only plumbed
    /// through so a sink can choose to special-case it.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Run `f` with `sink` installed as the active observability sink
    /// for its duration (spec §11/§12).
    pub fn with_sink<T>(&self, sink: &dyn SessionSink, f: impl FnOnce() -> T) -> T {
        with_session_sink(sink, f)
    }

    #[must_use]
    pub const fn provider(&self) -> &Prov {
        &self.provider
    }

    /// Look up the table for `descriptor`, constructing it via `make`
    /// on first use. Subsequent calls for the same descriptor return
    /// the same table, downcast back to its concrete type.
    ///
    /// # Panics
    /// Panics if `descriptor` was already registered with a different
    /// concrete `SessionTable<E, M, P>` type — a programmer error (two
    /// incompatible table constructions for one logical table), not a
    /// runtime condition callers need to recover from.
    pub fn table<T: AnySessionTable + 'static>(
        &self,
        descriptor: EntityDescriptor,
        make: impl FnOnce() -> Rc<T>,
    ) -> Rc<T> {
        if let Some(existing) = self.tables.borrow().get(&descriptor) {
            return Rc::clone(&existing.typed)
                .downcast::<T>()
                .expect("table registered under this descriptor with a different type");
        }

        let table = make();
        self.tables.borrow_mut().insert(
            descriptor,
            RegisteredTable {
                typed: Rc::clone(&table) as Rc<dyn Any>,
                any: Rc::clone(&table) as Rc<dyn AnySessionTable>,
            },
        );
        table
    }

    fn pending_items(&self) -> Vec<PendingItem> {
        let tables = self.tables.borrow();
        let mut items = Vec::new();
        for (&descriptor, registered) in tables.iter() {
            for id in registered.any.pending_ids() {
                items.push(PendingItem { table: descriptor, id });
            }
        }
        items
    }

    /// An insert-shaped item must wait for everything it depends on
    /// (its foreign-key targets) plus whatever pending delete holds its
    /// key; a delete must wait for everything that depends on it; any
    /// other resolved action (`Update`, or a `PossibleUpdate` resolving
    /// to `None`) has no predecessors at all (spec §4.G step 3's
    /// "Otherwise: no predecessors").
    fn predecessors(&self, item: &PendingItem) -> Vec<PendingItem> {
        let tables = self.tables.borrow();
        let Some(registered) = tables.get(&item.table) else {
            return Vec::new();
        };
        let action = registered.any.resolved_action(item.id);

        let refs = if action.is_delete() {
            let (_, dependents) = registered.any.dependency_refs(item.id);
            dependents
        } else if action.is_insert_like() {
            let (depends_on, _) = registered.any.dependency_refs(item.id);
            depends_on
        } else {
            Vec::new()
        };
        let mut preds: Vec<PendingItem> = refs
            .into_iter()
            .filter(|dep| {
                tables
                    .get(&dep.descriptor)
                    .is_some_and(|t| t.any.is_pending(dep.id))
            })
            .map(|dep| PendingItem {
                table: dep.descriptor,
                id: dep.id,
            })
            .collect();

        if action.is_insert_like() {
            if let Some(conflict_id) = registered.any.conflicting_delete_id(item.id) {
                preds.push(PendingItem {
                    table: item.table,
                    id: conflict_id,
                });
            }
        }
        preds
    }

    /// Resolve dependency order and submit every pending item through
    /// the provider inside a single transaction (spec §4.G).
    ///
    /// # Errors
    /// `SessionError::cycle_detected` if the pending items' dependency
    /// graph contains a cycle; otherwise whatever the provider raises,
    /// wrapped via `SessionError::provider`.
    pub fn submit_changes(&self) -> Result<(), SessionError> {
        let items = self.pending_items();
        emit(SessionEvent::CommitStarted { pending: items.len() });

        let ordered = topo::topo_sort(&items, |item| self.predecessors(item)).map_err(|cycle| {
            emit(SessionEvent::CycleDetected { items: cycle.items.len() });
            SessionError::cycle_detected(format!(
                "commit order cycle among {} pending item(s)",
                cycle.items.len()
            ))
        })?;

        for (position, item) in ordered.iter().enumerate() {
            emit(SessionEvent::CommitOrdered { table: item.table, position });
        }

        let tables = self.tables.borrow();
        let submitted = RefCell::new(Vec::new());
        self.provider
            .do_transacted(|| {
                for item in &ordered {
                    let Some(registered) = tables.get(&item.table) else {
                        continue;
                    };
                    match registered.any.submit_one(item.id) {
                        Ok(true) => submitted.borrow_mut().push(*item),
                        Ok(false) => {}
                        Err(err) => return Err(Box::new(err) as crate::provider::ProviderError),
                    }
                }
                Ok(())
            })
            .map_err(|err| {
                // `submit_one` already raises a well-formed `SessionError`;
                // unwrap it rather than re-wrapping under `Provider` origin.
                err.downcast::<SessionError>()
                    .map_or_else(SessionError::provider, |boxed| *boxed)
            })?;

        for item in submitted.into_inner() {
            if let Some(registered) = tables.get(&item.table) {
                registered.any.accept_one(item.id);
            }
        }

        emit(SessionEvent::CommitFinished {
            submitted: ordered.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests;
