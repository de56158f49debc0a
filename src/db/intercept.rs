//! Intercepting provider / fluent query facade (spec §4.F, SPEC_FULL
//! §14). Wraps a `QueryExecutor<Row>` so every row it produces passes
//! through the owning table's identity map before reaching the
//! caller — the one place a freshly materialized row becomes (or
//! rejoins) a session-tracked instance.

use crate::{
    db::SessionTable,
    entity::{Entity, Handle},
    mapping::Mapping,
    provider::{ProviderTable, QueryExecutor},
    value::Param,
};
use std::marker::PhantomData;

///
/// QueryBuilder
///
/// Thin fluent wrapper over a `QueryExecutor<Row>`: accumulates an
/// opaque command string and bound parameters, then executes and
/// projects rows through the owning table's identity map. Expression
/// trees and predicates are out of scope here (spec §1 Non-goals) —
/// callers supply the command text directly; this is the
/// "intercepting" half of the provider boundary, not a query language.
///

pub struct QueryBuilder<'t, E, M, P, X, Row, F> {
    table: &'t SessionTable<E, M, P>,
    executor: X,
    command: String,
    params: Vec<Param>,
    project: F,
    _row: PhantomData<fn() -> Row>,
}

impl<'t, E, M, P, X, Row, F> QueryBuilder<'t, E, M, P, X, Row, F>
where
    E: Entity,
    M: Mapping<E>,
    P: ProviderTable<E>,
    X: QueryExecutor<Row>,
    F: Fn(Row) -> E,
{
    pub fn new(
        table: &'t SessionTable<E, M, P>,
        executor: X,
        command: impl Into<String>,
        project: F,
    ) -> Self {
        Self {
            table,
            executor,
            command: command.into(),
            params: Vec::new(),
            project,
            _row: PhantomData,
        }
    }

    /// Bind one parameter for this command; each call appends (spec
    /// §14's positional-binding convention).
    #[must_use]
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Execute the command, returning an iterator that projects and
    /// interns each row through the table's identity map as the caller
    /// pulls it (spec §5: "enumeration is lazy — the intercepted
    /// projector runs once per row as the caller iterates"; §7: a
    /// projector failure partway through leaves everything materialized
    /// so far interned). A caller that stops iterating early never
    /// touches the remaining rows.
    pub fn fetch(self) -> Fetch<'t, E, M, P, X::Iter, F> {
        let rows = self.executor.execute(&self.command, &self.params);
        Fetch {
            table: self.table,
            rows,
            project: self.project,
        }
    }
}

///
/// Fetch
///
/// Lazy row-to-handle iterator returned by [`QueryBuilder::fetch`].
/// Each call to `next` pulls exactly one row from the underlying
/// executor, projects it, and interns it — nothing downstream of the
/// executor runs ahead of the caller's own iteration.
///

pub struct Fetch<'t, E, M, P, I, F> {
    table: &'t SessionTable<E, M, P>,
    rows: I,
    project: F,
}

impl<E, M, P, I, F, Row> Iterator for Fetch<'_, E, M, P, I, F>
where
    E: Entity,
    M: Mapping<E>,
    P: ProviderTable<E>,
    I: Iterator<Item = Row>,
    F: Fn(Row) -> E,
{
    type Item = Handle<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let instance = (self.project)(row);
        Some(self.table.on_materialized(instance))
    }
}
