//! Observability boundary (SPEC_FULL §11). Session logic never depends
//! on a concrete logging backend; it emits `SessionEvent`s through
//! whatever `SessionSink` the caller installs, mirroring the teacher's
//! `obs::sink` module. With nothing installed, events are dropped.

use crate::{action::SubmitAction, entity::EntityDescriptor};
use std::cell::Cell;

///
/// SessionEvent
///

#[derive(Clone, Copy, Debug)]
pub enum SessionEvent {
    Materialized {
        table: EntityDescriptor,
        interned: bool,
    },
    ActionAssigned {
        table: EntityDescriptor,
        action: SubmitAction,
    },
    CommitStarted {
        pending: usize,
    },
    CommitOrdered {
        table: EntityDescriptor,
        position: usize,
    },
    CommitFinished {
        submitted: usize,
    },
    CycleDetected {
        items: usize,
    },
}

///
/// SessionSink
///

pub trait SessionSink {
    fn record(&self, event: SessionEvent);
}

thread_local! {
    static SINK_OVERRIDE: Cell<Option<*const dyn SessionSink>> = const { Cell::new(None) };
}

/// Install `sink` as the active sink for the duration of `f`, restoring
/// whatever was previously installed afterwards (even on panic/unwind,
/// since the restore happens via `Drop`).
pub fn with_session_sink<T>(sink: &dyn SessionSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn SessionSink>);
    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| cell.set(self.0.take()));
        }
    }

    let previous = SINK_OVERRIDE.with(|cell| cell.replace(Some(std::ptr::from_ref(sink))));
    let _guard = Guard(previous);
    f()
}

/// Emit `event` to the currently installed sink, if any.
pub fn emit(event: SessionEvent) {
    SINK_OVERRIDE.with(|cell| {
        if let Some(ptr) = cell.get() {
            // SAFETY: `with_session_sink` only ever stores a pointer
            // derived from a `&dyn SessionSink` borrow that outlives the
            // call to `f`, and clears it (via `Guard::drop`) before that
            // borrow ends, even on unwind.
            let sink = unsafe { &*ptr };
            sink.record(event);
        }
    });
}
