//! The tracked item: an immutable record of one pending (or
//! just-resolved) change to a specific instance.

use crate::{action::SubmitAction, entity::Handle, original::Original};

///
/// TrackedItem
///
/// Value object. Transitions never mutate a `TrackedItem` in place;
/// the table replaces its map entry with a freshly constructed one.
///

#[derive(Clone, Debug)]
pub struct TrackedItem<E> {
    pub instance: Handle<E>,
    pub original: Original<E>,
    pub state: SubmitAction,
    pub subscribed: bool,
}

impl<E> TrackedItem<E> {
    #[must_use]
    pub const fn new(
        instance: Handle<E>,
        original: Original<E>,
        state: SubmitAction,
        subscribed: bool,
    ) -> Self {
        Self {
            instance,
            original,
            state,
            subscribed,
        }
    }

    /// A freshly materialized / freshly default-tracked item: no
    /// pending action, and neither snapshot nor subscription yet
    /// established (those are only set up when `PossibleUpdate` is
    /// assigned; see spec §4.E).
    #[must_use]
    pub fn untracked(instance: Handle<E>) -> Self {
        Self::new(instance, Original::Absent, SubmitAction::None, false)
    }

    /// Replace `state`, keeping `instance`/`original`/`subscribed` as-is.
    #[must_use]
    pub fn with_state(&self, state: SubmitAction) -> Self
    where
        E: Clone,
    {
        Self {
            instance: self.instance.clone(),
            original: self.original.clone(),
            state,
            subscribed: self.subscribed,
        }
    }
}

/// Resolve `PossibleUpdate` against the mapping's modification check;
/// every other action is already concrete. This is the single place
/// spec §4.C's `effective_action` and §4.E's `get_submit_action`
/// resolution logic lives.
pub fn effective_action<E>(item: &TrackedItem<E>, is_modified: impl FnOnce(&E, &E) -> bool) -> SubmitAction {
    match item.state {
        SubmitAction::PossibleUpdate => {
            let current = item.instance.borrow();
            let modified = match item.original.as_snapshot() {
                Some(original) => is_modified(&current, original),
                // Subscription strategy: absence of a snapshot here means
                // no "about to change" signal has landed since tracking,
                // so nothing has been detected as modified.
                None => false,
            };
            if modified {
                SubmitAction::Update
            } else {
                SubmitAction::None
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn possible_update_with_no_snapshot_change_resolves_to_none() {
        let handle: Handle<i32> = Rc::new(RefCell::new(5));
        let item = TrackedItem::new(
            Rc::clone(&handle),
            Original::Snapshot(5),
            SubmitAction::PossibleUpdate,
            false,
        );
        assert_eq!(effective_action(&item, |a, b| a != b), SubmitAction::None);
    }

    #[test]
    fn possible_update_with_snapshot_change_resolves_to_update() {
        let handle: Handle<i32> = Rc::new(RefCell::new(6));
        let item = TrackedItem::new(
            Rc::clone(&handle),
            Original::Snapshot(5),
            SubmitAction::PossibleUpdate,
            false,
        );
        assert_eq!(effective_action(&item, |a, b| a != b), SubmitAction::Update);
    }

    #[test]
    fn possible_update_subscription_strategy_with_absent_original_is_none() {
        let handle: Handle<i32> = Rc::new(RefCell::new(5));
        let item = TrackedItem::new(
            Rc::clone(&handle),
            Original::Absent,
            SubmitAction::PossibleUpdate,
            true,
        );
        assert_eq!(
            effective_action(&item, |_, _| panic!("should not be called")),
            SubmitAction::None
        );
    }

    #[test]
    fn non_possible_update_actions_pass_through_unchanged() {
        let handle: Handle<i32> = Rc::new(RefCell::new(5));
        for state in [
            SubmitAction::None,
            SubmitAction::Insert,
            SubmitAction::Update,
            SubmitAction::InsertOrUpdate,
            SubmitAction::Delete,
        ] {
            let item = TrackedItem::new(Rc::clone(&handle), Original::Absent, state, false);
            assert_eq!(effective_action(&item, |_, _| true), state);
        }
    }

    #[test]
    fn with_state_preserves_original_and_subscribed() {
        let handle: Handle<i32> = Rc::new(RefCell::new(5));
        let item = TrackedItem::new(
            Rc::clone(&handle),
            Original::Snapshot(5),
            SubmitAction::PossibleUpdate,
            false,
        );
        let next = item.with_state(SubmitAction::None);
        assert!(next.original.as_snapshot().is_some());
        assert_eq!(next.state, SubmitAction::None);
    }
}
