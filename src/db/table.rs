//! Session table: identity map + change tracker for one entity type
//! (spec §4.E). The single largest component — it owns both halves of
//! the unit-of-work contract (who is this instance, and what, if
//! anything, needs to happen to it on commit).

use crate::{
    action::SubmitAction,
    db::AnySessionTable,
    entity::{ChangeNotify, DependencyRef, Entity, EntityDescriptor, Handle, handle_id},
    error::SessionError,
    mapping::Mapping,
    obs::{emit, SessionEvent},
    original::Original,
    provider::ProviderTable,
    tracked::{effective_action, TrackedItem},
};
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

type SubscribeFn<E> = fn(&Handle<E>, Rc<dyn Fn()>);

///
/// SessionTable
///
/// Owns its `identity_cache` (key -> canonical live instance) and its
/// `tracked` map (instance identity -> pending-change record)
/// exclusively, per spec §5's shared-resource policy.
///

pub struct SessionTable<E: Entity, M: Mapping<E>, P: ProviderTable<E>> {
    mapping: M,
    provider_table: P,
    identity_cache: RefCell<HashMap<E::Key, Handle<E>>>,
    tracked: RefCell<HashMap<usize, TrackedItem<E>>>,
    subscriptions: RefCell<HashMap<usize, Rc<dyn Fn()>>>,
    /// First-seen order of tracked ids, so commit-time collection can
    /// break topological-sort ties by input order (spec §4.D) instead
    /// of by hash-map iteration order.
    order: RefCell<Vec<usize>>,
    subscribe_fn: Option<SubscribeFn<E>>,
    self_weak: Weak<Self>,
}

fn subscribe_via_notify<E: ChangeNotify>(handle: &Handle<E>, callback: Rc<dyn Fn()>) {
    handle.borrow().notifier().subscribe(&callback);
}

impl<E, M, P> SessionTable<E, M, P>
where
    E: Entity,
    M: Mapping<E>,
    P: ProviderTable<E>,
{
    /// Build a table that detects changes by cloning a snapshot at
    /// tracking time and field-comparing at commit (spec's "snapshot
    /// strategy").
    #[must_use]
    pub fn with_snapshot_strategy(mapping: M, provider_table: P) -> Rc<Self> {
        Self::build(mapping, provider_table, None)
    }

    fn build(mapping: M, provider_table: P, subscribe_fn: Option<SubscribeFn<E>>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            mapping,
            provider_table,
            identity_cache: RefCell::new(HashMap::new()),
            tracked: RefCell::new(HashMap::new()),
            subscriptions: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
            subscribe_fn,
            self_weak: weak.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Public contract (spec §4.E)
    // ------------------------------------------------------------------

    /// Delegates straight to the provider; the identity map only
    /// applies to instances that have already been tracked.
    pub fn get_by_id(&self, key: &E::Key) -> Option<E> {
        self.provider_table.get_by_id(key)
    }

    /// The tracked action for `instance`, resolving `PossibleUpdate`
    /// against the mapping's modification check.
    #[must_use]
    pub fn get_submit_action(&self, instance: &Handle<E>) -> SubmitAction {
        let id = handle_id(instance);
        match self.tracked.borrow().get(&id) {
            Some(item) => effective_action(item, |current, original| {
                self.mapping.is_modified(current, original)
            }),
            None => SubmitAction::None,
        }
    }

    /// Assign a pending action to `instance`.
    ///
    /// # Errors
    /// Returns `IdentityConflict` if a *different* instance already
    /// holds `instance`'s key in the identity cache and that instance
    /// is not itself pending deletion (spec §3 invariant 1, §7, and the
    /// delete+insert key-reuse scenario in §8 S4).
    pub fn set_submit_action(
        &self,
        instance: Handle<E>,
        action: SubmitAction,
    ) -> Result<(), SessionError> {
        let id = handle_id(&instance);
        let key = instance.borrow().key();

        self.check_identity(&key, id)?;
        self.identity_cache
            .borrow_mut()
            .insert(key, Rc::clone(&instance));

        let previous = self.tracked.borrow().get(&id).cloned();
        let item = if action == SubmitAction::PossibleUpdate {
            self.enter_possible_update(id, instance)
        } else {
            // Preserve any existing original/subscribed flag (spec §4.E).
            let (original, subscribed) = previous
                .map(|p| (p.original, p.subscribed))
                .unwrap_or((Original::Absent, false));
            TrackedItem::new(instance, original, action, subscribed)
        };

        self.insert_tracked(id, item);
        emit(SessionEvent::ActionAssigned {
            table: E::DESCRIPTOR,
            action,
        });
        Ok(())
    }

    /// Intern a freshly materialized instance: return the canonical
    /// handle for its key, discarding the duplicate if one is already
    /// cached (spec §4.E, §4.F, §8 property 2).
    pub fn on_materialized(&self, instance: E) -> Handle<E> {
        let key = instance.key();
        if let Some(cached) = self.identity_cache.borrow().get(&key) {
            emit(SessionEvent::Materialized {
                table: E::DESCRIPTOR,
                interned: true,
            });
            return Rc::clone(cached);
        }

        let handle: Handle<E> = Rc::new(RefCell::new(instance));
        self.identity_cache
            .borrow_mut()
            .insert(key, Rc::clone(&handle));
        let id = handle_id(&handle);
        let item = self.enter_possible_update(id, Rc::clone(&handle));
        self.insert_tracked(id, item);
        emit(SessionEvent::Materialized {
            table: E::DESCRIPTOR,
            interned: false,
        });
        handle
    }

    // ------------------------------------------------------------------
    // Internals shared with `AnySessionTable`
    // ------------------------------------------------------------------

    fn check_identity(&self, key: &E::Key, id: usize) -> Result<(), SessionError> {
        let Some(cached) = self.identity_cache.borrow().get(key).cloned() else {
            return Ok(());
        };
        if handle_id(&cached) == id {
            return Ok(());
        }
        let cached_is_pending_delete = self
            .tracked
            .borrow()
            .get(&handle_id(&cached))
            .is_some_and(|item| item.state == SubmitAction::Delete);
        if cached_is_pending_delete {
            // Permitted transient state (spec §3 invariant 5, §8 S4): a
            // different instance may take over a key that the cached
            // instance is on its way out of.
            return Ok(());
        }
        Err(SessionError::identity_conflict(format!(
            "{}: key already tracked by a different instance",
            E::DESCRIPTOR
        )))
    }

    fn insert_tracked(&self, id: usize, item: TrackedItem<E>) {
        let mut tracked = self.tracked.borrow_mut();
        if !tracked.contains_key(&id) {
            self.order.borrow_mut().push(id);
        }
        tracked.insert(id, item);
    }

    /// Enter `PossibleUpdate`, establishing whichever change-detection
    /// strategy this table uses (spec §4.E, §9's "Open Questions": a
    /// first-time `PossibleUpdate` always means "no prior subscription;
    /// subscribe now").
    fn enter_possible_update(&self, id: usize, instance: Handle<E>) -> TrackedItem<E> {
        match self.subscribe_fn {
            Some(subscribe_fn) => {
                if !self.subscriptions.borrow().contains_key(&id) {
                    let weak_table = self.self_weak.clone();
                    let callback: Rc<dyn Fn()> = Rc::new(move || {
                        if let Some(table) = weak_table.upgrade() {
                            table.handle_change_signal(id);
                        }
                    });
                    subscribe_fn(&instance, Rc::clone(&callback));
                    self.subscriptions.borrow_mut().insert(id, callback);
                }
                TrackedItem::new(instance, Original::Absent, SubmitAction::PossibleUpdate, true)
            }
            None => {
                let snapshot = instance.borrow().clone();
                TrackedItem::new(
                    instance,
                    Original::Snapshot(snapshot),
                    SubmitAction::PossibleUpdate,
                    false,
                )
            }
        }
    }

    /// The subscription strategy's "about to change" handler: captures
    /// the pre-mutation snapshot and upgrades the item to `Update`, but
    /// only while it is still `PossibleUpdate` (subsequent signals are
    /// ignored once it has already been captured).
    fn handle_change_signal(&self, id: usize) {
        let mut tracked = self.tracked.borrow_mut();
        if let Some(item) = tracked.get(&id) {
            if item.state == SubmitAction::PossibleUpdate {
                let original = item.instance.borrow().clone();
                let updated = TrackedItem::new(
                    Rc::clone(&item.instance),
                    Original::Snapshot(original),
                    SubmitAction::Update,
                    item.subscribed,
                );
                tracked.insert(id, updated);
            }
        }
    }

    fn pending_ids_impl(&self) -> Vec<usize> {
        let tracked = self.tracked.borrow();
        self.order
            .borrow()
            .iter()
            .copied()
            .filter(|id| {
                tracked
                    .get(id)
                    .is_some_and(|item| item.state != SubmitAction::None)
            })
            .collect()
    }

    fn dependency_refs_impl(&self, id: usize) -> (Vec<DependencyRef>, Vec<DependencyRef>) {
        let Some(item) = self.tracked.borrow().get(&id).cloned() else {
            return (Vec::new(), Vec::new());
        };
        let instance = item.instance.borrow();
        (
            self.mapping.depending_entities(&instance),
            self.mapping.dependent_entities(&instance),
        )
    }

    fn conflicting_delete_id_impl(&self, id: usize) -> Option<usize> {
        let tracked = self.tracked.borrow();
        let target_key = tracked.get(&id)?.instance.borrow().key();
        tracked
            .iter()
            .find(|(&other_id, item)| {
                other_id != id
                    && item.state == SubmitAction::Delete
                    && item.instance.borrow().key() == target_key
            })
            .map(|(&other_id, _)| other_id)
    }

    fn resolved_action_impl(&self, id: usize) -> SubmitAction {
        match self.tracked.borrow().get(&id) {
            Some(item) => {
                effective_action(item, |current, original| self.mapping.is_modified(current, original))
            }
            None => SubmitAction::None,
        }
    }

    fn submit_one_impl(&self, id: usize) -> Result<bool, SessionError> {
        let Some(item) = self.tracked.borrow().get(&id).cloned() else {
            return Ok(false);
        };
        let resolved =
            effective_action(&item, |current, original| self.mapping.is_modified(current, original));
        let instance = item.instance.borrow();
        let result = match resolved {
            SubmitAction::Delete => self.provider_table.delete(&instance).map(|()| true),
            SubmitAction::Insert => self.provider_table.insert(&instance).map(|()| true),
            SubmitAction::InsertOrUpdate => {
                self.provider_table.insert_or_update(&instance).map(|()| true)
            }
            SubmitAction::Update => self.provider_table.update(&instance).map(|()| true),
            SubmitAction::None | SubmitAction::PossibleUpdate => Ok(false),
        };
        result.map_err(SessionError::provider)
    }

    fn accept_one_impl(&self, id: usize) {
        let pre_state = self.tracked.borrow().get(&id).map(|item| item.state);
        let Some(pre_state) = pre_state else { return };

        match pre_state {
            SubmitAction::Delete => {
                if let Some(item) = self.tracked.borrow_mut().remove(&id) {
                    let key = item.instance.borrow().key();
                    let mut cache = self.identity_cache.borrow_mut();
                    if cache.get(&key).map(handle_id) == Some(id) {
                        cache.remove(&key);
                    }
                }
                self.subscriptions.borrow_mut().remove(&id);
            }
            SubmitAction::Insert | SubmitAction::InsertOrUpdate => {
                let instance = self.tracked.borrow().get(&id).map(|i| Rc::clone(&i.instance));
                if let Some(instance) = instance {
                    let key = instance.borrow().key();
                    self.identity_cache
                        .borrow_mut()
                        .insert(key, Rc::clone(&instance));
                    let item = self.enter_possible_update(id, instance);
                    self.insert_tracked(id, item);
                }
            }
            SubmitAction::PossibleUpdate | SubmitAction::Update => {
                let instance = self.tracked.borrow().get(&id).map(|i| Rc::clone(&i.instance));
                if let Some(instance) = instance {
                    let item = self.enter_possible_update(id, instance);
                    self.insert_tracked(id, item);
                }
            }
            SubmitAction::None => {}
        }
    }
}

impl<E, M, P> SessionTable<E, M, P>
where
    E: Entity + ChangeNotify,
    M: Mapping<E>,
    P: ProviderTable<E>,
{
    /// Build a table that detects changes via the entity's
    /// "about to change" subscription instead of snapshotting.
    #[must_use]
    pub fn with_subscription_strategy(mapping: M, provider_table: P) -> Rc<Self> {
        Self::build(mapping, provider_table, Some(subscribe_via_notify::<E>))
    }
}

impl<E, M, P> AnySessionTable for SessionTable<E, M, P>
where
    E: Entity,
    M: Mapping<E>,
    P: ProviderTable<E>,
{
    fn descriptor(&self) -> EntityDescriptor {
        E::DESCRIPTOR
    }

    fn pending_ids(&self) -> Vec<usize> {
        self.pending_ids_impl()
    }

    fn is_pending(&self, id: usize) -> bool {
        self.tracked
            .borrow()
            .get(&id)
            .is_some_and(|item| item.state != SubmitAction::None)
    }

    fn dependency_refs(&self, id: usize) -> (Vec<DependencyRef>, Vec<DependencyRef>) {
        self.dependency_refs_impl(id)
    }

    fn resolved_action(&self, id: usize) -> SubmitAction {
        self.resolved_action_impl(id)
    }

    fn conflicting_delete_id(&self, id: usize) -> Option<usize> {
        self.conflicting_delete_id_impl(id)
    }

    fn submit_one(&self, id: usize) -> Result<bool, SessionError> {
        self.submit_one_impl(id)
    }

    fn accept_one(&self, id: usize) {
        self.accept_one_impl(id);
    }
}
