use super::*;
use crate::{
    action::SubmitAction,
    entity::{DependencyRef, Entity, EntityDescriptor, Handle},
    mapping::Mapping,
    provider::{Provider, ProviderError, ProviderTable},
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

// A minimal Customer/Order pair (spec §8 S1's canonical dependency
// example): an Order depends on its Customer.

#[derive(Clone, Debug, PartialEq)]
struct Customer {
    id: u32,
}

impl Entity for Customer {
    type Key = u32;
    const DESCRIPTOR: EntityDescriptor = EntityDescriptor::new("customer");
    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Order {
    id: u32,
    customer_id: u32,
}

impl Entity for Order {
    type Key = u32;
    const DESCRIPTOR: EntityDescriptor = EntityDescriptor::new("order");
    fn key(&self) -> u32 {
        self.id
    }
}

struct NoopMapping;
impl<E: PartialEq> Mapping<E> for NoopMapping {
    fn is_modified(&self, current: &E, original: &E) -> bool {
        current != original
    }
}

struct OrderMapping {
    customers: Rc<RefCell<HashMap<u32, Handle<Customer>>>>,
}

impl Mapping<Order> for OrderMapping {
    fn is_modified(&self, current: &Order, original: &Order) -> bool {
        current != original
    }

    fn depending_entities(&self, instance: &Order) -> Vec<DependencyRef> {
        self.customers
            .borrow()
            .get(&instance.customer_id)
            .map(DependencyRef::of)
            .into_iter()
            .collect()
    }
}

struct LoggingProvider<E> {
    log: Rc<RefCell<Vec<String>>>,
    label: &'static str,
    _marker: std::marker::PhantomData<E>,
}

impl<E> LoggingProvider<E> {
    fn new(log: Rc<RefCell<Vec<String>>>, label: &'static str) -> Self {
        Self {
            log,
            label,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E: Entity> ProviderTable<E> for LoggingProvider<E>
where
    E::Key: std::fmt::Display,
{
    fn get_by_id(&self, _key: &E::Key) -> Option<E> {
        None
    }
    fn insert(&self, instance: &E) -> Result<(), ProviderError> {
        self.log
            .borrow_mut()
            .push(format!("{}:insert:{}", self.label, instance.key()));
        Ok(())
    }
    fn update(&self, instance: &E) -> Result<(), ProviderError> {
        self.log
            .borrow_mut()
            .push(format!("{}:update:{}", self.label, instance.key()));
        Ok(())
    }
    fn insert_or_update(&self, instance: &E) -> Result<(), ProviderError> {
        self.log
            .borrow_mut()
            .push(format!("{}:upsert:{}", self.label, instance.key()));
        Ok(())
    }
    fn delete(&self, instance: &E) -> Result<(), ProviderError> {
        self.log
            .borrow_mut()
            .push(format!("{}:delete:{}", self.label, instance.key()));
        Ok(())
    }
}

struct DirectProvider;
impl Provider for DirectProvider {
    fn do_transacted(
        &self,
        work: impl FnOnce() -> Result<(), ProviderError>,
    ) -> Result<(), ProviderError> {
        work()
    }
}

#[test]
fn commit_orders_dependencies_before_dependents() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let customers_registry = Rc::new(RefCell::new(HashMap::new()));

    let session = Session::new(DirectProvider);
    let customer_table = session.table(Customer::DESCRIPTOR, || {
        crate::db::SessionTable::with_snapshot_strategy(
            NoopMapping,
            LoggingProvider::new(Rc::clone(&log), "customer"),
        )
    });
    let order_table = session.table(Order::DESCRIPTOR, || {
        crate::db::SessionTable::with_snapshot_strategy(
            OrderMapping {
                customers: Rc::clone(&customers_registry),
            },
            LoggingProvider::new(Rc::clone(&log), "order"),
        )
    });

    let customer = Rc::new(RefCell::new(Customer { id: 1 }));
    customers_registry
        .borrow_mut()
        .insert(1, Rc::clone(&customer));
    customer_table
        .set_submit_action(Rc::clone(&customer), SubmitAction::Insert)
        .unwrap();

    let order = Rc::new(RefCell::new(Order {
        id: 10,
        customer_id: 1,
    }));
    order_table
        .set_submit_action(Rc::clone(&order), SubmitAction::Insert)
        .unwrap();

    session.submit_changes().unwrap();

    let log = log.borrow();
    let customer_pos = log.iter().position(|e| e == "customer:insert:1").unwrap();
    let order_pos = log.iter().position(|e| e == "order:insert:10").unwrap();
    assert!(customer_pos < order_pos);
}

#[derive(Clone, Debug, PartialEq)]
struct Node {
    id: u32,
    points_to: u32,
}

impl Entity for Node {
    type Key = u32;
    const DESCRIPTOR: EntityDescriptor = EntityDescriptor::new("node");
    fn key(&self) -> u32 {
        self.id
    }
}

struct NodeMapping {
    nodes: Rc<RefCell<HashMap<u32, Handle<Node>>>>,
}

impl Mapping<Node> for NodeMapping {
    fn is_modified(&self, current: &Node, original: &Node) -> bool {
        current != original
    }

    fn depending_entities(&self, instance: &Node) -> Vec<DependencyRef> {
        self.nodes
            .borrow()
            .get(&instance.points_to)
            .map(DependencyRef::of)
            .into_iter()
            .collect()
    }
}

#[test]
fn commit_detects_a_cycle_across_pending_items() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let nodes_registry = Rc::new(RefCell::new(HashMap::new()));

    let session = Session::new(DirectProvider);
    let node_table = session.table(Node::DESCRIPTOR, || {
        crate::db::SessionTable::with_snapshot_strategy(
            NodeMapping {
                nodes: Rc::clone(&nodes_registry),
            },
            LoggingProvider::new(Rc::clone(&log), "node"),
        )
    });

    // Node 1 depends on node 2, and node 2 depends on node 1: a direct
    // two-item cycle (spec §4.D, §8 property 8).
    let a = Rc::new(RefCell::new(Node { id: 1, points_to: 2 }));
    let b = Rc::new(RefCell::new(Node { id: 2, points_to: 1 }));
    nodes_registry.borrow_mut().insert(1, Rc::clone(&a));
    nodes_registry.borrow_mut().insert(2, Rc::clone(&b));
    node_table.set_submit_action(Rc::clone(&a), SubmitAction::Insert).unwrap();
    node_table.set_submit_action(Rc::clone(&b), SubmitAction::Insert).unwrap();

    let err = session.submit_changes().unwrap_err();
    assert!(err.is_cycle_detected());
}

#[test]
fn commit_runs_delete_before_insert_on_key_reuse() {
    let log = Rc::new(RefCell::new(Vec::new()));

    let session = Session::new(DirectProvider);
    let customer_table = session.table(Customer::DESCRIPTOR, || {
        crate::db::SessionTable::with_snapshot_strategy(
            NoopMapping,
            LoggingProvider::new(Rc::clone(&log), "customer"),
        )
    });

    let old = Rc::new(RefCell::new(Customer { id: 1 }));
    customer_table
        .set_submit_action(Rc::clone(&old), SubmitAction::Delete)
        .unwrap();
    let new = Rc::new(RefCell::new(Customer { id: 1 }));
    customer_table
        .set_submit_action(Rc::clone(&new), SubmitAction::Insert)
        .unwrap();

    session.submit_changes().unwrap();

    let log = log.borrow();
    let delete_pos = log.iter().position(|e| e == "customer:delete:1").unwrap();
    let insert_pos = log.iter().position(|e| e == "customer:insert:1").unwrap();
    assert!(delete_pos < insert_pos);
}

#[test]
fn commit_does_not_cycle_on_mutual_dependency_between_pending_updates() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let nodes_registry = Rc::new(RefCell::new(HashMap::new()));

    let session = Session::new(DirectProvider);
    let node_table = session.table(Node::DESCRIPTOR, || {
        crate::db::SessionTable::with_snapshot_strategy(
            NodeMapping {
                nodes: Rc::clone(&nodes_registry),
            },
            LoggingProvider::new(Rc::clone(&log), "node"),
        )
    });

    // Node 1 and node 2 mutually reference each other via
    // `depending_entities`, but both are already-tracked rows resolving
    // to `Update` (not `Insert`/`InsertOrUpdate`): spec §4.G step 3 says
    // "Otherwise: no predecessors", so this must not be mistaken for a
    // dependency cycle.
    let a = node_table.on_materialized(Node { id: 1, points_to: 2 });
    let b = node_table.on_materialized(Node { id: 2, points_to: 1 });
    nodes_registry.borrow_mut().insert(1, Rc::clone(&a));
    nodes_registry.borrow_mut().insert(2, Rc::clone(&b));
    node_table.set_submit_action(Rc::clone(&a), SubmitAction::Update).unwrap();
    node_table.set_submit_action(Rc::clone(&b), SubmitAction::Update).unwrap();

    session.submit_changes().unwrap();

    let log = log.borrow();
    assert!(log.iter().any(|e| e == "node:update:1"));
    assert!(log.iter().any(|e| e == "node:update:2"));
}
