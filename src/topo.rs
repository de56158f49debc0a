//! Generic stable topological sort with cycle diagnosis (spec §4.D).
//!
//! Decoupled from the session: this operates over any `T: Clone + Eq +
//! Hash` given a `preds` function, so it is independently testable and
//! reusable as a plain library routine.

use std::{collections::HashMap, fmt, hash::Hash};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// A cycle was found among `items`; the cycle's members are returned for
/// diagnostics (spec §4.D, §7).
#[derive(Clone, Debug)]
pub struct CycleDetected<T> {
    pub items: Vec<T>,
}

impl<T: fmt::Debug> fmt::Display for CycleDetected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle detected among {:?}", self.items)
    }
}

impl<T: fmt::Debug> std::error::Error for CycleDetected<T> {}

/// Produce a linear order over `items` such that every predecessor of X
/// (as reported by `preds`) precedes X. Ties are broken by input order
/// (stable). Predecessors that are not themselves in `items` are
/// ignored — they are not pending and so impose no ordering constraint.
pub fn topo_sort<T, F>(items: &[T], preds: F) -> Result<Vec<T>, CycleDetected<T>>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Vec<T>,
{
    let index_of: HashMap<T, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.clone(), i))
        .collect();

    let mut marks = vec![Mark::Unvisited; items.len()];
    let mut order = Vec::with_capacity(items.len());
    // Tracks the DFS stack of original indices, for cycle diagnostics.
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..items.len() {
        if marks[start] == Mark::Done {
            continue;
        }
        visit(start, items, &index_of, &preds, &mut marks, &mut stack, &mut order)?;
    }

    Ok(order)
}

#[allow(clippy::too_many_arguments)]
fn visit<T, F>(
    idx: usize,
    items: &[T],
    index_of: &HashMap<T, usize>,
    preds: &F,
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    order: &mut Vec<T>,
) -> Result<(), CycleDetected<T>>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Vec<T>,
{
    match marks[idx] {
        Mark::Done => return Ok(()),
        Mark::Visiting => {
            let cycle_start = stack.iter().position(|&i| i == idx).unwrap_or(0);
            let items = stack[cycle_start..]
                .iter()
                .map(|&i| items[i].clone())
                .collect();
            return Err(CycleDetected { items });
        }
        Mark::Unvisited => {}
    }

    marks[idx] = Mark::Visiting;
    stack.push(idx);

    for pred in preds(&items[idx]) {
        if let Some(&pred_idx) = index_of.get(&pred) {
            visit(pred_idx, items, index_of, preds, marks, stack, order)?;
        }
        // Predecessors outside `items` are not pending; ignored.
    }

    stack.pop();
    marks[idx] = Mark::Done;
    order.push(items[idx].clone());

    Ok(())
}
