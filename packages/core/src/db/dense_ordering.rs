//! Dense Order Maintenance
//!
//! Records carry two integer ranks:
//!
//! - `page_order`: rank of the record's group among all groups under one path.
//!   The distinct values form exactly `0..G`.
//! - `nested_order`: rank inside the group. For one `page_order` the values
//!   form exactly `0..M` with no duplicates.
//!
//! `DenseOrderCalculator` computes the writes that keep both rankings dense
//! after an insert, delete or move. It works on an in-memory snapshot, never
//! performs I/O and never fails: an operation with nothing to do (moving the
//! first group up, swapping past the last child) returns an empty write set.
//!
//! Moves are asymmetric on purpose. A group move swaps two whole groups; a
//! child move swaps two adjacent siblings.

use crate::models::Ordered;
use std::collections::{BTreeMap, BTreeSet};

/// Key -> new order value, the minimal set of writes for one operation
pub type OrderWrites = BTreeMap<String, u32>;

/// Direction of travel in the rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward order 0 (`-1`)
    Up,
    /// Away from order 0 (`+1`)
    Down,
}

impl Direction {
    pub fn delta(self) -> i64 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Neighbouring order in this direction; `None` when moving up from 0
    pub fn step(self, order: u32) -> Option<u32> {
        match self {
            Direction::Up => order.checked_sub(1),
            Direction::Down => order.checked_add(1),
        }
    }
}

/// A broken density invariant found by [`DenseOrderCalculator::density_violations`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DensityViolation {
    /// Distinct page orders are not `0..G`
    PageOrders { found: Vec<u32> },
    /// Nested orders of one group are not `0..M`
    NestedOrders { page_order: u32, found: Vec<u32> },
}

/// Dense order computations over sibling/page group snapshots
pub struct DenseOrderCalculator;

impl DenseOrderCalculator {
    /// Highest page order in the snapshot, `0` for an empty one
    pub fn max_page_order<T: Ordered>(group: &[T]) -> u32 {
        group.iter().map(Ordered::page_order).max().unwrap_or(0)
    }

    /// Highest nested order among records of `page_order`, `0` when there are none
    pub fn max_nested_order<T: Ordered>(group: &[T], page_order: u32) -> u32 {
        Self::members(group, page_order)
            .map(Ordered::nested_order)
            .max()
            .unwrap_or(0)
    }

    /// Page order for a group appended after every existing group
    pub fn next_page_order<T: Ordered>(group: &[T]) -> u32 {
        if group.is_empty() {
            0
        } else {
            Self::max_page_order(group) + 1
        }
    }

    /// Nested order for a child appended to group `page_order`
    ///
    /// `0` for an empty group, `max + 1` otherwise.
    pub fn next_nested_order<T: Ordered>(group: &[T], page_order: u32) -> u32 {
        Self::members(group, page_order)
            .map(Ordered::nested_order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Swap group `from_order` with its neighbour in `direction`
    ///
    /// Every record of group `from_order` moves one step in `direction` and
    /// every record of the neighbouring group moves one step back. Returns no
    /// writes when there is no neighbouring group.
    pub fn shift_page_orders<T: Ordered>(
        group: &[T],
        from_order: u32,
        direction: Direction,
    ) -> OrderWrites {
        let mut writes = OrderWrites::new();
        let Some(target) = direction.step(from_order) else {
            return writes;
        };
        let has_moving = group.iter().any(|r| r.page_order() == from_order);
        let has_neighbour = group.iter().any(|r| r.page_order() == target);
        if !has_moving || !has_neighbour {
            return writes;
        }

        for record in group {
            if record.page_order() == from_order {
                writes.insert(record.key().to_string(), target);
            } else if record.page_order() == target {
                writes.insert(record.key().to_string(), from_order);
            }
        }
        writes
    }

    /// Add `delta` to the nested order of every member of `page_order` ranked after `after_order`
    ///
    /// Used with `delta = -1` to close the gap left by a deleted child.
    /// Results that would fall below zero are left out.
    pub fn shift_nested_orders<T: Ordered>(
        group: &[T],
        page_order: u32,
        after_order: u32,
        delta: i64,
    ) -> OrderWrites {
        Self::members(group, page_order)
            .filter(|r| r.nested_order() > after_order)
            .filter_map(|r| {
                let shifted = i64::from(r.nested_order()) + delta;
                u32::try_from(shifted)
                    .ok()
                    .map(|value| (r.key().to_string(), value))
            })
            .collect()
    }

    /// Exchange `component`'s nested order with its adjacent sibling in `direction`
    ///
    /// Returns no writes when `component` is already first/last in its group.
    pub fn swap_nested_order<T: Ordered, C: Ordered + ?Sized>(
        group: &[T],
        component: &C,
        direction: Direction,
    ) -> OrderWrites {
        let mut writes = OrderWrites::new();
        let Some(target) = direction.step(component.nested_order()) else {
            return writes;
        };

        let sibling = Self::members(group, component.page_order())
            .find(|r| r.key() != component.key() && r.nested_order() == target);

        if let Some(sibling) = sibling {
            writes.insert(sibling.key().to_string(), component.nested_order());
            writes.insert(component.key().to_string(), target);
        }
        writes
    }

    /// Relabel the members of `page_order` that survive `removed` as `0..M`
    ///
    /// Relative order is kept (ties broken by key). Only members whose value
    /// changes are written.
    pub fn compact_nested_orders<T: Ordered>(
        group: &[T],
        page_order: u32,
        removed: &BTreeSet<&str>,
    ) -> OrderWrites {
        let mut survivors: Vec<&T> = Self::members(group, page_order)
            .filter(|r| !removed.contains(r.key()))
            .collect();
        survivors.sort_by(|a, b| {
            a.nested_order()
                .cmp(&b.nested_order())
                .then_with(|| a.key().cmp(b.key()))
        });

        survivors
            .into_iter()
            .zip(0u32..)
            .filter(|(r, rank)| r.nested_order() != *rank)
            .map(|(r, rank)| (r.key().to_string(), rank))
            .collect()
    }

    /// Decrement every group ranked above a removed group
    pub fn close_page_gap<T: Ordered>(group: &[T], removed_page_order: u32) -> OrderWrites {
        group
            .iter()
            .filter(|r| r.page_order() > removed_page_order)
            .map(|r| (r.key().to_string(), r.page_order() - 1))
            .collect()
    }

    /// Apply `writes` to a copy of the snapshot's order values
    ///
    /// `field` selects which rank the writes target. Records listed in
    /// `removed` are dropped. Handy for checking an operation before it is
    /// written.
    pub fn preview<T: Ordered>(
        group: &[T],
        writes: &OrderWrites,
        field: OrderField,
        removed: &BTreeSet<&str>,
    ) -> Vec<(String, u32, u32)> {
        group
            .iter()
            .filter(|r| !removed.contains(r.key()))
            .map(|r| {
                let mut page = r.page_order();
                let mut nested = r.nested_order();
                if let Some(value) = writes.get(r.key()) {
                    match field {
                        OrderField::Page => page = *value,
                        OrderField::Nested => nested = *value,
                    }
                }
                (r.key().to_string(), page, nested)
            })
            .collect()
    }

    /// Check both density invariants over a page group
    pub fn density_violations<T: Ordered>(group: &[T]) -> Vec<DensityViolation> {
        let mut violations = Vec::new();
        let mut by_page: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for record in group {
            by_page
                .entry(record.page_order())
                .or_default()
                .push(record.nested_order());
        }

        let pages: Vec<u32> = by_page.keys().copied().collect();
        if !is_dense(&pages) {
            violations.push(DensityViolation::PageOrders { found: pages });
        }

        for (page_order, mut nested) in by_page {
            nested.sort_unstable();
            if !is_dense(&nested) {
                violations.push(DensityViolation::NestedOrders {
                    page_order,
                    found: nested,
                });
            }
        }
        violations
    }

    fn members<T: Ordered>(group: &[T], page_order: u32) -> impl Iterator<Item = &T> {
        group.iter().filter(move |r| r.page_order() == page_order)
    }
}

/// Which of the two ranks a write set targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Page,
    Nested,
}

impl OrderField {
    /// Stored field name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::Page => crate::models::PAGE_ORDER_FIELD,
            OrderField::Nested => crate::models::NESTED_ORDER_FIELD,
        }
    }
}

/// `sorted` equals `0..sorted.len()`
fn is_dense(sorted: &[u32]) -> bool {
    sorted
        .iter()
        .enumerate()
        .all(|(i, value)| usize::try_from(*value).is_ok_and(|v| v == i))
}
