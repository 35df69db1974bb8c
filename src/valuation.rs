//! valuation.rs - Recursive valuation of composite items
//!
//! Walks attachment trees and nested storage depth-first with an explicit
//! stack, so adversarially deep graphs cannot overflow the call stack.
//! Identity-based visited tracking breaks cycles; depth, item and
//! large-container limits bound the work and flag the result as a lower
//! bound when they cut anything off.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::item::ItemNode;
use crate::models::{ComponentValue, PriceTable, ValuationResult};

/// Bounds on one valuation walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalLimits {
    /// Levels below the root that are still descended into
    pub max_depth: usize,
    /// Children examined across the whole walk, 0 = unlimited
    pub max_items: usize,
    pub skip_large_containers: bool,
    /// Containers holding more first-level items than this are not opened
    pub large_container_threshold: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        TraversalLimits {
            max_depth: 10,
            max_items: 100,
            skip_large_containers: true,
            large_container_threshold: 150,
        }
    }
}

/// Unit price times stack count. Non-positive stacks contribute nothing.
fn own_value<N: ItemNode>(node: &N, table: &PriceTable) -> (f64, f64) {
    let unit = table.get(node.type_id()).unwrap_or(0.0);
    (unit, unit * node.stack_count().max(0) as f64)
}

/// Computes item values from a price table snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuationEngine {
    limits: TraversalLimits,
}

impl ValuationEngine {
    pub fn new(limits: TraversalLimits) -> Self {
        ValuationEngine { limits }
    }

    pub fn limits(&self) -> &TraversalLimits {
        &self.limits
    }

    /// Value of `root` plus everything attached to or stored in it
    pub fn value_of<N: ItemNode>(&self, root: &N, table: &PriceTable) -> ValuationResult {
        let (_, own_price) = own_value(root, table);
        let mut children_price = 0.0;

        let truncated = self.walk(root, table, |_, _, total, _| children_price += total);

        ValuationResult {
            own_price,
            children_price,
            truncated,
        }
    }

    /// Every priced component under `root` in depth-first order, for
    /// hierarchical display. Components without a price are left out.
    pub fn breakdown<N: ItemNode>(&self, root: &N, table: &PriceTable) -> Vec<ComponentValue> {
        let mut components = Vec::new();

        self.walk(root, table, |node, unit, total, depth| {
            if table.contains(node.type_id()) {
                components.push(ComponentValue {
                    type_id: node.type_id().to_string(),
                    unit_price: unit,
                    total_price: total,
                    depth,
                });
            }
        });
        components
    }

    /// Visit each reachable child once. Returns whether a limit cut the
    /// walk short.
    fn walk<N, F>(&self, root: &N, table: &PriceTable, mut visit: F) -> bool
    where
        N: ItemNode,
        F: FnMut(&N, f64, f64, usize),
    {
        let limits = &self.limits;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.instance_id().to_string());

        let mut stack: Vec<(N, usize)> = Vec::new();
        let mut truncated = self.expand(root, 0, &mut stack);
        let mut examined = 0usize;

        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node.instance_id().to_string()) {
                debug!("Skipping already visited item {}", node.instance_id());
                continue;
            }

            examined += 1;
            if limits.max_items > 0 && examined > limits.max_items {
                debug!("Item limit {} reached, stopping valuation", limits.max_items);
                truncated = true;
                break;
            }

            let (unit, total) = own_value(&node, table);
            visit(&node, unit, total, depth);

            if self.expand(&node, depth + 1, &mut stack) {
                truncated = true;
            }
        }

        truncated
    }

    /// Queue the children of `node` at `depth`, attachments first. Returns
    /// true when a limit prevented it.
    fn expand<N: ItemNode>(&self, node: &N, depth: usize, stack: &mut Vec<(N, usize)>) -> bool {
        let limits = &self.limits;
        let stored = node.stored_items();
        let mut children = node.attachments();

        if children.is_empty() && stored.is_empty() {
            return false;
        }

        if depth >= limits.max_depth {
            debug!("Depth limit {} reached at {}", limits.max_depth, node.instance_id());
            return true;
        }

        if limits.skip_large_containers
            && node.is_container()
            && stored.len() > limits.large_container_threshold
        {
            debug!(
                "Skipping contents of large container {} ({} items)",
                node.instance_id(),
                stored.len()
            );
            return true;
        }

        children.extend(stored);
        stack.extend(children.into_iter().rev().map(|child| (child, depth)));
        false
    }
}
