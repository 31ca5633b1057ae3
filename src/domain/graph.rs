//! Interest calculator over an ownership graph.
//!
//! The graph borrows an immutable snapshot of the node collection and answers
//! every question about fractional interest from it. Edges run from a node to
//! the sources named by its transfers; a node without transfers is a root and
//! always holds 100% of itself.
//!
//! Nothing here fails: unknown ids yield 0 or an empty list, dangling sources
//! contribute 0, and cycles are cut by a per-path visited set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::entities::{OwnershipNode, Transfer};

/// Interest held by a root node, in percent.
pub const ROOT_INTEREST: f64 = 100.0;

/// Tolerance for "fully allocated" after repeated fraction arithmetic.
pub const LEAF_EPSILON: f64 = 0.01;

/// Arena slot for one node of the snapshot.
#[derive(Debug)]
struct GraphEntry<'a> {
    node: &'a OwnershipNode,
    /// Arena index of each transfer's source, `None` when dangling
    sources: Vec<Option<Index>>,
}

/// One inbound transfer of a node, resolved against the graph.
#[derive(Debug, Clone, Copy)]
pub struct TransferShare<'a> {
    pub transfer: &'a Transfer,
    /// Source node, `None` for a dangling reference
    pub source: Option<&'a OwnershipNode>,
    /// Total interest of the source
    pub parent_total: f64,
    /// Share of the whole property conveyed by this transfer
    pub amount: f64,
}

/// Data-integrity findings; reported, never raised.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphDiagnostic {
    /// Node ids along a cycle of transfers
    Cycle { ids: Vec<String> },
    /// A node conveyed more than all of its own interest
    OverAllocated { id: String, allocated: f64 },
    /// A transfer names a source that does not exist
    DanglingReference { node: String, from: String },
}

impl fmt::Display for GraphDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphDiagnostic::Cycle { ids } => {
                write!(f, "graph contains a cycle: {}", ids.join(" -> "))
            }
            GraphDiagnostic::OverAllocated { id, allocated } => {
                write!(f, "{} has allocated {:.4}% of its interest", id, allocated)
            }
            GraphDiagnostic::DanglingReference { node, from } => {
                write!(f, "{} receives from unknown owner {}", node, from)
            }
        }
    }
}

/// Read-only view of an ownership snapshot.
#[derive(Debug)]
pub struct OwnershipGraph<'a> {
    arena: Arena<GraphEntry<'a>>,
    /// Insertion order, equal to the collection order
    order: Vec<Index>,
    /// First node carrying each id
    index: HashMap<&'a str, Index>,
    /// Sum of transfer percentages keyed by source id
    allocated: HashMap<&'a str, f64>,
    cycle: Option<Vec<Index>>,
    /// Totals cached per snapshot; only present for acyclic graphs
    totals: Option<HashMap<Index, f64>>,
    leaf_epsilon: f64,
}

impl<'a> OwnershipGraph<'a> {
    #[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
    pub fn new(nodes: &'a [OwnershipNode]) -> Self {
        let mut arena = Arena::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let idx = arena.insert(GraphEntry {
                node,
                sources: Vec::new(),
            });
            order.push(idx);
            index.entry(node.id.as_str()).or_insert(idx);
        }

        for &idx in &order {
            if let Some(entry) = arena.get_mut(idx) {
                entry.sources = entry
                    .node
                    .transfers
                    .iter()
                    .map(|t| index.get(t.from_id.as_str()).copied())
                    .collect();
            }
        }

        let mut allocated: HashMap<&'a str, f64> = HashMap::new();
        for transfer in nodes.iter().flat_map(|n| &n.transfers) {
            *allocated.entry(transfer.from_id.as_str()).or_insert(0.0) += transfer.percentage;
        }

        let mut graph = Self {
            arena,
            order,
            index,
            allocated,
            cycle: None,
            totals: None,
            leaf_epsilon: LEAF_EPSILON,
        };

        graph.cycle = graph.find_cycle();
        if graph.cycle.is_none() {
            graph.totals = Some(graph.precompute_totals());
        } else {
            debug!("cycle detected, totals computed per call");
        }
        graph
    }

    /// Override the tolerance used by [`leaf_owners`](Self::leaf_owners).
    pub fn with_leaf_epsilon(mut self, epsilon: f64) -> Self {
        self.leaf_epsilon = epsilon;
        self
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First node with the given id.
    pub fn node(&self, id: &str) -> Option<&'a OwnershipNode> {
        self.index
            .get(id)
            .and_then(|&idx| self.arena.get(idx))
            .map(|entry| entry.node)
    }

    /// All nodes in collection order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a OwnershipNode> + '_ {
        self.order
            .iter()
            .filter_map(|&idx| self.arena.get(idx))
            .map(|entry| entry.node)
    }

    /// Nodes without transfers.
    pub fn roots(&self) -> Vec<&'a OwnershipNode> {
        self.nodes().filter(|n| n.is_root()).collect()
    }

    /// Share of the whole property held or passed through by `id`, in percent.
    pub fn total_interest(&self, id: &str) -> f64 {
        let Some(&idx) = self.index.get(id) else {
            return 0.0;
        };
        match &self.totals {
            Some(totals) => totals.get(&idx).copied().unwrap_or(0.0),
            None => self.total_guarded(idx, HashSet::new()),
        }
    }

    fn total_guarded(&self, idx: Index, mut visited: HashSet<Index>) -> f64 {
        if !visited.insert(idx) {
            return 0.0;
        }
        let Some(entry) = self.arena.get(idx) else {
            return 0.0;
        };
        if entry.node.is_root() {
            return ROOT_INTEREST;
        }
        entry
            .node
            .transfers
            .iter()
            .zip(&entry.sources)
            .fold(0.0, |total, (transfer, source)| {
                let parent_total = source
                    .map(|src| self.total_guarded(src, visited.clone()))
                    .unwrap_or(0.0);
                total + (transfer.percentage / 100.0) * parent_total
            })
    }

    fn precompute_totals(&self) -> HashMap<Index, f64> {
        let mut memo = HashMap::with_capacity(self.order.len());
        for &idx in &self.order {
            self.total_memoized(idx, &mut memo);
        }
        memo
    }

    // Only called on acyclic graphs.
    fn total_memoized(&self, idx: Index, memo: &mut HashMap<Index, f64>) -> f64 {
        if let Some(&total) = memo.get(&idx) {
            return total;
        }
        let total = match self.arena.get(idx) {
            None => 0.0,
            Some(entry) if entry.node.is_root() => ROOT_INTEREST,
            Some(entry) => entry
                .node
                .transfers
                .iter()
                .zip(&entry.sources)
                .fold(0.0, |total, (transfer, source)| {
                    let parent_total = source
                        .map(|src| self.total_memoized(src, memo))
                        .unwrap_or(0.0);
                    total + (transfer.percentage / 100.0) * parent_total
                }),
        };
        memo.insert(idx, total);
        total
    }

    /// Nodes with at least one transfer from `id`, in collection order.
    pub fn children(&self, id: &str) -> Vec<&'a OwnershipNode> {
        self.nodes()
            .filter(|n| n.transfers.iter().any(|t| t.from_id == id))
            .collect()
    }

    /// Percent of its own interest that `id` has conveyed; may exceed 100.
    pub fn allocated_out(&self, id: &str) -> f64 {
        self.allocated.get(id).copied().unwrap_or(0.0)
    }

    /// Percent of its own interest that `id` still holds; negative when over-allocated.
    pub fn remaining(&self, id: &str) -> f64 {
        100.0 - self.allocated_out(id)
    }

    /// Share of the whole property that `id` still holds after its own conveyances.
    pub fn current_ownership(&self, id: &str) -> f64 {
        (self.total_interest(id) * self.remaining(id)) / 100.0
    }

    /// Non-root nodes that have not conveyed all of their interest.
    pub fn leaf_owners(&self) -> Vec<&'a OwnershipNode> {
        self.nodes()
            .filter(|n| !n.is_root())
            .filter(|n| self.allocated_out(&n.id) < 100.0 - self.leaf_epsilon)
            .collect()
    }

    /// Tier of a node: its `original_level`, else one below its first source.
    ///
    /// Only the first transfer is followed, so a node with several sources at
    /// different depths sits below the first one.
    pub fn node_level(&self, id: &str) -> usize {
        match self.node(id) {
            Some(node) => self.resolve_level(&node.id, &mut HashMap::new(), &mut HashSet::new()),
            None => 0,
        }
    }

    /// Tier of every node, sharing work across common ancestors.
    pub fn levels(&self) -> HashMap<&'a str, usize> {
        let mut memo = HashMap::with_capacity(self.order.len());
        for node in self.nodes() {
            self.resolve_level(&node.id, &mut memo, &mut HashSet::new());
        }
        memo
    }

    fn resolve_level(
        &self,
        id: &'a str,
        memo: &mut HashMap<&'a str, usize>,
        visiting: &mut HashSet<&'a str>,
    ) -> usize {
        if let Some(&level) = memo.get(id) {
            return level;
        }
        let level = match self.node(id) {
            None => 0,
            Some(node) => match (node.original_level, node.transfers.first()) {
                (Some(level), _) => level,
                (None, None) => 0,
                (None, Some(first)) => {
                    if !visiting.insert(id) {
                        return 0;
                    }
                    self.resolve_level(&first.from_id, memo, visiting) + 1
                }
            },
        };
        memo.insert(id, level);
        level
    }

    /// Inbound transfers of `id` with the amount each one conveys.
    pub fn transfer_breakdown(&self, id: &str) -> Vec<TransferShare<'a>> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        node.transfers
            .iter()
            .map(|transfer| {
                let source = self.node(&transfer.from_id);
                let parent_total = source
                    .map(|s| self.total_interest(&s.id))
                    .unwrap_or(0.0);
                TransferShare {
                    transfer,
                    source,
                    parent_total,
                    amount: (parent_total * transfer.percentage) / 100.0,
                }
            })
            .collect()
    }

    pub fn is_acyclic(&self) -> bool {
        self.cycle.is_none()
    }

    /// Ids along the first cycle found, if any.
    pub fn cycle(&self) -> Option<Vec<String>> {
        self.cycle.as_ref().map(|path| {
            path.iter()
                .filter_map(|&idx| self.arena.get(idx))
                .map(|entry| entry.node.id.clone())
                .collect()
        })
    }

    fn find_cycle(&self) -> Option<Vec<Index>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit(
            graph: &OwnershipGraph<'_>,
            idx: Index,
            marks: &mut HashMap<Index, Mark>,
            stack: &mut Vec<Index>,
        ) -> Option<Vec<Index>> {
            match marks.get(&idx) {
                Some(Mark::Done) => return None,
                Some(Mark::InProgress) => {
                    let start = stack.iter().position(|&i| i == idx)?;
                    return Some(stack[start..].to_vec());
                }
                None => {}
            }
            marks.insert(idx, Mark::InProgress);
            stack.push(idx);
            if let Some(entry) = graph.arena.get(idx) {
                for &source in entry.sources.iter().flatten() {
                    if let Some(cycle) = visit(graph, source, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            marks.insert(idx, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        self.order
            .iter()
            .find_map(|&idx| visit(self, idx, &mut marks, &mut stack))
    }

    /// Whether `id` draws interest, directly or transitively, from `ancestor`.
    pub fn descends_from(&self, id: &str, ancestor: &str) -> bool {
        let (Some(&start), Some(&target)) = (self.index.get(id), self.index.get(ancestor)) else {
            return false;
        };
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            if !seen.insert(idx) {
                continue;
            }
            let Some(entry) = self.arena.get(idx) else {
                continue;
            };
            for &source in entry.sources.iter().flatten() {
                if source == target {
                    return true;
                }
                queue.push_back(source);
            }
        }
        false
    }

    /// Whether adding a transfer `from -> to` would close a cycle.
    pub fn would_create_cycle(&self, from_id: &str, to_id: &str) -> bool {
        from_id == to_id || self.descends_from(from_id, to_id)
    }

    /// Integrity findings: cycles, over-allocation, dangling sources.
    pub fn diagnostics(&self) -> Vec<GraphDiagnostic> {
        let mut findings = Vec::new();

        if let Some(ids) = self.cycle() {
            findings.push(GraphDiagnostic::Cycle { ids });
        }

        let mut seen = HashSet::new();
        for node in self.nodes() {
            if !seen.insert(node.id.as_str()) {
                continue;
            }
            let allocated = self.allocated_out(&node.id);
            if allocated > 100.0 + self.leaf_epsilon {
                findings.push(GraphDiagnostic::OverAllocated {
                    id: node.id.clone(),
                    allocated,
                });
            }
        }

        for &idx in &self.order {
            let Some(entry) = self.arena.get(idx) else {
                continue;
            };
            for (transfer, source) in entry.node.transfers.iter().zip(&entry.sources) {
                if source.is_none() {
                    findings.push(GraphDiagnostic::DanglingReference {
                        node: entry.node.id.clone(),
                        from: transfer.from_id.clone(),
                    });
                }
            }
        }

        findings
    }
}
