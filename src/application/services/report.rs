//! Report service
//!
//! Computed, renderer-facing views of a ledger: per-node figures, labelled
//! edges, person totals, and the chain tree. All views are derived from one
//! `OwnershipGraph` per call and never mutate the ledger.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use termtree::Tree;
use tracing::instrument;

use crate::application::ApplicationResult;
use crate::domain::{
    compute_layout, format_fraction, Document, DomainError, GraphDiagnostic, LayoutConfig,
    LayoutDirection, Ledger, OwnershipGraph, OwnershipNode, Point, LEAF_EPSILON,
};

/// One inbound transfer as shown next to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownLine {
    pub from_id: String,
    /// Source name, `"Unknown"` when the source does not exist
    pub from_name: String,
    pub parent_fraction: String,
    pub transfer_fraction: String,
    pub result_fraction: String,
    /// Share of the whole property, in percent
    pub amount: f64,
}

impl std::fmt::Display for BreakdownLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} = {}",
            self.transfer_fraction, self.parent_fraction, self.result_fraction
        )
    }
}

/// Figures for a single node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub display_name: String,
    pub name_as_written: String,
    pub person_id: Option<String>,
    pub person_name: Option<String>,
    pub relationship: String,
    pub notes: String,
    pub level: usize,
    pub is_root: bool,
    /// Share of the property that flowed into the node
    pub total_received: f64,
    /// Share the node still holds after its own conveyances
    pub current_ownership: f64,
    /// Percent of its own interest conveyed onward
    pub allocated_out: f64,
    pub remaining: f64,
    pub breakdown: Vec<BreakdownLine>,
    pub has_notes: bool,
    pub transfer_count: usize,
    /// Another node belongs to the same person
    pub has_same_person_nodes: bool,
}

/// A conveyance edge ready for drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeView {
    /// `e-{from}-{to}-{index}`
    pub id: String,
    pub source: String,
    pub target: String,
    pub percentage: f64,
    /// Document label followed by the target's relationship, if any
    pub label: Option<String>,
}

/// Combined holding of one person across their leaf nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonTotal {
    pub person_id: String,
    pub name: String,
    pub total: f64,
    pub node_ids: Vec<String>,
}

/// A node that received interest under a given document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGrantee {
    pub node_id: String,
    pub name: String,
    pub from_id: String,
    pub percentage: f64,
}

/// Edge label: document short label then relationship, space separated.
pub fn document_label(document: Option<&Document>, relationship: &str) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(label) = document.and_then(|d| d.short_label()) {
        parts.push(label);
    }
    if !relationship.is_empty() {
        parts.push(relationship.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Builds computed views of a ledger.
#[derive(Debug, Clone)]
pub struct ReportService {
    layout: LayoutConfig,
    leaf_epsilon: f64,
}

impl Default for ReportService {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl ReportService {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            leaf_epsilon: LEAF_EPSILON,
        }
    }

    pub fn with_leaf_epsilon(mut self, epsilon: f64) -> Self {
        self.leaf_epsilon = epsilon;
        self
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout
    }

    fn graph<'a>(&self, ledger: &'a Ledger) -> OwnershipGraph<'a> {
        OwnershipGraph::new(&ledger.owners).with_leaf_epsilon(self.leaf_epsilon)
    }

    fn view(
        &self,
        ledger: &Ledger,
        graph: &OwnershipGraph<'_>,
        node: &OwnershipNode,
        levels: &HashMap<&str, usize>,
        person_counts: &HashMap<&str, usize>,
    ) -> NodeView {
        let breakdown = graph
            .transfer_breakdown(&node.id)
            .into_iter()
            .map(|share| BreakdownLine {
                from_id: share.transfer.from_id.clone(),
                from_name: share
                    .source
                    .map(|s| s.display_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                parent_fraction: format_fraction(share.parent_total),
                transfer_fraction: format_fraction(share.transfer.percentage),
                result_fraction: format_fraction(share.amount),
                amount: share.amount,
            })
            .collect();

        let person_name = node
            .person_id
            .as_deref()
            .and_then(|pid| ledger.person(pid))
            .map(|p| p.primary_name.clone());
        let has_same_person_nodes = node
            .person_id
            .as_deref()
            .and_then(|pid| person_counts.get(pid))
            .is_some_and(|&count| count > 1);

        NodeView {
            id: node.id.clone(),
            display_name: node.display_name.clone(),
            name_as_written: node.name_as_written.clone(),
            person_id: node.person_id.clone(),
            person_name,
            relationship: node.relationship.clone(),
            notes: node.notes.clone(),
            level: levels.get(node.id.as_str()).copied().unwrap_or(0),
            is_root: node.is_root(),
            total_received: graph.total_interest(&node.id),
            current_ownership: graph.current_ownership(&node.id),
            allocated_out: graph.allocated_out(&node.id),
            remaining: graph.remaining(&node.id),
            breakdown,
            has_notes: node.has_notes(),
            transfer_count: node.transfers.len(),
            has_same_person_nodes,
        }
    }

    fn person_counts(ledger: &Ledger) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for pid in ledger.owners.iter().filter_map(|o| o.person_id.as_deref()) {
            *counts.entry(pid).or_insert(0) += 1;
        }
        counts
    }

    /// Views of every node in collection order.
    #[instrument(level = "debug", skip_all)]
    pub fn node_views(&self, ledger: &Ledger) -> Vec<NodeView> {
        let graph = self.graph(ledger);
        let levels = graph.levels();
        let counts = Self::person_counts(ledger);
        ledger
            .owners
            .iter()
            .map(|node| self.view(ledger, &graph, node, &levels, &counts))
            .collect()
    }

    pub fn node_view(&self, ledger: &Ledger, id: &str) -> ApplicationResult<NodeView> {
        let node = ledger
            .node(id)
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))?;
        let graph = self.graph(ledger);
        let levels = graph.levels();
        let counts = Self::person_counts(ledger);
        Ok(self.view(ledger, &graph, node, &levels, &counts))
    }

    /// Views of the nodes that still hold interest.
    pub fn leaf_views(&self, ledger: &Ledger) -> Vec<NodeView> {
        let graph = self.graph(ledger);
        let levels = graph.levels();
        let counts = Self::person_counts(ledger);
        graph
            .leaf_owners()
            .into_iter()
            .map(|node| self.view(ledger, &graph, node, &levels, &counts))
            .collect()
    }

    /// One edge per transfer, in collection order.
    pub fn edges(&self, ledger: &Ledger) -> Vec<EdgeView> {
        ledger
            .owners
            .iter()
            .flat_map(|owner| {
                owner.transfers.iter().enumerate().map(move |(idx, transfer)| {
                    let document = transfer
                        .document_id
                        .as_deref()
                        .and_then(|id| ledger.document(id));
                    EdgeView {
                        id: format!("e-{}-{}-{}", transfer.from_id, owner.id, idx),
                        source: transfer.from_id.clone(),
                        target: owner.id.clone(),
                        percentage: transfer.percentage,
                        label: document_label(document, &owner.relationship),
                    }
                })
            })
            .collect()
    }

    /// Leaf owners grouped by person, summing what each still holds.
    ///
    /// Leaf nodes without a person are listed under their own id.
    #[instrument(level = "debug", skip_all)]
    pub fn person_totals(&self, ledger: &Ledger) -> Vec<PersonTotal> {
        let graph = self.graph(ledger);
        let mut totals: Vec<PersonTotal> = Vec::new();
        for node in graph.leaf_owners() {
            let key = node.person_id.clone().unwrap_or_else(|| node.id.clone());
            let amount = graph.current_ownership(&node.id);
            match totals.iter_mut().find(|t| t.person_id == key) {
                Some(entry) => {
                    entry.total += amount;
                    entry.node_ids.push(node.id.clone());
                }
                None => {
                    let name = node
                        .person_id
                        .as_deref()
                        .and_then(|pid| ledger.person(pid))
                        .map(|p| p.primary_name.clone())
                        .unwrap_or_else(|| node.display_name.clone());
                    totals.push(PersonTotal {
                        person_id: key,
                        name,
                        total: amount,
                        node_ids: vec![node.id.clone()],
                    });
                }
            }
        }
        totals
    }

    /// Nodes that received interest under `document_id`.
    pub fn document_grantees(
        &self,
        ledger: &Ledger,
        document_id: &str,
    ) -> ApplicationResult<Vec<DocumentGrantee>> {
        if ledger.document(document_id).is_none() {
            return Err(DomainError::DocumentNotFound(document_id.to_string()).into());
        }
        Ok(ledger
            .owners
            .iter()
            .flat_map(|owner| {
                owner
                    .transfers
                    .iter()
                    .filter(|t| t.document_id.as_deref() == Some(document_id))
                    .map(move |t| DocumentGrantee {
                        node_id: owner.id.clone(),
                        name: owner.display_name.clone(),
                        from_id: t.from_id.clone(),
                        percentage: t.percentage,
                    })
            })
            .collect())
    }

    pub fn diagnostics(&self, ledger: &Ledger) -> Vec<GraphDiagnostic> {
        self.graph(ledger).diagnostics()
    }

    /// Automatic layout with manual positions laid over it.
    ///
    /// Manual positions of ids no longer in the ledger are ignored.
    pub fn positions(
        &self,
        ledger: &Ledger,
        direction: LayoutDirection,
    ) -> BTreeMap<String, Point> {
        let mut positions = compute_layout(&ledger.owners, direction, &self.layout);
        for (id, point) in &ledger.node_positions {
            if let Some(slot) = positions.get_mut(id) {
                *slot = *point;
            }
        }
        positions
    }

    /// The ownership chain as a tree rooted at each root node.
    ///
    /// Every node is expanded once. A node with several sources is listed again
    /// under its later sources as a one-line `(see above)` leaf; a node already
    /// on the current path is marked `(cycle)`.
    pub fn chain_tree(&self, ledger: &Ledger) -> Tree<String> {
        let graph = self.graph(ledger);
        let mut walk = ChainWalk::default();
        let leaves: Vec<_> = graph
            .roots()
            .into_iter()
            .map(|root| walk.subtree(&graph, root))
            .collect();
        Tree::new(ledger.project_name.clone()).with_leaves(leaves)
    }
}

/// Visit state of one chain tree rendering.
#[derive(Default)]
struct ChainWalk<'a> {
    path: HashSet<&'a str>,
    seen: HashSet<&'a str>,
}

impl<'a> ChainWalk<'a> {
    fn subtree(&mut self, graph: &OwnershipGraph<'a>, node: &'a OwnershipNode) -> Tree<String> {
        let id = node.id.as_str();
        if self.path.contains(id) {
            return Tree::new(format!("{} [{}] (cycle)", node.display_name, id));
        }
        if !self.seen.insert(id) {
            return Tree::new(format!("{} [{}] (see above)", node.display_name, id));
        }

        let label = format!(
            "{} [{}] {} holds {}",
            node.display_name,
            id,
            format_fraction(graph.total_interest(id)),
            format_fraction(graph.current_ownership(id)),
        );
        self.path.insert(id);
        let leaves: Vec<_> = graph
            .children(id)
            .into_iter()
            .map(|child| self.subtree(graph, child))
            .collect();
        self.path.remove(id);
        Tree::new(label).with_leaves(leaves)
    }
}
