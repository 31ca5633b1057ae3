//! Tiered diagram layout
//!
//! Every node sits on the tier given by [`OwnershipGraph::node_level`]. Tiers
//! are stacked along the main axis at a fixed pitch; nodes inside a tier keep
//! collection order along the cross axis and are centered against the widest
//! tier. The result depends only on the node slice, the direction, and the
//! dimensions, so repeated calls return identical maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::entities::{OwnershipNode, Point};
use crate::domain::graph::OwnershipGraph;

/// Main axis of the diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    /// Tiers are rows, top to bottom
    #[default]
    Vertical,
    /// Tiers are columns, left to right
    Horizontal,
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDirection::Vertical => write!(f, "vertical"),
            LayoutDirection::Horizontal => write!(f, "horizontal"),
        }
    }
}

impl FromStr for LayoutDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vertical" | "tb" | "v" => Ok(LayoutDirection::Vertical),
            "horizontal" | "lr" | "h" => Ok(LayoutDirection::Horizontal),
            other => Err(format!(
                "unknown layout direction '{}' (expected vertical or horizontal)",
                other
            )),
        }
    }
}

/// Slot dimensions of the diagram, in canvas units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub node_width: f64,
    pub node_height: f64,
    pub horizontal_gap: f64,
    pub vertical_gap: f64,
    /// Offset of tier 0 along the main axis
    pub margin: f64,
    /// Minimum cross-axis extent for vertical layouts
    pub min_width: f64,
    /// Minimum cross-axis extent for horizontal layouts
    pub min_height: f64,
    /// Extra spacing between columns in horizontal layouts
    pub horizontal_tier_padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::Vertical,
            node_width: 180.0,
            node_height: 160.0,
            horizontal_gap: 60.0,
            vertical_gap: 120.0,
            margin: 50.0,
            min_width: 800.0,
            min_height: 500.0,
            horizontal_tier_padding: 40.0,
        }
    }
}

impl LayoutConfig {
    /// Distance between consecutive tiers along the main axis.
    pub fn tier_pitch(&self, direction: LayoutDirection) -> f64 {
        match direction {
            LayoutDirection::Vertical => self.node_height + self.vertical_gap,
            LayoutDirection::Horizontal => {
                self.node_width + self.horizontal_gap + self.horizontal_tier_padding
            }
        }
    }

    /// Distance between consecutive nodes inside one tier.
    pub fn slot_pitch(&self, direction: LayoutDirection) -> f64 {
        match direction {
            LayoutDirection::Vertical => self.node_width + self.horizontal_gap,
            LayoutDirection::Horizontal => self.node_height + self.vertical_gap,
        }
    }
}

/// Group nodes by tier, keeping collection order inside each tier.
pub fn tiers(nodes: &[OwnershipNode]) -> BTreeMap<usize, Vec<&OwnershipNode>> {
    let graph = OwnershipGraph::new(nodes);
    let levels = graph.levels();

    let mut tiers: BTreeMap<usize, Vec<&OwnershipNode>> = BTreeMap::new();
    for node in nodes {
        let level = levels.get(node.id.as_str()).copied().unwrap_or(0);
        tiers.entry(level).or_default().push(node);
    }
    tiers
}

/// Compute a position for every node id.
///
/// When two nodes share an id, the later one's position wins.
#[instrument(level = "debug", skip(nodes, config), fields(nodes = nodes.len()))]
pub fn compute_layout(
    nodes: &[OwnershipNode],
    direction: LayoutDirection,
    config: &LayoutConfig,
) -> BTreeMap<String, Point> {
    let tiers = tiers(nodes);
    let widest = tiers.values().map(Vec::len).max().unwrap_or(0).max(1);
    debug!("{} tiers, widest has {} nodes", tiers.len(), widest);

    let slot = config.slot_pitch(direction);
    let pitch = config.tier_pitch(direction);
    let (node_extent, gap, min_extent) = match direction {
        LayoutDirection::Vertical => (config.node_width, config.horizontal_gap, config.min_width),
        LayoutDirection::Horizontal => {
            (config.node_height, config.vertical_gap, config.min_height)
        }
    };
    let total_extent = min_extent.max(widest as f64 * slot);

    let mut positions = BTreeMap::new();
    for (level, members) in &tiers {
        let count = members.len() as f64;
        let tier_extent = count * node_extent + (count - 1.0) * gap;
        let start = (total_extent - tier_extent) / 2.0;
        let main = config.margin + *level as f64 * pitch;

        for (i, node) in members.iter().enumerate() {
            let cross = start + i as f64 * slot;
            let point = match direction {
                LayoutDirection::Vertical => Point::new(cross, main),
                LayoutDirection::Horizontal => Point::new(main, cross),
            };
            positions.insert(node.id.clone(), point);
        }
    }
    positions
}
