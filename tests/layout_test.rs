//! Tests for the tiered layout engine

use std::collections::HashSet;

use rstest::rstest;

use undivided::domain::{
    compute_layout, tiers, LayoutConfig, LayoutDirection, OwnershipNode, Point, Transfer,
};

fn node(id: &str, transfers: &[(&str, f64)]) -> OwnershipNode {
    OwnershipNode::grantee(
        id,
        id,
        transfers
            .iter()
            .map(|(from, pct)| Transfer::new(*from, *pct))
            .collect(),
    )
}

/// Three tiers: root; a, b, c; d (two sources), e
fn family() -> Vec<OwnershipNode> {
    vec![
        OwnershipNode::root("root", "Root"),
        node("a", &[("root", 40.0)]),
        node("b", &[("root", 30.0)]),
        node("c", &[("root", 30.0)]),
        node("d", &[("a", 50.0), ("b", 50.0)]),
        node("e", &[("c", 100.0)]),
    ]
}

/// A wider graph built from a fixed pattern: every node draws from one or two
/// earlier nodes.
fn generated(size: usize) -> Vec<OwnershipNode> {
    let mut nodes = vec![OwnershipNode::root("n0", "n0")];
    for i in 1..size {
        let first = format!("n{}", (i * 7 + 3) % i);
        let second = format!("n{}", (i * 3) % i);
        let transfers = if first == second {
            vec![Transfer::new(first, 10.0)]
        } else {
            vec![Transfer::new(first, 5.0), Transfer::new(second, 5.0)]
        };
        let id = format!("n{}", i);
        nodes.push(OwnershipNode::grantee(id.clone(), id, transfers));
    }
    nodes
}

fn main_axis(point: &Point, direction: LayoutDirection) -> f64 {
    match direction {
        LayoutDirection::Vertical => point.y,
        LayoutDirection::Horizontal => point.x,
    }
}

#[rstest]
#[case(family(), LayoutDirection::Vertical)]
#[case(family(), LayoutDirection::Horizontal)]
#[case(generated(40), LayoutDirection::Vertical)]
#[case(generated(40), LayoutDirection::Horizontal)]
fn given_acyclic_nodes_when_laying_out_then_tiers_are_disjoint_and_ordered(
    #[case] nodes: Vec<OwnershipNode>,
    #[case] direction: LayoutDirection,
) {
    // Act
    let positions = compute_layout(&nodes, direction, &LayoutConfig::default());
    let tiers = tiers(&nodes);

    // Assert: every node placed
    assert_eq!(positions.len(), nodes.len());

    // Assert: no shared position inside a tier
    for members in tiers.values() {
        let distinct: HashSet<(u64, u64)> = members
            .iter()
            .map(|n| {
                let p = positions[&n.id];
                (p.x.to_bits(), p.y.to_bits())
            })
            .collect();
        assert_eq!(distinct.len(), members.len());
    }

    // Assert: tier k lies strictly beyond tier k-1 on the main axis
    let levels: Vec<&usize> = tiers.keys().collect();
    for pair in levels.windows(2) {
        let max_prev = tiers[pair[0]]
            .iter()
            .map(|n| main_axis(&positions[&n.id], direction))
            .fold(f64::MIN, f64::max);
        let min_next = tiers[pair[1]]
            .iter()
            .map(|n| main_axis(&positions[&n.id], direction))
            .fold(f64::MAX, f64::min);
        assert!(min_next > max_prev, "tier {} not beyond {}", pair[1], pair[0]);
    }
}

#[test]
fn given_family_when_grouping_then_tiers_keep_collection_order() {
    let nodes = family();

    let tiers = tiers(&nodes);

    let ids = |level: usize| {
        tiers[&level]
            .iter()
            .map(|n| n.id.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(0), vec!["root"]);
    assert_eq!(ids(1), vec!["a", "b", "c"]);
    assert_eq!(ids(2), vec!["d", "e"]);
}

#[test]
fn given_vertical_layout_when_placing_tier_then_nodes_are_centered_on_widest() {
    // Arrange: widest tier has 3 nodes → 3 * 240 = 720 < 800 minimum
    let nodes = family();
    let config = LayoutConfig::default();

    // Act
    let positions = compute_layout(&nodes, LayoutDirection::Vertical, &config);

    // Assert: tier 1 spans 3 * 180 + 2 * 60 = 660, centered in 800
    assert_eq!(positions["a"], Point::new(70.0, 50.0 + 280.0));
    assert_eq!(positions["b"], Point::new(70.0 + 240.0, 330.0));
    assert_eq!(positions["c"], Point::new(70.0 + 480.0, 330.0));
    // tier 2 spans 2 * 180 + 60 = 420
    assert_eq!(positions["d"], Point::new(190.0, 50.0 + 560.0));
}

#[test]
fn given_wide_tier_when_laying_out_then_extent_grows_beyond_minimum() {
    // Arrange: 5 children → 5 * 240 = 1200 > 800
    let mut nodes = vec![OwnershipNode::root("root", "Root")];
    for i in 0..5 {
        nodes.push(node(&format!("c{}", i), &[("root", 20.0)]));
    }

    // Act
    let positions = compute_layout(&nodes, LayoutDirection::Vertical, &LayoutConfig::default());

    // Assert: tier extent 5 * 180 + 4 * 60 = 1140 → start (1200 - 1140) / 2
    assert_eq!(positions["c0"].x, 30.0);
    assert_eq!(positions["c4"].x, 30.0 + 4.0 * 240.0);
    // root centered: (1200 - 180) / 2
    assert_eq!(positions["root"].x, 510.0);
}

#[test]
fn given_stored_level_when_laying_out_then_node_keeps_its_tier() {
    let nodes = vec![
        OwnershipNode::root("root", "Root"),
        node("a", &[("root", 50.0)]).with_level(3),
    ];

    let positions = compute_layout(&nodes, LayoutDirection::Vertical, &LayoutConfig::default());

    assert_eq!(positions["a"].y, 50.0 + 3.0 * 280.0);
}

#[test]
fn given_same_input_when_laying_out_twice_then_results_are_identical() {
    let nodes = generated(25);
    let config = LayoutConfig::default();

    let first = compute_layout(&nodes, LayoutDirection::Horizontal, &config);
    let second = compute_layout(&nodes, LayoutDirection::Horizontal, &config);

    assert_eq!(first, second);
}

#[test]
fn given_custom_dimensions_when_laying_out_then_pitch_follows_config() {
    let nodes = family();
    let config = LayoutConfig {
        node_height: 100.0,
        vertical_gap: 20.0,
        margin: 0.0,
        ..LayoutConfig::default()
    };

    let positions = compute_layout(&nodes, LayoutDirection::Vertical, &config);

    assert_eq!(positions["root"].y, 0.0);
    assert_eq!(positions["a"].y, 120.0);
    assert_eq!(positions["e"].y, 240.0);
}

#[test]
fn given_empty_input_when_laying_out_then_map_is_empty() {
    let positions = compute_layout(&[], LayoutDirection::Vertical, &LayoutConfig::default());
    assert!(positions.is_empty());
}
