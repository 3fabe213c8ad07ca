//! Pedigree tree rendering for `studbook tree` output.

use std::io::{self, Write};

use colored::Colorize;

use crate::coi::CoiValue;
use crate::domain::{DogId, DogNode, ParentType};
use crate::layout::{TreeNode, TreeSlot};
use crate::session::ChartSnapshot;
use std::collections::HashMap;

use super::color::{bold, colorize_coi, colorize_id, dimmed, info};
use super::{dog_label, OutputConfig, OutputMode};

/// Print a pedigree tree with ASCII/Unicode connectors.
///
/// Renders a tree like:
/// ```text
/// ◆ ♂ dog-a3f8 Rex ★
/// ├── sire: ♂ dog-b4c1 Max
/// │   ├── sire: (unknown)
/// │   └── dam: ♀ dog-d2e9 Bella
/// └── dam: ♀ dog-f7a2 Luna
/// ```
pub fn print_pedigree_tree(snapshot: &ChartSnapshot, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env().with_theme(snapshot.display.theme);

    match mode {
        OutputMode::Text => print_pedigree_tree_text(&mut handle, snapshot, &config),
        OutputMode::Json => {
            let json = pedigree_tree_to_json(&snapshot.tree, &snapshot.nodes);
            let output = serde_json::to_string_pretty(&json).map_err(io::Error::other)?;
            writeln!(handle, "{}", output)
        }
    }
}

/// Render the pedigree tree with connector lines.
fn print_pedigree_tree_text<W: Write>(
    w: &mut W,
    snapshot: &ChartSnapshot,
    config: &OutputConfig,
) -> io::Result<()> {
    let root_icon = if config.use_ascii { "*" } else { "◆" };
    let root_icon_str = bold(&info(root_icon, config), config);

    writeln!(
        w,
        "{} {}",
        root_icon_str,
        node_label(&snapshot.tree.id, snapshot, config)
    )?;

    let children = slot_pair(&snapshot.tree);
    print_tree_children(w, &children, &[], snapshot, config)?;

    if let CoiValue::Coefficient(f) = &snapshot.coi.value {
        writeln!(w)?;
        writeln!(
            w,
            "{} {}",
            bold("Coefficient of inbreeding:", config),
            colorize_coi(*f, config)
        )?;
    }
    Ok(())
}

/// The two parent slots of a node, in sire-then-dam order.
fn slot_pair(node: &TreeNode) -> [(ParentType, &TreeSlot); 2] {
    [
        (ParentType::Sire, &node.sire),
        (ParentType::Dam, &node.dam),
    ]
}

/// Recursively render parent slots with proper connector lines.
///
/// `prefix_segments` tracks which ancestor levels still have siblings
/// below, used to draw the vertical continuation lines (`│`).
fn print_tree_children<W: Write>(
    w: &mut W,
    children: &[(ParentType, &TreeSlot)],
    prefix_segments: &[bool],
    snapshot: &ChartSnapshot,
    config: &OutputConfig,
) -> io::Result<()> {
    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, (parent_type, slot)) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;

        let mut prefix = String::new();
        for &has_more in prefix_segments {
            let segment = if has_more { pipe } else { space };
            if config.use_colors {
                prefix.push_str(&segment.dimmed().to_string());
            } else {
                prefix.push_str(segment);
            }
        }

        let connector = if is_last { corner } else { branch };
        let connector_str = if config.use_colors {
            connector.dimmed().to_string()
        } else {
            connector.to_string()
        };

        let slot_label = match slot {
            TreeSlot::Dog(node) => node_label(&node.id, snapshot, config),
            TreeSlot::Unknown => dimmed("(unknown)", config),
            TreeSlot::Truncated => dimmed("(beyond depth)", config),
        };
        writeln!(
            w,
            "{}{}{} {}",
            prefix,
            connector_str,
            dimmed(&format!("{parent_type}:"), config),
            slot_label
        )?;

        if let TreeSlot::Dog(node) = slot {
            let grandparents = slot_pair(node);
            // Leaves with two empty slots still render them, so an
            // unknown ancestor is visibly unknown rather than omitted.
            let mut next_segments = prefix_segments.to_vec();
            next_segments.push(!is_last);
            print_tree_children(w, &grandparents, &next_segments, snapshot, config)?;
        }
    }

    Ok(())
}

fn node_label(id: &DogId, snapshot: &ChartSnapshot, config: &OutputConfig) -> String {
    snapshot
        .nodes
        .get(id)
        .map(|n| dog_label(n, &snapshot.display, config))
        .unwrap_or_else(|| colorize_id(id.as_str(), config))
}

/// Convert a pedigree tree to a JSON value for programmatic output.
fn pedigree_tree_to_json(
    node: &TreeNode,
    nodes: &HashMap<DogId, DogNode>,
) -> serde_json::Value {
    let mut obj = serde_json::json!({
        "id": node.id.as_str(),
    });
    if let Some(record) = nodes.get(&node.id) {
        obj["name"] = serde_json::json!(record.name);
        obj["sex"] = serde_json::json!(record.sex);
        if record.champion {
            obj["champion"] = serde_json::json!(true);
        }
    }
    obj["sire"] = tree_slot_to_json(&node.sire, nodes);
    obj["dam"] = tree_slot_to_json(&node.dam, nodes);
    obj
}

fn tree_slot_to_json(
    slot: &TreeSlot,
    nodes: &HashMap<DogId, DogNode>,
) -> serde_json::Value {
    match slot {
        TreeSlot::Dog(node) => pedigree_tree_to_json(node, nodes),
        TreeSlot::Unknown => serde_json::Value::Null,
        TreeSlot::Truncated => serde_json::json!("truncated"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coi::CoiResult;
    use crate::domain::{DisplayOptions, Sex};
    use crate::graph::test_support::{dog, graph_from};
    use crate::layout::{generation_columns, pedigree_tree};
    use chrono::Utc;

    fn sample_snapshot() -> ChartSnapshot {
        let graph = graph_from(
            "pup",
            2,
            vec![
                (dog("pup", Sex::Male, Some("s"), Some("d")), 0),
                (dog("s", Sex::Male, Some("gs"), None), 1),
                (dog("d", Sex::Female, None, None), 1),
                (dog("gs", Sex::Male, None, None), 2),
            ],
        );
        let nodes = graph.nodes().map(|n| (n.id.clone(), n.clone())).collect();
        ChartSnapshot {
            root: DogId::new("pup"),
            revision: 0,
            generated_at: Utc::now(),
            coi: CoiResult {
                dog: DogId::new("pup"),
                value: CoiValue::Coefficient(0.0),
                contributions: Vec::new(),
                depth_truncated: false,
            },
            columns: generation_columns(&graph),
            tree: pedigree_tree(&graph),
            nodes,
            warnings: Vec::new(),
            display: DisplayOptions::default(),
        }
    }

    #[test]
    fn tree_labels_slots_and_uses_connectors() {
        let config = OutputConfig::new(false, false);
        let snapshot = sample_snapshot();
        let mut buffer = Vec::new();

        print_pedigree_tree_text(&mut buffer, &snapshot, &config).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("├── sire:"), "got:\n{output}");
        assert!(output.contains("└── dam:"), "got:\n{output}");
        assert!(output.contains("(unknown)"), "got:\n{output}");
        assert!(
            output.contains("│   ") || output.contains("    └──"),
            "nested levels should indent, got:\n{output}"
        );
    }

    #[test]
    fn tree_ascii_mode_uses_plain_connectors() {
        let config = OutputConfig::new(true, false);
        let snapshot = sample_snapshot();
        let mut buffer = Vec::new();

        print_pedigree_tree_text(&mut buffer, &snapshot, &config).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("|-- sire:"), "got:\n{output}");
        assert!(output.contains("`-- dam:"), "got:\n{output}");
        assert!(!output.contains('├'), "no Unicode in ASCII mode:\n{output}");
    }

    #[test]
    fn tree_json_nests_parent_slots() {
        let snapshot = sample_snapshot();
        let json = pedigree_tree_to_json(&snapshot.tree, &snapshot.nodes);

        assert_eq!(json["id"], "pup");
        assert_eq!(json["sire"]["id"], "s");
        assert_eq!(json["sire"]["sire"]["id"], "gs");
        assert!(json["sire"]["dam"].is_null());
        assert_eq!(json["dam"]["id"], "d");
    }
}
