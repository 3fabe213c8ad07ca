//! Chart layouts derived from the ancestor graph.
//!
//! Two read-only views are derived per graph revision:
//!
//! - [`GenerationColumns`]: the classic pedigree-chart shape, one column
//!   per generation with `2^k` slots in column `k`, sire-line first
//! - [`TreeNode`]: a recursive view for indented tree rendering
//!
//! Both views hold [`DogId`] keys, never record copies: every occurrence
//! of a shared ancestor resolves through the graph to the same entry, so a
//! committed edit is visible in all of its chart positions at once.

use crate::domain::{DogId, ParentType};
use crate::graph::{AncestorGraph, AncestorSlot};

/// Column-per-generation layout.
///
/// Column 0 holds the root; column `k` holds exactly `2^k` slots in
/// canonical order (the sire-side half precedes the dam-side half at every
/// level). Slots under an unknown or truncated ancestor repeat that
/// placeholder, so every column keeps its full width and a renderer can
/// index slots positionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationColumns {
    root: DogId,
    columns: Vec<Vec<AncestorSlot>>,
}

impl GenerationColumns {
    /// The root dog of the chart.
    pub fn root(&self) -> &DogId {
        &self.root
    }

    /// Number of generations laid out, including the root's.
    ///
    /// Always `max_generations + 1` for the graph the layout was derived
    /// from.
    pub fn generations(&self) -> usize {
        self.columns.len()
    }

    /// The slots of generation `k`, sire-side half first.
    pub fn column(&self, k: usize) -> Option<&[AncestorSlot]> {
        self.columns.get(k).map(Vec::as_slice)
    }

    /// Iterate over all columns in generation order.
    pub fn iter(&self) -> impl Iterator<Item = &[AncestorSlot]> {
        self.columns.iter().map(Vec::as_slice)
    }
}

/// What occupies a slot of the recursive tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSlot {
    /// A resolved ancestor with its own sub-tree.
    Dog(Box<TreeNode>),

    /// Explicitly no ancestor.
    Unknown,

    /// An ancestor beyond the generation bound.
    Truncated,
}

/// A dog in the recursive tree view.
///
/// Holds only the lookup key; display data is resolved through the graph
/// at render time. A shared ancestor occurs once per lineage path here
/// (trees duplicate by nature), but every occurrence carries the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Lookup key into the shared graph.
    pub id: DogId,

    /// The sire sub-tree.
    pub sire: TreeSlot,

    /// The dam sub-tree.
    pub dam: TreeSlot,
}

/// Derive the column-per-generation layout for the whole graph.
pub fn generation_columns(graph: &AncestorGraph) -> GenerationColumns {
    let mut columns = Vec::with_capacity(graph.max_generations() + 1);
    columns.push(vec![AncestorSlot::Dog(graph.root().clone())]);

    for _ in 0..graph.max_generations() {
        let previous = columns
            .last()
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut next = Vec::with_capacity(previous.len() * 2);
        for slot in previous {
            match slot {
                AncestorSlot::Dog(id) => {
                    next.push(graph.parent_slot(id, ParentType::Sire));
                    next.push(graph.parent_slot(id, ParentType::Dam));
                }
                placeholder => {
                    next.push(placeholder.clone());
                    next.push(placeholder.clone());
                }
            }
        }
        columns.push(next);
    }

    GenerationColumns {
        root: graph.root().clone(),
        columns,
    }
}

/// Derive the recursive tree view rooted at the graph's root dog.
pub fn pedigree_tree(graph: &AncestorGraph) -> TreeNode {
    build_tree_node(graph, graph.root(), graph.max_generations())
}

fn build_tree_node(graph: &AncestorGraph, id: &DogId, remaining: usize) -> TreeNode {
    let slot_for = |parent_type| {
        if remaining == 0 {
            // The column layout stops here too; mirror its placeholders.
            return match graph.parent_slot(id, parent_type) {
                AncestorSlot::Dog(_) | AncestorSlot::Truncated => TreeSlot::Truncated,
                AncestorSlot::Unknown => TreeSlot::Unknown,
            };
        }
        match graph.parent_slot(id, parent_type) {
            AncestorSlot::Dog(parent) => {
                TreeSlot::Dog(Box::new(build_tree_node(graph, &parent, remaining - 1)))
            }
            AncestorSlot::Unknown => TreeSlot::Unknown,
            AncestorSlot::Truncated => TreeSlot::Truncated,
        }
    };

    TreeNode {
        id: id.clone(),
        sire: slot_for(ParentType::Sire),
        dam: slot_for(ParentType::Dam),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sex;
    use crate::graph::test_support::{dog, graph_from};

    fn sample_graph(max_generations: usize) -> AncestorGraph {
        // Sire and dam share the grandsire "gs".
        graph_from(
            "pup",
            max_generations,
            vec![
                (dog("pup", Sex::Male, Some("s"), Some("d")), 0),
                (dog("s", Sex::Male, Some("gs"), None), 1),
                (dog("d", Sex::Female, Some("gs"), Some("gd")), 1),
                (dog("gs", Sex::Male, None, None), 2),
                (dog("gd", Sex::Female, None, None), 2),
            ],
        )
    }

    #[test]
    fn columns_have_power_of_two_widths() {
        let columns = generation_columns(&sample_graph(3));

        assert_eq!(columns.generations(), 4);
        for k in 0..4 {
            assert_eq!(columns.column(k).unwrap().len(), 1 << k, "column {k}");
        }
        assert!(columns.column(4).is_none());
    }

    #[test]
    fn zero_generation_layout_is_just_the_root() {
        let graph = graph_from(
            "pup",
            0,
            vec![(dog("pup", Sex::Male, Some("s"), Some("d")), 0)],
        );
        let columns = generation_columns(&graph);

        assert_eq!(columns.generations(), 1);
        assert_eq!(
            columns.column(0).unwrap(),
            &[AncestorSlot::Dog(DogId::new("pup"))]
        );
    }

    #[test]
    fn placeholders_propagate_to_descendant_slots() {
        let columns = generation_columns(&sample_graph(3));

        // Column 2: [s.sire=gs, s.dam=Unknown, d.sire=gs, d.dam=gd].
        let column2 = columns.column(2).unwrap();
        assert_eq!(column2[0], AncestorSlot::Dog(DogId::new("gs")));
        assert_eq!(column2[1], AncestorSlot::Unknown);
        assert_eq!(column2[2], AncestorSlot::Dog(DogId::new("gs")));
        assert_eq!(column2[3], AncestorSlot::Dog(DogId::new("gd")));

        // Column 3: slots under the unknown slot stay unknown, keeping the
        // column at full width.
        let column3 = columns.column(3).unwrap();
        assert_eq!(column3.len(), 8);
        assert_eq!(column3[2], AncestorSlot::Unknown);
        assert_eq!(column3[3], AncestorSlot::Unknown);
    }

    #[test]
    fn tree_mirrors_slot_semantics() {
        let tree = pedigree_tree(&sample_graph(2));

        assert_eq!(tree.id, DogId::new("pup"));
        let TreeSlot::Dog(sire) = &tree.sire else {
            panic!("sire is resolved");
        };
        assert_eq!(sire.id, DogId::new("s"));
        let TreeSlot::Dog(sire_gs) = &sire.sire else {
            panic!("grandsire is resolved");
        };
        assert_eq!(sire_gs.id, DogId::new("gs"));
        assert_eq!(sire.dam, TreeSlot::Unknown);
    }

    #[test]
    fn shared_ancestor_resolves_to_one_graph_entry() {
        let graph = sample_graph(3);
        let columns = generation_columns(&graph);
        let tree = pedigree_tree(&graph);

        // The shared grandsire occupies two column slots and two tree
        // positions, but all four resolve to the same record in the graph.
        let column2 = columns.column(2).unwrap();
        let from_columns = column2[0].dog_id().and_then(|id| graph.node(id)).unwrap();

        let TreeSlot::Dog(sire) = &tree.sire else {
            panic!("sire is resolved");
        };
        let TreeSlot::Dog(via_tree) = &sire.sire else {
            panic!("grandsire is resolved");
        };
        let from_tree = graph.node(&via_tree.id).unwrap();

        assert!(std::ptr::eq(from_columns, from_tree));
    }

    #[test]
    fn bound_shorter_than_pedigree_truncates_tree_leaves() {
        let graph = graph_from(
            "pup",
            1,
            vec![
                (dog("pup", Sex::Male, Some("s"), None), 0),
                (dog("s", Sex::Male, Some("gs"), None), 1),
            ],
        );
        // The builder would flag "s" at the bound; mirror that here.
        let mut graph = graph;
        graph.mark_truncated(&DogId::new("s"));

        let tree = pedigree_tree(&graph);
        let TreeSlot::Dog(sire) = &tree.sire else {
            panic!("sire is resolved");
        };
        assert_eq!(sire.sire, TreeSlot::Truncated);
        assert_eq!(tree.dam, TreeSlot::Unknown);
    }
}
