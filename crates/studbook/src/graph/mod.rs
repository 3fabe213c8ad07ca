//! The shared ancestor graph.
//!
//! This module provides [`AncestorGraph`], the identity-preserving arena
//! that every other pedigree component works from:
//!
//! - nodes live in a single map keyed by [`DogId`]; an ancestor reachable
//!   through several lineage paths is one shared entry, never per-path
//!   copies
//! - parent references are stored as lookup keys on the nodes themselves
//! - a petgraph mirror of the child -> parent relation backs reachability
//!   queries (descendant-as-ancestor checks at mutation time)
//!
//! The graph is built fresh per chart session by
//! [`builder::build_ancestor_graph`], mutated in place by the mutation
//! coordinator, and discarded with the session.

pub mod builder;

use crate::domain::{DogId, DogNode, ParentType};
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What occupies an ancestor slot of the pedigree.
///
/// `Unknown` and `Truncated` are distinct, typed placeholders: an unknown
/// ancestor is explicitly absent (no reference recorded, the referenced
/// record does not exist, or the edge was rejected as cyclic), while a
/// truncated ancestor exists beyond the configured generation bound and was
/// deliberately not fetched. Neither is ever conflated with a rendering
/// layer's own loading or error states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorSlot {
    /// A resolved dog, present in the shared graph map.
    Dog(DogId),

    /// Explicitly no ancestor in this slot.
    Unknown,

    /// An ancestor exists but lies beyond the generation bound.
    Truncated,
}

impl AncestorSlot {
    /// The dog ID occupying the slot, if resolved.
    pub fn dog_id(&self) -> Option<&DogId> {
        match self {
            Self::Dog(id) => Some(id),
            Self::Unknown | Self::Truncated => None,
        }
    }
}

/// Non-fatal problems recorded while building or mutating the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// A parent edge would have revisited an ancestor already on the active
    /// lineage path; the edge was rejected and the slot reads as unknown.
    CycleDetected {
        /// The dog whose parent reference was rejected.
        child: DogId,
        /// The referenced parent.
        parent: DogId,
        /// Which slot held the rejected reference.
        parent_type: ParentType,
    },

    /// A referenced parent ID did not resolve in the registry; the slot
    /// reads as unknown.
    NotFound {
        /// The dog holding the dangling reference.
        child: DogId,
        /// The unresolvable parent ID.
        parent: DogId,
        /// Which slot held the dangling reference.
        parent_type: ParentType,
    },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycleDetected {
                child,
                parent,
                parent_type,
            } => write!(
                f,
                "rejected cyclic {parent_type} reference {child} -> {parent}"
            ),
            Self::NotFound {
                child,
                parent,
                parent_type,
            } => write!(f, "{parent_type} {parent} of {child} not found"),
        }
    }
}

/// Identity-preserving ancestor graph for one chart session.
///
/// Conceptually a DAG rooted at the query dog, with edges running
/// child -> parent via `sire_id`/`dam_id` lookup keys.
#[derive(Debug, Clone)]
pub struct AncestorGraph {
    /// The query dog this graph was built for.
    root: DogId,

    /// Generation bound the graph was built with.
    max_generations: usize,

    /// All resolved dogs, one shared entry per ID.
    nodes: HashMap<DogId, DogNode>,

    /// Generation depth at which each dog was first reached.
    depth: HashMap<DogId, usize>,

    /// Dogs whose own parents were deliberately not fetched because they
    /// sit at the generation bound.
    truncated: HashSet<DogId>,

    /// Parent edges rejected as cyclic, keyed by (child, slot).
    rejected_edges: HashSet<(DogId, ParentType)>,

    /// Non-fatal problems encountered so far.
    warnings: Vec<GraphWarning>,

    /// Mirror of the child -> parent relation for reachability queries.
    relation: DiGraph<DogId, ParentType>,

    /// Mapping from dog ID to its node index in `relation`.
    node_map: HashMap<DogId, NodeIndex>,

    /// Bumped on every committed mutation; derived views cache against it.
    revision: u64,
}

impl AncestorGraph {
    /// Create an empty graph for the given root and generation bound.
    pub(crate) fn new(root: DogId, max_generations: usize) -> Self {
        Self {
            root,
            max_generations,
            nodes: HashMap::new(),
            depth: HashMap::new(),
            truncated: HashSet::new(),
            rejected_edges: HashSet::new(),
            warnings: Vec::new(),
            relation: DiGraph::new(),
            node_map: HashMap::new(),
            revision: 0,
        }
    }

    /// The query dog this graph was built for.
    pub fn root(&self) -> &DogId {
        &self.root
    }

    /// The generation bound the graph was built with.
    pub fn max_generations(&self) -> usize {
        self.max_generations
    }

    /// Current mutation revision. Bumped on every committed mutation, so
    /// cached derived views (COI, layouts) can detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of resolved dogs in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no dogs at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a dog is present in the graph.
    pub fn contains(&self, id: &DogId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a dog by ID.
    pub fn node(&self, id: &DogId) -> Option<&DogNode> {
        self.nodes.get(id)
    }

    /// Iterate over all resolved dogs.
    pub fn nodes(&self) -> impl Iterator<Item = &DogNode> {
        self.nodes.values()
    }

    /// Iterate over all resolved dog IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = &DogId> {
        self.nodes.keys()
    }

    /// Generation depth at which a dog was first reached.
    pub fn depth_of(&self, id: &DogId) -> Option<usize> {
        self.depth.get(id).copied()
    }

    /// Whether a dog sits at the generation bound with unfetched parents.
    pub fn is_truncated(&self, id: &DogId) -> bool {
        self.truncated.contains(id)
    }

    /// Warnings recorded while building or mutating the graph.
    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    /// Resolve what occupies the given parent slot of `child`.
    ///
    /// Rejected (cyclic) references and references to records that never
    /// resolved read as [`AncestorSlot::Unknown`]; references held by a
    /// depth-truncated node read as [`AncestorSlot::Truncated`].
    pub fn parent_slot(&self, child: &DogId, parent_type: ParentType) -> AncestorSlot {
        if self.rejected_edges.contains(&(child.clone(), parent_type)) {
            return AncestorSlot::Unknown;
        }
        let Some(node) = self.nodes.get(child) else {
            return AncestorSlot::Unknown;
        };
        match node.parent_ref(parent_type) {
            None => AncestorSlot::Unknown,
            Some(parent_id) => {
                // Truncation wins even when the referenced dog happens to be
                // in the map through another lineage: the builder never
                // cycle-checked edges at the bound, so they must not resolve.
                if self.truncated.contains(child) {
                    AncestorSlot::Truncated
                } else if self.nodes.contains_key(parent_id) {
                    AncestorSlot::Dog(parent_id.clone())
                } else {
                    // Reference that never resolved (NotFound during build).
                    AncestorSlot::Unknown
                }
            }
        }
    }

    /// Whether linking `parent` into a parent slot of `child` would make
    /// `child` its own ancestor.
    ///
    /// True when the two are the same dog, or when `child` is already
    /// reachable from `parent` along child -> parent edges (i.e. `parent`
    /// is a descendant of `child`). A `parent` not present in the graph
    /// can never close a cycle.
    pub fn would_create_cycle(&self, child: &DogId, parent: &DogId) -> bool {
        if child == parent {
            return true;
        }
        match (self.node_map.get(parent), self.node_map.get(child)) {
            (Some(&parent_node), Some(&child_node)) => {
                algo::has_path_connecting(&self.relation, parent_node, child_node, None)
            }
            _ => false,
        }
    }

    // ========== Crate-internal mutators ==========
    //
    // The builder and the mutation coordinator are the only writers; all
    // external mutation goes through the coordinator's validated,
    // roll-backable operations.

    /// Insert or overwrite a node, recording the depth of first sighting.
    pub(crate) fn insert_node(&mut self, node: DogNode, depth: usize) {
        let id = node.id.clone();
        if !self.node_map.contains_key(&id) {
            let idx = self.relation.add_node(id.clone());
            self.node_map.insert(id.clone(), idx);
        }
        self.depth.entry(id.clone()).or_insert(depth);
        self.nodes.insert(id, node);
    }

    /// Remove a node and its edges entirely.
    ///
    /// Used only to roll back an optimistic insert. Repairs the petgraph
    /// index map, since `remove_node` swaps the last node into the freed
    /// index.
    pub(crate) fn remove_node(&mut self, id: &DogId) {
        self.nodes.remove(id);
        self.depth.remove(id);
        self.truncated.remove(id);
        if let Some(idx) = self.node_map.remove(id) {
            self.relation.remove_node(idx);
            if let Some(moved) = self.relation.node_weight(idx) {
                self.node_map.insert(moved.clone(), idx);
            }
        }
    }

    /// Mirror an accepted child -> parent edge into the relation graph.
    ///
    /// Both endpoints must already be present. At most one edge per
    /// (child, slot) exists; re-linking replaces the previous edge.
    pub(crate) fn link_parent(&mut self, child: &DogId, parent_type: ParentType, parent: &DogId) {
        let (Some(&child_idx), Some(&parent_idx)) =
            (self.node_map.get(child), self.node_map.get(parent))
        else {
            return;
        };
        self.unlink_parent_edge(child_idx, parent_type);
        self.relation.add_edge(child_idx, parent_idx, parent_type);
    }

    /// Set the child's stored parent reference and keep the relation
    /// mirror consistent. `None` clears both.
    pub(crate) fn set_parent(
        &mut self,
        child: &DogId,
        parent_type: ParentType,
        parent: Option<DogId>,
    ) {
        let Some(node) = self.nodes.get_mut(child) else {
            return;
        };
        node.set_parent_ref(parent_type, parent.clone());
        if let Some(&child_idx) = self.node_map.get(child) {
            self.unlink_parent_edge(child_idx, parent_type);
            if let Some(parent_id) = parent {
                if let Some(&parent_idx) = self.node_map.get(&parent_id) {
                    self.relation.add_edge(child_idx, parent_idx, parent_type);
                }
            }
        }
    }

    /// Remove the single (child, slot) edge from the relation mirror.
    fn unlink_parent_edge(&mut self, child_idx: NodeIndex, parent_type: ParentType) {
        let existing = self
            .relation
            .edges(child_idx)
            .find(|e| *e.weight() == parent_type)
            .map(|e| e.id());
        if let Some(edge) = existing {
            self.relation.remove_edge(edge);
        }
    }

    /// Flag a dog as depth-truncated.
    pub(crate) fn mark_truncated(&mut self, id: &DogId) {
        self.truncated.insert(id.clone());
    }

    /// Record a (child, slot) reference as rejected.
    pub(crate) fn reject_edge(&mut self, child: DogId, parent_type: ParentType) {
        self.rejected_edges.insert((child, parent_type));
    }

    /// Whether a (child, slot) reference is currently rejected.
    pub(crate) fn is_rejected(&self, child: &DogId, parent_type: ParentType) -> bool {
        self.rejected_edges.contains(&(child.clone(), parent_type))
    }

    /// Clear a rejection, e.g. when the slot is rewritten by a mutation.
    pub(crate) fn clear_rejection(&mut self, child: &DogId, parent_type: ParentType) {
        self.rejected_edges.remove(&(child.clone(), parent_type));
    }

    /// Re-record a rejection during rollback.
    pub(crate) fn restore_rejection(&mut self, child: DogId, parent_type: ParentType) {
        self.rejected_edges.insert((child, parent_type));
    }

    /// Attach a warning.
    pub(crate) fn push_warning(&mut self, warning: GraphWarning) {
        self.warnings.push(warning);
    }

    /// Mark a committed mutation, invalidating cached derived views.
    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }
}
