//! Breadth-first ancestor graph construction.
//!
//! The builder walks outward from the root dog one generation at a time.
//! Every unresolved parent ID needed at a given depth is fetched in a
//! single batched, concurrent round through the [`DogLookup`]
//! collaborator, so the number of registry round-trips is bounded by the
//! generation limit rather than by the (exponential) slot count.
//!
//! Previously-seen IDs are never refetched; they are linked by reference
//! into the shared map. A reference that fails to resolve degrades to an
//! unknown-ancestor placeholder plus a warning, and a reference that would
//! revisit the active lineage path is rejected with a cycle warning; in
//! both cases the rest of the build continues.

use super::{AncestorGraph, GraphWarning};
use crate::domain::{DogId, ParentType};
use crate::error::{Error, Result, ValidationError};
use crate::registry::DogLookup;
use crate::session::SessionToken;
use tracing::{debug, warn};

/// A parent edge waiting on a registry fetch.
struct PendingEdge {
    child: DogId,
    parent_type: ParentType,
    parent: DogId,
    /// Active lineage path root..=child, used for cycle rejection and to
    /// seed the parent's own path.
    path: Vec<DogId>,
}

/// Build the ancestor graph for `root_id`, bounded by `max_generations`.
///
/// Nodes at depth `max_generations` are recorded but their own parents are
/// not fetched; such nodes are flagged depth-truncated so downstream
/// consumers never mistake the bound for "no ancestor".
///
/// The `token` is checked after every await: if the hosting chart session
/// closed while a fetch was in flight, its completion is discarded and the
/// build aborts with [`Error::SessionClosed`] instead of applying stale
/// state.
///
/// # Errors
///
/// Returns [`Error::DogNotFound`] if the root itself does not resolve,
/// [`Error::SessionClosed`] on cancellation, or a registry error from the
/// lookup collaborator. Missing or cyclic *ancestor* references never fail
/// the build; they are recorded as warnings on the returned graph.
pub async fn build_ancestor_graph(
    lookup: &dyn DogLookup,
    token: &SessionToken,
    root_id: &DogId,
    max_generations: usize,
) -> Result<AncestorGraph> {
    let root = lookup.fetch_dog(root_id).await?;
    if !token.is_live() {
        return Err(Error::SessionClosed);
    }
    let root = root.ok_or_else(|| Error::DogNotFound(root_id.clone()))?;
    if root.sire_id.is_some() && root.sire_id == root.dam_id {
        // Data-integrity failure; reject up front rather than producing a
        // chart and coefficient over a nonsense pedigree.
        return Err(ValidationError::SameSireAndDam {
            dog: root_id.clone(),
        }
        .into());
    }

    let mut graph = AncestorGraph::new(root_id.clone(), max_generations);
    let root_has_parents = root.has_parent_refs();
    graph.insert_node(root, 0);

    if max_generations == 0 {
        if root_has_parents {
            graph.mark_truncated(root_id);
        }
        return Ok(graph);
    }

    // Frontier of (dog, active lineage path root..=dog) awaiting expansion.
    let mut frontier: Vec<(DogId, Vec<DogId>)> =
        vec![(root_id.clone(), vec![root_id.clone()])];

    for depth in 1..=max_generations {
        let mut pending: Vec<PendingEdge> = Vec::new();
        let mut need: Vec<DogId> = Vec::new();

        for (child, path) in frontier.drain(..) {
            for parent_type in [ParentType::Sire, ParentType::Dam] {
                let Some(parent) = graph
                    .node(&child)
                    .and_then(|n| n.parent_ref(parent_type))
                    .cloned()
                else {
                    continue;
                };

                if path.contains(&parent) {
                    warn!(%child, %parent, %parent_type, "rejecting cyclic parent reference");
                    graph.reject_edge(child.clone(), parent_type);
                    graph.push_warning(GraphWarning::CycleDetected {
                        child: child.clone(),
                        parent,
                        parent_type,
                    });
                    continue;
                }

                if graph.contains(&parent) {
                    // Shared ancestor: link by reference, never refetch.
                    // Reachability on the mirror catches cycles that arrive
                    // through a lineage other than this frontier's path.
                    if graph.would_create_cycle(&child, &parent) {
                        warn!(%child, %parent, %parent_type, "rejecting cyclic parent reference");
                        graph.reject_edge(child.clone(), parent_type);
                        graph.push_warning(GraphWarning::CycleDetected {
                            child: child.clone(),
                            parent,
                            parent_type,
                        });
                    } else {
                        graph.link_parent(&child, parent_type, &parent);
                    }
                    continue;
                }

                if !need.contains(&parent) {
                    need.push(parent.clone());
                }
                pending.push(PendingEdge {
                    child: child.clone(),
                    parent_type,
                    parent,
                    path: path.clone(),
                });
            }
        }

        if pending.is_empty() {
            break;
        }

        debug!(depth, fetches = need.len(), "fetching pedigree generation");
        let fetched = lookup.fetch_dogs(&need).await?;
        if !token.is_live() {
            debug!(depth, "session closed mid-build; discarding fetched generation");
            return Err(Error::SessionClosed);
        }

        for edge in pending {
            let position = need
                .iter()
                .position(|id| *id == edge.parent)
                .and_then(|i| fetched.get(i));
            match position {
                Some(Some(node)) => {
                    if !graph.contains(&edge.parent) {
                        graph.insert_node(node.clone(), depth);
                        if depth == max_generations && node.has_parent_refs() {
                            graph.mark_truncated(&edge.parent);
                        }
                        let mut parent_path = edge.path.clone();
                        parent_path.push(edge.parent.clone());
                        frontier.push((edge.parent.clone(), parent_path));
                    }
                    graph.link_parent(&edge.child, edge.parent_type, &edge.parent);
                }
                _ => {
                    warn!(
                        child = %edge.child,
                        parent = %edge.parent,
                        parent_type = %edge.parent_type,
                        "ancestor reference did not resolve"
                    );
                    graph.push_warning(GraphWarning::NotFound {
                        child: edge.child,
                        parent: edge.parent,
                        parent_type: edge.parent_type,
                    });
                }
            }
        }

        if depth == max_generations {
            break;
        }
    }

    debug!(
        root = %root_id,
        nodes = graph.len(),
        warnings = graph.warnings().len(),
        "ancestor graph built"
    );
    Ok(graph)
}
