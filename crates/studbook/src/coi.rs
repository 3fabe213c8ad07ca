//! Wright's coefficient of inbreeding over the ancestor graph.
//!
//! The coefficient for a dog sums, over every ancestor shared between the
//! sire's lineage and the dam's lineage, the term
//! `(1/2)^(n1 + n2 + 1) * (1 + F_A)` for each pair of a sire-side path of
//! length `n1` and a dam-side path of length `n2` reaching that ancestor,
//! where `F_A` is the shared ancestor's own coefficient. A pair only counts
//! when the common ancestor is the sole animal the two paths share; a pair
//! meeting again at a nearer animal is already covered by that animal's own
//! term (and by the `(1 + F_A)` factor when the overlap lies behind it).
//!
//! Two conventions keep the result well-defined on partial pedigrees:
//!
//! - an ancestor with unknown or truncated parentage is treated as
//!   non-inbred (`F_A = 0`); the bounded graph can only *understate* the
//!   true coefficient, never overstate it
//! - a dog whose own sire or dam is unresolved gets an explicit
//!   insufficient-data result, not a silent 0.0, since "we cannot tell"
//!   and "provably outcrossed" mean different things to a breeder
//!
//! Both path enumeration and per-ancestor coefficients are memoized, so
//! recomputing after a mutation touches only what the dense pedigree
//! actually shares.

use crate::domain::{DogId, ParentType};
use crate::graph::{AncestorGraph, AncestorSlot};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// The computed coefficient, or the reason there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum CoiValue {
    /// Wright's coefficient, clamped to `[0.0, 1.0]`.
    Coefficient(f64),

    /// The dog's sire or dam is unknown or beyond the generation bound;
    /// no meaningful coefficient exists.
    InsufficientData,
}

impl CoiValue {
    /// The numeric coefficient, if one was computed.
    pub fn coefficient(&self) -> Option<f64> {
        match self {
            Self::Coefficient(f) => Some(*f),
            Self::InsufficientData => None,
        }
    }
}

/// One contributing path pair through a shared ancestor.
///
/// Kept per (ancestor, sire-path length, dam-path length) combination so
/// a caller can explain exactly where a coefficient comes from; multiple
/// distinct paths of the same length fold their multiplicity into the
/// contribution value.
#[derive(Debug, Clone, PartialEq)]
pub struct CoiContribution {
    /// The shared ancestor.
    pub ancestor: DogId,

    /// Path length from the sire to the ancestor (0 = the sire itself).
    pub sire_path_len: usize,

    /// Path length from the dam to the ancestor (0 = the dam itself).
    pub dam_path_len: usize,

    /// Contribution of this path pair, `(1 + F_A)` applied and path
    /// multiplicity folded in.
    pub contribution: f64,
}

/// Result of a coefficient-of-inbreeding computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoiResult {
    /// The dog the coefficient was computed for.
    pub dog: DogId,

    /// The coefficient, or the insufficient-data marker.
    pub value: CoiValue,

    /// Contributing path pairs, largest first. Empty when the value is
    /// insufficient data or the lineages share no ancestor.
    pub contributions: Vec<CoiContribution>,

    /// Whether any reachable ancestor sits at the generation bound with
    /// unfetched parents. A truncated pedigree can only understate the
    /// true coefficient.
    pub depth_truncated: bool,
}

/// Memoizing coefficient calculator over one graph revision.
///
/// The memo tables key on dog IDs within a single [`AncestorGraph`]
/// snapshot; after a committed mutation, build a fresh engine (the chart
/// session does this automatically via revision stamps).
#[derive(Debug, Default)]
pub struct CoiEngine {
    /// Memoized coefficient per dog.
    f_memo: HashMap<DogId, f64>,

    /// Memoized ancestor path lists per dog. Each path runs from the dog
    /// itself (first element) to one of its ancestors (last element), with
    /// one entry per distinct route, so an ancestor reachable twice at the
    /// same depth appears twice.
    path_memo: HashMap<DogId, Rc<Vec<Vec<DogId>>>>,
}

impl CoiEngine {
    /// Create an engine with empty memo tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the coefficient of inbreeding for `dog`.
    ///
    /// A dog absent from the graph, or one whose sire or dam slot is not a
    /// resolved ancestor, yields [`CoiValue::InsufficientData`].
    pub fn compute(&mut self, graph: &AncestorGraph, dog: &DogId) -> CoiResult {
        let sire_slot = graph.parent_slot(dog, ParentType::Sire);
        let dam_slot = graph.parent_slot(dog, ParentType::Dam);
        let (sire, dam) = match (sire_slot, dam_slot) {
            (AncestorSlot::Dog(sire), AncestorSlot::Dog(dam)) => (sire, dam),
            (sire_slot, dam_slot) => {
                return CoiResult {
                    dog: dog.clone(),
                    value: CoiValue::InsufficientData,
                    contributions: Vec::new(),
                    depth_truncated: sire_slot == AncestorSlot::Truncated
                        || dam_slot == AncestorSlot::Truncated,
                }
            }
        };

        let sire_paths = self.ancestor_paths(graph, &sire);
        let dam_paths = self.ancestor_paths(graph, &dam);
        let depth_truncated = sire_paths
            .iter()
            .chain(dam_paths.iter())
            .filter_map(|path| path.last())
            .any(|ancestor| graph.is_truncated(ancestor));

        let mut contributions = self.shared_ancestor_terms(graph, &sire, &dam);
        contributions.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ancestor.as_str().cmp(b.ancestor.as_str()))
                .then_with(|| (a.sire_path_len, a.dam_path_len).cmp(&(b.sire_path_len, b.dam_path_len)))
        });
        let total: f64 = contributions.iter().map(|c| c.contribution).sum();
        let total = total.min(1.0);

        debug!(
            %dog,
            coefficient = total,
            path_pairs = contributions.len(),
            depth_truncated,
            "computed coefficient of inbreeding"
        );
        CoiResult {
            dog: dog.clone(),
            value: CoiValue::Coefficient(total),
            contributions,
            depth_truncated,
        }
    }

    /// Contributing (ancestor, n1, n2) path pairs for an offspring of
    /// `sire` and `dam`, with `(1 + F_A)` applied.
    ///
    /// A sire-side/dam-side path pair counts only when the common ancestor
    /// is the sole animal the two paths share. A pair meeting again at a
    /// nearer animal would recount identity-by-descent already carried by
    /// that animal's own term.
    fn shared_ancestor_terms(
        &mut self,
        graph: &AncestorGraph,
        sire: &DogId,
        dam: &DogId,
    ) -> Vec<CoiContribution> {
        let sire_paths = self.ancestor_paths(graph, sire);
        let dam_paths = self.ancestor_paths(graph, dam);

        // Multiplicity per (ancestor, n1, n2) over the qualifying pairs.
        let mut counts: HashMap<(&DogId, usize, usize), usize> = HashMap::new();
        for sire_path in sire_paths.iter() {
            for dam_path in dam_paths.iter() {
                let (Some(ancestor), Some(dam_ancestor)) =
                    (sire_path.last(), dam_path.last())
                else {
                    continue;
                };
                if ancestor != dam_ancestor || !meet_only_at_ancestor(sire_path, dam_path) {
                    continue;
                }
                *counts
                    .entry((ancestor, sire_path.len() - 1, dam_path.len() - 1))
                    .or_insert(0) += 1;
            }
        }

        let mut terms = Vec::with_capacity(counts.len());
        for ((ancestor, n1, n2), count) in counts {
            let base = 0.5_f64.powi((n1 + n2 + 1) as i32);
            let f_ancestor = self.coefficient_of(graph, ancestor);
            terms.push(CoiContribution {
                ancestor: ancestor.clone(),
                sire_path_len: n1,
                dam_path_len: n2,
                contribution: count as f64 * base * (1.0 + f_ancestor),
            });
        }
        terms
    }

    /// Memoized numeric coefficient, applying the F = 0 convention for
    /// unknown or truncated parentage.
    fn coefficient_of(&mut self, graph: &AncestorGraph, dog: &DogId) -> f64 {
        if let Some(&f) = self.f_memo.get(dog) {
            return f;
        }
        // Placeholder first, so corrupt data that slipped past cycle
        // rejection terminates instead of recursing forever.
        self.f_memo.insert(dog.clone(), 0.0);

        let f = match (
            graph.parent_slot(dog, ParentType::Sire),
            graph.parent_slot(dog, ParentType::Dam),
        ) {
            (AncestorSlot::Dog(sire), AncestorSlot::Dog(dam)) => self
                .shared_ancestor_terms(graph, &sire, &dam)
                .iter()
                .map(|c| c.contribution)
                .sum::<f64>()
                .min(1.0),
            _ => 0.0,
        };
        self.f_memo.insert(dog.clone(), f);
        f
    }

    /// All lineage paths from `dog` to each reachable ancestor, including
    /// the trivial path to `dog` itself, with one entry per distinct route.
    fn ancestor_paths(&mut self, graph: &AncestorGraph, dog: &DogId) -> Rc<Vec<Vec<DogId>>> {
        if let Some(paths) = self.path_memo.get(dog) {
            return Rc::clone(paths);
        }

        let mut paths = vec![vec![dog.clone()]];
        for parent_type in [ParentType::Sire, ParentType::Dam] {
            if let AncestorSlot::Dog(parent) = graph.parent_slot(dog, parent_type) {
                let parent_paths = self.ancestor_paths(graph, &parent);
                for tail in parent_paths.iter() {
                    let mut path = Vec::with_capacity(tail.len() + 1);
                    path.push(dog.clone());
                    path.extend(tail.iter().cloned());
                    paths.push(path);
                }
            }
        }

        let paths = Rc::new(paths);
        self.path_memo.insert(dog.clone(), Rc::clone(&paths));
        paths
    }
}

/// Whether the only animal two lineage paths share is their final, common
/// ancestor. Path heads are the sire and dam themselves, so a parent who is
/// also a deeper ancestor on the other side is handled here too.
fn meet_only_at_ancestor(sire_path: &[DogId], dam_path: &[DogId]) -> bool {
    let (Some((_, sire_body)), Some((_, dam_body))) =
        (sire_path.split_last(), dam_path.split_last())
    else {
        return false;
    };
    sire_body.iter().all(|id| !dam_body.contains(id))
}
