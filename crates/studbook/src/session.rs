//! Chart sessions: one graph, its derived views, and a liveness token.
//!
//! A [`ChartSession`] owns the ancestor graph built for one root dog, the
//! mutation coordinator that edits it, and revision-stamped caches of the
//! derived views (coefficient of inbreeding and both chart layouts). The
//! caches are recomputed lazily whenever the graph revision moved, so a
//! committed mutation invalidates everything derived at once and a
//! rolled-back one invalidates nothing.
//!
//! The session's [`SessionToken`] is shared with in-flight async work;
//! closing the session flips it, and pending fetch completions observe the
//! flip and discard themselves instead of mutating a dead session.

use crate::coi::{CoiEngine, CoiResult};
use crate::domain::{DisplayOptions, DogId, DogNode, NewParent, ParentType, ParentUpdate};
use crate::error::{Error, Result};
use crate::graph::builder::build_ancestor_graph;
use crate::graph::{AncestorGraph, GraphWarning};
use crate::layout::{generation_columns, pedigree_tree, GenerationColumns, TreeNode};
use crate::mutation::{MutationReceipt, PedigreeMutationCoordinator};
use crate::registry::{DogLookup, IdGenerator, PedigreeStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared liveness flag for one chart session.
///
/// Clones observe the same flag; async work holds a clone and checks it
/// after every await.
#[derive(Debug, Clone)]
pub struct SessionToken {
    live: Arc<AtomicBool>,
}

impl SessionToken {
    /// Create a live token.
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the owning session is still open.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark the session closed. Idempotent.
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Views derived from one graph revision.
struct CachedViews {
    revision: u64,
    coi: CoiResult,
    columns: GenerationColumns,
    tree: TreeNode,
}

/// Frozen export of a chart's state at one instant.
///
/// Holds its own copies; later session edits never show through.
#[derive(Debug, Clone)]
pub struct ChartSnapshot {
    /// The root dog of the chart.
    pub root: DogId,

    /// Graph revision the snapshot was taken at.
    pub revision: u64,

    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,

    /// Coefficient of inbreeding for the root.
    pub coi: CoiResult,

    /// Column-per-generation layout.
    pub columns: GenerationColumns,

    /// Recursive tree layout.
    pub tree: TreeNode,

    /// All dog records referenced by the layouts.
    pub nodes: HashMap<DogId, DogNode>,

    /// Build and mutation warnings accumulated so far.
    pub warnings: Vec<GraphWarning>,

    /// Display options in effect when the snapshot was taken.
    pub display: DisplayOptions,
}

/// An open pedigree chart for one root dog.
pub struct ChartSession {
    token: SessionToken,
    graph: AncestorGraph,
    coordinator: PedigreeMutationCoordinator,
    display: DisplayOptions,
    cache: Option<CachedViews>,
}

impl ChartSession {
    /// Build the ancestor graph for `root` and open a session over it.
    ///
    /// # Errors
    ///
    /// Fails when the root does not resolve or the registry errors; see
    /// [`build_ancestor_graph`].
    pub async fn open(
        lookup: &dyn DogLookup,
        store: Arc<dyn PedigreeStore>,
        id_generator: IdGenerator,
        root: &DogId,
        max_generations: usize,
        display: DisplayOptions,
    ) -> Result<Self> {
        let token = SessionToken::new();
        let graph = build_ancestor_graph(lookup, &token, root, max_generations).await?;
        debug!(%root, nodes = graph.len(), max_generations, "chart session opened");
        Ok(Self {
            token,
            graph,
            coordinator: PedigreeMutationCoordinator::new(store, id_generator),
            display,
            cache: None,
        })
    }

    /// A clone of the session's liveness token.
    pub fn token(&self) -> SessionToken {
        self.token.clone()
    }

    /// The underlying ancestor graph.
    pub fn graph(&self) -> &AncestorGraph {
        &self.graph
    }

    /// Current display options.
    pub fn display_options(&self) -> &DisplayOptions {
        &self.display
    }

    /// Replace the display options. Purely presentational; derived-view
    /// caches stay valid.
    pub fn set_display_options(&mut self, display: DisplayOptions) {
        self.display = display;
    }

    /// Coefficient of inbreeding for the root, cached per revision.
    pub fn coi(&mut self) -> &CoiResult {
        &self.views().coi
    }

    /// Column-per-generation layout, cached per revision.
    pub fn columns(&mut self) -> &GenerationColumns {
        &self.views().columns
    }

    /// Recursive tree layout, cached per revision.
    pub fn tree(&mut self) -> &TreeNode {
        &self.views().tree
    }

    /// Set a parent slot of a dog in this chart.
    ///
    /// See [`PedigreeMutationCoordinator::add_parent`] for semantics.
    pub async fn add_parent(
        &mut self,
        dog_id: &DogId,
        parent_type: ParentType,
        new_parent: NewParent,
    ) -> Result<MutationReceipt> {
        if !self.token.is_live() {
            return Err(Error::SessionClosed);
        }
        self.coordinator
            .add_parent(&mut self.graph, dog_id, parent_type, new_parent)
            .await
    }

    /// Edit the ancestor occupying a parent slot.
    ///
    /// See [`PedigreeMutationCoordinator::edit_parent`] for semantics.
    pub async fn edit_parent(
        &mut self,
        dog_id: &DogId,
        parent_type: ParentType,
        update: ParentUpdate,
    ) -> Result<MutationReceipt> {
        if !self.token.is_live() {
            return Err(Error::SessionClosed);
        }
        self.coordinator
            .edit_parent(&mut self.graph, dog_id, parent_type, update)
            .await
    }

    /// Take a frozen snapshot of the chart for export.
    pub fn snapshot(&mut self) -> ChartSnapshot {
        let display = self.display.clone();
        let warnings = self.graph.warnings().to_vec();
        let nodes = self
            .graph
            .nodes()
            .map(|n| (n.id.clone(), n.clone()))
            .collect();
        let root = self.graph.root().clone();
        let views = self.views();
        ChartSnapshot {
            root,
            revision: views.revision,
            generated_at: Utc::now(),
            coi: views.coi.clone(),
            columns: views.columns.clone(),
            tree: views.tree.clone(),
            nodes,
            warnings,
            display,
        }
    }

    /// Close the session, flipping the token for any in-flight work.
    pub fn close(&mut self) {
        self.token.close();
    }

    fn views(&mut self) -> &CachedViews {
        let revision = self.graph.revision();
        if self.cache.as_ref().map(|c| c.revision) != Some(revision) {
            self.cache = None;
        }
        let graph = &self.graph;
        self.cache.get_or_insert_with(|| {
            debug!(revision, "recomputing derived chart views");
            CachedViews {
                revision,
                coi: CoiEngine::new().compute(graph, graph.root()),
                columns: generation_columns(graph),
                tree: pedigree_tree(graph),
            }
        })
    }
}

impl Drop for ChartSession {
    fn drop(&mut self) {
        self.token.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coi::CoiValue;
    use crate::domain::Sex;
    use crate::graph::test_support::dog;
    use crate::registry::InMemoryRegistry;

    async fn open_session(dogs: Vec<DogNode>, root: &str, depth: usize) -> ChartSession {
        let registry = InMemoryRegistry::new("dog");
        let mut ids = IdGenerator::new("dog");
        for d in dogs {
            ids.register_id(&d.id);
            registry.insert_dog(d).await;
        }
        ChartSession::open(
            &registry,
            Arc::new(registry.clone()),
            ids,
            &DogId::new(root),
            depth,
            DisplayOptions::default(),
        )
        .await
        .unwrap()
    }

    fn full_sibling_litter() -> Vec<DogNode> {
        vec![
            dog("pup", Sex::Male, Some("s"), Some("d")),
            dog("s", Sex::Male, Some("gs"), Some("gd")),
            dog("d", Sex::Female, Some("gs"), Some("gd")),
            dog("gs", Sex::Male, None, None),
            dog("gd", Sex::Female, None, None),
        ]
    }

    #[tokio::test]
    async fn derived_views_reflect_committed_mutations() {
        let mut session = open_session(
            vec![
                dog("pup", Sex::Male, Some("s"), None),
                dog("s", Sex::Male, None, None),
            ],
            "pup",
            3,
        )
        .await;

        assert_eq!(session.coi().value, CoiValue::InsufficientData);

        session
            .add_parent(
                &DogId::new("pup"),
                ParentType::Dam,
                NewParent {
                    id: None,
                    name: "Dam".to_string(),
                    sex: Sex::Female,
                    breed: "Whippet".to_string(),
                    date_of_birth: None,
                    champion: false,
                    health_tested: false,
                    registration_number: None,
                    owner_id: None,
                    owner_name: None,
                },
            )
            .await
            .unwrap();

        // Cache was invalidated by the revision bump.
        match &session.coi().value {
            CoiValue::Coefficient(f) => assert_eq!(*f, 0.0),
            CoiValue::InsufficientData => panic!("both parents are now resolved"),
        }
        let columns = session.columns();
        assert_eq!(columns.column(1).map(<[_]>::len), Some(2));
    }

    #[tokio::test]
    async fn snapshot_is_frozen_against_later_edits() {
        let mut session = open_session(full_sibling_litter(), "pup", 3).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.root, DogId::new("pup"));
        assert_eq!(
            snapshot.coi.value.coefficient(),
            Some(0.25)
        );

        session
            .edit_parent(
                &DogId::new("pup"),
                ParentType::Sire,
                ParentUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The live view moved; the snapshot did not.
        assert_eq!(session.graph().node(&DogId::new("s")).unwrap().name, "Renamed");
        assert_eq!(snapshot.nodes[&DogId::new("s")].name, "S");
        assert_eq!(snapshot.revision, 0);
        assert_eq!(session.graph().revision(), 1);
    }

    #[tokio::test]
    async fn closed_session_rejects_mutations() {
        let mut session = open_session(full_sibling_litter(), "pup", 3).await;
        session.close();

        let err = session
            .edit_parent(
                &DogId::new("pup"),
                ParentType::Sire,
                ParentUpdate::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn dropping_the_session_flips_shared_tokens() {
        let session = open_session(full_sibling_litter(), "pup", 3).await;
        let token = session.token();
        assert!(token.is_live());

        drop(session);
        assert!(!token.is_live());
    }
}
