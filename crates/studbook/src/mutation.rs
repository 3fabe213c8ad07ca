//! Validated, roll-backable pedigree mutations.
//!
//! All edits to a chart's ancestor graph go through
//! [`PedigreeMutationCoordinator`]. Every mutation moves through a fixed
//! sequence of states:
//!
//! 1. `Validating`: all checks run against the untouched graph; any
//!    rejection leaves it byte-for-byte unchanged
//! 2. `Applying`: the graph is updated in memory, with enough prior state
//!    captured for an exact reversal
//! 3. `Persisting`: the change is written through the [`PedigreeStore`]
//! 4. `Committed` on success (revision bumped, caches invalidated), or
//!    `RolledBack` when persistence fails (the captured state is restored
//!    and the persistence error propagates)
//!
//! The optimistic order means readers between apply and commit already see
//! the new shape; a rollback snaps them back to exactly the pre-mutation
//! graph.

use crate::domain::{DogId, DogNode, NewParent, ParentType, ParentUpdate};
use crate::error::{Error, Result, ValidationError};
use crate::graph::AncestorGraph;
use crate::registry::{IdGenerator, PedigreeStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Phase a mutation is in, recorded on receipts and state logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Checks are running; nothing has changed yet.
    Validating,

    /// The in-memory graph is being updated.
    Applying,

    /// The change is being written to the backing store.
    Persisting,

    /// The change is durable and visible; the graph revision was bumped.
    Committed,

    /// Persistence failed and the in-memory change was reversed.
    RolledBack,
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::Persisting => "persisting",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    /// The dog whose parent slot was mutated.
    pub dog: DogId,

    /// Which parent slot was mutated.
    pub parent_type: ParentType,

    /// The dog now occupying that slot.
    pub parent: DogId,

    /// ID of a freshly created ancestor record, when the mutation created
    /// one rather than linking an existing dog.
    pub created: Option<DogId>,

    /// Final state; always [`MutationState::Committed`] on the `Ok` path.
    pub state: MutationState,

    /// Whether anything actually changed. An edit that matched the
    /// existing record commits as a no-op without touching the store or
    /// the revision.
    pub changed: bool,
}

/// Captured pre-mutation state for exact rollback of an `add_parent`.
struct AddRollback {
    prior_parent: Option<DogId>,
    inserted_node: Option<DogId>,
    was_rejected: bool,
}

/// Coordinator applying validated mutations to a graph and its store.
pub struct PedigreeMutationCoordinator {
    store: Arc<dyn PedigreeStore>,
    id_generator: IdGenerator,
}

impl PedigreeMutationCoordinator {
    /// Create a coordinator writing through `store`.
    ///
    /// `id_generator` should have all known registry IDs registered so
    /// that freshly created ancestors never collide.
    pub fn new(store: Arc<dyn PedigreeStore>, id_generator: IdGenerator) -> Self {
        Self {
            store,
            id_generator,
        }
    }

    /// Set a parent slot of `dog_id`, creating or linking the ancestor.
    ///
    /// When `new_parent.id` names a dog already in the graph, that dog is
    /// linked; otherwise a new record is created (with a generated ID if
    /// none was supplied). An occupied slot is overwritten; the previous
    /// parent record itself is left in place.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when a check fails (graph unchanged),
    /// [`Error::DogNotFound`] when `dog_id` is not in the graph, or
    /// [`Error::Persistence`] when the store write fails (graph rolled
    /// back).
    pub async fn add_parent(
        &mut self,
        graph: &mut AncestorGraph,
        dog_id: &DogId,
        parent_type: ParentType,
        new_parent: NewParent,
    ) -> Result<MutationReceipt> {
        debug!(dog = %dog_id, %parent_type, state = %MutationState::Validating, "add parent");
        let child = graph
            .node(dog_id)
            .ok_or_else(|| Error::DogNotFound(dog_id.clone()))?;
        let child_depth = graph.depth_of(dog_id).unwrap_or(0);

        let expected = parent_type.expected_sex();
        if new_parent.sex != expected {
            return Err(ValidationError::SexMismatch {
                dog: dog_id.clone(),
                parent_type,
                expected,
                actual: new_parent.sex,
            }
            .into());
        }

        // Resolve what we are linking: an existing graph node or a record
        // to create.
        let (parent_id, node_to_create) = match &new_parent.id {
            Some(id) => {
                if id == dog_id {
                    return Err(ValidationError::SelfParent {
                        dog: dog_id.clone(),
                    }
                    .into());
                }
                if let Some(existing) = graph.node(id) {
                    if existing.sex != expected {
                        return Err(ValidationError::SexMismatch {
                            dog: dog_id.clone(),
                            parent_type,
                            expected,
                            actual: existing.sex,
                        }
                        .into());
                    }
                    if graph.would_create_cycle(dog_id, id) {
                        return Err(ValidationError::WouldCreateCycle {
                            dog: dog_id.clone(),
                            parent: id.clone(),
                        }
                        .into());
                    }
                    (id.clone(), None)
                } else {
                    (id.clone(), Some(new_parent.clone()))
                }
            }
            None => {
                let id = self.id_generator.generate(
                    &new_parent.name,
                    &new_parent.breed,
                    new_parent.registration_number.as_deref(),
                )?;
                (id, Some(new_parent.clone()))
            }
        };

        if child.parent_ref(parent_type.other()) == Some(&parent_id) {
            return Err(ValidationError::SameSireAndDam {
                dog: dog_id.clone(),
            }
            .into());
        }

        // Apply in memory, capturing everything needed to reverse.
        debug!(dog = %dog_id, %parent_type, state = %MutationState::Applying, "add parent");
        let rollback = AddRollback {
            prior_parent: child.parent_ref(parent_type).cloned(),
            inserted_node: node_to_create.as_ref().map(|_| parent_id.clone()),
            was_rejected: graph.is_rejected(dog_id, parent_type),
        };

        let created_node = node_to_create.map(|p| materialize(parent_id.clone(), p));
        if let Some(node) = &created_node {
            graph.insert_node(node.clone(), child_depth + 1);
        }
        graph.clear_rejection(dog_id, parent_type);
        graph.set_parent(dog_id, parent_type, Some(parent_id.clone()));

        // Persist; reverse the in-memory change on failure.
        debug!(dog = %dog_id, %parent_type, state = %MutationState::Persisting, "add parent");
        let persisted = self
            .persist_add(dog_id, parent_type, &parent_id, created_node.as_ref())
            .await;
        if let Err(e) = persisted {
            warn!(
                dog = %dog_id,
                %parent_type,
                state = %MutationState::RolledBack,
                error = %e,
                "add parent persistence failed"
            );
            graph.set_parent(dog_id, parent_type, rollback.prior_parent);
            if let Some(inserted) = rollback.inserted_node {
                graph.remove_node(&inserted);
            }
            if rollback.was_rejected {
                graph.restore_rejection(dog_id.clone(), parent_type);
            }
            return Err(as_persistence(e));
        }

        graph.bump_revision();
        debug!(
            dog = %dog_id,
            %parent_type,
            parent = %parent_id,
            state = %MutationState::Committed,
            "add parent"
        );
        Ok(MutationReceipt {
            dog: dog_id.clone(),
            parent_type,
            parent: parent_id,
            created: created_node.map(|n| n.id),
            state: MutationState::Committed,
            changed: true,
        })
    }

    /// Apply a partial update to the ancestor occupying a parent slot.
    ///
    /// An update identical to the current record (including an empty
    /// update) commits as a no-op: nothing is persisted and the revision
    /// is not bumped, so applying the same edit twice is safe.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] with [`ValidationError::NoSuchParent`] when
    /// the slot holds no resolved ancestor, [`Error::DogNotFound`] when
    /// `dog_id` is not in the graph, or [`Error::Persistence`] when the
    /// store write fails (graph rolled back).
    pub async fn edit_parent(
        &mut self,
        graph: &mut AncestorGraph,
        dog_id: &DogId,
        parent_type: ParentType,
        update: ParentUpdate,
    ) -> Result<MutationReceipt> {
        debug!(dog = %dog_id, %parent_type, state = %MutationState::Validating, "edit parent");
        if !graph.contains(dog_id) {
            return Err(Error::DogNotFound(dog_id.clone()));
        }
        let Some(parent_id) = graph.parent_slot(dog_id, parent_type).dog_id().cloned() else {
            return Err(ValidationError::NoSuchParent {
                dog: dog_id.clone(),
                parent_type,
            }
            .into());
        };
        // Slot resolution guarantees presence.
        let Some(prior) = graph.node(&parent_id).cloned() else {
            return Err(Error::DogNotFound(parent_id));
        };

        let mut updated = prior.clone();
        update.apply_to(&mut updated);
        if updated == prior {
            debug!(
                dog = %dog_id,
                %parent_type,
                parent = %parent_id,
                "edit parent matched existing record; no-op commit"
            );
            return Ok(MutationReceipt {
                dog: dog_id.clone(),
                parent_type,
                parent: parent_id,
                created: None,
                state: MutationState::Committed,
                changed: false,
            });
        }
        updated.updated_at = Utc::now();

        debug!(dog = %dog_id, %parent_type, state = %MutationState::Applying, "edit parent");
        let depth = graph.depth_of(&parent_id).unwrap_or(0);
        graph.insert_node(updated.clone(), depth);

        debug!(dog = %dog_id, %parent_type, state = %MutationState::Persisting, "edit parent");
        if let Err(e) = self.store.update_dog(&updated).await {
            warn!(
                dog = %dog_id,
                %parent_type,
                state = %MutationState::RolledBack,
                error = %e,
                "edit parent persistence failed"
            );
            graph.insert_node(prior, depth);
            return Err(as_persistence(e));
        }

        graph.bump_revision();
        debug!(
            dog = %dog_id,
            %parent_type,
            parent = %parent_id,
            state = %MutationState::Committed,
            "edit parent"
        );
        Ok(MutationReceipt {
            dog: dog_id.clone(),
            parent_type,
            parent: parent_id,
            created: None,
            state: MutationState::Committed,
            changed: true,
        })
    }

    async fn persist_add(
        &self,
        dog_id: &DogId,
        parent_type: ParentType,
        parent_id: &DogId,
        created: Option<&DogNode>,
    ) -> Result<()> {
        if let Some(node) = created {
            self.store.create_dog(node).await?;
        }
        self.store
            .update_dog_parent(dog_id, parent_type, Some(parent_id))
            .await
    }
}

/// Build the stored record for a freshly created ancestor.
fn materialize(id: DogId, p: NewParent) -> DogNode {
    let now = Utc::now();
    DogNode {
        id,
        name: p.name,
        sex: p.sex,
        breed: p.breed,
        date_of_birth: p.date_of_birth,
        sire_id: None,
        dam_id: None,
        champion: p.champion,
        health_tested: p.health_tested,
        registration_number: p.registration_number,
        owner_id: p.owner_id,
        owner_name: p.owner_name,
        created_at: now,
        updated_at: now,
    }
}

/// Normalize a store failure into the persistence variant callers match
/// on. Store-reported not-found and validation errors pass through.
fn as_persistence(e: Error) -> Error {
    match e {
        e @ (Error::DogNotFound(_) | Error::Validation(_)) => e,
        Error::Io(io) => Error::Persistence {
            message: io.to_string(),
            retryable: true,
        },
        other => Error::Persistence {
            message: other.to_string(),
            retryable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sex;
    use crate::graph::test_support::{dog, graph_from};
    use crate::graph::AncestorSlot;
    use crate::registry::InMemoryRegistry;
    use async_trait::async_trait;

    fn new_parent(id: Option<&str>, sex: Sex) -> NewParent {
        NewParent {
            id: id.map(DogId::new),
            name: "Ancestor".to_string(),
            sex,
            breed: "Whippet".to_string(),
            date_of_birth: None,
            champion: false,
            health_tested: false,
            registration_number: None,
            owner_id: None,
            owner_name: None,
        }
    }

    fn sample_graph() -> AncestorGraph {
        graph_from(
            "pup",
            3,
            vec![
                (dog("pup", Sex::Male, Some("s"), None), 0),
                (dog("s", Sex::Male, None, None), 1),
            ],
        )
    }

    async fn coordinator_over(graph: &AncestorGraph) -> (PedigreeMutationCoordinator, InMemoryRegistry) {
        let registry = InMemoryRegistry::new("dog");
        let mut ids = IdGenerator::new("dog");
        for node in graph.nodes() {
            registry.insert_dog(node.clone()).await;
            ids.register_id(&node.id);
        }
        (
            PedigreeMutationCoordinator::new(Arc::new(registry.clone()), ids),
            registry,
        )
    }

    /// Store that fails every write, for rollback coverage.
    struct FailingStore;

    #[async_trait]
    impl crate::registry::PedigreeStore for FailingStore {
        async fn create_dog(&self, _dog: &DogNode) -> Result<()> {
            Err(Error::Registry("write refused".to_string()))
        }
        async fn update_dog(&self, _dog: &DogNode) -> Result<()> {
            Err(Error::Registry("write refused".to_string()))
        }
        async fn update_dog_parent(
            &self,
            _dog_id: &DogId,
            _parent_type: ParentType,
            _parent_id: Option<&DogId>,
        ) -> Result<()> {
            Err(Error::Registry("write refused".to_string()))
        }
    }

    #[tokio::test]
    async fn add_parent_creates_record_and_links_slot() {
        let mut graph = sample_graph();
        let (mut coordinator, registry) = coordinator_over(&graph).await;

        let receipt = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Dam,
                new_parent(None, Sex::Female),
            )
            .await
            .unwrap();

        assert_eq!(receipt.state, MutationState::Committed);
        assert!(receipt.changed);
        let created = receipt.created.expect("a record was created");
        assert_eq!(receipt.parent, created);
        assert_eq!(
            graph.parent_slot(&DogId::new("pup"), ParentType::Dam),
            AncestorSlot::Dog(created.clone())
        );
        assert_eq!(graph.depth_of(&created), Some(1));
        assert_eq!(graph.revision(), 1);

        // Both the new record and the link were persisted.
        use crate::registry::DogLookup;
        let stored = registry.fetch_dog(&created).await.unwrap().unwrap();
        assert_eq!(stored.sex, Sex::Female);
        let pup = registry.fetch_dog(&DogId::new("pup")).await.unwrap().unwrap();
        assert_eq!(pup.dam_id, Some(created));
    }

    #[tokio::test]
    async fn add_parent_links_existing_graph_node() {
        let mut graph = graph_from(
            "pup",
            3,
            vec![
                (dog("pup", Sex::Male, Some("s"), None), 0),
                (dog("s", Sex::Male, None, None), 1),
                (dog("gd", Sex::Female, None, None), 2),
            ],
        );
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let receipt = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("s"),
                ParentType::Dam,
                new_parent(Some("gd"), Sex::Female),
            )
            .await
            .unwrap();

        assert!(receipt.created.is_none());
        assert_eq!(
            graph.parent_slot(&DogId::new("s"), ParentType::Dam),
            AncestorSlot::Dog(DogId::new("gd"))
        );
    }

    #[tokio::test]
    async fn self_parent_is_rejected_with_graph_unchanged() {
        let mut graph = sample_graph();
        let before = format!("{graph:?}");
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let err = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Sire,
                new_parent(Some("pup"), Sex::Male),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::SelfParent { .. })
        ));
        assert_eq!(format!("{graph:?}"), before);
        assert_eq!(graph.revision(), 0);
    }

    #[tokio::test]
    async fn sex_mismatch_is_rejected() {
        let mut graph = sample_graph();
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let err = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Dam,
                new_parent(None, Sex::Male),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::SexMismatch {
                expected: Sex::Female,
                actual: Sex::Male,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn descendant_as_parent_is_rejected() {
        let mut graph = sample_graph();
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        // pup is a descendant of s; s cannot get pup as a sire.
        let err = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("s"),
                ParentType::Sire,
                new_parent(Some("pup"), Sex::Male),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::WouldCreateCycle { .. })
        ));
    }

    #[tokio::test]
    async fn same_dog_as_both_parents_is_rejected() {
        // pup's dam slot holds an unresolved reference "x"; linking "x"
        // into the sire slot as well must be refused.
        let mut graph = graph_from(
            "pup",
            3,
            vec![(dog("pup", Sex::Male, None, Some("x")), 0)],
        );
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let err = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Sire,
                new_parent(Some("x"), Sex::Male),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::SameSireAndDam { .. })
        ));
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_exactly() {
        let mut graph = sample_graph();
        let mut coordinator =
            PedigreeMutationCoordinator::new(Arc::new(FailingStore), IdGenerator::new("dog"));

        let before = format!("{graph:?}");
        let err = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Dam,
                new_parent(None, Sex::Female),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Persistence { .. }));
        // The optimistic insert and link are fully reversed.
        assert_eq!(format!("{graph:?}"), before);
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.parent_slot(&DogId::new("pup"), ParentType::Dam),
            AncestorSlot::Unknown
        );
        assert_eq!(graph.revision(), 0);
    }

    #[tokio::test]
    async fn edit_parent_applies_partial_update() {
        let mut graph = sample_graph();
        let (mut coordinator, registry) = coordinator_over(&graph).await;

        let receipt = coordinator
            .edit_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Sire,
                ParentUpdate {
                    champion: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(receipt.changed);
        assert!(graph.node(&DogId::new("s")).unwrap().champion);
        assert_eq!(graph.revision(), 1);

        use crate::registry::DogLookup;
        let stored = registry.fetch_dog(&DogId::new("s")).await.unwrap().unwrap();
        assert!(stored.champion);
    }

    #[tokio::test]
    async fn identical_edit_is_a_no_op_commit() {
        let mut graph = sample_graph();
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let update = ParentUpdate {
            champion: Some(true),
            ..Default::default()
        };
        let first = coordinator
            .edit_parent(&mut graph, &DogId::new("pup"), ParentType::Sire, update.clone())
            .await
            .unwrap();
        assert!(first.changed);
        let updated_at = graph.node(&DogId::new("s")).unwrap().updated_at;

        let second = coordinator
            .edit_parent(&mut graph, &DogId::new("pup"), ParentType::Sire, update)
            .await
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.state, MutationState::Committed);
        // No revision bump and no timestamp churn on the no-op.
        assert_eq!(graph.revision(), 1);
        assert_eq!(graph.node(&DogId::new("s")).unwrap().updated_at, updated_at);
    }

    #[tokio::test]
    async fn editing_an_empty_slot_is_rejected() {
        let mut graph = sample_graph();
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let err = coordinator
            .edit_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Dam,
                ParentUpdate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::NoSuchParent {
                parent_type: ParentType::Dam,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn edit_rollback_restores_prior_record() {
        let mut graph = sample_graph();
        let mut coordinator =
            PedigreeMutationCoordinator::new(Arc::new(FailingStore), IdGenerator::new("dog"));

        let err = coordinator
            .edit_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Sire,
                ParentUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(graph.node(&DogId::new("s")).unwrap().name, "S");
        assert_eq!(graph.revision(), 0);
    }

    #[tokio::test]
    async fn add_parent_overwrites_occupied_slot() {
        let mut graph = sample_graph();
        let (mut coordinator, _registry) = coordinator_over(&graph).await;

        let receipt = coordinator
            .add_parent(
                &mut graph,
                &DogId::new("pup"),
                ParentType::Sire,
                new_parent(None, Sex::Male),
            )
            .await
            .unwrap();

        let created = receipt.created.unwrap();
        assert_ne!(created, DogId::new("s"));
        assert_eq!(
            graph.parent_slot(&DogId::new("pup"), ParentType::Sire),
            AncestorSlot::Dog(created)
        );
    }
}
