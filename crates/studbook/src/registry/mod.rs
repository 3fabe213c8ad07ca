//! Registry collaborators for pedigree operations.
//!
//! Two seams separate the analysis core from the backing registry:
//!
//! - [`DogLookup`]: read-only record fetches used by the graph builder
//! - [`PedigreeStore`]: durable writes used by the mutation coordinator
//!
//! [`InMemoryRegistry`] implements both over an in-memory map with
//! optional JSONL file persistence, and is the backend the CLI runs on.

mod id_generation;
mod in_memory;

pub use id_generation::IdGenerator;
pub use in_memory::{InMemoryRegistry, LoadWarning};

use crate::domain::{DogId, DogNode, ParentType};
use crate::error::Result;
use async_trait::async_trait;
use futures::future::join_all;

/// Read-only access to dog records.
#[async_trait]
pub trait DogLookup: Send + Sync {
    /// Fetch a single dog by ID. `Ok(None)` means the record does not
    /// exist; errors are reserved for backend failures.
    async fn fetch_dog(&self, id: &DogId) -> Result<Option<DogNode>>;

    /// Fetch a batch of dogs concurrently, preserving input order.
    ///
    /// The default implementation issues the single-record fetches
    /// concurrently; backends with a native batch query should override it.
    async fn fetch_dogs(&self, ids: &[DogId]) -> Result<Vec<Option<DogNode>>> {
        let fetches = ids.iter().map(|id| self.fetch_dog(id));
        join_all(fetches).await.into_iter().collect()
    }
}

/// Durable writes for pedigree mutations.
///
/// The mutation coordinator applies changes to the in-memory graph first
/// and then persists through this trait; a persistence failure triggers an
/// exact in-memory rollback.
#[async_trait]
pub trait PedigreeStore: Send + Sync {
    /// Create a new dog record.
    async fn create_dog(&self, dog: &DogNode) -> Result<()>;

    /// Overwrite an existing dog record.
    async fn update_dog(&self, dog: &DogNode) -> Result<()>;

    /// Set or clear one parent reference of an existing dog.
    async fn update_dog_parent(
        &self,
        dog_id: &DogId,
        parent_type: ParentType,
        parent_id: Option<&DogId>,
    ) -> Result<()>;
}
