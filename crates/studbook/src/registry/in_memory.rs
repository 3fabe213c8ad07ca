//! In-memory registry backend with JSONL persistence.
//!
//! Dog records live in a map behind an async mutex; the whole registry can
//! be loaded from and saved to a JSONL (JSON Lines) file, one record per
//! line. Loading is resilient: a malformed line or duplicate ID is skipped
//! with a warning instead of failing the load, since a registry file edited
//! by hand or truncated by a crash should still open.

use super::{DogLookup, PedigreeStore};
use crate::domain::{DogId, DogNode, ParentType};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::warn;

/// Non-fatal problems encountered while loading a JSONL registry file.
#[derive(Debug, Clone)]
pub enum LoadWarning {
    /// A line that could not be parsed as a dog record; the line is
    /// skipped.
    MalformedJson {
        /// 1-based line number in the file.
        line_number: usize,
        /// Parser error text.
        error: String,
    },

    /// A record whose ID already appeared earlier in the file; the later
    /// record is skipped.
    DuplicateId {
        /// The repeated ID.
        id: DogId,
        /// 1-based line number of the skipped record.
        line_number: usize,
    },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed record ({error})")
            }
            Self::DuplicateId { id, line_number } => {
                write!(f, "line {line_number}: duplicate record for {id}")
            }
        }
    }
}

struct RegistryInner {
    prefix: String,
    dogs: HashMap<DogId, DogNode>,
}

/// In-memory dog registry, cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct InMemoryRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl InMemoryRegistry {
    /// Create an empty registry. `prefix` is used for generated IDs
    /// (e.g. "dog" yields IDs like "dog-a3f8").
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                prefix: prefix.into(),
                dogs: HashMap::new(),
            })),
        }
    }

    /// The prefix newly generated IDs should carry.
    pub async fn id_prefix(&self) -> String {
        self.inner.lock().await.prefix.clone()
    }

    /// Insert or overwrite a record directly, bypassing mutation
    /// validation. Used for seeding and loading.
    pub async fn insert_dog(&self, dog: DogNode) {
        let mut inner = self.inner.lock().await;
        inner.dogs.insert(dog.id.clone(), dog);
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.dogs.len()
    }

    /// Whether the registry holds no records.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.dogs.is_empty()
    }

    /// All record IDs currently held, in unspecified order.
    pub async fn dog_ids(&self) -> Vec<DogId> {
        self.inner.lock().await.dogs.keys().cloned().collect()
    }

    /// Load a registry from a JSONL file.
    ///
    /// Returns the registry plus any warnings for lines that were skipped.
    /// Parent references are *not* validated here; a dangling reference
    /// surfaces later as a build warning.
    pub async fn load_from_jsonl(
        path: &Path,
        prefix: impl Into<String>,
    ) -> Result<(Self, Vec<LoadWarning>)> {
        let registry = Self::new(prefix);
        let mut warnings = Vec::new();

        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0;

        let mut inner = registry.inner.lock().await;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DogNode>(&line) {
                Ok(dog) => {
                    if inner.dogs.contains_key(&dog.id) {
                        warn!(id = %dog.id, line_number, "skipping duplicate record");
                        warnings.push(LoadWarning::DuplicateId {
                            id: dog.id,
                            line_number,
                        });
                        continue;
                    }
                    inner.dogs.insert(dog.id.clone(), dog);
                }
                Err(e) => {
                    warn!(line_number, error = %e, "skipping malformed record");
                    warnings.push(LoadWarning::MalformedJson {
                        line_number,
                        error: e.to_string(),
                    });
                }
            }
        }
        drop(inner);

        Ok((registry, warnings))
    }

    /// Save all records to a JSONL file.
    ///
    /// Writes to a temporary file and renames over the target, so an
    /// interrupted save leaves the original file intact. Records are
    /// written in ID order for stable diffs.
    pub async fn save_to_jsonl(&self, path: &Path) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        let file = File::create(&temp_path).await?;
        let mut writer = BufWriter::new(file);

        let inner = self.inner.lock().await;
        let mut dogs: Vec<&DogNode> = inner.dogs.values().collect();
        dogs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

        for dog in dogs {
            let json = serde_json::to_string(dog)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        drop(inner);

        writer.flush().await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DogLookup for InMemoryRegistry {
    async fn fetch_dog(&self, id: &DogId) -> Result<Option<DogNode>> {
        let inner = self.inner.lock().await;
        Ok(inner.dogs.get(id).cloned())
    }

    async fn fetch_dogs(&self, ids: &[DogId]) -> Result<Vec<Option<DogNode>>> {
        // Native batch: one lock acquisition for the whole generation.
        let inner = self.inner.lock().await;
        Ok(ids.iter().map(|id| inner.dogs.get(id).cloned()).collect())
    }
}

#[async_trait]
impl PedigreeStore for InMemoryRegistry {
    async fn create_dog(&self, dog: &DogNode) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.dogs.contains_key(&dog.id) {
            return Err(Error::Registry(format!(
                "record {} already exists",
                dog.id
            )));
        }
        inner.dogs.insert(dog.id.clone(), dog.clone());
        Ok(())
    }

    async fn update_dog(&self, dog: &DogNode) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.dogs.contains_key(&dog.id) {
            return Err(Error::DogNotFound(dog.id.clone()));
        }
        inner.dogs.insert(dog.id.clone(), dog.clone());
        Ok(())
    }

    async fn update_dog_parent(
        &self,
        dog_id: &DogId,
        parent_type: ParentType,
        parent_id: Option<&DogId>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let dog = inner
            .dogs
            .get_mut(dog_id)
            .ok_or_else(|| Error::DogNotFound(dog_id.clone()))?;
        dog.set_parent_ref(parent_type, parent_id.cloned());
        dog.updated_at = chrono::Utc::now();
        Ok(())
    }
}
