// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistent store of cache generations.
//!
//! Each generation lives in its own sled tree. Installing a generation
//! writes every entry in one batch, so a generation is either fully
//! populated or absent.

use crate::error::CacheError;
use crate::models::{CacheEntry, StoredResponse};
use std::path::Path;

const TREE_PREFIX: &str = "generation:";

/// A named cache generation. Names follow `<prefix>-v<N>`; the numeric
/// suffix orders generations, names without one sort first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation {
    name: String,
    version: u64,
}

impl Generation {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let version = name
            .rsplit_once("-v")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        Self { name, version }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn tree_name(&self) -> String {
        format!("{}{}", TREE_PREFIX, self.name)
    }
}

#[derive(Clone)]
pub struct CacheStore {
    db: sled::Db,
}

impl CacheStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        tracing::info!(path = %path.as_ref().display(), "Opened offline cache");
        Ok(Self { db })
    }

    /// Store removed when the last handle is dropped.
    pub fn temporary() -> Result<Self, CacheError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// All generations present, oldest first.
    pub fn generations(&self) -> Vec<Generation> {
        let mut generations: Vec<Generation> = self
            .db
            .tree_names()
            .iter()
            .filter_map(|raw| {
                let name = String::from_utf8_lossy(raw);
                name.strip_prefix(TREE_PREFIX).map(Generation::new)
            })
            .collect();
        generations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));
        generations
    }

    pub fn contains(&self, generation: &Generation) -> bool {
        let name = generation.tree_name();
        self.db
            .tree_names()
            .iter()
            .any(|raw| &raw[..] == name.as_bytes())
    }

    /// Open a generation's tree without creating it.
    fn existing_tree(&self, generation: &Generation) -> Result<Option<sled::Tree>, CacheError> {
        if !self.contains(generation) {
            return Ok(None);
        }
        Ok(Some(self.db.open_tree(generation.tree_name())?))
    }

    /// Write a complete generation atomically. Returns the entry count.
    pub fn install(
        &self,
        generation: &Generation,
        responses: Vec<(String, StoredResponse)>,
    ) -> Result<usize, CacheError> {
        let mut batch = sled::Batch::default();
        let count = responses.len();
        for (request_key, stored_response) in responses {
            let entry = CacheEntry {
                request_key,
                stored_response,
                cache_generation: generation.version,
            };
            batch.insert(entry.request_key.as_bytes(), encode(&entry)?);
        }

        let existed = self.contains(generation);
        let tree = self.db.open_tree(generation.tree_name())?;
        if let Err(e) = tree.apply_batch(batch).and_then(|()| self.db.flush().map(|_| ())) {
            // An empty tree would read as an installed generation on restart
            if !existed {
                let _ = self.db.drop_tree(generation.tree_name());
            }
            return Err(e.into());
        }
        Ok(count)
    }

    pub fn get(&self, generation: &Generation, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(tree) = self.existing_tree(generation)? else {
            return Ok(None);
        };
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| CacheError::Encoding(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Store or replace one response in an installed generation.
    pub fn put(
        &self,
        generation: &Generation,
        key: &str,
        response: StoredResponse,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            request_key: key.to_string(),
            stored_response: response,
            cache_generation: generation.version,
        };
        let tree = self
            .existing_tree(generation)?
            .ok_or(CacheError::NotInstalled)?;
        tree.insert(key.as_bytes(), encode(&entry)?)?;
        Ok(())
    }

    /// Entry count of a generation; zero when it is absent.
    pub fn len(&self, generation: &Generation) -> Result<usize, CacheError> {
        Ok(self
            .existing_tree(generation)?
            .map(|tree| tree.len())
            .unwrap_or(0))
    }

    /// Drop every generation except `keep`. Returns the dropped names.
    pub fn purge_except(&self, keep: &Generation) -> Result<Vec<String>, CacheError> {
        let mut purged = Vec::new();
        for generation in self.generations() {
            if &generation != keep {
                self.db.drop_tree(generation.tree_name())?;
                purged.push(generation.name);
            }
        }
        self.db.flush()?;
        Ok(purged)
    }
}

fn encode(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(entry).map_err(|e| CacheError::Encoding(e.to_string()))
}
