//! Paginated, bounded-memory enumeration of a repository's units.
//!
//! Only the id index (type id → unit ids) is sized to the repository. Full
//! unit bodies are fetched one page per store round trip and dropped as they
//! are yielded, so at most `page_size` bodies are held at a time.

use crate::error::PublishResult;
use crate::store::UnitStore;
use nodemirror_types::{AssociatedUnit, Association, MirrorConfig, relative_to_storage};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Joins repository associations with unit bodies across content types.
pub struct UnitEnumerator<'a, S: ?Sized> {
    store: &'a S,
    page_size: usize,
    storage_dir: PathBuf,
}

impl<'a, S: UnitStore + ?Sized> UnitEnumerator<'a, S> {
    pub fn new(store: &'a S, config: &MirrorConfig) -> Self {
        Self {
            store,
            page_size: config.page_size.max(1),
            storage_dir: config.storage_dir.clone(),
        }
    }

    /// Starts enumerating `repo_id`. Only the id index is loaded here.
    pub fn enumerate(&self, repo_id: &str) -> PublishResult<AssociatedUnits<'a, S>> {
        let index = self.store.associated_unit_ids(repo_id)?;
        debug!(
            "Enumerating repository {}: {} units across {} types",
            repo_id,
            index.values().map(Vec::len).sum::<usize>(),
            index.len()
        );
        Ok(AssociatedUnits {
            store: self.store,
            repo_id: repo_id.to_string(),
            page_size: self.page_size,
            storage_dir: self.storage_dir.clone(),
            types: index.into_iter().collect(),
            offset: 0,
            page: VecDeque::new(),
            failed: false,
        })
    }
}

/// Lazy sequence of associated units. Ends after the first store error.
pub struct AssociatedUnits<'a, S: ?Sized> {
    store: &'a S,
    repo_id: String,
    page_size: usize,
    storage_dir: PathBuf,
    types: VecDeque<(String, Vec<String>)>,
    offset: usize,
    page: VecDeque<AssociatedUnit>,
    failed: bool,
}

impl<S: UnitStore + ?Sized> AssociatedUnits<'_, S> {
    /// Fetches the next non-empty page. Returns false when exhausted.
    fn load_page(&mut self) -> PublishResult<bool> {
        loop {
            let Some((type_id, ids)) = self.types.front() else {
                return Ok(false);
            };
            if self.offset >= ids.len() {
                self.types.pop_front();
                self.offset = 0;
                continue;
            }

            let end = (self.offset + self.page_size).min(ids.len());
            let batch = &ids[self.offset..end];
            let associations: HashMap<String, Association> = self
                .store
                .associations(&self.repo_id, type_id, batch)?
                .into_iter()
                .map(|a| (a.unit_id.clone(), a))
                .collect();
            let units = self.store.units(type_id, batch)?;
            self.offset = end;

            for stored in units {
                let Some(association) = associations.get(&stored.id) else {
                    warn!(
                        "Unit {} of type {} lost its association with {} during enumeration",
                        stored.id, type_id, self.repo_id
                    );
                    continue;
                };
                let relative_path = stored
                    .unit
                    .storage_path
                    .as_deref()
                    .map(|p| relative_to_storage(&self.storage_dir, p));
                self.page.push_back(AssociatedUnit {
                    unit_id: stored.id,
                    unit: stored.unit,
                    association: association.clone(),
                    relative_path,
                });
            }
            if !self.page.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl<S: UnitStore + ?Sized> Iterator for AssociatedUnits<'_, S> {
    type Item = PublishResult<AssociatedUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(unit) = self.page.pop_front() {
            return Some(Ok(unit));
        }
        if self.failed {
            return None;
        }
        match self.load_page() {
            Ok(true) => self.page.pop_front().map(Ok),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
