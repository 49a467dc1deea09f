use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use gantry_core::LauncherLayout;
use serde_json::{Map, Value};

use crate::named_lock::{NamedLock, NamedLockGuard, PROPERTIES_LOCK};

/// Persisted key/value properties shared by every process of the launcher
/// family.
///
/// The document is a single JSON object of string values. Every transaction
/// re-reads it from disk under the cross-process lock; the store keeps no
/// in-memory copy, so writes from concurrently running instances are never
/// clobbered. A missing or malformed document is treated as empty.
pub struct PropertyStore {
    path: PathBuf,
    lock: Option<NamedLock>,
}

impl PropertyStore {
    /// Opens the store for the given layout. When the lock primitive cannot
    /// be created the store degrades to unsynchronized access instead of
    /// failing: property access must stay available even on a machine where
    /// the run directory is unusable.
    pub fn open(layout: &LauncherLayout) -> Self {
        let lock = match NamedLock::open(&layout.run_dir(), PROPERTIES_LOCK) {
            Ok(lock) => Some(lock),
            Err(err) => {
                log::warn!("property store lock unavailable, continuing unsynchronized: {err}");
                None
            }
        };

        Self {
            path: layout.properties_file(),
            lock,
        }
    }

    /// Returns the value for `key` if present and string-typed.
    pub fn load(&self, key: &str) -> Option<String> {
        let _guard = self.lock_guard();
        let document = self.read_document();
        match document.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Inserts or replaces `key`, rewriting the whole document atomically.
    pub fn store(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock_guard();
        let mut document = self.read_document();
        document.insert(key.to_string(), Value::String(value.to_string()));
        self.write_document(&document)
    }

    /// Removes `key`; absent keys are a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock_guard();
        let mut document = self.read_document();
        if document.remove(key).is_none() {
            return Ok(());
        }
        self.write_document(&document)
    }

    /// Applies several writes under one lock hold and one document rewrite.
    pub fn store_many(&self, pairs: &[(String, String)]) -> Result<()> {
        let _guard = self.lock_guard();
        let mut document = self.read_document();
        for (key, value) in pairs {
            document.insert(key.clone(), Value::String(value.clone()));
        }
        self.write_document(&document)
    }

    /// Exposes the store lock so a caller can wrap a multi-step
    /// read-modify-write without interleaving from another process. Returns
    /// `None` in degraded (lockless) mode.
    pub fn with_lock(&self) -> Option<NamedLockGuard<'_>> {
        self.lock_guard()
    }

    fn lock_guard(&self) -> Option<NamedLockGuard<'_>> {
        let lock = self.lock.as_ref()?;
        match lock.acquire() {
            Ok(guard) => Some(guard),
            Err(err) => {
                log::warn!("property store lock acquisition failed: {err}");
                None
            }
        }
    }

    /// Reads and parses the persisted document. Missing, unreadable, or
    /// malformed content yields an empty document so the store stays usable
    /// after external corruption.
    fn read_document(&self) -> Map<String, Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Map::new(),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => document,
            _ => Map::new(),
        }
    }

    /// Writes the full document to a part file, then renames it into place
    /// so readers only ever observe a complete document.
    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(&Value::Object(document.clone()))
            .context("failed serializing property document")?;

        let part_path = self.path.with_file_name(format!(
            "{}.part",
            self.path
                .file_name()
                .and_then(|v| v.to_str())
                .unwrap_or("properties.json")
        ));
        fs::write(&part_path, content)
            .with_context(|| format!("failed writing property document: {}", part_path.display()))?;

        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("failed replacing property document: {}", self.path.display())
            })?;
        }
        fs::rename(&part_path, &self.path).with_context(|| {
            format!(
                "failed moving property document into place: {}",
                self.path.display()
            )
        })
    }
}
