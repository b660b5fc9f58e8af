//! Durable record store
//!
//! Whole-document JSON persistence. Every document is a flat key → record
//! mapping written as `<dir>/<name>.json`.
//!
//! # Backends
//!
//! - `Directory` - resolved at startup: configured dir → OS temp dir
//! - `Memory` - last resort when no writable path exists. NOT durable:
//!   state lives only for the process lifetime.
//!
//! # Guarantees
//!
//! - `save` fully replaces the named document (write tmp → fsync → rename)
//! - read or parse failure returns the caller's default
//! - write failure is logged and swallowed; the cache keeps the intended state
//!
//! Read-modify-write atomicity is the caller's job (see `ledger`).

use crate::error::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Document holding claim records
pub const DOC_CLAIMS: &str = "magic-links";
/// Document holding transaction history entries
pub const DOC_TRANSACTIONS: &str = "transactions";
/// Document holding claim action records
pub const DOC_ACTIONS: &str = "claim-actions";
/// Document holding the runtime payment mode
pub const DOC_PAYMENT_MODE: &str = "payment-mode";

const TEMP_SUBDIR: &str = "magic-claims";
const PROBE_FILE: &str = ".write-probe";

/// Where documents live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON files in a directory
    Directory(PathBuf),
    /// Process memory only
    Memory,
}

/// Storage wrapper for JSON documents
#[derive(Debug)]
pub struct DurableStore {
    backend: StoreBackend,
    cache: RwLock<HashMap<String, serde_json::Value>>,
}

impl DurableStore {
    /// Resolve a backend using the fallback chain
    pub fn open(configured: Option<&Path>) -> Self {
        if let Some(dir) = configured {
            match probe(dir) {
                Ok(()) => {
                    tracing::info!(path = %dir.display(), "Opened document store");
                    return Self::with_backend(StoreBackend::Directory(dir.to_path_buf()));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Configured data directory is not writable, trying temp dir"
                    );
                }
            }
        }

        let temp = std::env::temp_dir().join(TEMP_SUBDIR);
        match probe(&temp) {
            Ok(()) => {
                tracing::info!(path = %temp.display(), "Opened document store in temp dir");
                Self::with_backend(StoreBackend::Directory(temp))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "No writable directory available, state will NOT survive a restart"
                );
                Self::memory()
            }
        }
    }

    /// Open a directory store without fallback
    pub fn directory(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        probe(path)?;
        Ok(Self::with_backend(StoreBackend::Directory(path.to_path_buf())))
    }

    /// Memory-only store
    pub fn memory() -> Self {
        Self::with_backend(StoreBackend::Memory)
    }

    fn with_backend(backend: StoreBackend) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Active backend
    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    /// Whether documents survive a restart
    pub fn is_durable(&self) -> bool {
        matches!(self.backend, StoreBackend::Directory(_))
    }

    /// Load a whole document, or `default` when absent or unreadable
    pub fn load<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        if let Some(value) = self.cache.read().get(name).cloned() {
            return match serde_json::from_value(value) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(document = name, error = %e, "Cached document has unexpected shape");
                    default
                }
            };
        }

        let dir = match &self.backend {
            StoreBackend::Directory(dir) => dir,
            StoreBackend::Memory => return default,
        };

        let path = document_path(dir, name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read document");
                return default;
            }
        };

        let value: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse document");
                return default;
            }
        };

        match serde_json::from_value(value.clone()) {
            Ok(doc) => {
                self.cache.write().insert(name.to_string(), value);
                doc
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Document has unexpected shape");
                default
            }
        }
    }

    /// Replace a whole document
    pub fn save<T: Serialize>(&self, name: &str, doc: &T) {
        let value = match serde_json::to_value(doc) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(document = name, error = %e, "Failed to serialize document");
                return;
            }
        };

        if let StoreBackend::Directory(dir) = &self.backend {
            if let Err(e) = write_atomic(&document_path(dir, name), &value) {
                tracing::warn!(
                    document = name,
                    error = %e,
                    "Failed to persist document, keeping in-memory state"
                );
            }
        }

        self.cache.write().insert(name.to_string(), value);
    }
}

fn document_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

fn probe(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"ok")?;
    fs::remove_file(&probe)?;
    Ok(())
}

fn write_atomic(path: &Path, value: &serde_json::Value) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");

    let mut file = File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;

    Ok(())
}
