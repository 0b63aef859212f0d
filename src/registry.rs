//! Nullifier registry and accepted-root window.
//!
//! The registry is the only shared mutable state on the server. Every
//! implementation performs the replay check and the commit as one step so
//! concurrent submissions carrying the same nullifier cannot both succeed.

use crate::error::Rejection;
use crate::utils::{field_from_hex, field_to_bytes, field_to_hex};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use pasta_curves::pallas;
use std::collections::{HashSet, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

/// Number of published roots accepted by default: the latest plus three
/// predecessors.
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 4;

type NullifierKey = ([u8; 32], [u8; 32]);

fn key(external_nullifier: pallas::Base, nullifier_hash: pallas::Base) -> NullifierKey {
    (
        field_to_bytes(external_nullifier),
        field_to_bytes(nullifier_hash),
    )
}

/// Set of `(external_nullifier, nullifier_hash)` pairs already accepted.
pub trait NullifierRegistry: Send + Sync {
    /// Records the pair unless present. Returns `Ok(false)` for a duplicate.
    ///
    /// # Errors
    /// Returns [`Rejection::Registry`] if the backing store fails; the pair
    /// is then not recorded.
    fn insert_if_absent(
        &self,
        external_nullifier: pallas::Base,
        nullifier_hash: pallas::Base,
    ) -> Result<bool, Rejection>;

    fn contains(&self, external_nullifier: pallas::Base, nullifier_hash: pallas::Base) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local registry.
#[derive(Debug, Default)]
pub struct MemoryNullifierRegistry {
    seen: Mutex<HashSet<NullifierKey>>,
}

impl MemoryNullifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NullifierRegistry for MemoryNullifierRegistry {
    fn insert_if_absent(
        &self,
        external_nullifier: pallas::Base,
        nullifier_hash: pallas::Base,
    ) -> Result<bool, Rejection> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(seen.insert(key(external_nullifier, nullifier_hash)))
    }

    fn contains(&self, external_nullifier: pallas::Base, nullifier_hash: pallas::Base) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key(external_nullifier, nullifier_hash))
    }

    fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct FileState {
    seen: HashSet<NullifierKey>,
    file: File,
}

/// Append-only text file of `scope_hex:nullifier_hex` lines.
///
/// The file is read once at open. Afterwards lookups use the in-memory index
/// and each accepted pair is appended and synced to disk before it is
/// indexed. A failed append is rolled back to the previous length.
pub struct FileNullifierRegistry {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileNullifierRegistry {
    /// Opens or creates the registry file.
    ///
    /// An unterminated final line is a torn append from a crash; it is
    /// truncated away with a warning.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or a complete line is not a valid
    /// pair.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("Failed to open nullifier file: {}", path.display()))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .with_context(|| format!("Failed to read nullifier file: {}", path.display()))?;

        let complete = content.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        if complete < content.len() {
            warn!(
                "Discarding {} bytes of unterminated entry at end of {}",
                content.len() - complete,
                path.display()
            );
            file.set_len(complete as u64)
                .context("Failed to truncate torn nullifier entry")?;
        }

        let text = std::str::from_utf8(&content[..complete])
            .context("Nullifier file is not valid UTF-8")?;
        let mut seen = HashSet::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = parse_line(line).with_context(|| {
                format!(
                    "Invalid nullifier entry at {}:{}",
                    path.display(),
                    number + 1
                )
            })?;
            seen.insert(parsed);
        }

        info!(
            "Loaded {} nullifiers from {}",
            seen.len(),
            path.display()
        );

        Ok(Self {
            path,
            state: Mutex::new(FileState { seen, file }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_line(line: &str) -> Result<NullifierKey> {
    let (scope, nullifier) = line
        .split_once(':')
        .context("expected `external_nullifier:nullifier_hash`")?;
    let scope = field_from_hex(scope).context("bad external nullifier")?;
    let nullifier = field_from_hex(nullifier).context("bad nullifier hash")?;
    Ok(key(scope, nullifier))
}

impl NullifierRegistry for FileNullifierRegistry {
    fn insert_if_absent(
        &self,
        external_nullifier: pallas::Base,
        nullifier_hash: pallas::Base,
    ) -> Result<bool, Rejection> {
        let entry = key(external_nullifier, nullifier_hash);
        let mut state = self
            .state
            .lock()
            .map_err(|_| Rejection::Registry("nullifier registry lock poisoned".into()))?;

        if state.seen.contains(&entry) {
            return Ok(false);
        }

        let line = format!(
            "{}:{}\n",
            field_to_hex(external_nullifier),
            field_to_hex(nullifier_hash)
        );
        let file = &mut state.file;
        let committed_len = file
            .metadata()
            .map_err(|e| Rejection::Registry(format!("failed to stat nullifier file: {e}")))?
            .len();
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.sync_data()) {
            if let Err(rollback) = file.set_len(committed_len) {
                error!(
                    "Failed to roll back partial nullifier entry in {}: {rollback}",
                    self.path.display()
                );
            }
            return Err(Rejection::Registry(format!("failed to append nullifier: {e}")));
        }

        state.seen.insert(entry);
        debug!("Nullifier recorded to {}", self.path.display());
        Ok(true)
    }

    fn contains(&self, external_nullifier: pallas::Base, nullifier_hash: pallas::Base) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seen
            .contains(&key(external_nullifier, nullifier_hash))
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seen
            .len()
    }
}

/// Bounded window of published group roots, newest first.
#[derive(Debug)]
pub struct RootHistory {
    capacity: usize,
    roots: RwLock<VecDeque<pallas::Base>>,
}

impl Default for RootHistory {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_HISTORY_SIZE)
    }
}

impl RootHistory {
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            roots: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Makes `root` the latest accepted root, evicting the oldest beyond
    /// capacity. Republishing a root already in the window moves it to the
    /// front.
    pub fn publish(&self, root: pallas::Base) {
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        roots.retain(|r| *r != root);
        roots.push_front(root);
        roots.truncate(self.capacity);
    }

    #[must_use]
    pub fn contains(&self, root: &pallas::Base) -> bool {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(root)
    }

    #[must_use]
    pub fn latest(&self) -> Option<pallas::Base> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .front()
            .copied()
    }

    /// Snapshot of the window, newest first.
    #[must_use]
    pub fn roots(&self) -> Vec<pallas::Base> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}
