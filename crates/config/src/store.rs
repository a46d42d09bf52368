//! Durable, shared policy store.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{FilterMode, IndicatorColor, Mapping, Policy, Result, loader};

/// Capacity of the change-notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Identifies one version of the policy file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    /// Modification time, where the filesystem reports one.
    modified: Option<SystemTime>,
    /// File length in bytes.
    len: u64,
}

/// Stamp of the file at `path`; `None` when it does not exist or cannot be read.
fn file_stamp(path: &Path) -> Option<FileStamp> {
    let meta = fs::metadata(path).ok()?;
    Some(FileStamp {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// The policy together with the file version it was read from or written to.
struct Loaded {
    /// Latest committed policy.
    policy: Policy,
    /// Stamp of the backing file when `policy` was last synchronized with it.
    stamp: Option<FileStamp>,
}

/// Shared state behind a [`PolicyStore`] handle.
struct Inner {
    /// Latest committed policy and its file stamp.
    state: RwLock<Loaded>,
    /// Backing file; `None` for in-memory stores.
    path: Option<PathBuf>,
    /// Broadcasts the committed policy after every change.
    changes: broadcast::Sender<Policy>,
}

/// Owns the policy and its durable copy.
///
/// Handles are cheap to clone and may be shared between the engine actor and
/// the presentation layer. Every mutation is written to disk before it becomes
/// visible, and a failed write leaves the visible policy untouched.
///
/// The file may also be edited by another process (the CLI). Every mutation
/// starts from the file's current contents, and [`PolicyStore::snapshot`]
/// reloads the policy whenever the file's modification stamp has changed, so
/// readers always see the latest committed value.
#[derive(Clone)]
pub struct PolicyStore {
    /// Shared state.
    inner: Arc<Inner>,
}

impl PolicyStore {
    /// Open the store backed by `path`, loading the existing policy if present.
    pub fn open(path: &Path) -> Result<Self> {
        let policy = loader::load_from_path(path)?;
        info!(
            "policy loaded from {}: {} mappings, lock={}",
            path.display(),
            policy.mappings.len(),
            policy.global_lock.active
        );
        let stamp = file_stamp(path);
        Ok(Self::build(policy, Some(path.to_path_buf()), stamp))
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(policy: Policy) -> Self {
        Self::build(policy, None, None)
    }

    /// Construct the shared state.
    fn build(policy: Policy, path: Option<PathBuf>, stamp: Option<FileStamp>) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Loaded { policy, stamp }),
                path,
                changes,
            }),
        }
    }

    /// Backing file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Clone of the latest committed policy.
    ///
    /// Picks up edits other processes made to the backing file since the
    /// last read. A file that fails to load is logged and the previous policy
    /// is kept.
    pub fn snapshot(&self) -> Policy {
        if let Some(path) = &self.inner.path {
            let stamp = file_stamp(path);
            if stamp != self.inner.state.read().stamp {
                self.reload(path, stamp);
            }
        }
        self.inner.state.read().policy.clone()
    }

    /// Reload from `path` after its stamp changed to `stamp`; publish a changed policy.
    fn reload(&self, path: &Path, stamp: Option<FileStamp>) {
        let mut state = self.inner.state.write();
        if state.stamp == stamp {
            return;
        }
        state.stamp = stamp;
        let policy = match loader::load_from_path(path) {
            Ok(p) => p,
            Err(e) => {
                warn!("policy reload failed, keeping previous: {}", e.pretty());
                return;
            }
        };
        if policy == state.policy {
            return;
        }
        state.policy = policy.clone();
        drop(state);
        info!("policy reloaded from {}", path.display());
        let _ignored = self.inner.changes.send(policy);
    }

    /// Subscribe to committed changes. Each message carries the new policy.
    pub fn subscribe(&self) -> broadcast::Receiver<Policy> {
        self.inner.changes.subscribe()
    }

    /// Apply `f` to a copy of the policy; persist and publish when it reports a change.
    ///
    /// With a backing file, `f` sees the file's current contents rather than
    /// the last loaded copy, so edits made by another process are kept. A file
    /// that cannot be read or parsed fails the mutation and is left untouched.
    /// The write lock is held across persistence so concurrent mutations are
    /// committed in a single order on disk and in memory.
    fn update<F>(&self, what: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Policy) -> bool,
    {
        let mut state = self.inner.state.write();
        let mut refreshed = false;
        if let Some(path) = &self.inner.path {
            let stamp = file_stamp(path);
            let on_disk = loader::load_from_path(path)?;
            state.stamp = stamp;
            if on_disk != state.policy {
                debug!("policy {}: picked up external edit", what);
                state.policy = on_disk;
                refreshed = true;
            }
        }
        let mut next = state.policy.clone();
        if !f(&mut next) || next == state.policy {
            debug!("policy {}: no change", what);
            if refreshed {
                let current = state.policy.clone();
                drop(state);
                let _ignored = self.inner.changes.send(current);
            }
            return Ok(false);
        }
        if let Some(path) = &self.inner.path {
            loader::save_to_path(path, &next)?;
            state.stamp = file_stamp(path);
        }
        state.policy = next.clone();
        drop(state);
        debug!("policy {}: committed", what);
        let _ignored = self.inner.changes.send(next);
        Ok(true)
    }

    /// Set the automatic-switching flag.
    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        self.update("set_enabled", |p| {
            p.enabled = enabled;
            true
        })
    }

    /// Flip the automatic-switching flag.
    pub fn toggle_enabled(&self) -> Result<bool> {
        self.update("toggle_enabled", |p| {
            p.enabled = !p.enabled;
            true
        })
    }

    /// Activate or release the global lock.
    ///
    /// When activating, a non-blank `current_source_id` (trimmed) becomes the
    /// lock target; a blank one keeps the previous target. Releasing keeps the
    /// target so the next activation can reuse it.
    pub fn set_global_lock(&self, active: bool, current_source_id: &str) -> Result<bool> {
        let normalized = current_source_id.trim().to_string();
        self.update("set_global_lock", |p| {
            p.global_lock.active = active;
            if active && !normalized.is_empty() {
                p.global_lock.source_id = normalized;
            }
            true
        })
    }

    /// Insert or update the mapping for `app_id`. Blank application ids are ignored.
    pub fn upsert_mapping(&self, app_id: &str, source_id: &str) -> Result<bool> {
        let app = app_id.trim().to_string();
        if app.is_empty() {
            return Ok(false);
        }
        let source = source_id.trim().to_string();
        self.update("upsert_mapping", |p| {
            match p.mapping_index(&app) {
                Some(i) => p.mappings[i].source_id = source,
                None => p.mappings.push(Mapping::new(app, source)),
            }
            true
        })
    }

    /// Remove every mapping for `app_id`.
    pub fn remove_mapping(&self, app_id: &str) -> Result<bool> {
        self.update("remove_mapping", |p| {
            let before = p.mappings.len();
            p.mappings.retain(|m| m.app_id != app_id);
            p.mappings.len() != before
        })
    }

    /// Move the mapping for `app_id` one position towards the front.
    pub fn move_mapping_up(&self, app_id: &str) -> Result<bool> {
        self.update("move_mapping_up", |p| match p.mapping_index(app_id) {
            Some(i) if i > 0 => {
                p.mappings.swap(i, i - 1);
                true
            }
            _ => false,
        })
    }

    /// Move the mapping for `app_id` one position towards the back.
    pub fn move_mapping_down(&self, app_id: &str) -> Result<bool> {
        self.update("move_mapping_down", |p| match p.mapping_index(app_id) {
            Some(i) if i + 1 < p.mappings.len() => {
                p.mappings.swap(i, i + 1);
                true
            }
            _ => false,
        })
    }

    /// Whether the mapping for `app_id` exists and is not first.
    pub fn can_move_up(&self, app_id: &str) -> bool {
        matches!(self.snapshot().mapping_index(app_id), Some(i) if i > 0)
    }

    /// Whether the mapping for `app_id` exists and is not last.
    pub fn can_move_down(&self, app_id: &str) -> bool {
        let p = self.snapshot();
        matches!(p.mapping_index(app_id), Some(i) if i + 1 < p.mappings.len())
    }

    /// Append `app_id` (trimmed) to the filter list unless blank or already present.
    pub fn add_filtered_app(&self, app_id: &str) -> Result<bool> {
        let app = app_id.trim().to_string();
        if app.is_empty() {
            return Ok(false);
        }
        self.update("add_filtered_app", |p| {
            if p.filter_list.contains(&app) {
                return false;
            }
            p.filter_list.push(app);
            true
        })
    }

    /// Remove `app_id` from the filter list.
    pub fn remove_filtered_app(&self, app_id: &str) -> Result<bool> {
        self.update("remove_filtered_app", |p| {
            let before = p.filter_list.len();
            p.filter_list.retain(|a| a != app_id);
            p.filter_list.len() != before
        })
    }

    /// Switch the filter interpretation.
    pub fn set_filter_mode(&self, mode: FilterMode) -> Result<bool> {
        self.update("set_filter_mode", |p| {
            p.filter_mode = mode;
            true
        })
    }

    /// Set the color of the enabled-status dot.
    pub fn set_status_dot_color(&self, color: IndicatorColor) -> Result<bool> {
        self.update("set_status_dot_color", |p| {
            p.indicator.status_dot = color;
            true
        })
    }

    /// Set the color of the switch pulse dot.
    pub fn set_switch_dot_color(&self, color: IndicatorColor) -> Result<bool> {
        self.update("set_switch_dot_color", |p| {
            p.indicator.switch_dot = color;
            true
        })
    }
}
