//! Per-session deck history with undo.
//!
//! Each session sits behind its own async mutex so that operations on one
//! session run one at a time while distinct sessions proceed in parallel.
//! The map lock only guards membership and is never held across I/O or a
//! model call.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use slide_protocol::{
    SessionId, SessionInfo, SessionSnapshot, SlideDeck, UndoOutcome, SNAPSHOT_FORMAT_VERSION,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;

use crate::error::{Result, SlideError, SnapshotError};

const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub source_document_text: String,
    pub theme: Option<String>,
    /// Earlier decks, oldest first. The current deck is kept apart so a
    /// session can never be without one.
    past: Vec<SlideDeck>,
    current: SlideDeck,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Session {
    fn new(source_document_text: String, initial: SlideDeck, theme: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            source_document_text,
            theme,
            past: Vec::new(),
            current: initial,
            created_at: now,
            last_accessed: now,
        }
    }

    pub fn current_deck(&self) -> &SlideDeck {
        &self.current
    }

    /// Number of snapshots, the current deck included.
    pub fn history_len(&self) -> usize {
        self.past.len() + 1
    }

    pub fn history(&self) -> impl Iterator<Item = &SlideDeck> {
        self.past.iter().chain(std::iter::once(&self.current))
    }

    fn commit(&mut self, deck: SlideDeck) {
        let previous = std::mem::replace(&mut self.current, deck);
        self.past.push(previous);
    }

    fn undo(&mut self) -> UndoOutcome {
        match self.past.pop() {
            Some(previous) => {
                self.current = previous;
                UndoOutcome { deck: self.current.clone(), undone: true }
            }
            None => UndoOutcome { deck: self.current.clone(), undone: false },
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            total_slides: self.current.len(),
            history_len: self.history_len(),
            created_at: self.created_at,
            has_source_document: !self.source_document_text.trim().is_empty(),
        }
    }

    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            session_id: self.id.clone(),
            source_document_text: self.source_document_text.clone(),
            theme: self.theme.clone(),
            history: self.history().cloned().collect(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> std::result::Result<Self, SnapshotError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { found: snapshot.format_version });
        }
        let mut past = snapshot.history;
        let Some(current) = past.pop() else {
            return Err(SnapshotError::EmptyHistory(snapshot.session_id));
        };
        Ok(Self {
            id: snapshot.session_id,
            source_document_text: snapshot.source_document_text,
            theme: snapshot.theme,
            past,
            current,
            created_at: snapshot.created_at,
            last_accessed: snapshot.last_accessed,
        })
    }
}

/// Exclusive access to one session, held for the length of an operation.
/// The session unlocks when the guard is dropped.
pub struct SessionGuard {
    inner: OwnedMutexGuard<Session>,
}

impl SessionGuard {
    pub fn commit(&mut self, deck: SlideDeck) {
        self.inner.commit(deck);
    }

    pub fn undo(&mut self) -> UndoOutcome {
        self.inner.undo()
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.inner
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session whose history holds `initial` as its only snapshot.
    pub async fn create(
        &self,
        source_document_text: impl Into<String>,
        initial: SlideDeck,
        theme: Option<String>,
    ) -> Session {
        let session = Session::new(source_document_text.into(), initial, theme);
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::new(Mutex::new(session.clone())));
        tracing::info!("created session {} with {} slides", session.id, session.current.len());
        session
    }

    async fn entry(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SlideError::SessionNotFound(id.clone()))
    }

    /// Wait for exclusive access to a session.
    pub async fn lock(&self, id: &SessionId) -> Result<SessionGuard> {
        let entry = self.entry(id).await?;
        let mut inner = Arc::clone(&entry).lock_owned().await;

        // The session may have been deleted while we waited.
        let still_present = self
            .sessions
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));
        if !still_present {
            return Err(SlideError::SessionNotFound(id.clone()));
        }

        inner.touch();
        Ok(SessionGuard { inner })
    }

    pub async fn get(&self, id: &SessionId) -> Result<Session> {
        let guard = self.lock(id).await?;
        Ok(Session::clone(&guard))
    }

    pub async fn current_deck(&self, id: &SessionId) -> Result<SlideDeck> {
        let guard = self.lock(id).await?;
        Ok(guard.current_deck().clone())
    }

    pub async fn commit(&self, id: &SessionId, deck: SlideDeck) -> Result<()> {
        let mut guard = self.lock(id).await?;
        guard.commit(deck);
        tracing::debug!("session {id} now has {} snapshots", guard.history_len());
        Ok(())
    }

    pub async fn undo(&self, id: &SessionId) -> Result<UndoOutcome> {
        let mut guard = self.lock(id).await?;
        let outcome = guard.undo();
        if outcome.undone {
            tracing::info!("undid last change in session {id}");
        } else {
            tracing::info!("nothing to undo in session {id}");
        }
        Ok(outcome)
    }

    /// Sessions ordered by creation time. Sessions locked by an in-flight
    /// operation are left out rather than waited on.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let entries: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();
        let mut infos = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            match entry.try_lock() {
                Ok(session) => infos.push(session.info()),
                Err(_) => tracing::debug!("session {id} is busy; not listed"),
            }
        }
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        infos
    }

    /// Remove a session once any in-flight operation on it has finished.
    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        let entry = self.entry(id).await?;
        let _session = entry.lock().await;

        let mut sessions = self.sessions.write().await;
        let still_present = sessions
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));
        if !still_present {
            return Err(SlideError::SessionNotFound(id.clone()));
        }
        sessions.remove(id);
        tracing::info!("deleted session {id}");
        Ok(())
    }

    /// Drop sessions idle for longer than `ttl`. Sessions locked by an
    /// in-flight operation are in use and stay.
    pub async fn evict_expired(&self, ttl: Duration) -> Vec<SessionId> {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        self.sessions.write().await.retain(|id, entry| match entry.try_lock() {
            Ok(session) if session.last_accessed < cutoff => {
                evicted.push(id.clone());
                false
            }
            _ => true,
        });
        for id in &evicted {
            tracing::info!("evicted idle session {id}");
        }
        evicted
    }

    /// Periodically evict idle sessions until the store is dropped.
    pub fn spawn_eviction_task(self: &Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.evict_expired(ttl).await;
            }
        })
    }

    pub async fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot> {
        let entry = self.entry(id).await?;
        let snapshot = entry.lock().await.to_snapshot();
        Ok(snapshot)
    }

    /// Insert a session from its snapshot, replacing any session with the
    /// same id.
    pub async fn restore(&self, snapshot: SessionSnapshot) -> Result<SessionId> {
        let session = Session::from_snapshot(snapshot)?;
        let id = session.id.clone();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        Ok(id)
    }

    /// Write `<dir>/<id>.json`. The file is replaced atomically.
    pub async fn save_snapshot(&self, id: &SessionId, dir: &Path) -> Result<PathBuf> {
        let snapshot = self.snapshot(id).await?;
        let path = snapshot_path(dir, id)?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        tokio::fs::create_dir_all(dir).await?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        tracing::debug!("saved session {id} to {}", path.display());
        Ok(path)
    }

    /// Restore every snapshot file found in `dir`. Files that cannot be read
    /// or validated are skipped with a warning.
    pub async fn load_snapshots(&self, dir: &Path) -> Result<Vec<SessionId>> {
        let mut loaded = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(loaded),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let restored = match read_snapshot(&path).await {
                Ok(snapshot) => self.restore(snapshot).await,
                Err(e) => Err(e),
            };
            match restored {
                Ok(id) => loaded.push(id),
                Err(e) => tracing::warn!("skipping snapshot {}: {e}", path.display()),
            }
        }
        tracing::debug!("loaded {} session(s) from {}", loaded.len(), dir.display());
        Ok(loaded)
    }

    /// Remove a session's snapshot file, if any.
    pub async fn remove_snapshot(id: &SessionId, dir: &Path) -> Result<()> {
        let path = snapshot_path(dir, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse one snapshot file.
pub async fn read_snapshot(path: &Path) -> Result<SessionSnapshot> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn snapshot_path(dir: &Path, id: &SessionId) -> Result<PathBuf> {
    let valid = !id.as_str().is_empty()
        && id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(SnapshotError::InvalidSessionId(id.clone()).into());
    }
    Ok(dir.join(format!("{id}.{SNAPSHOT_EXTENSION}")))
}
