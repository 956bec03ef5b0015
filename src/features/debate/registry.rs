//! # Session Registry
//!
//! Concurrent map of live debate sessions keyed by thread id, plus the
//! periodic sweep that evicts idle sessions. The registry is an owned,
//! injected object so tests can run several side by side.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::session::DebateSession;
use super::DebateError;

/// How often the idle sweep runs
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Sessions idle longer than this are evicted
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// All live debate sessions. Sole authority for creation and removal.
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<DebateSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    /// Register a new session. Fails when the thread already hosts one.
    pub fn create(&self, session: DebateSession) -> Result<Arc<DebateSession>, DebateError> {
        let thread_id = session.thread_id();
        match self.sessions.entry(thread_id) {
            Entry::Occupied(_) => Err(DebateError::AlreadyExists(thread_id)),
            Entry::Vacant(slot) => {
                let session = Arc::new(session);
                slot.insert(Arc::clone(&session));
                Ok(session)
            }
        }
    }

    /// Non-blocking lookup
    pub fn get(&self, thread_id: u64) -> Option<Arc<DebateSession>> {
        self.sessions.get(&thread_id).map(|entry| Arc::clone(&entry))
    }

    /// Unconditional removal; no-op when absent
    pub fn remove(&self, thread_id: u64) {
        self.sessions.remove(&thread_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict every session idle longer than `idle_threshold`, regardless of
    /// its lock state. Returns how many were removed.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.idle_for() <= idle_threshold);
        before - self.sessions.len()
    }

    /// Spawn the periodic sweep task. The first tick fires immediately.
    pub fn spawn_sweep(
        self: Arc<Self>,
        interval: Duration,
        idle_threshold: Duration,
    ) -> JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = registry.sweep(idle_threshold);
                if removed > 0 {
                    info!("idle sweep removed {removed} debate session(s)");
                }
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
