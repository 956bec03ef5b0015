//! # Debate Session
//!
//! Per-thread mutable state. The turn lock is a compare-and-swap on an
//! atomic, so two racing message events can never both start a turn; the
//! rest of the state sits behind a mutex with short critical sections and
//! is only touched by whoever holds the turn lock.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Win counters, per-session prompt templates
//! - 1.0.0: Initial implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Who said an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Bot,
}

impl Speaker {
    fn tag(self) -> &'static str {
        match self {
            Speaker::Human => "USER",
            Speaker::Bot => "BOT",
        }
    }
}

/// State of one ongoing debate, keyed by its thread
#[derive(Debug)]
pub struct DebateSession {
    thread_id: u64,
    topic: String,
    opening_prompt: String,
    reply_prompt: String,
    leader_id: u64,
    turn_lock: AtomicBool,
    closed: AtomicBool,
    state: Mutex<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    /// Tagged utterances ("USER: ..." / "BOT: ..."), append-only
    history: Vec<String>,
    last_activity: Instant,
    /// Message the orchestrator is currently editing, if a turn is in flight
    pending_message: Option<u64>,
    bot_wins: u32,
    human_wins: u32,
}

impl DebateSession {
    pub fn new(
        thread_id: u64,
        topic: &str,
        opening_prompt: String,
        reply_prompt: String,
        leader_id: u64,
    ) -> Self {
        DebateSession {
            thread_id,
            topic: topic.to_string(),
            opening_prompt,
            reply_prompt,
            leader_id,
            turn_lock: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state: Mutex::new(SessionState {
                history: Vec::new(),
                last_activity: Instant::now(),
                pending_message: None,
                bot_wins: 0,
                human_wins: 0,
            }),
        }
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Human who started the debate (informational only)
    pub fn leader_id(&self) -> u64 {
        self.leader_id
    }

    /// Opening system prompt with the topic substituted
    pub fn opening_prompt(&self) -> String {
        self.opening_prompt.replace("{topic}", &self.topic)
    }

    /// Reply system prompt with topic and recent context substituted
    pub fn reply_prompt(&self, context: &str) -> String {
        self.reply_prompt
            .replace("{topic}", &self.topic)
            .replace("{context}", context)
    }

    /// Atomically claim the turn. Returns false without side effects when a
    /// turn is already in flight.
    pub fn try_acquire_turn(&self) -> bool {
        self.turn_lock
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the turn lock. Unconditional and idempotent.
    pub fn release(&self) {
        self.turn_lock.store(false, Ordering::Release);
    }

    /// Mark the session closed. Idempotent; does not release the turn lock,
    /// an in-flight turn finishes or abandons on its own.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Append a tagged utterance and refresh the activity timestamp
    pub fn append_utterance(&self, speaker: Speaker, text: &str) {
        let mut state = self.state_guard();
        state.history.push(format!("{}: {}", speaker.tag(), text));
        state.last_activity = Instant::now();
    }

    /// Last `max_entries` utterances joined in original order
    pub fn recent_context(&self, max_entries: usize) -> String {
        let state = self.state_guard();
        let start = state.history.len().saturating_sub(max_entries);
        state.history[start..].join("\n")
    }

    pub fn history(&self) -> Vec<String> {
        self.state_guard().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.state_guard().history.len()
    }

    /// Time since the last appended utterance
    pub fn idle_for(&self) -> Duration {
        self.state_guard().last_activity.elapsed()
    }

    pub fn set_pending_message(&self, message_id: Option<u64>) {
        self.state_guard().pending_message = message_id;
    }

    pub fn pending_message(&self) -> Option<u64> {
        self.state_guard().pending_message
    }

    pub fn record_bot_win(&self) {
        self.state_guard().bot_wins += 1;
    }

    pub fn record_human_win(&self) {
        self.state_guard().human_wins += 1;
    }

    /// (bot wins, human wins)
    pub fn wins(&self) -> (u32, u32) {
        let state = self.state_guard();
        (state.bot_wins, state.human_wins)
    }

    fn state_guard(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }
}
