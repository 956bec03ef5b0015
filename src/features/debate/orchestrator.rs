//! # Debate Orchestrator
//!
//! Drives a session through its opening, reply, and closing phases. This is
//! the only component that calls the model client and the chat output; the
//! full turn protocol - lock, placeholder, streamed edits, concession
//! checks, unlock - lives here.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Per-debate prompt template overrides
//! - 1.1.0: Bot self-concession detection on generated replies
//! - 1.0.0: Initial implementation

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::core::response::truncate_for_message;
use crate::llm::LanguageModelClient;

use super::aggregator::{StreamAggregator, StreamUpdate, DEBOUNCE_INTERVAL};
use super::output::{OutputError, ThreadOutput};
use super::registry::SessionRegistry;
use super::session::{DebateSession, Speaker};
use super::DebateError;

/// History entries included in the reply prompt context
pub const CONTEXT_WINDOW: usize = 16;

/// User prompt for the opening generation
const KICKOFF_PROMPT: &str = "Start the debate.";

/// Phrases a human uses to give up
const HUMAN_CONCESSION_PHRASES: &[&str] = &["concede", "you win", "gg", "good game"];

/// Phrases the model is prompted to surrender with; narrower than the
/// human set so a bare "concede" in an aggressive reply doesn't end the game
const BOT_CONCESSION_PHRASES: &[&str] = &["i concede", "you win", "i lose"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum TurnKind {
    Opening,
    Reply,
}

impl TurnKind {
    fn render_partial(self, text: &str) -> String {
        match self {
            TurnKind::Opening => format!("**AI: {text}**"),
            TurnKind::Reply => format!("AI: {text}"),
        }
    }

    fn render_final(self, text: &str) -> String {
        match self {
            TurnKind::Opening => format!("**AI: {text}**\n\n**Your turn!**"),
            TurnKind::Reply => format!("AI: {text}"),
        }
    }
}

/// Orchestrates debates between humans and the model
pub struct DebateOrchestrator {
    registry: Arc<SessionRegistry>,
    llm: Arc<dyn LanguageModelClient>,
    output: Arc<dyn ThreadOutput>,
    opening_template: String,
    reply_template: String,
    debounce: Duration,
}

impl DebateOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        llm: Arc<dyn LanguageModelClient>,
        output: Arc<dyn ThreadOutput>,
        opening_template: String,
        reply_template: String,
    ) -> Self {
        DebateOrchestrator {
            registry,
            llm,
            output,
            opening_template,
            reply_template,
            debounce: DEBOUNCE_INTERVAL,
        }
    }

    /// Open a debate thread under `channel_id` and generate the opening
    /// statement. Returns the new thread id.
    ///
    /// The whole opening turn is awaited; callers on an event path should
    /// spawn this onto a worker task.
    pub async fn start_debate(
        &self,
        channel_id: u64,
        leader_id: u64,
        topic: &str,
        opening_override: Option<String>,
        reply_override: Option<String>,
    ) -> Result<u64, DebateError> {
        let thread_id = self
            .output
            .create_thread(channel_id, &format!("Debate: {topic}"))
            .await
            .map_err(DebateError::from_output)?;

        let opening = opening_override.unwrap_or_else(|| self.opening_template.clone());
        let reply = reply_override.unwrap_or_else(|| self.reply_template.clone());
        let session = self
            .registry
            .create(DebateSession::new(thread_id, topic, opening, reply, leader_id))?;

        // No contender can exist yet, the thread was just created
        session.try_acquire_turn();

        let placeholder = format!("**Topic: `{topic}`**\n\n**AI starts:**");
        match self.output.send_message(thread_id, &placeholder).await {
            Ok(message_id) => session.set_pending_message(Some(message_id)),
            Err(e) => {
                // Roll the half-created debate back out of the registry
                session.release();
                self.registry.remove(thread_id);
                return Err(DebateError::Output(e));
            }
        }

        info!("debate opened in thread {thread_id} on '{topic}'");
        self.run_turn(
            &session,
            session.opening_prompt(),
            KICKOFF_PROMPT.to_string(),
            TurnKind::Opening,
        )
        .await;

        Ok(thread_id)
    }

    /// Route an inbound thread message. Messages outside active debates,
    /// bot-authored messages, and messages racing an in-flight turn are
    /// dropped; everything else produces a reply turn or ends the debate.
    pub async fn handle_message(&self, thread_id: u64, author_is_bot: bool, content: &str) {
        if author_is_bot {
            return;
        }
        let Some(session) = self.registry.get(thread_id) else {
            return;
        };

        if !session.try_acquire_turn() {
            // Deliberately not queued; the human has to re-send
            debug!("turn in flight for thread {thread_id}, dropping message");
            let _ = self.output.send_message(thread_id, "Still thinking...").await;
            return;
        }

        if session.is_closed() {
            session.release();
            return;
        }

        session.append_utterance(Speaker::Human, content);

        if contains_any(content, HUMAN_CONCESSION_PHRASES) {
            let _ = self
                .output
                .send_message(thread_id, "Human concedes! AI wins this round.")
                .await;
            session.record_bot_win();
            self.close_session(&session).await;
            session.release();
            return;
        }

        match self.output.send_message(thread_id, "AI thinking...").await {
            Ok(message_id) => session.set_pending_message(Some(message_id)),
            Err(e) => {
                error!("failed to send reply placeholder in thread {thread_id}: {e}");
                session.release();
                return;
            }
        }

        let system_prompt = session.reply_prompt(&session.recent_context(CONTEXT_WINDOW));
        self.run_turn(&session, system_prompt, content.to_string(), TurnKind::Reply)
            .await;
    }

    /// Drive one generation through the aggregator: partials edit the
    /// pending message in place, the completion writes the final text and
    /// the bot utterance. The turn lock is released on every path.
    async fn run_turn(
        &self,
        session: &Arc<DebateSession>,
        system_prompt: String,
        user_prompt: String,
        kind: TurnKind,
    ) {
        let thread_id = session.thread_id();

        let tokens = match self.llm.stream(&system_prompt, &user_prompt).await {
            Ok(tokens) => tokens,
            Err(e) => {
                // Absorbed: the session stays usable, no retry
                error!("model call failed for thread {thread_id}: {e}");
                session.set_pending_message(None);
                session.release();
                return;
            }
        };

        let mut updates = StreamAggregator::with_debounce(self.debounce).run(tokens);
        let message_id = session.pending_message();
        let mut final_text = None;

        while let Some(update) = updates.recv().await {
            match update {
                StreamUpdate::Partial(text) => {
                    if let Some(message_id) = message_id {
                        let rendered = truncate_for_message(&kind.render_partial(&text));
                        if let Err(e) =
                            self.output.edit_message(thread_id, message_id, &rendered).await
                        {
                            debug!("partial edit failed in thread {thread_id}: {e}");
                        }
                    }
                }
                StreamUpdate::Failed(e) => {
                    error!("stream failed for thread {thread_id}: {e}");
                }
                StreamUpdate::Complete(text) => final_text = Some(text),
            }
        }

        if let Some(text) = final_text {
            if session.is_closed() {
                // Raced an external close; the turn is abandoned
                debug!("session {thread_id} closed during generation, discarding output");
            } else {
                if let Some(message_id) = message_id {
                    let rendered = truncate_for_message(&kind.render_final(&text));
                    if let Err(e) =
                        self.output.edit_message(thread_id, message_id, &rendered).await
                    {
                        error!("final edit failed in thread {thread_id}: {e}");
                    }
                }
                session.append_utterance(Speaker::Bot, &text);

                if kind == TurnKind::Reply && contains_any(&text, BOT_CONCESSION_PHRASES) {
                    let _ = self
                        .output
                        .send_message(thread_id, "AI concedes! Human wins this round.")
                        .await;
                    session.record_human_win();
                    self.close_session(session).await;
                }
            }
        }

        session.set_pending_message(None);
        session.release();
    }

    async fn close_session(&self, session: &Arc<DebateSession>) {
        session.close();
        if let Err(e) = self.output.lock_thread(session.thread_id()).await {
            warn!("failed to lock thread {}: {e}", session.thread_id());
        }
    }
}

/// Case-insensitive substring match against a phrase set
fn contains_any(text: &str, phrases: &[&str]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DEFAULT_OPENING_PROMPT, DEFAULT_REPLY_PROMPT};
    use crate::llm::{LlmError, TokenReceiver};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    const CHANNEL: u64 = 100;
    const THREAD: u64 = 777;
    const LEADER: u64 = 42;

    /// Model double that replays scripted token streams in order
    struct ScriptedLlm {
        scripts: Mutex<VecDeque<Vec<Result<String, LlmError>>>>,
    }

    impl ScriptedLlm {
        fn new(scripts: Vec<Vec<Result<String, LlmError>>>) -> Self {
            ScriptedLlm {
                scripts: Mutex::new(scripts.into()),
            }
        }

        fn replying(texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|text| vec![Ok(text.to_string())])
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl LanguageModelClient for ScriptedLlm {
        async fn stream(&self, _system: &str, _user: &str) -> Result<TokenReceiver, LlmError> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted generation left");
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for item in script {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    /// Model double whose calls fail before any token arrives
    struct FailingLlm;

    #[async_trait]
    impl LanguageModelClient for FailingLlm {
        async fn stream(&self, _system: &str, _user: &str) -> Result<TokenReceiver, LlmError> {
            Err(LlmError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    /// Output double recording everything the orchestrator does
    #[derive(Default)]
    struct RecordingOutput {
        next_id: AtomicU64,
        sent: Mutex<Vec<(u64, String)>>,
        edits: Mutex<Vec<(u64, u64, String)>>,
        locked: Mutex<Vec<u64>>,
        unsupported: bool,
        fail_sends: bool,
    }

    impl RecordingOutput {
        fn sent(&self) -> Vec<(u64, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn edits(&self) -> Vec<(u64, u64, String)> {
            self.edits.lock().unwrap().clone()
        }

        fn locked(&self) -> Vec<u64> {
            self.locked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ThreadOutput for RecordingOutput {
        async fn create_thread(&self, _channel_id: u64, _name: &str) -> Result<u64, OutputError> {
            if self.unsupported {
                return Err(OutputError::UnsupportedContext);
            }
            Ok(THREAD)
        }

        async fn send_message(&self, thread_id: u64, content: &str) -> Result<u64, OutputError> {
            if self.fail_sends {
                return Err(OutputError::Platform("send rejected".to_string()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.sent.lock().unwrap().push((thread_id, content.to_string()));
            Ok(id)
        }

        async fn edit_message(
            &self,
            thread_id: u64,
            message_id: u64,
            content: &str,
        ) -> Result<(), OutputError> {
            self.edits
                .lock()
                .unwrap()
                .push((thread_id, message_id, content.to_string()));
            Ok(())
        }

        async fn lock_thread(&self, thread_id: u64) -> Result<(), OutputError> {
            self.locked.lock().unwrap().push(thread_id);
            Ok(())
        }
    }

    fn orchestrator(
        llm: Arc<dyn LanguageModelClient>,
        output: Arc<RecordingOutput>,
    ) -> (DebateOrchestrator, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        let orchestrator = DebateOrchestrator::new(
            Arc::clone(&registry),
            llm,
            output,
            DEFAULT_OPENING_PROMPT.to_string(),
            DEFAULT_REPLY_PROMPT.to_string(),
        );
        (orchestrator, registry)
    }

    #[tokio::test]
    async fn test_start_debate_runs_opening_turn() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["The Force is real. Prove me wrong."]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        let thread_id = orchestrator
            .start_debate(CHANNEL, LEADER, "Is the Force real?", None, None)
            .await
            .unwrap();
        assert_eq!(thread_id, THREAD);

        let session = registry.get(THREAD).expect("session registered");
        assert_eq!(
            session.history(),
            vec!["BOT: The Force is real. Prove me wrong."]
        );
        // Lock released once the opening completed
        assert!(session.try_acquire_turn());

        let edits = output.edits();
        let last = &edits.last().unwrap().2;
        assert!(last.contains("**AI: The Force is real. Prove me wrong.**"));
        assert!(last.contains("**Your turn!**"));
    }

    #[tokio::test]
    async fn test_start_debate_unsupported_context() {
        let output = Arc::new(RecordingOutput {
            unsupported: true,
            ..Default::default()
        });
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        let err = orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DebateError::UnsupportedContext));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_start_debate_twice_fails_with_already_exists() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["opening"]));
        let (orchestrator, _registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        let err = orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DebateError::AlreadyExists(THREAD)));
    }

    #[tokio::test]
    async fn test_start_debate_rolls_back_when_placeholder_fails() {
        let output = Arc::new(RecordingOutput {
            fail_sends: true,
            ..Default::default()
        });
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        let err = orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DebateError::Output(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reply_turn_appends_and_releases() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&[
            "Opening shot.",
            "Wrong. Next question?",
        ]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        orchestrator
            .handle_message(THREAD, false, "The premise is flawed")
            .await;

        let session = registry.get(THREAD).unwrap();
        assert_eq!(
            session.history(),
            vec![
                "BOT: Opening shot.",
                "USER: The premise is flawed",
                "BOT: Wrong. Next question?",
            ]
        );
        assert!(session.try_acquire_turn());
        assert!(output
            .edits()
            .iter()
            .any(|(_, _, content)| content == "AI: Wrong. Next question?"));
    }

    #[tokio::test]
    async fn test_human_concession_closes_session() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["Opening shot."]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        orchestrator
            .handle_message(THREAD, false, "I concede, you win")
            .await;

        let session = registry.get(THREAD).unwrap();
        assert!(session.is_closed());
        assert_eq!(session.wins(), (1, 0));
        assert_eq!(output.locked(), vec![THREAD]);
        assert!(output
            .sent()
            .iter()
            .any(|(_, content)| content == "Human concedes! AI wins this round."));

        // Closed sessions ignore further messages
        let history_before = session.history_len();
        let sent_before = output.sent().len();
        orchestrator.handle_message(THREAD, false, "wait, rematch").await;
        assert_eq!(session.history_len(), history_before);
        assert_eq!(output.sent().len(), sent_before);
        // And the lock is free again afterwards
        assert!(session.try_acquire_turn());
    }

    #[tokio::test]
    async fn test_bot_concession_ends_debate() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&[
            "Opening shot.",
            "Fine. I concede, your logic holds.",
        ]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        orchestrator
            .handle_message(THREAD, false, "Checkmate argument")
            .await;

        let session = registry.get(THREAD).unwrap();
        assert!(session.is_closed());
        assert_eq!(session.wins(), (0, 1));
        assert_eq!(output.locked(), vec![THREAD]);
        assert!(output
            .sent()
            .iter()
            .any(|(_, content)| content == "AI concedes! Human wins this round."));
    }

    #[tokio::test]
    async fn test_lock_contention_drops_message() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["Opening shot."]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        let session = registry.get(THREAD).unwrap();

        // Simulate a reply turn still in flight
        assert!(session.try_acquire_turn());
        let history_before = session.history_len();
        orchestrator.handle_message(THREAD, false, "too eager").await;

        assert_eq!(session.history_len(), history_before);
        assert!(output
            .sent()
            .iter()
            .any(|(_, content)| content == "Still thinking..."));
        session.release();
    }

    #[tokio::test]
    async fn test_message_without_session_is_ignored() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let (orchestrator, _registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator.handle_message(999, false, "hello?").await;
        assert!(output.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bot_authored_message_is_ignored() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["Opening shot."]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();
        let session = registry.get(THREAD).unwrap();
        let history_before = session.history_len();

        orchestrator.handle_message(THREAD, true, "my own echo").await;
        assert_eq!(session.history_len(), history_before);
    }

    #[tokio::test]
    async fn test_model_failure_releases_lock_and_keeps_session() {
        let output = Arc::new(RecordingOutput::default());
        let (orchestrator, registry) = orchestrator(Arc::new(FailingLlm), Arc::clone(&output));

        let thread_id = orchestrator
            .start_debate(CHANNEL, LEADER, "topic", None, None)
            .await
            .unwrap();

        let session = registry.get(thread_id).unwrap();
        assert!(!session.is_closed());
        assert!(session.history().is_empty());
        // The placeholder is left as-is, but the session is usable again
        assert!(session.try_acquire_turn());
    }

    #[tokio::test]
    async fn test_prompt_override_reaches_session() {
        let output = Arc::new(RecordingOutput::default());
        let llm = Arc::new(ScriptedLlm::replying(&["Opening shot."]));
        let (orchestrator, registry) = orchestrator(llm, Arc::clone(&output));

        orchestrator
            .start_debate(
                CHANNEL,
                LEADER,
                "tabs vs spaces",
                Some("Custom opener on {topic}".to_string()),
                None,
            )
            .await
            .unwrap();

        let session = registry.get(THREAD).unwrap();
        assert_eq!(session.opening_prompt(), "Custom opener on tabs vs spaces");
    }

    #[test]
    fn test_human_concession_phrases() {
        assert!(contains_any("I CONCEDE!", HUMAN_CONCESSION_PHRASES));
        assert!(contains_any("ok you win", HUMAN_CONCESSION_PHRASES));
        assert!(contains_any("gg", HUMAN_CONCESSION_PHRASES));
        assert!(!contains_any("not giving up", HUMAN_CONCESSION_PHRASES));
    }

    #[test]
    fn test_bot_concession_phrases_are_narrower() {
        assert!(contains_any("Alright, i lose.", BOT_CONCESSION_PHRASES));
        // A bare "concede" from the model is not a surrender
        assert!(!contains_any("you must concede my point", BOT_CONCESSION_PHRASES));
    }
}
