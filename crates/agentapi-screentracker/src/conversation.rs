use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use agentapi_msgfmt::extract_codex_reply;
use agentapi_protocol::{AgentType, ConversationMessage, ConversationRole};
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::message_part::{execute_parts, parts_to_string, MessagePart};
use crate::ring_buffer::RingBuffer;

/// Overall bound on each phase of the write-with-confirmation protocol.
const WRITE_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(15);
/// Phase A polling cadence while waiting for the echoed input to appear.
const ECHO_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Phase A settle delay: a changed screen must survive this long unchanged
/// before the echo counts as landed.
const ECHO_SETTLE_DELAY: Duration = Duration::from_secs(1);
/// Phase B polling cadence while waiting for processing to start.
const PROCESSING_POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Phase B re-sends the carriage return if nothing has happened for this
/// long. Agents may drop the first CR, but none of the supported ones treat
/// a repeat as a second submission.
const CARRIAGE_RETURN_RETRY: Duration = Duration::from_secs(3);

/// The slice of the terminal supervisor the tracker is allowed to see.
#[async_trait]
pub trait AgentIo: Send + Sync {
    async fn write(&self, data: &[u8]) -> std::io::Result<usize>;
    async fn read_screen(&self) -> String;
}

pub type FormatMessageFn = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;
pub type GetTimeFn = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub struct ConversationConfig {
    pub agent_type: AgentType,
    pub agent_io: Arc<dyn AgentIo>,
    /// Injectable clock.
    pub get_time: GetTimeFn,
    /// How often the sampler snapshots the screen.
    pub snapshot_interval: Duration,
    /// How long the screen must stay unchanged to count as stable.
    pub screen_stability_length: Duration,
    /// Cleans a raw extracted agent message; the second argument is the last
    /// user message content.
    pub format_message: FormatMessageFn,
    /// Skip writing to the agent entirely. Tests only.
    pub skip_writing_message: bool,
    /// Skip the stable-status precondition on send. Tests only.
    pub skip_send_message_status_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Initializing,
    Stable,
    Changing,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    #[error("message must not be empty")]
    Empty,
    #[error("message must be trimmed of leading and trailing whitespace")]
    Whitespace,
    #[error("message can only be sent when the agent is waiting for user input")]
    Changing,
    #[error("{0}")]
    Io(String),
}

struct ScreenSnapshot {
    timestamp: OffsetDateTime,
    screen: String,
}

struct ConversationState {
    snapshot_buffer: RingBuffer<Arc<ScreenSnapshot>>,
    messages: Vec<ConversationMessage>,
    screen_before_last_user_message: String,
    /// Set while a user message is being written to the agent. The user
    /// entry is appended only after the write is confirmed, so this flag is
    /// what makes `status` report `changing` in the meantime. It also stops
    /// concurrently sampled frames from growing the finalized tail agent
    /// message with the echo of the user's own keystrokes.
    pending_send: bool,
}

/// Builds the conversation out of screen samples.
///
/// The lock is held for state mutation only; it is released around every
/// blocking terminal read or write.
pub struct Conversation {
    cfg: ConversationConfig,
    stable_snapshots_threshold: usize,
    state: Mutex<ConversationState>,
}

fn stable_snapshots_threshold(cfg: &ConversationConfig) -> usize {
    let length = cfg.screen_stability_length.as_millis();
    let interval = cfg.snapshot_interval.as_millis();
    assert!(interval > 0, "snapshot interval must be positive");
    let mut threshold = usize::try_from(length / interval).expect("stability threshold fits usize");
    if length % interval != 0 {
        threshold += 1;
    }
    // One more than the window so a full ring proves a stability span rather
    // than an accidentally aligned repaint.
    threshold + 1
}

/// Extract the part of `new_screen` that is not present in `old_screen`.
///
/// Both screens are split into lines; the first new line not appearing
/// anywhere in the old screen marks where novel content starts. Leading and
/// trailing whitespace-only lines are dropped from the result. Codex replies
/// come out of a dedicated reply widget instead of a plain diff.
pub fn find_new_message(old_screen: &str, new_screen: &str, agent_type: AgentType) -> String {
    if agent_type == AgentType::Codex {
        return extract_codex_reply(new_screen);
    }

    let old_lines: HashSet<&str> = old_screen.split('\n').collect();
    let new_lines: Vec<&str> = new_screen.split('\n').collect();
    let first_new_line = new_lines
        .iter()
        .position(|line| !old_lines.contains(line))
        .unwrap_or(new_lines.len());
    let section = &new_lines[first_new_line..];
    if section.is_empty() {
        return String::new();
    }

    let start = section
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(0);
    let end = section
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(section.len() - 1);
    section[start..=end].join("\n")
}

impl Conversation {
    pub fn new(cfg: ConversationConfig) -> Self {
        let threshold = stable_snapshots_threshold(&cfg);
        let initial_message = ConversationMessage {
            id: 0,
            role: ConversationRole::Agent,
            content: String::new(),
            time: (cfg.get_time)(),
        };
        Self {
            stable_snapshots_threshold: threshold,
            state: Mutex::new(ConversationState {
                snapshot_buffer: RingBuffer::new(threshold),
                messages: vec![initial_message],
                screen_before_last_user_message: String::new(),
                pending_send: false,
            }),
            cfg,
        }
    }

    /// Snapshot the screen every `snapshot_interval` until aborted.
    pub fn start_snapshot_loop(self: Arc<Self>) -> JoinHandle<()> {
        let conversation = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(conversation.cfg.snapshot_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let screen = conversation.cfg.agent_io.read_screen().await;
                conversation.add_snapshot(&screen);
            }
        })
    }

    pub fn add_snapshot(&self, screen: &str) {
        let now = (self.cfg.get_time)();
        let mut state = self.lock_state();
        let snapshot = Arc::new(ScreenSnapshot {
            timestamp: now,
            screen: screen.to_owned(),
        });
        tracing::trace!(taken_at = %snapshot.timestamp, "screen snapshot added");
        state.snapshot_buffer.push(snapshot);
        if !state.pending_send {
            self.update_last_agent_message(&mut state, screen, now);
        }
    }

    /// Recompute the tail agent message from the given screen. Appends a new
    /// agent entry when the tail is a user message; otherwise rewrites the
    /// tail's content in place, keeping its id and timestamp.
    fn update_last_agent_message(
        &self,
        state: &mut ConversationState,
        screen: &str,
        timestamp: OffsetDateTime,
    ) {
        let raw = find_new_message(
            &state.screen_before_last_user_message,
            screen,
            self.cfg.agent_type,
        );
        let last_user_content = state
            .messages
            .iter()
            .rev()
            .find(|message| message.role == ConversationRole::User)
            .map(|message| message.content.clone())
            .unwrap_or_default();
        let formatted = (self.cfg.format_message)(&raw, &last_user_content);

        let unchanged = state
            .messages
            .iter()
            .rev()
            .find(|message| message.role == ConversationRole::Agent)
            .map(|message| message.content.as_str())
            .unwrap_or_default()
            == formatted;
        if unchanged {
            return;
        }

        let tail_is_user = state
            .messages
            .last()
            .map_or(true, |message| message.role == ConversationRole::User);
        if tail_is_user {
            let id = state.messages.len();
            state.messages.push(ConversationMessage {
                id,
                role: ConversationRole::Agent,
                content: formatted,
                time: timestamp,
            });
        } else {
            let tail = state
                .messages
                .last_mut()
                .expect("conversation always has at least the initial agent message");
            tail.content = formatted;
        }
    }

    /// Send a user submission to the agent.
    ///
    /// Preconditions: the visible content must be non-empty, free of leading
    /// and trailing whitespace (the formatter relies on it), and the agent
    /// must be waiting for input. On any error the conversation history is
    /// left untouched.
    pub async fn send_message(&self, parts: Vec<MessagePart>) -> Result<(), SendMessageError> {
        {
            let state = self.lock_state();
            if !self.cfg.skip_send_message_status_check
                && self.status_inner(&state) != ConversationStatus::Stable
            {
                return Err(SendMessageError::Changing);
            }
        }

        let message = parts_to_string(&parts);
        if message != agentapi_msgfmt::trim_whitespace(&message) {
            return Err(SendMessageError::Whitespace);
        }
        if message.is_empty() {
            return Err(SendMessageError::Empty);
        }

        // Finalize the tail agent message from the pre-send screen so the
        // echo of this submission never becomes part of it.
        let screen_before_message = self.cfg.agent_io.read_screen().await;
        let now = (self.cfg.get_time)();
        {
            let mut state = self.lock_state();
            // Re-check under the same lock that stages the send: a
            // concurrent send or a fresh snapshot may have flipped the
            // status while the screen was being read.
            if !self.cfg.skip_send_message_status_check
                && self.status_inner(&state) != ConversationStatus::Stable
            {
                return Err(SendMessageError::Changing);
            }
            self.update_last_agent_message(&mut state, &screen_before_message, now);
            state.pending_send = true;
        }

        let written = self.write_message_with_confirmation(&parts).await;

        let mut state = self.lock_state();
        state.pending_send = false;
        written?;

        state.screen_before_last_user_message = screen_before_message;
        let id = state.messages.len();
        state.messages.push(ConversationMessage {
            id,
            role: ConversationRole::User,
            content: message,
            time: now,
        });
        Ok(())
    }

    /// TUI agents only process a prompt once they have echoed it back and
    /// received a carriage return after the echo landed. Sending the CR too
    /// early silently drops the submission or submits twice.
    async fn write_message_with_confirmation(
        &self,
        parts: &[MessagePart],
    ) -> Result<(), SendMessageError> {
        if self.cfg.skip_writing_message {
            return Ok(());
        }
        let agent_io = self.cfg.agent_io.as_ref();

        let screen_before_message = agent_io.read_screen().await;
        execute_parts(agent_io, parts)
            .await
            .map_err(|error| SendMessageError::Io(format!("failed to write message part: {error}")))?;

        // Phase A: wait for the echoed input to appear and settle.
        let deadline = Instant::now() + WRITE_CONFIRMATION_TIMEOUT;
        let mut settled = false;
        while Instant::now() < deadline {
            tokio::time::sleep(ECHO_POLL_INTERVAL).await;
            let screen = agent_io.read_screen().await;
            if screen != screen_before_message {
                tokio::time::sleep(ECHO_SETTLE_DELAY).await;
                if agent_io.read_screen().await == screen {
                    settled = true;
                    break;
                }
            }
        }
        if !settled {
            return Err(SendMessageError::Io(
                "timed out waiting for the echoed message to stabilize".to_owned(),
            ));
        }

        // Phase B: nudge with a carriage return until the screen moves.
        let screen_before_carriage_return = agent_io.read_screen().await;
        let deadline = Instant::now() + WRITE_CONFIRMATION_TIMEOUT;
        let mut last_carriage_return: Option<Instant> = None;
        while Instant::now() < deadline {
            if last_carriage_return.map_or(true, |at| at.elapsed() >= CARRIAGE_RETURN_RETRY) {
                last_carriage_return = Some(Instant::now());
                agent_io.write(b"\r").await.map_err(|error| {
                    SendMessageError::Io(format!("failed to write carriage return: {error}"))
                })?;
            }
            tokio::time::sleep(PROCESSING_POLL_INTERVAL).await;
            if agent_io.read_screen().await != screen_before_carriage_return {
                return Ok(());
            }
        }
        Err(SendMessageError::Io(
            "timed out waiting for the agent to start processing the message".to_owned(),
        ))
    }

    fn status_inner(&self, state: &ConversationState) -> ConversationStatus {
        assert_eq!(
            state.snapshot_buffer.capacity(),
            self.stable_snapshots_threshold,
            "snapshot buffer capacity must equal the stability threshold"
        );
        assert!(
            self.stable_snapshots_threshold > 0,
            "stability threshold must be positive"
        );

        if state.pending_send {
            return ConversationStatus::Changing;
        }
        if state
            .messages
            .last()
            .is_some_and(|message| message.role == ConversationRole::User)
        {
            // The sampler has not run since the last user message; assume
            // the screen is about to change.
            return ConversationStatus::Changing;
        }
        if state.snapshot_buffer.len() != self.stable_snapshots_threshold {
            return ConversationStatus::Initializing;
        }

        let mut screens = state.snapshot_buffer.iter();
        let first = screens.next().expect("full ring is not empty");
        if screens.all(|snapshot| snapshot.screen == first.screen) {
            ConversationStatus::Stable
        } else {
            ConversationStatus::Changing
        }
    }

    pub fn status(&self) -> ConversationStatus {
        let state = self.lock_state();
        self.status_inner(&state)
    }

    /// A defensive copy of the conversation history.
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.lock_state().messages.clone()
    }

    /// The most recent sampled screen, or an empty string before the first
    /// sample.
    pub fn screen(&self) -> String {
        self.lock_state()
            .snapshot_buffer
            .last()
            .map(|snapshot| snapshot.screen.clone())
            .unwrap_or_default()
    }

    fn lock_state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().expect("conversation state lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestAgent {
        screen: Mutex<String>,
    }

    impl TestAgent {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                screen: Mutex::new(String::new()),
            })
        }

        fn set_screen(&self, screen: &str) {
            *self.screen.lock().expect("test agent screen lock") = screen.to_owned();
        }
    }

    #[async_trait]
    impl AgentIo for TestAgent {
        async fn write(&self, data: &[u8]) -> std::io::Result<usize> {
            Ok(data.len())
        }

        async fn read_screen(&self) -> String {
            self.screen.lock().expect("test agent screen lock").clone()
        }
    }

    fn fixed_now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_714_000_000).expect("valid timestamp")
    }

    fn test_config(agent: Arc<TestAgent>) -> ConversationConfig {
        ConversationConfig {
            agent_type: AgentType::Custom,
            agent_io: agent,
            get_time: Arc::new(fixed_now),
            snapshot_interval: Duration::from_secs(1),
            screen_stability_length: Duration::from_secs(2),
            format_message: Arc::new(|message, _| message.to_owned()),
            skip_writing_message: true,
            skip_send_message_status_check: true,
        }
    }

    fn agent_msg(id: usize, content: &str) -> ConversationMessage {
        ConversationMessage {
            id,
            role: ConversationRole::Agent,
            content: content.to_owned(),
            time: fixed_now(),
        }
    }

    fn user_msg(id: usize, content: &str) -> ConversationMessage {
        ConversationMessage {
            id,
            role: ConversationRole::User,
            content: content.to_owned(),
            time: fixed_now(),
        }
    }

    async fn send(conversation: &Conversation, content: &str) -> Result<(), SendMessageError> {
        conversation
            .send_message(vec![MessagePart::text(content)])
            .await
    }

    fn status_table_test(
        snapshot_interval: Duration,
        screen_stability_length: Duration,
        steps: &[(&str, ConversationStatus)],
    ) {
        let mut cfg = test_config(TestAgent::new());
        cfg.snapshot_interval = snapshot_interval;
        cfg.screen_stability_length = screen_stability_length;
        let conversation = Conversation::new(cfg);
        assert_eq!(conversation.status(), ConversationStatus::Initializing);

        for (i, (snapshot, expected)) in steps.iter().enumerate() {
            conversation.add_snapshot(snapshot);
            assert_eq!(conversation.status(), *expected, "step {i}");
        }
    }

    #[test]
    fn status_follows_the_stability_window() {
        use ConversationStatus::{Changing, Initializing, Stable};

        // threshold: 3
        status_table_test(
            Duration::from_secs(1),
            Duration::from_secs(2),
            &[
                ("1", Initializing),
                ("1", Initializing),
                ("1", Stable),
                ("1", Stable),
                ("2", Changing),
            ],
        );

        // threshold: 3 (stability length rounds up to two intervals)
        status_table_test(
            Duration::from_secs(2),
            Duration::from_secs(3),
            &[
                ("1", Initializing),
                ("1", Initializing),
                ("1", Stable),
                ("1", Stable),
                ("2", Changing),
                ("2", Changing),
                ("2", Stable),
                ("2", Stable),
                ("2", Stable),
            ],
        );

        // threshold: 4
        status_table_test(
            Duration::from_secs(6),
            Duration::from_secs(14),
            &[
                ("1", Initializing),
                ("1", Initializing),
                ("1", Initializing),
                ("1", Stable),
                ("1", Stable),
                ("1", Stable),
                ("2", Changing),
                ("2", Changing),
                ("2", Changing),
                ("2", Stable),
            ],
        );
    }

    #[test]
    fn equal_interval_and_stability_need_two_matching_frames() {
        use ConversationStatus::{Initializing, Stable};

        // threshold: 2
        status_table_test(
            Duration::from_millis(25),
            Duration::from_millis(25),
            &[("1", Initializing), ("1", Stable)],
        );
    }

    #[test]
    fn messages_are_returned_as_a_defensive_copy() {
        let conversation = Conversation::new(test_config(TestAgent::new()));
        let mut messages = conversation.messages();
        assert_eq!(messages, vec![agent_msg(0, "")]);

        messages[0].content = "modification".to_owned();

        assert_eq!(conversation.messages(), vec![agent_msg(0, "")]);
    }

    #[tokio::test]
    async fn whitespace_padded_messages_are_rejected_without_state_changes() {
        let conversation = Conversation::new(test_config(TestAgent::new()));
        for content in ["123 ", " 123", "123\t\t", "\n123", "123\n\t", " \t123\n\t"] {
            let error = send(&conversation, content)
                .await
                .expect_err("padded message should fail");
            assert_eq!(error, SendMessageError::Whitespace);
        }
        assert_eq!(conversation.messages(), vec![agent_msg(0, "")]);
    }

    #[tokio::test]
    async fn empty_messages_are_rejected() {
        let conversation = Conversation::new(test_config(TestAgent::new()));
        assert_eq!(
            send(&conversation, "").await,
            Err(SendMessageError::Empty)
        );
    }

    #[test]
    fn unchanged_screens_do_not_touch_the_message_list() {
        let later = Arc::new(Mutex::new(fixed_now()));
        let clock = Arc::clone(&later);
        let mut cfg = test_config(TestAgent::new());
        cfg.get_time = Arc::new(move || *clock.lock().expect("clock lock"));
        let conversation = Conversation::new(cfg);

        conversation.add_snapshot("1");
        let messages = conversation.messages();
        assert_eq!(messages, vec![agent_msg(0, "1")]);

        *later.lock().expect("clock lock") = fixed_now() + Duration::from_secs(1);
        conversation.add_snapshot("1");
        assert_eq!(conversation.messages(), messages);
    }

    #[tokio::test]
    async fn tracks_messages_across_user_turns() {
        let agent = TestAgent::new();
        let conversation = Conversation::new(test_config(Arc::clone(&agent)));

        // the agent message is recorded when the first snapshot is added
        conversation.add_snapshot("1");
        assert_eq!(conversation.messages(), vec![agent_msg(0, "1")]);

        // the tail agent message is rewritten when the screen changes
        conversation.add_snapshot("2");
        assert_eq!(conversation.messages(), vec![agent_msg(0, "2")]);

        // a user message is recorded
        agent.set_screen("2");
        send(&conversation, "3").await.expect("send message");
        assert_eq!(
            conversation.messages(),
            vec![agent_msg(0, "2"), user_msg(1, "3")]
        );

        // an agent message is appended after a user message
        conversation.add_snapshot("4");
        assert_eq!(
            conversation.messages(),
            vec![agent_msg(0, "2"), user_msg(1, "3"), agent_msg(2, "4")]
        );

        // the tail agent message is finalized from the pre-send screen
        agent.set_screen("5");
        send(&conversation, "6").await.expect("send message");
        assert_eq!(
            conversation.messages(),
            vec![
                agent_msg(0, "2"),
                user_msg(1, "3"),
                agent_msg(2, "5"),
                user_msg(3, "6"),
            ]
        );

        // the conversation is changing right after a user message
        conversation.add_snapshot("7");
        conversation.add_snapshot("7");
        conversation.add_snapshot("7");
        assert_eq!(conversation.status(), ConversationStatus::Stable);
        agent.set_screen("7");
        send(&conversation, "8").await.expect("send message");
        assert_eq!(
            conversation.messages(),
            vec![
                agent_msg(0, "2"),
                user_msg(1, "3"),
                agent_msg(2, "5"),
                user_msg(3, "6"),
                agent_msg(4, "7"),
                user_msg(5, "8"),
            ]
        );
        assert_eq!(conversation.status(), ConversationStatus::Changing);

        // and back to stable once a snapshot matches the full ring again
        conversation.add_snapshot("7");
        assert_eq!(conversation.status(), ConversationStatus::Stable);
    }

    #[tokio::test]
    async fn overlap_with_previous_screens_is_removed() {
        let agent = TestAgent::new();
        let conversation = Conversation::new(test_config(Arc::clone(&agent)));

        conversation.add_snapshot("1");
        agent.set_screen("1");
        send(&conversation, "2").await.expect("send message");
        conversation.add_snapshot("1\n3");
        assert_eq!(
            conversation.messages(),
            vec![agent_msg(0, "1"), user_msg(1, "2"), agent_msg(2, "3")]
        );

        agent.set_screen("1\n3x");
        send(&conversation, "4").await.expect("send message");
        conversation.add_snapshot("1\n3x\n5");
        assert_eq!(
            conversation.messages(),
            vec![
                agent_msg(0, "1"),
                user_msg(1, "2"),
                agent_msg(2, "3x"),
                user_msg(3, "4"),
                agent_msg(4, "5"),
            ]
        );
    }

    #[tokio::test]
    async fn formatter_receives_the_last_user_message() {
        let agent = TestAgent::new();
        let mut cfg = test_config(Arc::clone(&agent));
        cfg.format_message = Arc::new(|message, user_input| format!("{message} {user_input}"));
        let conversation = Conversation::new(cfg);

        agent.set_screen("1");
        send(&conversation, "2").await.expect("send message");
        assert_eq!(
            conversation.messages(),
            vec![agent_msg(0, "1 "), user_msg(1, "2")]
        );

        agent.set_screen("x");
        conversation.add_snapshot("x");
        assert_eq!(
            conversation.messages(),
            vec![agent_msg(0, "1 "), user_msg(1, "2"), agent_msg(2, "x 2")]
        );
    }

    #[test]
    fn the_initial_message_is_not_formatted() {
        let mut cfg = test_config(TestAgent::new());
        cfg.format_message = Arc::new(|_, _| "formatted".to_owned());
        let conversation = Conversation::new(cfg);

        assert_eq!(conversation.messages(), vec![agent_msg(0, "")]);
    }

    #[tokio::test]
    async fn user_messages_require_a_stable_screen() {
        let mut cfg = test_config(TestAgent::new());
        cfg.skip_send_message_status_check = false;
        let conversation = Conversation::new(cfg);

        assert_eq!(
            send(&conversation, "1").await,
            Err(SendMessageError::Changing)
        );
        for _ in 0..3 {
            conversation.add_snapshot("1");
        }
        send(&conversation, "4").await.expect("send while stable");
        conversation.add_snapshot("2");
        assert_eq!(
            send(&conversation, "5").await,
            Err(SendMessageError::Changing)
        );
    }

    #[test]
    fn find_new_message_identities() {
        let custom = AgentType::Custom;
        assert_eq!(find_new_message("123456", "123456", custom), "");
        assert_eq!(find_new_message("123456", "1234567", custom), "1234567");
        assert_eq!(find_new_message("123", "123\n  \n \n \n42", custom), "42");
        assert_eq!(find_new_message("123", "12342\n   \n \n \n", custom), "12342");
        assert_eq!(
            find_new_message("123", "123\n  \n \n \n42\n   \n \n \n", custom),
            "42"
        );
        assert_eq!(find_new_message("89", "42", custom), "42");
        assert_eq!(find_new_message("", "welcome\n", custom), "welcome");
    }

    #[test]
    fn find_new_message_extracts_the_codex_reply_widget() {
        let screen = "\
old content
╭──────────────────╮
│ boxed reply      │
╰──────────────────╯";
        assert_eq!(
            find_new_message("old content", screen, AgentType::Codex),
            " boxed reply"
        );
    }

    #[test]
    fn screen_returns_the_latest_snapshot() {
        let conversation = Conversation::new(test_config(TestAgent::new()));
        assert_eq!(conversation.screen(), "");
        conversation.add_snapshot("first");
        conversation.add_snapshot("second");
        assert_eq!(conversation.screen(), "second");
    }
}
