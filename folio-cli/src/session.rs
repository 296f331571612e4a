//! Client-held chat transcript and the per-turn state machine.
//!
//! A turn goes Idle -> Sending -> Streaming -> Idle. Input is only accepted
//! while Idle, so at most one completion is in flight per session.

use folio_shared::{ChatMessage, ClientChatRequest};
use tracing::{debug, info, warn};

use crate::client::TurnEvent;
use crate::persona::GREETING;

pub const FALLBACK_REPLY: &str =
    "It looks like I'm having trouble connecting. Please try again later!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub sender: Sender,
    pub text: String,
}

impl Entry {
    fn to_message(&self) -> ChatMessage {
        match self.sender {
            Sender::User => ChatMessage::user(self.text.clone()),
            Sender::Bot => ChatMessage::assistant(self.text.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
}

pub struct ChatSession {
    entries: Vec<Entry>,
    state: TurnState,
    persona: String,
    history_window: usize,
    scroll_offset: usize,
}

impl ChatSession {
    pub fn new(persona: impl Into<String>, history_window: usize) -> Self {
        Self {
            entries: vec![Entry {
                sender: Sender::Bot,
                text: GREETING.to_string(),
            }],
            state: TurnState::Idle,
            persona: persona.into(),
            history_window,
            scroll_offset: 0,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn input_enabled(&self) -> bool {
        self.state == TurnState::Idle
    }

    /// A turn is in flight and nothing has arrived for it yet.
    pub fn is_waiting(&self) -> bool {
        !self.input_enabled()
            && self
                .entries
                .last()
                .is_some_and(|entry| entry.sender == Sender::Bot && entry.text.is_empty())
    }

    /// Starts a turn for `input` and returns the request to send, or `None`
    /// if the input is blank or a turn is already running.
    pub fn begin_turn(&mut self, input: &str) -> Option<ClientChatRequest> {
        let prompt = input.trim();
        if prompt.is_empty() || !self.input_enabled() {
            return None;
        }

        let request = self.build_request(prompt);
        info!("Starting turn with {} messages", request.messages.len());

        self.entries.push(Entry {
            sender: Sender::User,
            text: prompt.to_string(),
        });
        self.entries.push(Entry {
            sender: Sender::Bot,
            text: String::new(),
        });
        self.state = TurnState::Sending;
        self.scroll_to_bottom();

        Some(request)
    }

    fn build_request(&self, prompt: &str) -> ClientChatRequest {
        let start = self.entries.len().saturating_sub(self.history_window);
        let history = &self.entries[start..];

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.persona.clone()));
        messages.extend(history.iter().map(Entry::to_message));
        messages.push(ChatMessage::user(prompt));

        ClientChatRequest { messages }
    }

    pub fn apply(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Opened => {
                if self.state == TurnState::Sending {
                    self.state = TurnState::Streaming;
                }
            }
            TurnEvent::Delta(delta) => self.append_delta(&delta),
            TurnEvent::Done => self.finish_turn(),
            TurnEvent::Failed(reason) => {
                warn!("Turn failed: {}", reason);
                self.fail_turn();
            }
            TurnEvent::Cancelled => self.cancel_turn(),
        }
    }

    fn placeholder(&mut self) -> Option<&mut Entry> {
        if self.input_enabled() {
            return None;
        }
        self.entries
            .last_mut()
            .filter(|entry| entry.sender == Sender::Bot)
    }

    fn append_delta(&mut self, delta: &str) {
        match self.placeholder() {
            Some(entry) => entry.text.push_str(delta),
            None => {
                debug!("Dropping delta outside of a turn");
                return;
            }
        }
        self.scroll_to_bottom();
    }

    fn finish_turn(&mut self) {
        if self.input_enabled() {
            return;
        }
        self.state = TurnState::Idle;
        self.scroll_to_bottom();
    }

    fn fail_turn(&mut self) {
        if let Some(entry) = self.placeholder() {
            entry.text.push_str(FALLBACK_REPLY);
        }
        self.finish_turn();
    }

    fn cancel_turn(&mut self) {
        if self.is_waiting() {
            self.entries.pop();
        }
        self.finish_turn();
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(amount);
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_shared::MessageRole;

    fn session() -> ChatSession {
        ChatSession::new("persona", 20)
    }

    #[test]
    fn starts_idle_with_greeting() {
        let session = session();
        assert_eq!(session.state(), TurnState::Idle);
        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.entries()[0].sender, Sender::Bot);
        assert_eq!(session.entries()[0].text, GREETING);
    }

    #[test]
    fn begin_turn_appends_user_and_placeholder() {
        let mut session = session();
        let request = session.begin_turn("  hi there ").unwrap();

        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::System, MessageRole::Assistant, MessageRole::User]
        );
        assert_eq!(request.messages[0].content, "persona");
        assert_eq!(request.messages[2].content, "hi there");

        assert_eq!(session.state(), TurnState::Sending);
        assert!(!session.input_enabled());
        assert!(session.is_waiting());
        let entries = session.entries();
        assert_eq!(
            entries[1],
            Entry {
                sender: Sender::User,
                text: "hi there".into(),
            }
        );
        assert_eq!(
            entries[2],
            Entry {
                sender: Sender::Bot,
                text: String::new(),
            }
        );
    }

    #[test]
    fn ignores_blank_input_and_sends_during_a_turn() {
        let mut session = session();
        assert!(session.begin_turn("   ").is_none());
        assert!(session.begin_turn("first").is_some());
        assert!(session.begin_turn("second").is_none());
        assert_eq!(session.entries().len(), 3);
    }

    #[test]
    fn deltas_fill_placeholder_until_done() {
        let mut session = session();
        session.begin_turn("hi").unwrap();
        session.apply(TurnEvent::Opened);
        assert_eq!(session.state(), TurnState::Streaming);

        session.apply(TurnEvent::Delta("Hel".into()));
        session.apply(TurnEvent::Delta("lo".into()));
        session.apply(TurnEvent::Done);
        session.apply(TurnEvent::Delta("late".into()));

        assert_eq!(session.entries().last().unwrap().text, "Hello");
        assert!(session.input_enabled());
    }

    #[test]
    fn failure_appends_fallback_and_reenables_input() {
        let mut session = session();
        session.begin_turn("hi").unwrap();
        session.apply(TurnEvent::Failed("connection refused".into()));

        assert_eq!(session.entries().last().unwrap().text, FALLBACK_REPLY);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[test]
    fn cancel_drops_empty_placeholder_but_keeps_partial_reply() {
        let mut session = session();
        session.begin_turn("one").unwrap();
        session.apply(TurnEvent::Cancelled);
        assert_eq!(session.entries().last().unwrap().sender, Sender::User);
        assert!(session.input_enabled());

        session.begin_turn("two").unwrap();
        session.apply(TurnEvent::Delta("partial".into()));
        session.apply(TurnEvent::Cancelled);
        assert_eq!(session.entries().last().unwrap().text, "partial");
        assert!(session.input_enabled());
    }

    #[test]
    fn history_is_capped_to_window() {
        let mut session = ChatSession::new("persona", 2);
        for i in 0..3 {
            session.begin_turn(&format!("q{i}")).unwrap();
            session.apply(TurnEvent::Delta(format!("a{i}")));
            session.apply(TurnEvent::Done);
        }

        let request = session.begin_turn("q3").unwrap();
        let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["persona", "q2", "a2", "q3"]);
    }

    #[test]
    fn mutations_scroll_to_bottom() {
        let mut session = session();
        session.scroll_up(5);
        session.begin_turn("hi").unwrap();
        assert_eq!(session.scroll_offset(), 0);

        session.scroll_up(3);
        session.apply(TurnEvent::Delta("x".into()));
        assert_eq!(session.scroll_offset(), 0);
    }
}
