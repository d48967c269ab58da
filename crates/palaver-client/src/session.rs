//! The session state machine.
//!
//! `ChatSession` is the reconciliation engine: it routes inbound frames into
//! the timeline and roster, turns user intents into optimistic mutations
//! plus publish actions, and enforces room scoping. Pure state machine - the
//! caller handles all I/O.

use std::time::Duration;

use palaver_core::{
    ECHO_WINDOW, Environment, Lexicon, MemberRoster, MessageKind, Timeline, new_correlation_id,
};
use palaver_proto::{CorrelationId, Frame, FrameKind, Tagged};

use crate::event::{SessionAction, SessionEvent};

/// Session parameters, fixed at room entry.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local display name.
    pub username: String,
    /// The one room this session is scoped to.
    pub room_id: String,
    /// How long a locally sent message waits for its echo.
    pub echo_window: Duration,
    /// Banned entries for the local lexical filter.
    pub banned_words: Vec<String>,
    /// Entries that never trigger the filter, even when also banned.
    pub allowed_words: Vec<String>,
}

impl SessionConfig {
    /// Config with the default echo window and empty word lists.
    pub fn new(username: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room_id: room_id.into(),
            echo_window: ECHO_WINDOW,
            banned_words: Vec::new(),
            allowed_words: Vec::new(),
        }
    }
}

/// Room-scoped session state machine.
///
/// Each room entry builds a fresh session with its own timeline and roster;
/// nothing is shared across sessions. All mutations happen on the caller's
/// single event-delivery path, so there is no locking here.
pub struct ChatSession<E: Environment> {
    config: SessionConfig,
    env: E,
    timeline: Timeline,
    roster: MemberRoster,
    lexicon: Lexicon,
    closed: bool,
}

impl<E: Environment> ChatSession<E> {
    /// Fresh session for the configured room.
    pub fn new(env: E, config: SessionConfig) -> Self {
        let timeline = Timeline::with_echo_window(&config.room_id, config.echo_window);
        let lexicon = Lexicon::new(&config.banned_words, &config.allowed_words);
        Self { config, env, timeline, roster: MemberRoster::new(), lexicon, closed: false }
    }

    /// Local display name.
    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Room this session is scoped to.
    pub fn room_id(&self) -> &str {
        &self.config.room_id
    }

    /// The message timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The membership roster.
    pub fn roster(&self) -> &MemberRoster {
        &self.roster
    }

    /// Whether the session has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run the local lexical filter over a draft, for a pre-send warning.
    /// Independent of the `polite` verdict the relay stamps on the echo.
    pub fn screen_outbound(&self, text: &str) -> bool {
        self.lexicon.is_flagged(text)
    }

    /// Process one event and return the I/O the driver must perform.
    ///
    /// Never fails: every malformed or unmatched input degrades to a logged
    /// drop or a raw display record, so the worst outcome is a display
    /// inconsistency.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        if self.closed {
            tracing::trace!(?event, "session closed, ignoring event");
            return Vec::new();
        }

        match event {
            SessionEvent::Connected => self.handle_connected(),
            SessionEvent::SendChat { text } => self.handle_send(&text),
            SessionEvent::EditMessage { correlation_id, text } => {
                self.handle_edit(&correlation_id, &text)
            },
            SessionEvent::RecallMessage { correlation_id } => self.handle_recall(&correlation_id),
            SessionEvent::DeleteMessage { correlation_id } => self.handle_delete(&correlation_id),
            SessionEvent::ToggleReveal { correlation_id } => {
                self.timeline.toggle_reveal(&correlation_id);
                Vec::new()
            },
            SessionEvent::FrameReceived(frame) => self.handle_frame(frame),
            SessionEvent::PrivateRoster { names } => {
                self.roster.replace_all(names);
                Vec::new()
            },
            SessionEvent::RoomRoster { room_id, names } => {
                if room_id == self.config.room_id {
                    self.roster.replace_all(names);
                }
                Vec::new()
            },
            SessionEvent::Logout => self.handle_logout(),
        }
    }

    /// Announce presence and optimistically count ourselves present.
    fn handle_connected(&mut self) -> Vec<SessionAction> {
        self.roster.add(self.config.username.clone());
        vec![SessionAction::Publish(Frame::join(&self.config.username, &self.config.room_id))]
    }

    /// Optimistically append, then publish.
    fn handle_send(&mut self, text: &str) -> Vec<SessionAction> {
        let id = new_correlation_id(&self.env);
        let raw = Tagged::Chat { id: id.clone(), body: text.to_owned() }.encode();

        self.timeline.append_local(
            &self.config.username,
            text,
            id,
            raw.clone(),
            self.env.now(),
        );

        vec![SessionAction::Publish(Frame::chat(
            &self.config.username,
            &self.config.room_id,
            raw,
        ))]
    }

    /// Optimistic local edit; published regardless of whether the local
    /// record was found (peers may still hold it).
    fn handle_edit(&mut self, id: &CorrelationId, text: &str) -> Vec<SessionAction> {
        self.timeline.apply_edit(id, text);
        let raw = Tagged::Edit { id: id.clone(), body: text.to_owned() }.encode();
        vec![SessionAction::Publish(Frame::new(
            FrameKind::Edit,
            &self.config.username,
            &self.config.room_id,
            raw,
        ))]
    }

    fn handle_recall(&mut self, id: &CorrelationId) -> Vec<SessionAction> {
        self.timeline.apply_recall(id);
        let raw = Tagged::Recall { id: id.clone() }.encode();
        vec![SessionAction::Publish(Frame::new(
            FrameKind::Recall,
            &self.config.username,
            &self.config.room_id,
            raw,
        ))]
    }

    fn handle_delete(&mut self, id: &CorrelationId) -> Vec<SessionAction> {
        self.timeline.apply_delete(id);
        let raw = Tagged::Delete { id: id.clone() }.encode();
        vec![SessionAction::Publish(Frame::new(
            FrameKind::Delete,
            &self.config.username,
            &self.config.room_id,
            raw,
        ))]
    }

    /// Say goodbye (best effort), drop the roster, stop accepting inbound.
    fn handle_logout(&mut self) -> Vec<SessionAction> {
        let actions =
            vec![SessionAction::Publish(Frame::leave(&self.config.username, &self.config.room_id))];
        self.roster.clear();
        self.closed = true;
        actions
    }

    /// Route one inbound frame, applying the room-scope filter first.
    fn handle_frame(&mut self, frame: Frame) -> Vec<SessionAction> {
        match frame.room_id.as_deref() {
            Some(room) if room == self.config.room_id => {},
            Some(other) => {
                tracing::trace!(room = other, "frame for another room, discarding");
                return Vec::new();
            },
            None => {
                tracing::trace!("frame without a room, discarding");
                return Vec::new();
            },
        }

        match frame.kind {
            FrameKind::Chat => self.on_chat(frame),
            FrameKind::Edit => self.on_edit(frame),
            FrameKind::Recall => self.on_recall(frame),
            FrameKind::Delete => self.on_delete(frame),
            FrameKind::Join => self.on_presence(frame, MessageKind::Join),
            FrameKind::Leave => self.on_presence(frame, MessageKind::Leave),
            FrameKind::System => {
                self.append_notice(&frame, MessageKind::System);
                Vec::new()
            },
        }
    }

    /// Inbound CHAT: reconcile against the pending send or append.
    fn on_chat(&mut self, frame: Frame) -> Vec<SessionAction> {
        let (id, body) = match Tagged::decode(&frame.content) {
            Tagged::Chat { id, body } => (Some(id), body),
            // legacy frame predating the tag protocol, rendered as-is
            Tagged::Plain { body } => (None, body),
            // mutation tags carry no meaning on a CHAT frame; show the raw text
            _ => (None, frame.content.clone()),
        };

        self.timeline.apply_chat(
            &frame.sender,
            id,
            body,
            frame.content,
            frame.polite,
            self.env.now(),
        );
        Vec::new()
    }

    /// Inbound EDIT: in-place rewrite, or drop when the target was never
    /// seen. An EDIT without the matching tag degrades to a display record.
    fn on_edit(&mut self, frame: Frame) -> Vec<SessionAction> {
        match Tagged::decode(&frame.content) {
            Tagged::Edit { id, body } => {
                if !self.timeline.apply_edit(&id, &body) {
                    tracing::debug!(id = %id, "unmatched edit, dropping");
                }
            },
            _ => self.append_raw(frame),
        }
        Vec::new()
    }

    /// Inbound RECALL: terminal, idempotent retraction.
    fn on_recall(&mut self, frame: Frame) -> Vec<SessionAction> {
        match Tagged::decode(&frame.content) {
            Tagged::Recall { id } => {
                if !self.timeline.apply_recall(&id) {
                    tracing::debug!(id = %id, "unmatched recall, dropping");
                }
            },
            _ => self.append_raw(frame),
        }
        Vec::new()
    }

    /// Inbound DELETE: remove the record outright.
    fn on_delete(&mut self, frame: Frame) -> Vec<SessionAction> {
        match Tagged::decode(&frame.content) {
            Tagged::Delete { id } => {
                if !self.timeline.apply_delete(&id) {
                    tracing::debug!(id = %id, "unmatched delete, dropping");
                }
            },
            _ => self.append_raw(frame),
        }
        Vec::new()
    }

    /// Inbound JOIN/LEAVE: provisional roster update, display notice, and a
    /// resync request for the authoritative list.
    fn on_presence(&mut self, frame: Frame, kind: MessageKind) -> Vec<SessionAction> {
        if !frame.sender.is_empty() {
            match kind {
                MessageKind::Join => {
                    self.roster.add(frame.sender.clone());
                },
                _ => {
                    self.roster.remove(&frame.sender);
                },
            }
        }

        self.append_notice(&frame, kind);

        vec![SessionAction::RequestRosterSync { room_id: self.config.room_id.clone() }]
    }

    /// Append a join/leave/system display record, synthesizing text when the
    /// relay supplied none.
    fn append_notice(&mut self, frame: &Frame, kind: MessageKind) {
        let text = if frame.content.is_empty() {
            let about_me = self.concerns_local_user(frame);
            match (kind, about_me, frame.sender.is_empty()) {
                (MessageKind::Leave, true, _) => "You left".to_owned(),
                (MessageKind::Leave, false, true) => "Someone left".to_owned(),
                (MessageKind::Leave, false, false) => format!("{} left", frame.sender),
                (_, true, _) => "You joined".to_owned(),
                (_, false, true) => "Someone joined".to_owned(),
                (_, false, false) => format!("{} joined", frame.sender),
            }
        } else {
            frame.content.clone()
        };

        self.timeline.append_notice(kind, &frame.sender, text, frame.content.clone());
    }

    /// Append an undecodable mutation frame as plain display text.
    fn append_raw(&mut self, frame: Frame) {
        tracing::debug!(kind = ?frame.kind, "mutation frame without its tag, rendering as text");
        self.timeline.apply_chat(
            &frame.sender,
            None,
            frame.content.clone(),
            frame.content,
            frame.polite,
            self.env.now(),
        );
    }

    /// Is this frame about the local user? Sender match and content mention
    /// are OR'd, both case-insensitively.
    fn concerns_local_user(&self, frame: &Frame) -> bool {
        let me = self.config.username.to_lowercase();
        if me.is_empty() {
            return false;
        }
        frame.sender.to_lowercase() == me || frame.content.to_lowercase().contains(&me)
    }
}
