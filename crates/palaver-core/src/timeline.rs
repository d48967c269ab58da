//! The room-scoped message timeline.
//!
//! Ordered, mutable log of message records. Owns the optimistic-echo
//! reconciliation window, the apply-mutation semantics for EDIT, RECALL and
//! DELETE frames, and the moderation visibility state of each record.
//!
//! Reconciliation contract: for a locally sent message, an echo carrying the
//! same correlation id that arrives inside the window replaces the
//! optimistic record in place. An echo arriving later is appended as a new
//! record and the stale optimistic one stays forever - the window is checked
//! lazily at reconciliation time, never by timer.

use std::time::{Duration, Instant};

use palaver_proto::CorrelationId;

/// How long a locally sent message waits for its server echo before the
/// optimistic record is considered permanent.
pub const ECHO_WINDOW: Duration = Duration::from_secs(5);

/// What a record represents on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Conversational message.
    Chat,
    /// Join notice.
    Join,
    /// Leave notice.
    Leave,
    /// Other server-supplied display text.
    System,
}

/// Moderation visibility state of one record.
///
/// `revealed` only carries meaning while `flagged` is set; an unflagged
/// record is always visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationState {
    /// The politeness verdict came back negative.
    pub flagged: bool,
    /// User override of the hidden-by-default rendering.
    pub revealed: bool,
}

impl ModerationState {
    /// State for content nobody has objected to.
    pub fn clean() -> Self {
        Self { flagged: false, revealed: true }
    }

    /// State derived from an inbound frame's politeness verdict.
    pub fn from_verdict(polite: Option<bool>) -> Self {
        let flagged = polite == Some(false);
        Self { flagged, revealed: !flagged }
    }
}

/// One conversational unit in the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Present for locally-authored or round-tripped messages; absent for
    /// legacy and notice records that predate the tag protocol.
    pub correlation_id: Option<CorrelationId>,
    /// Display name of the author.
    pub sender: String,
    /// Room this record belongs to.
    pub room_id: String,
    /// What the record represents.
    pub kind: MessageKind,
    /// Human-visible text; `None` once recalled.
    pub content: Option<String>,
    /// The undecoded wire payload, retained for diagnostics.
    pub raw_content: String,
    /// True while the record is an optimistic placeholder awaiting its echo.
    pub is_local_echo: bool,
    /// The message has been retracted; terminal.
    pub is_recalled: bool,
    /// The message text has been replaced at least once.
    pub is_edited: bool,
    /// Moderation visibility state.
    pub moderation: ModerationState,
}

/// The most recent locally-sent message still awaiting its echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Correlation id the echo must carry.
    pub correlation_id: CorrelationId,
    /// When the send was submitted.
    pub submitted_at: Instant,
}

/// Outcome of applying an inbound CHAT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The frame confirmed the pending optimistic record in place.
    Replaced,
    /// The frame was appended as a new record.
    Appended,
}

/// Ordered, mutable log of message records for one room.
#[derive(Debug, Clone)]
pub struct Timeline {
    room_id: String,
    records: Vec<MessageRecord>,
    pending: Option<PendingSend>,
    echo_window: Duration,
}

impl Timeline {
    /// Empty timeline for a room, with the default echo window.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self::with_echo_window(room_id, ECHO_WINDOW)
    }

    /// Empty timeline with an explicit echo window.
    pub fn with_echo_window(room_id: impl Into<String>, echo_window: Duration) -> Self {
        Self { room_id: room_id.into(), records: Vec::new(), pending: None, echo_window }
    }

    /// Room this timeline is scoped to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// All records in display order.
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the timeline holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The send still awaiting its echo, if any.
    pub fn pending(&self) -> Option<&PendingSend> {
        self.pending.as_ref()
    }

    /// Latest record carrying `id`.
    pub fn find(&self, id: &CorrelationId) -> Option<&MessageRecord> {
        self.records.iter().rev().find(|r| r.correlation_id.as_ref() == Some(id))
    }

    /// Append an optimistic local record and arm the pending send.
    ///
    /// A previous unconfirmed pending send is superseded; its optimistic
    /// record stays in the log but will never reconcile.
    pub fn append_local(
        &mut self,
        sender: &str,
        body: &str,
        id: CorrelationId,
        raw_content: String,
        now: Instant,
    ) -> &MessageRecord {
        self.records.push(MessageRecord {
            correlation_id: Some(id.clone()),
            sender: sender.to_owned(),
            room_id: self.room_id.clone(),
            kind: MessageKind::Chat,
            content: Some(body.to_owned()),
            raw_content,
            is_local_echo: true,
            is_recalled: false,
            is_edited: false,
            moderation: ModerationState::clean(),
        });
        self.pending = Some(PendingSend { correlation_id: id, submitted_at: now });

        &self.records[self.records.len() - 1]
    }

    /// Apply an inbound CHAT frame: confirm the pending optimistic record in
    /// place when the correlation id matches inside the echo window,
    /// otherwise append. Covers messages from other senders and late or
    /// foreign echoes.
    pub fn apply_chat(
        &mut self,
        sender: &str,
        id: Option<CorrelationId>,
        body: String,
        raw_content: String,
        polite: Option<bool>,
        now: Instant,
    ) -> Reconciliation {
        // lazy cleanup: an expired pending send can never match again
        if let Some(pending) = &self.pending {
            if now.saturating_duration_since(pending.submitted_at) > self.echo_window {
                self.pending = None;
            }
        }

        let confirmed = MessageRecord {
            correlation_id: id.clone(),
            sender: sender.to_owned(),
            room_id: self.room_id.clone(),
            kind: MessageKind::Chat,
            content: Some(body),
            raw_content,
            is_local_echo: false,
            is_recalled: false,
            is_edited: false,
            moderation: ModerationState::from_verdict(polite),
        };

        if let (Some(id), Some(pending)) = (&id, &self.pending) {
            if *id == pending.correlation_id {
                if let Some(index) = self
                    .records
                    .iter()
                    .position(|r| r.is_local_echo && r.correlation_id.as_ref() == Some(id))
                {
                    self.records[index] = confirmed;
                    self.pending = None;
                    return Reconciliation::Replaced;
                }
                // optimistic record vanished (deleted before the echo landed)
                self.pending = None;
            }
        }

        self.records.push(confirmed);
        Reconciliation::Appended
    }

    /// Replace the text of the record carrying `id`.
    ///
    /// Returns false when no such record exists (out-of-order edit for a
    /// message never seen - dropped, not queued) or when the record has been
    /// recalled (recall is terminal).
    pub fn apply_edit(&mut self, id: &CorrelationId, body: &str) -> bool {
        let Some(record) = self.find_mut(id) else {
            tracing::debug!(id = %id, "edit targets unknown record, dropping");
            return false;
        };
        if record.is_recalled {
            tracing::debug!(id = %id, "edit targets recalled record, dropping");
            return false;
        }
        record.content = Some(body.to_owned());
        record.is_edited = true;
        true
    }

    /// Retract the record carrying `id`. Idempotent; a second recall of the
    /// same id changes nothing.
    pub fn apply_recall(&mut self, id: &CorrelationId) -> bool {
        let Some(record) = self.find_mut(id) else {
            tracing::debug!(id = %id, "recall targets unknown record, dropping");
            return false;
        };
        record.is_recalled = true;
        record.content = None;
        true
    }

    /// Remove the record carrying `id` entirely. No tombstone is kept.
    pub fn apply_delete(&mut self, id: &CorrelationId) -> bool {
        let Some(index) =
            self.records.iter().rposition(|r| r.correlation_id.as_ref() == Some(id))
        else {
            tracing::debug!(id = %id, "delete targets unknown record, dropping");
            return false;
        };
        self.records.remove(index);
        true
    }

    /// Append a join/leave/system display record. Never touches chat records.
    pub fn append_notice(
        &mut self,
        kind: MessageKind,
        sender: &str,
        text: String,
        raw_content: String,
    ) {
        self.records.push(MessageRecord {
            correlation_id: None,
            sender: sender.to_owned(),
            room_id: self.room_id.clone(),
            kind,
            content: Some(text),
            raw_content,
            is_local_echo: false,
            is_recalled: false,
            is_edited: false,
            moderation: ModerationState::clean(),
        });
    }

    /// Flip the reveal override on a flagged record. No-op (returns false)
    /// when the record is absent or was never flagged.
    pub fn toggle_reveal(&mut self, id: &CorrelationId) -> bool {
        match self.find_mut(id) {
            Some(record) if record.moderation.flagged => {
                record.moderation.revealed = !record.moderation.revealed;
                true
            },
            _ => false,
        }
    }

    /// Latest record carrying `id`, mutably. Peer mutations always target
    /// the server-echoed record, which sorts after any stale optimistic twin.
    fn find_mut(&mut self, id: &CorrelationId) -> Option<&mut MessageRecord> {
        self.records.iter_mut().rev().find(|r| r.correlation_id.as_ref() == Some(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cid(id: &str) -> CorrelationId {
        CorrelationId::new(id)
    }

    fn timeline() -> Timeline {
        Timeline::new("1")
    }

    fn inbound_chat(
        timeline: &mut Timeline,
        sender: &str,
        id: &str,
        body: &str,
        now: Instant,
    ) -> Reconciliation {
        timeline.apply_chat(
            sender,
            Some(cid(id)),
            body.to_owned(),
            format!("[cid:{id}]{body}"),
            None,
            now,
        )
    }

    #[test]
    fn append_local_is_optimistic() {
        let mut timeline = timeline();
        let now = Instant::now();

        timeline.append_local("ada", "hello", cid("abc"), "[cid:abc]hello".to_owned(), now);

        assert_eq!(timeline.len(), 1);
        let record = &timeline.records()[0];
        assert!(record.is_local_echo);
        assert_eq!(record.content.as_deref(), Some("hello"));
        assert_eq!(timeline.pending().unwrap().correlation_id, cid("abc"));
    }

    #[test]
    fn fresh_echo_replaces_in_place() {
        let mut timeline = timeline();
        let sent = Instant::now();

        timeline.append_local("ada", "hello", cid("abc"), "[cid:abc]hello".to_owned(), sent);
        let outcome =
            inbound_chat(&mut timeline, "ada", "abc", "hello", sent + Duration::from_secs(1));

        assert_eq!(outcome, Reconciliation::Replaced);
        assert_eq!(timeline.len(), 1);
        let record = &timeline.records()[0];
        assert!(!record.is_local_echo);
        assert!(timeline.pending().is_none());
    }

    #[test]
    fn echo_replacement_preserves_position() {
        let mut timeline = timeline();
        let sent = Instant::now();

        timeline.append_local("ada", "first", cid("abc"), "[cid:abc]first".to_owned(), sent);
        inbound_chat(&mut timeline, "bob", "zzz", "interleaved", sent);

        let outcome =
            inbound_chat(&mut timeline, "ada", "abc", "first", sent + Duration::from_secs(2));

        assert_eq!(outcome, Reconciliation::Replaced);
        assert_eq!(timeline.records()[0].sender, "ada");
        assert_eq!(timeline.records()[1].sender, "bob");
    }

    #[test]
    fn late_echo_appends_second_record() {
        let mut timeline = timeline();
        let sent = Instant::now();

        timeline.append_local("ada", "hello", cid("abc"), "[cid:abc]hello".to_owned(), sent);
        let outcome =
            inbound_chat(&mut timeline, "ada", "abc", "hello", sent + Duration::from_secs(6));

        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(timeline.len(), 2);
        assert!(timeline.records()[0].is_local_echo);
        assert!(!timeline.records()[1].is_local_echo);
        assert!(timeline.pending().is_none());
    }

    #[test]
    fn next_send_supersedes_pending() {
        let mut timeline = timeline();
        let now = Instant::now();

        timeline.append_local("ada", "one", cid("a"), "[cid:a]one".to_owned(), now);
        timeline.append_local("ada", "two", cid("b"), "[cid:b]two".to_owned(), now);

        assert_eq!(timeline.pending().unwrap().correlation_id, cid("b"));

        // echo for the superseded send no longer reconciles
        let outcome = inbound_chat(&mut timeline, "ada", "a", "one", now);
        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn foreign_chat_appends() {
        let mut timeline = timeline();
        let now = Instant::now();

        let outcome = inbound_chat(&mut timeline, "bob", "xyz", "hi", now);

        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(timeline.records()[0].sender, "bob");
    }

    #[test]
    fn edit_rewrites_content() {
        let mut timeline = timeline();
        let now = Instant::now();
        inbound_chat(&mut timeline, "bob", "abc", "hi", now);

        assert!(timeline.apply_edit(&cid("abc"), "bye"));

        let record = timeline.find(&cid("abc")).unwrap();
        assert_eq!(record.content.as_deref(), Some("bye"));
        assert!(record.is_edited);
    }

    #[test]
    fn edit_for_unseen_id_is_dropped() {
        let mut timeline = timeline();

        assert!(!timeline.apply_edit(&cid("ghost"), "bye"));
        assert!(timeline.is_empty());
    }

    #[test]
    fn recall_is_terminal_and_idempotent() {
        let mut timeline = timeline();
        let now = Instant::now();
        inbound_chat(&mut timeline, "bob", "abc", "hi", now);

        assert!(timeline.apply_recall(&cid("abc")));
        let first = timeline.records().to_vec();

        // recalling twice yields the same state as recalling once
        assert!(timeline.apply_recall(&cid("abc")));
        assert_eq!(timeline.records(), &first[..]);

        let record = timeline.find(&cid("abc")).unwrap();
        assert!(record.is_recalled);
        assert_eq!(record.content, None);

        // no edit may succeed against a recalled id
        assert!(!timeline.apply_edit(&cid("abc"), "resurrect"));
        assert_eq!(timeline.find(&cid("abc")).unwrap().content, None);
    }

    #[test]
    fn delete_removes_exactly_one_record() {
        let mut timeline = timeline();
        let now = Instant::now();
        inbound_chat(&mut timeline, "bob", "abc", "hi", now);
        inbound_chat(&mut timeline, "bob", "def", "there", now);

        assert!(timeline.apply_delete(&cid("abc")));

        assert_eq!(timeline.len(), 1);
        assert!(timeline.find(&cid("abc")).is_none());
        assert!(!timeline.apply_delete(&cid("abc")));
    }

    #[test]
    fn notices_never_touch_chat_records() {
        let mut timeline = timeline();
        let now = Instant::now();
        inbound_chat(&mut timeline, "bob", "abc", "hi", now);

        timeline.append_notice(
            MessageKind::Join,
            "carol",
            "carol joined".to_owned(),
            "carol has joined".to_owned(),
        );

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.records()[1].kind, MessageKind::Join);
        assert!(timeline.records()[1].correlation_id.is_none());
        assert_eq!(timeline.find(&cid("abc")).unwrap().content.as_deref(), Some("hi"));
    }

    #[test]
    fn toggle_reveal_only_acts_on_flagged_records() {
        let mut timeline = timeline();
        let now = Instant::now();

        timeline.apply_chat(
            "bob",
            Some(cid("rude")),
            "rude text".to_owned(),
            "[cid:rude]rude text".to_owned(),
            Some(false),
            now,
        );
        timeline.apply_chat(
            "bob",
            Some(cid("fine")),
            "fine text".to_owned(),
            "[cid:fine]fine text".to_owned(),
            Some(true),
            now,
        );

        let rude = timeline.find(&cid("rude")).unwrap();
        assert!(rude.moderation.flagged);
        assert!(!rude.moderation.revealed);

        assert!(timeline.toggle_reveal(&cid("rude")));
        assert!(timeline.find(&cid("rude")).unwrap().moderation.revealed);

        // unflagged record: no-op
        assert!(!timeline.toggle_reveal(&cid("fine")));
        assert!(timeline.find(&cid("fine")).unwrap().moderation.revealed);
    }

    #[test]
    fn verdict_mapping() {
        assert!(ModerationState::from_verdict(Some(false)).flagged);
        assert!(!ModerationState::from_verdict(Some(false)).revealed);
        assert!(!ModerationState::from_verdict(Some(true)).flagged);
        assert!(!ModerationState::from_verdict(None).flagged);
    }
}
