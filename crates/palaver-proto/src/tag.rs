//! Tagged-content codec.
//!
//! The channel gives us a single free-text `content` field, so the mutation
//! protocol rides on a bracket prefix:
//!
//! ```text
//! [cid:ID]BODY        chat message
//! [edited:ID]BODY     replace ID's text with BODY
//! [recalled:ID]       retract ID (whole payload, no body)
//! [deleted:ID]        remove ID (whole payload, no body)
//! ```
//!
//! Decoding is first-match-wins in the order recall, delete, edit, chat,
//! raw. Recall and delete must span the entire payload; edit and chat are
//! prefixes whose remainder is the body, taken verbatim - a body may be
//! empty, span lines, or itself start with bracket-looking text, and is
//! never re-parsed. A payload matching none of the forms is legacy free
//! text.
//!
//! Known limitation: user text that genuinely starts with `[cid:` (or one of
//! the other tags) is indistinguishable from protocol metadata and will be
//! parsed as such.

use crate::cid::CorrelationId;

/// A decoded `content` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tagged {
    /// Chat message carrying its correlation id.
    Chat {
        /// Correlation id minted by the sender.
        id: CorrelationId,
        /// Message text.
        body: String,
    },
    /// In-place replacement of an earlier message's text.
    Edit {
        /// Target correlation id.
        id: CorrelationId,
        /// Replacement text.
        body: String,
    },
    /// Terminal retraction of an earlier message.
    Recall {
        /// Target correlation id.
        id: CorrelationId,
    },
    /// Removal of an earlier message from the timeline.
    Delete {
        /// Target correlation id.
        id: CorrelationId,
    },
    /// Legacy or unrecognized content, rendered as-is.
    Plain {
        /// The raw payload.
        body: String,
    },
}

impl Tagged {
    /// Render the payload for the wire.
    pub fn encode(&self) -> String {
        match self {
            Self::Chat { id, body } => format!("[cid:{id}]{body}"),
            Self::Edit { id, body } => format!("[edited:{id}]{body}"),
            Self::Recall { id } => format!("[recalled:{id}]"),
            Self::Delete { id } => format!("[deleted:{id}]"),
            Self::Plain { body } => body.clone(),
        }
    }

    /// Decode a `content` payload. Infallible; anything unrecognized comes
    /// back as [`Tagged::Plain`].
    pub fn decode(content: &str) -> Self {
        if let Some(id) = anchored(content, "recalled") {
            return Self::Recall { id };
        }
        if let Some(id) = anchored(content, "deleted") {
            return Self::Delete { id };
        }
        if let Some((id, body)) = prefixed(content, "edited") {
            return Self::Edit { id, body: body.to_owned() };
        }
        if let Some((id, body)) = prefixed(content, "cid") {
            return Self::Chat { id, body: body.to_owned() };
        }
        Self::Plain { body: content.to_owned() }
    }

    /// The correlation id, if this payload carries one.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::Chat { id, .. }
            | Self::Edit { id, .. }
            | Self::Recall { id }
            | Self::Delete { id } => Some(id),
            Self::Plain { .. } => None,
        }
    }
}

/// `[label:id]` spanning the whole payload.
fn anchored(content: &str, label: &str) -> Option<CorrelationId> {
    let (id, rest) = prefixed(content, label)?;
    rest.is_empty().then_some(id)
}

/// `[label:id]` at the start of the payload; the remainder is the body.
fn prefixed<'a>(content: &'a str, label: &str) -> Option<(CorrelationId, &'a str)> {
    let rest = content.strip_prefix('[')?.strip_prefix(label)?.strip_prefix(':')?;
    let close = rest.find(']')?;
    Some((CorrelationId::new(&rest[..close]), &rest[close + 1..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn cid(id: &str) -> CorrelationId {
        CorrelationId::new(id)
    }

    #[test]
    fn chat_roundtrip() {
        let tagged = Tagged::Chat { id: cid("abc"), body: "hello".to_owned() };
        assert_eq!(tagged.encode(), "[cid:abc]hello");
        assert_eq!(Tagged::decode("[cid:abc]hello"), tagged);
    }

    #[test]
    fn chat_body_may_be_empty_or_multiline() {
        assert_eq!(
            Tagged::decode("[cid:abc]"),
            Tagged::Chat { id: cid("abc"), body: String::new() }
        );
        assert_eq!(
            Tagged::decode("[cid:abc]line one\nline two"),
            Tagged::Chat { id: cid("abc"), body: "line one\nline two".to_owned() }
        );
    }

    #[test]
    fn edit_body_is_never_reparsed() {
        let decoded = Tagged::decode("[edited:abc][cid:zzz]trailing");
        assert_eq!(decoded, Tagged::Edit { id: cid("abc"), body: "[cid:zzz]trailing".to_owned() });
    }

    #[test]
    fn recall_and_delete_are_anchored() {
        assert_eq!(Tagged::decode("[recalled:abc]"), Tagged::Recall { id: cid("abc") });
        assert_eq!(Tagged::decode("[deleted:abc]"), Tagged::Delete { id: cid("abc") });

        // trailing text makes them ordinary free text, not a mutation
        assert_eq!(
            Tagged::decode("[recalled:abc]x"),
            Tagged::Plain { body: "[recalled:abc]x".to_owned() }
        );
        assert_eq!(
            Tagged::decode("[deleted:abc] "),
            Tagged::Plain { body: "[deleted:abc] ".to_owned() }
        );
    }

    #[test]
    fn unterminated_tag_is_plain() {
        assert_eq!(Tagged::decode("[cid:abc"), Tagged::Plain { body: "[cid:abc".to_owned() });
    }

    #[test]
    fn legacy_text_is_plain() {
        assert_eq!(Tagged::decode("just words"), Tagged::Plain { body: "just words".to_owned() });
        assert_eq!(Tagged::decode(""), Tagged::Plain { body: String::new() });
    }

    #[test]
    fn correlation_id_accessor() {
        assert_eq!(Tagged::decode("[recalled:abc]").correlation_id(), Some(&cid("abc")));
        assert_eq!(Tagged::decode("plain").correlation_id(), None);
    }

    proptest! {
        #[test]
        fn chat_roundtrips(id in "[a-z0-9-]{1,32}", body in "\\PC*") {
            let tagged = Tagged::Chat { id: cid(&id), body: body.clone() };
            prop_assert_eq!(Tagged::decode(&tagged.encode()), tagged);
        }

        #[test]
        fn edit_roundtrips(id in "[a-z0-9-]{1,32}", body in "\\PC*") {
            let tagged = Tagged::Edit { id: cid(&id), body: body.clone() };
            prop_assert_eq!(Tagged::decode(&tagged.encode()), tagged);
        }

        #[test]
        fn decode_never_panics(content in "\\PC*") {
            let _ = Tagged::decode(&content);
        }
    }
}
