//! Client-side lexical content filter.
//!
//! Supplementary to the politeness verdict the remote service stamps on
//! inbound frames: this classifier is a pure function of the configured word
//! lists and can gate a send before it leaves the client. The inbound
//! verdict, not this filter, drives hidden-by-default rendering.

use std::collections::HashSet;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Banned and allowed word lists, pre-normalized at construction.
///
/// Matching rules:
/// - entries containing whitespace are phrases, tested by substring
///   containment in the normalized text;
/// - single-word entries must match a whole token ("class" never matches
///   because it contains "ass");
/// - entries on the allow list never trigger, even when also banned;
/// - a fallback pass collapses letter runs of three or more ("daaarn" →
///   "darn") and retests single-word entries by substring containment.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    phrases: Vec<String>,
    tokens: Vec<String>,
}

impl Lexicon {
    /// Build a lexicon from raw word lists. Entries are normalized the same
    /// way message content is; allowed entries are removed up front, which
    /// is the whitelist-beats-banlist rule evaluated once.
    pub fn new<B, A>(banned: B, allowed: A) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let allowed: HashSet<String> =
            allowed.into_iter().map(|entry| normalize(entry.as_ref())).collect();

        let mut phrases = Vec::new();
        let mut tokens = Vec::new();
        for entry in banned {
            let entry = normalize(entry.as_ref());
            if entry.is_empty() || allowed.contains(&entry) {
                continue;
            }
            if entry.contains(' ') {
                phrases.push(entry);
            } else {
                tokens.push(entry);
            }
        }

        Self { phrases, tokens }
    }

    /// Whether the lexicon has no active entries.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.tokens.is_empty()
    }

    /// Should `content` render hidden by default?
    pub fn is_flagged(&self, content: &str) -> bool {
        let normalized = normalize(content);
        let words: HashSet<&str> = normalized.split(' ').collect();

        if self.phrases.iter().any(|phrase| normalized.contains(phrase.as_str())) {
            return true;
        }
        if self.tokens.iter().any(|token| words.contains(token.as_str())) {
            return true;
        }

        // second pass defeats simple letter-repetition obfuscation
        let collapsed = normalize(&collapse_repeats(&content.to_lowercase()));
        self.tokens.iter().any(|token| collapsed.contains(token.as_str()))
    }
}

/// Decompose, strip diacritics, lowercase, and collapse every run of
/// non-alphanumeric characters to a single space (trimmed).
fn normalize(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut gap = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

/// Collapse every run of three or more identical characters to one.
fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1_usize;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let keep = if run >= 3 { 1 } else { run };
        for _ in 0..keep {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::new(["darn", "blast", "snake oil"], ["blast"])
    }

    #[test]
    fn token_requires_exact_match() {
        let lexicon = Lexicon::new(["ass"], std::iter::empty::<&str>());

        assert!(lexicon.is_flagged("what an ass"));
        // substring inside a longer token must not trigger
        assert!(!lexicon.is_flagged("attending class"));
    }

    #[test]
    fn phrase_matches_by_containment() {
        let lexicon = lexicon();
        assert!(lexicon.is_flagged("selling snake oil again"));
        assert!(!lexicon.is_flagged("snake handlers need oil"));
    }

    #[test]
    fn whitelist_beats_banlist() {
        let lexicon = lexicon();
        assert!(!lexicon.is_flagged("what a blast"));
        assert!(lexicon.is_flagged("darn it"));
    }

    #[test]
    fn diacritics_are_stripped() {
        let lexicon = lexicon();
        assert!(lexicon.is_flagged("dárn it"));
    }

    #[test]
    fn punctuation_separates_tokens() {
        let lexicon = lexicon();
        assert!(lexicon.is_flagged("darn!"));
        assert!(lexicon.is_flagged("well...darn...indeed"));
    }

    #[test]
    fn letter_repetition_is_collapsed() {
        let lexicon = lexicon();
        assert!(lexicon.is_flagged("daaaarn"));
        // doubled letters survive the collapse pass
        assert!(!lexicon.is_flagged("daarn"));
    }

    #[test]
    fn case_is_ignored() {
        let lexicon = lexicon();
        assert!(lexicon.is_flagged("DARN"));
    }

    #[test]
    fn empty_lexicon_flags_nothing() {
        let lexicon = Lexicon::default();
        assert!(!lexicon.is_flagged("anything at all"));
        assert!(lexicon.is_empty());
    }

    #[test]
    fn normalizer_shape() {
        assert_eq!(normalize("  Héllo,   WORLD!! "), "hello world");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn collapse_keeps_short_runs() {
        assert_eq!(collapse_repeats("rolll"), "rol");
        assert_eq!(collapse_repeats("roll"), "roll");
        assert_eq!(collapse_repeats("aaa bbb cc"), "a b cc");
    }

    proptest! {
        #[test]
        fn normalize_is_trimmed_and_single_spaced(text in "\\PC*") {
            let normalized = normalize(&text);
            prop_assert!(!normalized.contains("  "));
            prop_assert_eq!(normalized.trim(), normalized.as_str());
        }

        #[test]
        fn classifier_never_panics(text in "\\PC*") {
            let _ = lexicon().is_flagged(&text);
        }
    }
}
