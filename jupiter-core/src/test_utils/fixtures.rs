//! Test fixtures for engines, documents and random edits

use super::deterministic_rng::random_text;
use crate::jupiter::{
    DocumentSession, EditorPath, Jupiter, Operation, SiteId, TextDocument,
};
use rand::rngs::StdRng;
use rand::Rng;

/// Editor path used by the fixtures
pub const SAMPLE_EDITOR: &str = "hello";

/// Forty chars, so position 34 falls inside the last word
pub const SAMPLE_TEXT: &str = "The quick brown fox jumps over the lazy!";

pub fn sample_editor() -> EditorPath {
    EditorPath::new(SAMPLE_EDITOR)
}

/// Two engines wired to each other: sites 1 and 2
pub fn engine_pair() -> (Jupiter, Jupiter) {
    (
        Jupiter::new(sample_editor(), SiteId(1), SiteId(2)),
        Jupiter::new(sample_editor(), SiteId(2), SiteId(1)),
    )
}

/// A session for `site` talking to `remote` over a document holding `text`
pub fn text_session(site: u32, remote: u32, text: &str) -> DocumentSession<TextDocument> {
    DocumentSession::new(
        Jupiter::new(sample_editor(), SiteId(site), SiteId(remote)),
        TextDocument::new(sample_editor(), text),
    )
}

pub fn session_text(session: &DocumentSession<TextDocument>) -> String {
    session.with_document(|d| d.text().to_string()).unwrap()
}

/// A random edit that is valid against `text`.
///
/// Deletes carry the exact text they remove, so validated documents accept
/// them.
pub fn random_operation(rng: &mut StdRng, text: &str) -> Operation {
    let len = text.chars().count();
    if len == 0 || rng.random_bool(0.6) {
        let pos = rng.random_range(0..=len);
        return Operation::insert(pos, random_text(rng, 4));
    }

    let pos = rng.random_range(0..len);
    let count = rng.random_range(1..=(len - pos).min(5));
    let removed: String = text.chars().skip(pos).take(count).collect();
    Operation::delete(pos, removed)
}

/// Apply `op` to a copy of `text`, panicking if it does not fit
pub fn applied(text: &str, op: &Operation) -> String {
    let mut doc = text.to_string();
    op.apply(&mut doc).unwrap_or_else(|e| panic!("{:?} does not apply to {:?}: {}", op, text, e));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_rng;

    #[test]
    fn test_sample_text_length() {
        assert_eq!(SAMPLE_TEXT.chars().count(), 40);
    }

    #[test]
    fn test_random_operations_apply() {
        let mut rng = test_rng();
        let mut text = SAMPLE_TEXT.to_string();
        for _ in 0..200 {
            let op = random_operation(&mut rng, &text);
            text = applied(&text, &op);
        }
    }
}
