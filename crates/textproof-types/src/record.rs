use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Caller-supplied payload describing one deposited text.
///
/// A record is constructed before [`crate::Block`] creation and is immutable
/// afterwards; exactly one block embeds it by value. The `content_hash` field
/// is the SHA-256 hex digest of the full source text and serves as the
/// ledger's primary deduplication key — the text itself is never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub author_name: String,
    pub title: String,
    /// A few words from the start of the source text (informational only).
    pub text_start: String,
    /// A few words from the end of the source text (informational only).
    pub text_end: String,
    /// SHA-256 hex digest of the full source text; unique per distinct text.
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub public_key: Option<String>,
}

/// Compute the SHA-256 content digest of a source text, lowercase hex.
///
/// Callers store the result in [`Record::content_hash`].
pub fn content_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_digest_is_deterministic() {
        let d1 = content_digest("the quick brown fox");
        let d2 = content_digest("the quick brown fox");
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
    }

    #[test]
    fn distinct_texts_produce_distinct_digests() {
        assert_ne!(content_digest("text one"), content_digest("text two"));
    }

    #[test]
    fn content_digest_matches_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            content_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn public_key_is_omitted_from_json_when_absent() {
        let record = Record {
            author_name: "Author".into(),
            title: "Title".into(),
            text_start: "start words".into(),
            text_end: "end words".into(),
            content_hash: content_digest("body"),
            public_key: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("public_key"));

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
