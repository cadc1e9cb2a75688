//! Text normalization shared by the indexing and search paths

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"[a-z0-9]+").unwrap();
}

/// Maximum preview length in characters, ellipsis included
pub const PREVIEW_CHARS: usize = 400;

const ELLIPSIS: &str = "...";

/// Lowercase, strip markup tags and collapse whitespace
pub fn clean_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let untagged = TAG_RE.replace_all(&lowered, " ");
    let collapsed = WHITESPACE_RE.replace_all(&untagged, " ");
    collapsed.trim().to_string()
}

/// Hex SHA-256 of the cleaned text
pub fn content_hash(cleaned: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cleaned.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whitespace-delimited token count
pub fn count_tokens(cleaned: &str) -> usize {
    cleaned.split_whitespace().count()
}

/// Maximal runs of ASCII letters/digits, lowercased
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Single-line preview, truncated to `PREVIEW_CHARS` characters
pub fn make_preview(text: &str) -> String {
    let flat = text.trim().replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let kept: String = flat
        .chars()
        .take(PREVIEW_CHARS - ELLIPSIS.len())
        .collect();
    format!("{}{}", kept, ELLIPSIS)
}

/// Decode UTF-8, dropping invalid byte sequences
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Read a document body.
///
/// A file that no longer exists is `Ok(None)`; every other failure is
/// returned to the caller, which decides whether it is fatal.
pub fn read_body(path: &Path) -> io::Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(decode_text(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let raw = "  Hello <b>World</b>\n\n\tFrom   <a href=\"x\">HTML</a>  ";
        assert_eq!(clean_text(raw), "hello world from html");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text("<p></p>   \n"), "");
    }

    #[test]
    fn test_content_hash_tracks_cleaned_text() {
        let a = content_hash(&clean_text("Cat  DOG"));
        let b = content_hash(&clean_text("cat dog\n"));
        let c = content_hash(&clean_text("cat dogs"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Stock-market: FINANCE_2024, e.g."),
            vec!["stock", "market", "finance", "2024", "e", "g"]
        );
        assert!(tokenize("  ...  ").is_empty());
        // Non-ASCII letters split tokens
        assert_eq!(tokenize("café au lait"), vec!["caf", "au", "lait"]);
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens("one two  three"), 3);
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(make_preview("line one\nline two\n"), "line one line two");
    }

    #[test]
    fn test_preview_truncates_to_limit() {
        let body = "a".repeat(500);
        let preview = make_preview(&body);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_preview_counts_chars_not_bytes() {
        let body = "é".repeat(450);
        let preview = make_preview(&body);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_read_body_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = read_body(&dir.path().join("gone.txt")).unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode_text(b"caf\xe9 au lait"), "caf au lait");
        assert_eq!(decode_text("café".as_bytes()), "café");
    }

    #[test]
    fn test_read_body_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"na\xefve caf\xe9").unwrap();
        assert_eq!(read_body(&path).unwrap().as_deref(), Some("nave caf"));
    }

    #[test]
    fn test_read_body_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(read_body(&path).unwrap().as_deref(), Some("hello"));
    }
}
