//! Text input collection
//!
//! All sources strip surrounding whitespace; blank input becomes `None`.

use std::io::{BufRead, Read};

/// Trim `text`, treating blank input as nothing to say
pub fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Join positional arguments into one utterance
pub fn from_args(args: &[String]) -> Option<String> {
    normalize(&args.join(" "))
}

/// Read everything until EOF as one utterance
pub fn read_all<R: Read>(mut reader: R) -> std::io::Result<Option<String>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(normalize(&text))
}

/// One utterance per non-blank line
pub fn utterances<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<String>> {
    reader
        .lines()
        .filter_map(|line| line.map(|l| normalize(&l)).transpose())
}
