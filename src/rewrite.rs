use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Decides which keys hold index-like text whose content is rewritten and
/// whose validator is cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eligibility {
    suffixes: Vec<String>,
}

impl Eligibility {
    pub fn from_suffixes<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(Into::into)
            .filter(|suffix: &String| !suffix.is_empty())
            .collect();

        Self { suffixes }
    }

    pub fn is_eligible(&self, key: &str) -> bool {
        self.suffixes.iter().any(|suffix| key.ends_with(suffix.as_str()))
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::from_suffixes([".yaml"])
    }
}

/// Replaces `s3://<bucket>/` references with an externally reachable prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pattern: String,
    replacement: String,
}

impl RewriteRule {
    /// Returns `None` when no replacement prefix is configured, which disables
    /// rewriting entirely.
    pub fn new(bucket: &str, replacement_prefix: &str) -> Option<Self> {
        if replacement_prefix.is_empty() {
            return None;
        }

        Some(Self {
            pattern: format!("s3://{bucket}/"),
            replacement: format!("{replacement_prefix}/"),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal, global, non-overlapping replacement scanning left to right.
    /// Bodies without a match are returned as the same buffer.
    pub fn apply(&self, body: Bytes) -> Bytes {
        let pattern = self.pattern.as_bytes();

        let Some(first) = find(&body, pattern, 0) else {
            return body;
        };

        let mut out = Vec::with_capacity(body.len());
        let mut cursor = 0;
        let mut next = Some(first);

        while let Some(at) = next {
            out.extend_from_slice(&body[cursor..at]);
            out.extend_from_slice(self.replacement.as_bytes());
            cursor = at + pattern.len();
            next = find(&body, pattern, cursor);
        }
        out.extend_from_slice(&body[cursor..]);

        Bytes::from(out)
    }
}

impl Display for RewriteRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.replacement)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }

    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}
