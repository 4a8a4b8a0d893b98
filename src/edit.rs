use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Byte-span replacement over an in-memory payload, with verification.
///
/// The text-level codecs (INI, regex) never rebuild their payload from a
/// parsed model. They locate spans and compile their change down to a list of
/// edits, so every byte outside the edited spans survives untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply() is called"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Replacement bytes for [byte_start, byte_end)
    pub new_text: Vec<u8>,
    /// What we expect to find in the span before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact bytes required
    ExactMatch(Vec<u8>),
    /// xxh3 hash of the expected bytes (used for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided bytes match the verification criteria.
    pub fn matches(&self, text: &[u8]) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected.as_slice(),
            EditVerification::Hash(expected_hash) => xxh3_64(text) == *expected_hash,
        }
    }

    /// Create verification from bytes, using a hash above 1KB.
    pub fn from_bytes(text: &[u8]) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text))
        } else {
            EditVerification::ExactMatch(text.to_vec())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("before-text verification failed at [{byte_start}, {byte_end}): found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in payload of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("overlapping edits: span ending at {first_end} overlaps span starting at {second_start}")]
    Overlap {
        first_end: usize,
        second_start: usize,
    },
}

impl Edit {
    /// Create a new edit whose verification is derived from the current span.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<Vec<u8>>,
        expected_before: &[u8],
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_bytes(expected_before),
        }
    }

    fn validate(&self, content: &[u8]) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }

        let current = &content[self.byte_start..self.byte_end];
        if current == self.new_text.as_slice() {
            return Ok(());
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: String::from_utf8_lossy(current).into_owned(),
            });
        }

        Ok(())
    }

    /// Apply this edit to `content`, returning the new payload.
    pub fn apply(&self, content: &[u8]) -> Result<Vec<u8>, EditError> {
        Edit::apply_batch(content, vec![self.clone()])
    }

    /// Apply several non-overlapping edits to `content` in one pass.
    ///
    /// Edits are sorted by byte_start descending and applied bottom-to-top
    /// to avoid offset invalidation. Nothing is applied unless every edit
    /// validates.
    pub fn apply_batch(content: &[u8], mut edits: Vec<Edit>) -> Result<Vec<u8>, EditError> {
        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(content)?;
        }

        // Sorted descending: the earlier span must end before the later starts
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::Overlap {
                    first_end: earlier.byte_end,
                    second_start: later.byte_start,
                });
            }
        }

        let mut new_content = content.to_vec();
        for edit in &edits {
            new_content.splice(edit.byte_start..edit.byte_end, edit.new_text.iter().copied());
        }

        Ok(new_content)
    }
}
