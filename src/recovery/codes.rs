//! Recovery code sets.
//!
//! One-time fallback codes handed to the user when they enroll, for when
//! the authenticator device is lost. This module only shapes and generates
//! the codes; storing them (hashed) and crossing them off on use is the
//! application's side of the contract.
//!
//! # Example
//!
//! ```rust,ignore
//! use twostep::RecoveryCodeSet;
//!
//! let mut set = RecoveryCodeSet::new();
//! set.set_count(10).set_blocks(3);
//!
//! for code in set.codes() {
//!     println!("{code}");
//! }
//! ```

use crate::error::Result;
use crate::recovery::random::{CharacterSet, LetterCase, RandomStringGenerator};

/// Number of codes in a set unless configured otherwise.
pub const DEFAULT_CODE_COUNT: usize = 8;

/// Blocks per code unless configured otherwise.
pub const DEFAULT_BLOCKS: usize = 2;

/// Characters per block unless configured otherwise.
pub const DEFAULT_CHARS_PER_BLOCK: usize = 10;

/// Configurable set of recovery codes, generated lazily.
///
/// The first call to [`codes`](Self::codes) generates and caches the set;
/// every setter drops the cache so the next read reflects the new shape.
#[derive(Clone, Debug)]
pub struct RecoveryCodeSet {
    count: usize,
    blocks: usize,
    chars_per_block: usize,
    separator: String,
    generator: RandomStringGenerator,
    codes: Option<Vec<String>>,
}

impl Default for RecoveryCodeSet {
    fn default() -> Self {
        Self {
            count: DEFAULT_CODE_COUNT,
            blocks: DEFAULT_BLOCKS,
            chars_per_block: DEFAULT_CHARS_PER_BLOCK,
            separator: "-".to_string(),
            generator: RandomStringGenerator::new(),
            codes: None,
        }
    }
}

impl RecoveryCodeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of codes in the set.
    pub fn set_count(&mut self, count: usize) -> &mut Self {
        self.count = count;
        self.codes = None;
        self
    }

    /// Blocks per code.
    pub fn set_blocks(&mut self, blocks: usize) -> &mut Self {
        self.blocks = blocks;
        self.codes = None;
        self
    }

    /// Characters per block.
    pub fn set_chars_per_block(&mut self, chars: usize) -> &mut Self {
        self.chars_per_block = chars;
        self.codes = None;
        self
    }

    /// String placed between blocks.
    pub fn set_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.separator = separator.into();
        self.codes = None;
        self
    }

    /// Character set the blocks draw from.
    pub fn set_character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.generator = self.generator.charset(charset);
        self.codes = None;
        self
    }

    /// Letter case the blocks draw from.
    pub fn set_letter_case(&mut self, case: LetterCase) -> &mut Self {
        self.generator = self.generator.case(case);
        self.codes = None;
        self
    }

    /// The codes, generating them on first access.
    ///
    /// Repeated calls return the same codes until a setter resets the set.
    pub fn codes(&mut self) -> &[String] {
        if self.codes.is_none() {
            let generated = self.generate_codes();
            tracing::debug!(
                target: "twofa.recovery.generated",
                count = generated.len(),
                "Generated recovery code set"
            );
            self.codes = Some(generated);
        }
        match &self.codes {
            Some(codes) => codes,
            None => &[],
        }
    }

    /// The codes as a JSON array, generating them on first access.
    pub fn to_json(&mut self) -> Result<String> {
        let json = serde_json::to_string(self.codes())?;
        Ok(json)
    }

    fn generate_codes(&self) -> Vec<String> {
        (0..self.count)
            .map(|_| {
                (0..self.blocks)
                    .map(|_| self.generator.generate(self.chars_per_block))
                    .collect::<Vec<_>>()
                    .join(&self.separator)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ Shape tests ============

    #[test]
    fn test_default_set_shape() {
        let mut set = RecoveryCodeSet::new();

        let codes = set.codes().to_vec();
        assert_eq!(codes.len(), DEFAULT_CODE_COUNT);
        for code in &codes {
            // Two 10-character blocks and one separator.
            assert_eq!(code.len(), 21);
            let blocks: Vec<&str> = code.split('-').collect();
            assert_eq!(blocks.len(), 2);
            assert!(
                blocks
                    .iter()
                    .all(|block| block.chars().all(|c| c.is_ascii_alphanumeric()))
            );
        }
    }

    #[test]
    fn test_configured_set_shape() {
        let mut set = RecoveryCodeSet::new();
        set.set_count(4)
            .set_blocks(3)
            .set_chars_per_block(5)
            .set_separator("_");

        let codes = set.codes();
        assert_eq!(codes.len(), 4);
        for code in codes {
            assert_eq!(code.split('_').count(), 3);
            assert_eq!(code.len(), 3 * 5 + 2);
        }
    }

    #[test]
    fn test_empty_separator_joins_blocks() {
        let mut set = RecoveryCodeSet::new();
        set.set_separator("");

        for code in set.codes() {
            assert_eq!(code.len(), 20);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_numeric_character_set() {
        let mut set = RecoveryCodeSet::new();
        set.set_character_set(CharacterSet::Numeric);

        for code in set.codes() {
            assert!(code.chars().all(|c| c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn test_uppercase_alpha_codes() {
        let mut set = RecoveryCodeSet::new();
        set.set_character_set(CharacterSet::Alpha)
            .set_letter_case(LetterCase::Upper);

        for code in set.codes() {
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '-'));
        }
    }

    // ============ Caching tests ============

    #[test]
    fn test_codes_are_cached_between_reads() {
        let mut set = RecoveryCodeSet::new();

        let first = set.codes().to_vec();
        let second = set.codes().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_setters_reset_the_cache() {
        let mut set = RecoveryCodeSet::new();

        let before = set.codes().to_vec();
        set.set_count(4);
        let after = set.codes().to_vec();

        assert_eq!(after.len(), 4);
        assert_ne!(before, after);
    }

    #[test]
    fn test_reconfiguring_case_regenerates() {
        let mut set = RecoveryCodeSet::new();
        set.set_character_set(CharacterSet::Alpha)
            .set_letter_case(LetterCase::Lower);
        let lower = set.codes().to_vec();
        assert!(
            lower
                .iter()
                .all(|code| code.chars().all(|c| c.is_ascii_lowercase() || c == '-'))
        );

        set.set_letter_case(LetterCase::Upper);
        let upper = set.codes().to_vec();
        assert!(
            upper
                .iter()
                .all(|code| code.chars().all(|c| c.is_ascii_uppercase() || c == '-'))
        );
    }

    // ============ Serialization tests ============

    #[test]
    fn test_to_json_round_trips() {
        let mut set = RecoveryCodeSet::new();
        set.set_count(3);

        let json = set.to_json().unwrap();
        let parsed: Vec<String> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, set.codes());
    }
}
