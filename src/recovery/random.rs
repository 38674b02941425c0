//! Random string generation for codes and tokens.
//!
//! Draws from the operating system RNG. The alphabet is chosen up front from
//! a character-set and letter-case pair, so callers state what kind of
//! string they need instead of passing alphabets around.

use rand::Rng;

/// Which characters a generated string may contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CharacterSet {
    /// Digits only.
    Numeric,
    /// Letters only.
    Alpha,
    /// Digits and letters.
    #[default]
    Alphanumeric,
}

/// Which letter cases a generated string may contain.
///
/// Ignored for [`CharacterSet::Numeric`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LetterCase {
    Lower,
    Upper,
    #[default]
    Mixed,
}

/// Generates uniformly random strings over a fixed alphabet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RandomStringGenerator {
    charset: CharacterSet,
    case: LetterCase,
}

impl RandomStringGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the alphabet to a character set.
    #[must_use]
    pub fn charset(mut self, charset: CharacterSet) -> Self {
        self.charset = charset;
        self
    }

    /// Restrict letters to one case.
    #[must_use]
    pub fn case(mut self, case: LetterCase) -> Self {
        self.case = case;
        self
    }

    /// Produce a random string of exactly `length` characters.
    pub fn generate(&self, length: usize) -> String {
        let alphabet = self.alphabet();
        let mut rng = rand::rngs::OsRng;

        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..alphabet.len());
                alphabet[idx] as char
            })
            .collect()
    }

    fn alphabet(&self) -> &'static [u8] {
        const DIGITS: &[u8] = b"0123456789";
        const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
        const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const MIXED: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const DIGITS_LOWER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        const DIGITS_UPPER: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const DIGITS_MIXED: &[u8] =
            b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

        match (self.charset, self.case) {
            (CharacterSet::Numeric, _) => DIGITS,
            (CharacterSet::Alpha, LetterCase::Lower) => LOWER,
            (CharacterSet::Alpha, LetterCase::Upper) => UPPER,
            (CharacterSet::Alpha, LetterCase::Mixed) => MIXED,
            (CharacterSet::Alphanumeric, LetterCase::Lower) => DIGITS_LOWER,
            (CharacterSet::Alphanumeric, LetterCase::Upper) => DIGITS_UPPER,
            (CharacterSet::Alphanumeric, LetterCase::Mixed) => DIGITS_MIXED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ RandomStringGenerator tests ============

    #[test]
    fn test_generates_requested_length() {
        let generator = RandomStringGenerator::new();

        assert_eq!(generator.generate(0).len(), 0);
        assert_eq!(generator.generate(10).len(), 10);
        assert_eq!(generator.generate(64).len(), 64);
    }

    #[test]
    fn test_numeric_contains_only_digits() {
        let generator = RandomStringGenerator::new().charset(CharacterSet::Numeric);

        let value = generator.generate(200);
        assert!(value.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_alpha_lower_contains_only_lowercase_letters() {
        let generator = RandomStringGenerator::new()
            .charset(CharacterSet::Alpha)
            .case(LetterCase::Lower);

        let value = generator.generate(200);
        assert!(value.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_alpha_upper_contains_only_uppercase_letters() {
        let generator = RandomStringGenerator::new()
            .charset(CharacterSet::Alpha)
            .case(LetterCase::Upper);

        let value = generator.generate(200);
        assert!(value.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_alphanumeric_mixed_draws_from_full_alphabet() {
        let generator = RandomStringGenerator::new();

        // 2000 draws over a 62-character alphabet make a missing class
        // astronomically unlikely.
        let value = generator.generate(2000);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(value.chars().any(|c| c.is_ascii_digit()));
        assert!(value.chars().any(|c| c.is_ascii_lowercase()));
        assert!(value.chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_consecutive_strings_differ() {
        let generator = RandomStringGenerator::new();

        let first = generator.generate(32);
        let second = generator.generate(32);
        assert_ne!(first, second);
    }
}
