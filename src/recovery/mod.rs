//! Recovery codes and the random strings behind them.

mod codes;
mod random;

pub use codes::{
    DEFAULT_BLOCKS, DEFAULT_CHARS_PER_BLOCK, DEFAULT_CODE_COUNT, RecoveryCodeSet,
};
pub use random::{CharacterSet, LetterCase, RandomStringGenerator};
