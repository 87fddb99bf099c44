//! Anonymous exchange and queue naming.

use rand::Rng;

/// Alphabet generated identifiers are drawn from.
pub const NAME_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!@#$%^&*()_+1234567890";
pub const DEFAULT_ID_LEN: usize = 22;
pub const MIN_ID_LEN: usize = 10;

pub const EXCHANGE_NAME_PREFIX: &str = "rbbt.";
pub const QUEUE_NAME_PREFIX: &str = "rbbt.gen-";

/// Source of identifiers for entities created without a name.
pub trait NameGenerator: Send + Sync {
    fn generate_id(&self) -> String;

    fn exchange_name(&self) -> String {
        format!("{EXCHANGE_NAME_PREFIX}{}", self.generate_id())
    }

    fn queue_name(&self) -> String {
        format!("{QUEUE_NAME_PREFIX}{}", self.generate_id())
    }
}

/// Draws identifiers from [`NAME_ALPHABET`] with the thread-local RNG.
#[derive(Clone, Debug)]
pub struct RandomNameGenerator {
    len: usize,
}

impl RandomNameGenerator {
    /// Lengths below [`MIN_ID_LEN`] are raised to it.
    pub fn with_len(len: usize) -> Self {
        Self {
            len: len.max(MIN_ID_LEN),
        }
    }
}

impl Default for RandomNameGenerator {
    fn default() -> Self {
        Self::with_len(DEFAULT_ID_LEN)
    }
}

impl NameGenerator for RandomNameGenerator {
    fn generate_id(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.len)
            .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
            .collect()
    }
}
