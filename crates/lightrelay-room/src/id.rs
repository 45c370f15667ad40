//! Room id generation.
//!
//! Room ids are short strings peers can type or share: `id_length`
//! characters drawn from uppercase letters and digits, or from digits only.
//! Generation retries until the candidate is not already taken.

use std::str::FromStr;

use rand::Rng;

use crate::RoomError;

/// Upper bound on collision retries before giving up.
const MAX_ATTEMPTS: usize = 10_000;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NUMERIC: &[u8] = b"0123456789";

/// Which characters room ids are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdAlphabet {
    /// `A-Z` and `0-9`.
    #[default]
    Alphanumeric,
    /// `0-9` only.
    Numeric,
}

impl IdAlphabet {
    fn chars(self) -> &'static [u8] {
        match self {
            Self::Alphanumeric => ALPHANUMERIC,
            Self::Numeric => NUMERIC,
        }
    }
}

impl FromStr for IdAlphabet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alphanumeric" => Ok(Self::Alphanumeric),
            "numeric" => Ok(Self::Numeric),
            _ => Err(format!("unknown id alphabet {s:?}")),
        }
    }
}

/// One random candidate id. May collide with existing ids.
pub fn random_id(len: usize, alphabet: IdAlphabet) -> String {
    let chars = alphabet.chars();
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(chars[rng.random_range(0..chars.len())]))
        .collect()
}

/// Draws candidates until `is_taken` rejects none of them.
///
/// # Errors
/// [`RoomError::IdSpaceExhausted`] if every attempt collided, which only
/// happens when `len` is too small for the number of open rooms.
pub fn generate_unique_id(
    len: usize,
    alphabet: IdAlphabet,
    mut is_taken: impl FnMut(&str) -> bool,
) -> Result<String, RoomError> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = random_id(len, alphabet);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(RoomError::IdSpaceExhausted(MAX_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_id_alphanumeric_uses_uppercase_and_digits() {
        let id = random_id(64, IdAlphabet::Alphanumeric);
        assert_eq!(id.len(), 64);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_random_id_numeric_is_digits_only() {
        let id = random_id(12, IdAlphabet::Numeric);
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_unique_id_skips_taken_ids() {
        // One-digit numeric ids: 10 possibilities, 9 of them taken.
        let taken: HashSet<String> =
            (0..9).map(|d: u32| d.to_string()).collect();
        let id = generate_unique_id(1, IdAlphabet::Numeric, |c| {
            taken.contains(c)
        })
        .unwrap();
        assert_eq!(id, "9");
    }

    #[test]
    fn test_generate_unique_id_full_space_returns_exhausted() {
        let result = generate_unique_id(1, IdAlphabet::Numeric, |_| true);
        assert!(matches!(result, Err(RoomError::IdSpaceExhausted(_))));
    }
}
