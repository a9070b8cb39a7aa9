//! Shapes and generators for license keys and mentor ids.
//!
//! A license key looks like `PREFIX-XXXX-XXXX`: an upper-case alphanumeric
//! prefix derived from the issuing mentor, then two random segments.

use rand::Rng;

pub const SEGMENT_LEN: usize = 4;
pub const PREFIX_MIN: usize = 2;
pub const PREFIX_MAX: usize = 12;
pub const MENTOR_ID_DIGITS: u32 = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DERIVED_PREFIX_MAX: usize = 8;
const FALLBACK_PREFIX: &str = "KEY";

/// Prefix for keys issued by `mentor_id`.
pub fn prefix_for(mentor_id: &str) -> String {
    let prefix: String = mentor_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(DERIVED_PREFIX_MAX)
        .collect();

    if prefix.len() < PREFIX_MIN {
        FALLBACK_PREFIX.to_string()
    } else {
        prefix
    }
}

/// One candidate key. Uniqueness is the caller's job.
pub fn generate_key(prefix: &str) -> String {
    let mut rng = rand::rng();
    format!(
        "{}-{}-{}",
        prefix,
        random_segment(&mut rng),
        random_segment(&mut rng)
    )
}

pub fn is_well_formed(key: &str) -> bool {
    let mut parts = key.split('-');
    let (Some(prefix), Some(first), Some(second), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    (PREFIX_MIN..=PREFIX_MAX).contains(&prefix.len())
        && is_key_charset(prefix)
        && first.len() == SEGMENT_LEN
        && is_key_charset(first)
        && second.len() == SEGMENT_LEN
        && is_key_charset(second)
}

/// One candidate mentor id: fixed width, no leading zero.
pub fn generate_mentor_id() -> String {
    let low = 10u32.pow(MENTOR_ID_DIGITS - 1);
    let high = 10u32.pow(MENTOR_ID_DIGITS);
    rand::rng().random_range(low..high).to_string()
}

fn random_segment<R: Rng>(rng: &mut R) -> String {
    (0..SEGMENT_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

fn is_key_charset(part: &str) -> bool {
    part.bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
