use std::time::{SystemTime, UNIX_EPOCH};

use nanoid::nanoid;

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

// 0, O, 1 and I are left out
const JOIN_CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub const JOIN_CODE_LENGTH: usize = 6;

/// Generates an identifier such as `member_k3v9x0qa`
pub fn random_id(prefix: &str) -> String {
    format!("{}_{}", prefix, nanoid!(8, &ID_ALPHABET))
}

pub fn random_join_code() -> String {
    nanoid!(JOIN_CODE_LENGTH, &JOIN_CODE_ALPHABET)
}

/// Milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Trims a user provided name, falling back when nothing is left
pub fn normalize_name(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => String::from(text),
        _ => String::from(fallback),
    }
}

/// Case insensitive key used to compare usernames
pub fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Keeps at most `max_chars` characters of `text`
pub fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Floors a client provided count and clamps it into `min..=max`
pub fn clamp_count(value: Option<f64>, min: u32, max: u32, fallback: u32) -> u32 {
    match value {
        Some(value) if value.is_finite() => value.floor().clamp(min as f64, max as f64) as u32,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_shape() {
        let id = random_id("member");

        assert!(id.starts_with("member_"));
        assert_eq!(id.len(), "member_".len() + 8);
        assert!(id["member_".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_join_code_shape() {
        let code = random_join_code();

        assert_eq!(code.len(), JOIN_CODE_LENGTH);
        assert!(code.chars().all(|c| JOIN_CODE_ALPHABET.contains(&c)));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(Some("  ada "), "Guest"), "ada");
        assert_eq!(normalize_name(Some("   "), "Guest"), "Guest");
        assert_eq!(normalize_name(None, "Guest"), "Guest");
    }

    #[test]
    fn test_clip_counts_characters() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("abc", 10), "abc");
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(Some(7.9), 1, 50, 10), 7);
        assert_eq!(clamp_count(Some(500.0), 1, 50, 10), 50);
        assert_eq!(clamp_count(Some(-3.0), 1, 50, 10), 1);
        assert_eq!(clamp_count(Some(f64::NAN), 1, 50, 10), 10);
        assert_eq!(clamp_count(None, 1, 12, 12), 12);
    }
}
