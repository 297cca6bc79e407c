//! Join codes: short, human-typeable identifiers handed out by a director.

use rand::Rng;

/// Length of a generated join code.
pub const JOIN_CODE_LEN: usize = 6;

/// Alphabet join codes are drawn from.
const JOIN_CODE_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Maximum attempts at inserting a fresh code before giving up.
pub const MAX_JOIN_CODE_ATTEMPTS: usize = 8;

/// Generate a random join code. Uniqueness is enforced by the store; callers
/// regenerate on collision.
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.random_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

/// Normalize user input: trim and uppercase.
pub fn normalize_join_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Validate a (normalized) join code's shape.
pub fn validate_join_code(code: &str) -> Result<(), String> {
    if code.len() != JOIN_CODE_LEN {
        return Err(format!("Join code must be {JOIN_CODE_LEN} characters"));
    }
    if !code.bytes().all(|b| JOIN_CODE_CHARSET.contains(&b)) {
        return Err("Join code may only contain digits and uppercase letters".to_string());
    }
    Ok(())
}
