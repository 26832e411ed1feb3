//! Opaque identifier generation for CSRF state and session correlation

use rand::{thread_rng, Rng};

/// Default length for the CSRF state parameter.
pub const STATE_LENGTH: usize = 20;

/// Default length for transport session ids.
pub const SESSION_ID_LENGTH: usize = 32;

/// Generate a random token drawn uniformly from `[A-Za-z0-9]`.
///
/// Backed by `rand::thread_rng`, which is seeded from the operating system —
/// this already provides the cryptographic hardening the original
/// (`Math.random`-based) generator lacked.
pub fn generate_token(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}

/// Generate a CSRF state value (20 characters).
///
/// The state is stored before redirecting to the authorization server and
/// verified when the callback is received.
pub fn generate_state() -> String {
    generate_token(STATE_LENGTH)
}

/// Generate a session correlation id (32 characters) for transports that
/// cannot rely on the OAuth state alone (broadcast channel, backend polling).
pub fn generate_session_id() -> String {
    generate_token(SESSION_ID_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state_length_and_charset() {
        let state = generate_state();
        assert_eq!(state.len(), STATE_LENGTH);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_session_id_length() {
        let session_id = generate_session_id();
        assert_eq!(session_id.len(), SESSION_ID_LENGTH);
        assert!(session_id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_token_uniqueness() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let token = generate_token(STATE_LENGTH);
            assert!(seen.insert(token), "Generated duplicate token");
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_zero_length() {
        assert!(generate_token(0).is_empty());
    }
}
