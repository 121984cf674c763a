//! Token and nonce generation for wallet sign-in.

use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// Bytes of entropy in session tokens and challenge nonces.
const RANDOM_BYTES: usize = 32;

fn random_url_safe() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; RANDOM_BYTES];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically random session token.
///
/// Returns a URL-safe base64 string (43 characters) from 32 random bytes.
pub fn generate_session_token() -> String {
    random_url_safe()
}

/// Generate a cryptographically random challenge nonce.
///
/// 256 bits, encoded with the URL-safe alphabet so it survives the
/// `Nonce:` line of a challenge message unchanged.
pub fn generate_challenge_nonce() -> String {
    random_url_safe()
}
