use rand::Rng;

/// Length in bytes of the random part of a session token.
const SESSION_TOKEN_BYTES: usize = 16;

/// Generate an opaque session token: 16 random bytes hex-encoded.
pub fn generate_session_token() -> String {
    random_hex(SESSION_TOKEN_BYTES)
}

/// Generate `n` random bytes and return as hex string.
fn random_hex(n: usize) -> String {
    let bytes: Vec<u8> = (0..n).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex::encode(&bytes)
}
