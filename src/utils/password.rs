use base64::{Engine, engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD}};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_ITERATIONS: u32 = 260000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Invalid hash format")]
    Format,
    #[error("Invalid iterations")]
    Iterations,
    #[error("Failed to decode: {0}")]
    Decode(String),
    #[error("PBKDF2 failed: {0}")]
    Derive(String),
    #[error("Hashing task failed: {0}")]
    Task(String),
}

/// PBKDF2-HMAC-SHA256 hasher producing `pbkdf2:sha256:iterations$salt$hash`
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations: iterations.max(1) }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hashes off the async executor
    pub async fn hash(&self, password: &str) -> Result<String, HashError> {
        let hasher = *self;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|e| HashError::Task(e.to_string()))?
    }

    /// Verifies off the async executor
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, HashError> {
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| HashError::Task(e.to_string()))?
    }

    pub fn hash_blocking(&self, password: &str) -> Result<String, HashError> {
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill(&mut salt);

        let mut key = [0u8; KEY_LENGTH];
        pbkdf2::<HmacSha256>(password.as_bytes(), &salt, self.iterations, &mut key)
            .map_err(|e| HashError::Derive(e.to_string()))?;

        let salt_b64 = URL_SAFE_NO_PAD.encode(salt);
        let hash_b64 = URL_SAFE_NO_PAD.encode(key);

        Ok(format!("pbkdf2:sha256:{}${}${}", self.iterations, salt_b64, hash_b64))
    }
}

/// Verifies a password against a stored `pbkdf2:sha256:iterations$salt$hash` value.
/// Salt and hash may be base64 (any alphabet, padded or not) or hex.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, HashError> {
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 {
        return Err(HashError::Format);
    }

    let header_parts: Vec<&str> = parts[0].split(':').collect();
    if header_parts.len() != 3 || header_parts[0] != "pbkdf2" || header_parts[1] != "sha256" {
        return Err(HashError::Format);
    }

    let iterations = header_parts[2]
        .parse::<u32>()
        .map_err(|_| HashError::Iterations)?;

    let salt = decode_flexible(parts[1])?;
    let expected_hash = decode_flexible(parts[2])?;
    if expected_hash.is_empty() {
        return Err(HashError::Format);
    }

    let mut computed = vec![0u8; expected_hash.len()];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, iterations, &mut computed)
        .map_err(|e| HashError::Derive(e.to_string()))?;

    Ok(computed.ct_eq(&expected_hash).into())
}

fn decode_flexible(input: &str) -> Result<Vec<u8>, HashError> {
    // 64 hex chars = 32 bytes
    if input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(input).map_err(|e| HashError::Decode(e.to_string()));
    }

    let padded = add_base64_padding(input);

    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(input) {
        return Ok(decoded);
    }
    if let Ok(decoded) = STANDARD_NO_PAD.decode(input) {
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE.decode(&padded) {
        return Ok(decoded);
    }
    if let Ok(decoded) = STANDARD.decode(&padded) {
        return Ok(decoded);
    }

    hex::decode(input).map_err(|e| HashError::Decode(e.to_string()))
}

fn add_base64_padding(input: &str) -> String {
    let padding_needed = (4 - (input.len() % 4)) % 4;
    format!("{}{}", input, "=".repeat(padding_needed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1_000);
        let hash = hasher.hash_blocking("Abc12345!").unwrap();

        assert!(hash.starts_with("pbkdf2:sha256:1000$"));
        assert!(verify_password("Abc12345!", &hash).unwrap());
        assert!(!verify_password("abc12345!", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salt() {
        let hasher = PasswordHasher::new(1_000);
        let a = hasher.hash_blocking("Abc12345!").unwrap();
        let b = hasher.hash_blocking("Abc12345!").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_encoded_hash() {
        let salt = b"0123456789abcdef";
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2::<HmacSha256>(b"secret", salt, 1_000, &mut key).unwrap();
        let stored = format!(
            "pbkdf2:sha256:1000${}${}",
            URL_SAFE_NO_PAD.encode(salt),
            hex::encode(key)
        );

        assert!(verify_password("secret", &stored).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(verify_password("x", "not-a-hash"), Err(HashError::Format)));
        assert!(matches!(
            verify_password("x", "bcrypt:sha256:10$abc$def"),
            Err(HashError::Format)
        ));
        assert!(matches!(
            verify_password("x", "pbkdf2:sha256:many$abc$def"),
            Err(HashError::Iterations)
        ));
    }

    #[test]
    fn test_base64_padding() {
        assert_eq!(add_base64_padding(""), "");
        assert_eq!(add_base64_padding("abcd"), "abcd");
        assert_eq!(add_base64_padding("abcde"), "abcde===");
        assert_eq!(add_base64_padding("abcdef"), "abcdef==");
        assert_eq!(add_base64_padding("abcdefg"), "abcdefg=");
    }

    #[test]
    fn test_padded_standard_base64_hash() {
        let salt = b"0123456789abcdef";
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2::<HmacSha256>(b"secret", salt, 1_000, &mut key).unwrap();
        let stored = format!(
            "pbkdf2:sha256:1000${}${}",
            STANDARD.encode(salt),
            STANDARD.encode(key)
        );

        assert!(stored.ends_with('='));
        assert!(verify_password("secret", &stored).unwrap());
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hasher = PasswordHasher::new(1_000);
        let hash = hasher.hash("Abc12345!").await.unwrap();

        assert!(hasher.verify("Abc12345!", &hash).await.unwrap());
        assert!(!hasher.verify("wrong", &hash).await.unwrap());
    }
}
