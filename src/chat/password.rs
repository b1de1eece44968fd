// Password hashing for stored user records
//
// Two formats live side by side in users.json:
//   sha256$<salt hex>$<digest hex>   salted SHA-256
//   <signed decimal>                 legacy 32-bit rolling hash
//
// The legacy hash is kept so existing data files keep working. It is trivially
// reversible by brute force and must not be treated as credential protection.

use crate::chat::config::PasswordScheme;
use sha2::{Digest, Sha256};

const SHA256_PREFIX: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hash a password with the given scheme
pub fn hash_password(password: &str, scheme: PasswordScheme) -> String {
    match scheme {
        PasswordScheme::Sha256 => {
            let salt = generate_salt();
            format!(
                "{}${}${}",
                SHA256_PREFIX,
                hex::encode(salt),
                salted_digest(&salt, password)
            )
        }
        PasswordScheme::Legacy => legacy_hash(password),
    }
}

/// Check a password against a stored hash of either format
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SHA256_PREFIX), Some(salt_hex), Some(digest)) => match hex::decode(salt_hex) {
            Ok(salt) => salted_digest(&salt, password) == digest,
            Err(_) => false,
        },
        _ => legacy_hash(password) == stored,
    }
}

/// The original rolling hash: `h = h * 31 + c` over UTF-16 code units,
/// wrapped to i32, rendered as a signed decimal.
pub fn legacy_hash(password: &str) -> String {
    let hash = password
        .encode_utf16()
        .fold(0i32, |h, c| (h << 5).wrapping_sub(h).wrapping_add(c as i32));
    hash.to_string()
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_salt() -> [u8; SALT_LEN] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
