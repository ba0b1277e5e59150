//! Password hashing with bcrypt.

use chatarral_core::{Error, Result};

/// Work factor for new hashes.
const COST: u32 = 12;

/// Hashes a plaintext password.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, COST)
        .map_err(|e| Error::Storage(format!("no se pudo generar el hash: {e}")))
}

/// Checks a plaintext password against a stored hash. A malformed
/// stored hash counts as a failed match, not an error the caller has
/// to distinguish.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("otra-clave", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("admin123").unwrap();
        let b = hash_password("admin123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        assert!(!verify_password("admin123", "no-es-un-hash"));
    }
}
