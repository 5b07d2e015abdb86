use std::fmt;

use sha2::{Digest, Sha256};

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shared admin password. Only its SHA-256 digest is kept, and attempts are
/// compared digest to digest so the comparison is always fixed-length.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSecret {
    digest: String,
}

impl AdminSecret {
    pub fn new(password: &str) -> Self {
        Self {
            digest: digest(password),
        }
    }

    pub fn matches(&self, attempt: &str) -> bool {
        digest(attempt) == self.digest
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_exact_password_only() {
        let secret = AdminSecret::new("s3cret");
        assert!(secret.matches("s3cret"));
        assert!(!secret.matches("s3cret "));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let secret = AdminSecret::new("s3cret");
        assert_eq!(format!("{:?}", secret), "AdminSecret(****)");
    }
}
