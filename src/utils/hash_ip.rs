use sha2::{Digest, Sha256};

/// Hash a client IP before it reaches the logs. Raw addresses are never
/// stored or logged.
pub fn hash_ip(ip: &str) -> String {
    let salt = std::env::var("IP_HASH_SALT").unwrap_or_else(|_| String::from("qrtrace_salt"));
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", ip, salt).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_stable_hex_digest() {
        let a = hash_ip("203.0.113.9");
        let b = hash_ip("203.0.113.9");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_ip("203.0.113.10"));
    }
}
