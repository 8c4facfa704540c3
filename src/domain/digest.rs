use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content`, the format the API reports in
/// `X-Gitlab-Content-Sha256`.
pub fn sha256_hex(content: &[u8]) -> String {
    Sha256::digest(content).iter().map(|byte| format!("{:02x}", byte)).collect()
}
