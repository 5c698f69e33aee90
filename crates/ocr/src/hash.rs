use sha2::{Digest, Sha256};

/// SHA-256 of an in-memory image, as lowercase hex (64 chars).
pub fn image_digest(data: &[u8]) -> String {
    let hash: [u8; 32] = Sha256::digest(data).into();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
