//! Content digests for datastream checksum types

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hex digest of `data` for a Fedora checksum type.
///
/// Returns `None` for types this client cannot compute (`DISABLED`,
/// `SHA-384`, ...).
pub fn digest(checksum_type: &str, data: &[u8]) -> Option<String> {
    match checksum_type.to_ascii_uppercase().as_str() {
        "MD5" => Some(format!("{:x}", md5::compute(data))),
        "SHA-1" => Some(hex::encode(Sha1::digest(data))),
        "SHA-256" => Some(hex::encode(Sha256::digest(data))),
        _ => None,
    }
}
