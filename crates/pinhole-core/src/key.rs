use crate::shortcode::{ShortCode, CODE_BYTES};
use sha2::{Digest, Sha256};

/// Derives short codes from URLs.
///
/// The code is the first five bytes of the SHA-256 digest of the URL,
/// hex-encoded. The same URL always maps to the same code; different URLs
/// collide with a probability consistent with a 40-bit digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    pub fn derive(url: &str) -> ShortCode {
        let digest = Sha256::digest(url.as_bytes());
        ShortCode::new_unchecked(hex::encode(&digest[..CODE_BYTES]))
    }
}
