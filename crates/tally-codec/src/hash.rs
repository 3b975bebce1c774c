//! HMAC-SHA256 body signatures carried in the `HashSHA256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CodecError, CodecResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded HMAC of the body.
pub const HASH_HEADER: &str = "HashSHA256";

/// Signs and verifies bodies with a shared key.
#[derive(Clone)]
pub struct Signer {
    /// Keyed but unused; cloned for each body.
    keyed: HmacSha256,
}

impl Signer {
    /// `None` for an empty key: signing is disabled.
    pub fn new(key: &str) -> Option<Self> {
        if key.is_empty() {
            return None;
        }
        HmacSha256::new_from_slice(key.as_bytes())
            .ok()
            .map(|keyed| Self { keyed })
    }

    fn mac(&self) -> HmacSha256 {
        self.keyed.clone()
    }

    /// Lower-case hex HMAC of `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature against `body`.
    pub fn verify(&self, body: &[u8], signature: &str) -> CodecResult<()> {
        let expected = hex::decode(signature.trim()).map_err(|_| CodecError::MalformedHash {
            header: HASH_HEADER,
        })?;
        let mut mac = self.mac();
        mac.update(body);
        mac.verify_slice(&expected).map_err(|_| CodecError::HashMismatch)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signer(..)")
    }
}
