use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{DIGEST_LEN, KEY_LEN};
use crate::error::{Result, SafeError};

type HmacSha256 = Hmac<Sha256>;

/// Running HMAC-SHA256 over the payload of every field in the stream.
///
/// End-of-entry terminators and the stream sentinel are not part of the digest.
pub struct IntegrityTracker {
    mac: HmacSha256,
}

impl IntegrityTracker {
    pub fn new(hmac_key: &[u8; KEY_LEN]) -> Self {
        // HMAC takes keys of any length.
        let mac = <HmacSha256 as Mac>::new_from_slice(hmac_key).expect("hmac key");
        Self { mac }
    }

    pub fn update(&mut self, payload: &[u8]) {
        self.mac.update(payload);
    }

    /// Compares the running digest with the one stored after the sentinel.
    pub fn verify(self, stored: &[u8]) -> Result<()> {
        self.mac
            .verify_slice(stored)
            .map_err(|_| SafeError::IntegrityFailure)
    }

    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.mac.finalize().into_bytes().into()
    }
}
