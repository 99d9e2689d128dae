use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::KEY_LEN;

/// Stretches a passphrase into the 32-byte key guarding a PWS3 file.
///
/// `x0 = SHA256(passphrase || salt)`, then `x_i = SHA256(x_{i-1})` for
/// `iterations` rounds. The same key both verifies the passphrase (through its
/// hash) and unwraps the working keys.
pub fn stretch_key(salt: &[u8], passphrase: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    hasher.update(salt);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&hasher.finalize());

    for _ in 0..iterations {
        let next = Sha256::digest(&key[..]);
        key.copy_from_slice(&next);
    }

    key
}
