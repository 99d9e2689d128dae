//! The fixed 152-byte PWS3 prologue.
//!
//! ```text
//! MAGIC (4) | SALT (32) | ITER (4, LE) | H(P') (32) | B1 | B2 | B3 | B4 (16 each) | IV (16)
//! ```
//!
//! `B1 || B2` wrap the data key and `B3 || B4` wrap the HMAC key. Each block is an
//! independent single-block Twofish operation under the stretched key.

use getrandom::fill;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use twofish::cipher::{BlockDecrypt, BlockEncrypt, generic_array::GenericArray};
use zeroize::{Zeroize, Zeroizing};

use super::cipher::twofish;
use super::kdf::stretch_key;
use super::{
    BLOCK_LEN, DIGEST_LEN, ITER_LEN, ITERATIONS, ITERATIONS_WARN, KEY_LEN, MAGIC_LEN, SALT_LEN,
};
use crate::error::{Result, SafeError};

pub const MAGIC: &[u8; MAGIC_LEN] = b"PWS3";

const WRAPPED_BLOCKS: usize = 4;

/// Fresh random material for one encode: salt, IV and both working keys.
pub struct EncodeMaterial {
    salt: [u8; SALT_LEN],
    iv: [u8; BLOCK_LEN],
    data_key: [u8; KEY_LEN],
    hmac_key: [u8; KEY_LEN],
}

impl Drop for EncodeMaterial {
    fn drop(&mut self) {
        self.data_key.zeroize();
        self.hmac_key.zeroize();
    }
}

impl EncodeMaterial {
    /// Total random bytes consumed per encode.
    pub const LEN: usize = SALT_LEN + BLOCK_LEN + KEY_LEN + KEY_LEN;

    /// Builds material from explicit values, for reproducible output.
    pub fn new(
        salt: [u8; SALT_LEN],
        iv: [u8; BLOCK_LEN],
        data_key: [u8; KEY_LEN],
        hmac_key: [u8; KEY_LEN],
    ) -> Self {
        Self {
            salt,
            iv,
            data_key,
            hmac_key,
        }
    }

    /// Draws all material from the OS random generator.
    pub fn generate() -> Result<Self> {
        let mut buf = Zeroizing::new([0u8; Self::LEN]);
        fill(&mut buf[..]).map_err(|_| SafeError::Random)?;

        let mut material = Self::new(
            [0u8; SALT_LEN],
            [0u8; BLOCK_LEN],
            [0u8; KEY_LEN],
            [0u8; KEY_LEN],
        );
        let (salt, rest) = buf.split_at(SALT_LEN);
        let (iv, rest) = rest.split_at(BLOCK_LEN);
        let (data_key, hmac_key) = rest.split_at(KEY_LEN);

        material.salt.copy_from_slice(salt);
        material.iv.copy_from_slice(iv);
        material.data_key.copy_from_slice(data_key);
        material.hmac_key.copy_from_slice(hmac_key);

        Ok(material)
    }

    pub fn iv(&self) -> &[u8; BLOCK_LEN] {
        &self.iv
    }

    pub fn data_key(&self) -> &[u8; KEY_LEN] {
        &self.data_key
    }

    pub fn hmac_key(&self) -> &[u8; KEY_LEN] {
        &self.hmac_key
    }
}

/// The two keys recovered from an unlocked header.
pub struct WorkingKeys {
    pub data_key: Zeroizing<[u8; KEY_LEN]>,
    pub hmac_key: Zeroizing<[u8; KEY_LEN]>,
}

#[derive(Debug, Clone)]
pub struct Header {
    salt: [u8; SALT_LEN],
    iterations: u32,
    verifier: [u8; DIGEST_LEN],
    wrapped: [[u8; BLOCK_LEN]; WRAPPED_BLOCKS],
    iv: [u8; BLOCK_LEN],
}

impl Header {
    pub const LEN: usize = MAGIC_LEN
        + SALT_LEN
        + ITER_LEN
        + DIGEST_LEN
        + WRAPPED_BLOCKS * BLOCK_LEN
        + BLOCK_LEN;

    /// Builds the prologue for a new file, wrapping the material's working keys
    /// under a key stretched from `passphrase` with [`ITERATIONS`] rounds.
    pub fn seal(material: &EncodeMaterial, passphrase: &str) -> Self {
        let sk = stretch_key(&material.salt, passphrase.as_bytes(), ITERATIONS);
        let verifier: [u8; DIGEST_LEN] = Sha256::digest(&sk[..]).into();

        let tfish = twofish(&sk);
        let mut wrapped = [[0u8; BLOCK_LEN]; WRAPPED_BLOCKS];
        let halves = [
            &material.data_key[..BLOCK_LEN],
            &material.data_key[BLOCK_LEN..],
            &material.hmac_key[..BLOCK_LEN],
            &material.hmac_key[BLOCK_LEN..],
        ];
        for (block, half) in wrapped.iter_mut().zip(halves) {
            block.copy_from_slice(half);
            tfish.encrypt_block(GenericArray::from_mut_slice(block));
        }

        Self {
            salt: material.salt,
            iterations: ITERATIONS,
            verifier,
            wrapped,
            iv: material.iv,
        }
    }

    /// Checks `passphrase` against the stored verifier and unwraps the working keys.
    ///
    /// Stretching uses the iteration count stored in the file, so its cost is set by
    /// the file: up to `u32::MAX` SHA-256 rounds before a wrong passphrase is known.
    ///
    /// # Errors
    ///
    /// Returns [`SafeError::InvalidPassphrase`] if the verifier does not match.
    pub fn unlock(&self, passphrase: &str) -> Result<WorkingKeys> {
        if self.has_excessive_iterations() {
            warn!(
                iterations = self.iterations,
                "stored iteration count is unusually high; unlocking may take a long time"
            );
        }
        let sk = stretch_key(&self.salt, passphrase.as_bytes(), self.iterations);
        let computed = Sha256::digest(&sk[..]);

        if !bool::from(computed[..].ct_eq(&self.verifier[..])) {
            return Err(SafeError::InvalidPassphrase);
        }

        let tfish = twofish(&sk);
        let mut keys = Zeroizing::new([[0u8; BLOCK_LEN]; WRAPPED_BLOCKS]);
        for (out, block) in keys.iter_mut().zip(&self.wrapped) {
            out.copy_from_slice(block);
            tfish.decrypt_block(GenericArray::from_mut_slice(out));
        }

        let mut data_key = Zeroizing::new([0u8; KEY_LEN]);
        data_key[..BLOCK_LEN].copy_from_slice(&keys[0]);
        data_key[BLOCK_LEN..].copy_from_slice(&keys[1]);

        let mut hmac_key = Zeroizing::new([0u8; KEY_LEN]);
        hmac_key[..BLOCK_LEN].copy_from_slice(&keys[2]);
        hmac_key[BLOCK_LEN..].copy_from_slice(&keys[3]);

        Ok(WorkingKeys { data_key, hmac_key })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Whether the stored iteration count is above [`ITERATIONS_WARN`].
    pub fn has_excessive_iterations(&self) -> bool {
        self.iterations > ITERATIONS_WARN
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn iv(&self) -> &[u8; BLOCK_LEN] {
        &self.iv
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);

        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.iterations.to_le_bytes());
        buf.extend_from_slice(&self.verifier);
        for block in &self.wrapped {
            buf.extend_from_slice(block);
        }
        buf.extend_from_slice(&self.iv);

        buf
    }

    /// Parses the prologue, returning it with the offset of the field stream.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < Self::LEN {
            return Err(SafeError::BadFormat(format!(
                "file too short: {} bytes, prologue needs {}",
                data.len(),
                Self::LEN
            )));
        }

        if &data[..MAGIC_LEN] != MAGIC {
            return Err(SafeError::BadFormat("invalid magic".into()));
        }

        let mut offset = MAGIC_LEN;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[offset..offset + SALT_LEN]);
        offset += SALT_LEN;

        let mut iter = [0u8; ITER_LEN];
        iter.copy_from_slice(&data[offset..offset + ITER_LEN]);
        let iterations = u32::from_le_bytes(iter);
        offset += ITER_LEN;

        let mut verifier = [0u8; DIGEST_LEN];
        verifier.copy_from_slice(&data[offset..offset + DIGEST_LEN]);
        offset += DIGEST_LEN;

        let mut wrapped = [[0u8; BLOCK_LEN]; WRAPPED_BLOCKS];
        for block in wrapped.iter_mut() {
            block.copy_from_slice(&data[offset..offset + BLOCK_LEN]);
            offset += BLOCK_LEN;
        }

        let mut iv = [0u8; BLOCK_LEN];
        iv.copy_from_slice(&data[offset..offset + BLOCK_LEN]);
        offset += BLOCK_LEN;

        debug!(iterations, "parsed pwsafe v3 prologue");

        Ok((
            Header {
                salt,
                iterations,
                verifier,
                wrapped,
                iv,
            },
            offset,
        ))
    }
}
