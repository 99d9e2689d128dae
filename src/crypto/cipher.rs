use cbc::cipher::{
    BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit, generic_array::GenericArray,
};
use twofish::Twofish;

use super::{BLOCK_LEN, KEY_LEN};

/// Builds a Twofish instance from a 256-bit key.
pub(crate) fn twofish(key: &[u8; KEY_LEN]) -> Twofish {
    // Twofish accepts 128, 192 and 256 bit keys.
    Twofish::new_from_slice(key).expect("256-bit twofish key")
}

enum Session {
    Decrypt(cbc::Decryptor<Twofish>),
    Encrypt(cbc::Encryptor<Twofish>),
}

/// One Twofish-CBC session over the whole field stream.
///
/// The chaining state starts at the header IV and advances on every
/// [`process`](Self::process) call. Blocks must be fed in stream order; the
/// session is never rebuilt between fields or records.
pub struct FieldCipher {
    session: Session,
}

impl FieldCipher {
    pub fn decryptor(data_key: &[u8; KEY_LEN], iv: &[u8; BLOCK_LEN]) -> Self {
        let inner = cbc::Decryptor::inner_iv_init(twofish(data_key), GenericArray::from_slice(iv));
        Self {
            session: Session::Decrypt(inner),
        }
    }

    pub fn encryptor(data_key: &[u8; KEY_LEN], iv: &[u8; BLOCK_LEN]) -> Self {
        let inner = cbc::Encryptor::inner_iv_init(twofish(data_key), GenericArray::from_slice(iv));
        Self {
            session: Session::Encrypt(inner),
        }
    }

    /// Decrypts or encrypts one block in place, depending on the session direction.
    pub fn process(&mut self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match &mut self.session {
            Session::Decrypt(cbc) => cbc.decrypt_block_mut(block),
            Session::Encrypt(cbc) => cbc.encrypt_block_mut(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::{BlockDecrypt, BlockEncrypt};

    const KEY: [u8; 32] = [0x5a; 32];
    const IV: [u8; 16] = [0x33; 16];

    #[test]
    fn encrypt_then_decrypt_across_blocks() {
        let plain: Vec<[u8; 16]> = (0u8..5).map(|i| [i; 16]).collect();

        let mut enc = FieldCipher::encryptor(&KEY, &IV);
        let cipher: Vec<[u8; 16]> = plain
            .iter()
            .map(|p| {
                let mut b = *p;
                enc.process(&mut b);
                b
            })
            .collect();

        let mut dec = FieldCipher::decryptor(&KEY, &IV);
        for (c, p) in cipher.iter().zip(&plain) {
            let mut b = *c;
            dec.process(&mut b);
            assert_eq!(&b, p);
        }
    }

    #[test]
    fn chaining_state_persists() {
        // Identical plaintext blocks must not produce identical ciphertext.
        let mut enc = FieldCipher::encryptor(&KEY, &IV);
        let mut a = [7u8; 16];
        let mut b = [7u8; 16];
        enc.process(&mut a);
        enc.process(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn matches_manual_cbc() {
        let tf = twofish(&KEY);
        let plain = [[1u8; 16], [2u8; 16]];

        let mut expected = Vec::new();
        let mut prev = IV;
        for p in plain {
            let mut x = [0u8; 16];
            for i in 0..16 {
                x[i] = p[i] ^ prev[i];
            }
            tf.encrypt_block(GenericArray::from_mut_slice(&mut x));
            expected.push(x);
            prev = x;
        }

        let mut enc = FieldCipher::encryptor(&KEY, &IV);
        for (p, e) in plain.iter().zip(&expected) {
            let mut b = *p;
            enc.process(&mut b);
            assert_eq!(&b, e);
        }

        let mut first = expected[0];
        tf.decrypt_block(GenericArray::from_mut_slice(&mut first));
        for i in 0..16 {
            first[i] ^= IV[i];
        }
        assert_eq!(first, plain[0]);
    }

    #[test]
    fn out_of_order_blocks_do_not_decrypt() {
        let mut enc = FieldCipher::encryptor(&KEY, &IV);
        let mut a = [1u8; 16];
        let mut b = [2u8; 16];
        enc.process(&mut a);
        enc.process(&mut b);

        let mut dec = FieldCipher::decryptor(&KEY, &IV);
        dec.process(&mut b);
        assert_ne!(b, [2u8; 16]);
    }
}
