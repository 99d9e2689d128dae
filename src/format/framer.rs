//! Length-prefixed field framing over the chained cipher.
//!
//! Cleartext of the first block of every field:
//! ```text
//! LENGTH (4, LE) | TYPE (1) | DATA (11)
//! ```
//! Fields longer than 11 bytes continue in `ceil((len - 11) / 16)` further blocks.
//! Filler after the last payload byte is written as zeros and never read back.

use tracing::debug;

use super::{END_OF_ENTRY, FIELD_PREFIX_LEN, Field, INLINE_LEN, SENTINEL};
use crate::crypto::{BLOCK_LEN, DIGEST_LEN, FieldCipher, IntegrityTracker};
use crate::error::{Result, SafeError};

/// Number of blocks after the first one needed for `len` payload bytes.
fn extra_blocks(len: u64) -> u64 {
    len.saturating_sub(INLINE_LEN as u64).div_ceil(BLOCK_LEN as u64)
}

/// Decodes fields one at a time from the encrypted stream.
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    cipher: FieldCipher,
    tracker: IntegrityTracker,
    ended: bool,
}

impl<'a> FieldReader<'a> {
    /// Reads from `data` starting at byte `offset` (the end of the prologue).
    pub fn new(
        data: &'a [u8],
        offset: usize,
        cipher: FieldCipher,
        tracker: IntegrityTracker,
    ) -> Self {
        Self {
            data,
            pos: offset,
            cipher,
            tracker,
            ended: false,
        }
    }

    /// Current byte offset in the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn next_block(&mut self) -> Result<[u8; BLOCK_LEN]> {
        if self.remaining() < BLOCK_LEN {
            return Err(SafeError::BadFormat(format!(
                "truncated block at offset {}",
                self.pos
            )));
        }

        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&self.data[self.pos..self.pos + BLOCK_LEN]);
        self.pos += BLOCK_LEN;
        Ok(block)
    }

    /// Reads the next field.
    ///
    /// Returns `Ok(None)` once the sentinel is reached; call [`finish`](Self::finish)
    /// afterwards to check the stored digest. Every field except end-of-entry
    /// terminators is folded into the running HMAC.
    pub fn read_field(&mut self) -> Result<Option<Field>> {
        if self.ended {
            return Ok(None);
        }

        let start = self.pos;
        let mut block = self.next_block()?;

        if &block == SENTINEL {
            self.ended = true;
            return Ok(None);
        }

        self.cipher.process(&mut block);

        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&block[..4]);
        let declared = u32::from_le_bytes(prefix);
        let kind = block[4];
        let inline = &block[FIELD_PREFIX_LEN..];

        let data = if (declared as usize) <= INLINE_LEN {
            inline[..declared as usize].to_vec()
        } else {
            let extra = extra_blocks(u64::from(declared));
            if extra * BLOCK_LEN as u64 > self.remaining() as u64 {
                return Err(SafeError::MalformedField {
                    offset: start,
                    declared: u64::from(declared),
                });
            }

            let len = declared as usize;
            let mut data = Vec::with_capacity(INLINE_LEN + extra as usize * BLOCK_LEN);
            data.extend_from_slice(inline);
            for _ in 0..extra {
                let mut next = self.next_block()?;
                self.cipher.process(&mut next);
                data.extend_from_slice(&next);
            }
            data.truncate(len);
            data
        };

        if kind != END_OF_ENTRY {
            self.tracker.update(&data);
        }

        Ok(Some(Field { kind, data }))
    }

    /// Checks the 32-byte digest following the sentinel.
    ///
    /// # Errors
    ///
    /// - [`SafeError::BadFormat`] if the sentinel was not reached or the digest is missing
    /// - [`SafeError::IntegrityFailure`] if the digest does not match
    pub fn finish(self) -> Result<()> {
        if !self.ended {
            return Err(SafeError::BadFormat(
                "field stream is not terminated".into(),
            ));
        }

        let rest = &self.data[self.pos..];
        if rest.len() < DIGEST_LEN {
            return Err(SafeError::BadFormat(format!(
                "missing integrity digest: {} bytes after sentinel",
                rest.len()
            )));
        }
        if rest.len() > DIGEST_LEN {
            debug!(
                trailing = rest.len() - DIGEST_LEN,
                "ignoring bytes after integrity digest"
            );
        }

        self.tracker.verify(&rest[..DIGEST_LEN])
    }
}

/// Encodes fields into blocks, mirroring [`FieldReader`].
pub struct FieldWriter {
    out: Vec<u8>,
    cipher: FieldCipher,
    tracker: IntegrityTracker,
}

impl FieldWriter {
    /// Appends encrypted blocks to `out`, which normally already holds the prologue.
    pub fn new(out: Vec<u8>, cipher: FieldCipher, tracker: IntegrityTracker) -> Self {
        Self {
            out,
            cipher,
            tracker,
        }
    }

    fn push_block(&mut self, mut block: [u8; BLOCK_LEN]) {
        self.cipher.process(&mut block);
        self.out.extend_from_slice(&block);
    }

    /// Writes one field. Empty payloads are skipped, never written as zero-length fields.
    ///
    /// # Errors
    ///
    /// Returns [`SafeError::MalformedField`] if the payload does not fit a 32-bit length.
    pub fn write_field(&mut self, kind: u8, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let len = u32::try_from(data.len()).map_err(|_| SafeError::MalformedField {
            offset: self.out.len(),
            declared: data.len() as u64,
        })?;

        let (inline, rest) = data.split_at(data.len().min(INLINE_LEN));

        let mut first = [0u8; BLOCK_LEN];
        first[..4].copy_from_slice(&len.to_le_bytes());
        first[4] = kind;
        first[FIELD_PREFIX_LEN..FIELD_PREFIX_LEN + inline.len()].copy_from_slice(inline);
        self.push_block(first);

        for chunk in rest.chunks(BLOCK_LEN) {
            let mut block = [0u8; BLOCK_LEN];
            block[..chunk.len()].copy_from_slice(chunk);
            self.push_block(block);
        }

        self.tracker.update(data);
        Ok(())
    }

    /// Closes the current header or record group.
    pub fn write_terminator(&mut self) {
        let mut block = [0u8; BLOCK_LEN];
        block[4] = END_OF_ENTRY;
        self.push_block(block);
    }

    /// Appends the sentinel and the digest, returning the finished buffer.
    pub fn finish(self) -> Vec<u8> {
        let mut out = self.out;
        out.extend_from_slice(SENTINEL);
        out.extend_from_slice(&self.tracker.finalize());
        out
    }
}
