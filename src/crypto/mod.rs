//! Cryptographic primitives for the PWS3 container.
//!
//! Provides key stretching, the file prologue with its wrapped keys, the chained
//! field cipher and the keyed integrity hash.

pub mod cipher;
pub mod header;
pub mod integrity;
pub mod kdf;

pub use cipher::FieldCipher;
pub use header::{EncodeMaterial, Header, WorkingKeys};
pub use integrity::IntegrityTracker;
pub use kdf::stretch_key;

/// Length of the salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the stretched key and of both working keys (256 bits).
pub const KEY_LEN: usize = 32;
/// Twofish block size; also the size of the IV and of each wrapped-key block.
pub const BLOCK_LEN: usize = 16;
/// Length of a SHA-256 / HMAC-SHA256 output.
pub const DIGEST_LEN: usize = 32;
/// Length of the magic bytes (4 bytes "PWS3").
pub const MAGIC_LEN: usize = 4;
/// Length of the iteration count field (4 bytes).
pub const ITER_LEN: usize = 4;
/// Iteration count used whenever a safe is written.
pub const ITERATIONS: u32 = 2048;
/// Stored iteration counts above this are honoured but logged, since stretching
/// runs before the passphrase can be checked.
pub const ITERATIONS_WARN: u32 = 1 << 22;
