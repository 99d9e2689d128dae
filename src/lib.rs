//! Reader and writer for Password Safe v3 databases.
//!
//! ```no_run
//! let bytes = std::fs::read("db.psafe3")?;
//! let mut safe = pwsafe3::decode(&bytes, "passphrase")?;
//! safe.records[0].password = "new secret".into();
//! let out = pwsafe3::encode(&safe, "another passphrase")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod container;
pub mod crypto;
mod error;
pub mod format;
mod safe;
mod storage;

pub use crate::container::{SafeReader, decode, encode, encode_with_material};
pub use crate::crypto::{EncodeMaterial, ITERATIONS, stretch_key};
pub use crate::error::SafeError;
pub use crate::format::Field;
pub use crate::safe::{FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR, Headers, Record, Safe};
pub use crate::storage::{PROGRAM_NAME, Storage};
