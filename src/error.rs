/// Errors produced while decoding or encoding a safe.
///
/// Every decode failure aborts the whole decode; callers never see a partial model.
#[derive(Debug, thiserror::Error)]
pub enum SafeError {
    /// Wrong magic, truncated prologue or a short block read mid-stream.
    #[error("not a valid pwsafe v3 database: {0}")]
    BadFormat(String),

    /// The stretched-key verifier did not match.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// The trailing HMAC did not match the field payloads.
    #[error("integrity check failed; the database is corrupted or was tampered with")]
    IntegrityFailure,

    /// A field's declared length runs past the end of the stream.
    #[error("malformed field at offset {offset}: declared length {declared} exceeds the stream")]
    MalformedField { offset: usize, declared: u64 },

    /// A text attribute is not valid UTF-8.
    #[error("field '{field}' is not valid UTF-8")]
    InvalidText { field: &'static str },

    /// The OS random generator failed while producing fresh key material.
    #[error("OS random generator unavailable")]
    Random,
}

pub type Result<T, E = SafeError> = std::result::Result<T, E>;
