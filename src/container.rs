//! Whole-file decode and encode.

use tracing::debug;

use crate::crypto::{EncodeMaterial, FieldCipher, Header, IntegrityTracker};
use crate::error::{Result, SafeError};
use crate::format::record::{read_headers, read_record, write_headers, write_record};
use crate::format::{Field, FieldReader, FieldWriter};
use crate::safe::Safe;

/// Field-level reader over an encrypted safe.
///
/// Construction checks the magic and the passphrase. All fields returned are
/// cleartext; call [`verify`](Self::verify) after [`read_field`](Self::read_field)
/// returns `None` to check the file's integrity.
pub struct SafeReader<'a> {
    fields: FieldReader<'a>,
}

impl<'a> SafeReader<'a> {
    pub fn new(data: &'a [u8], passphrase: &str) -> Result<Self> {
        let (header, offset) = Header::from_bytes(data)?;
        let keys = header.unlock(passphrase)?;

        let cipher = FieldCipher::decryptor(&keys.data_key, header.iv());
        let tracker = IntegrityTracker::new(&keys.hmac_key);

        Ok(Self {
            fields: FieldReader::new(data, offset, cipher, tracker),
        })
    }

    /// Next field, or `None` at the end of the field stream.
    pub fn read_field(&mut self) -> Result<Option<Field>> {
        self.fields.read_field()
    }

    pub fn verify(self) -> Result<()> {
        self.fields.finish()
    }
}

/// Decodes a safe from its encrypted bytes.
///
/// The whole stream is materialised first; the model is returned only once the
/// trailing HMAC has been verified.
///
/// # Errors
///
/// - [`SafeError::BadFormat`](crate::SafeError::BadFormat) for a wrong magic or truncated data
/// - [`SafeError::InvalidPassphrase`](crate::SafeError::InvalidPassphrase) for a wrong passphrase
/// - [`SafeError::MalformedField`](crate::SafeError::MalformedField) for an impossible field length
/// - [`SafeError::IntegrityFailure`](crate::SafeError::IntegrityFailure) if the HMAC does not match
/// - [`SafeError::InvalidText`](crate::SafeError::InvalidText) for a text attribute that is not
///   UTF-8, reported only once the HMAC has been verified
pub fn decode(data: &[u8], passphrase: &str) -> Result<Safe> {
    let mut reader = SafeReader::new(data, passphrase)?;

    let safe = match read_safe(&mut reader.fields) {
        Ok(safe) => safe,
        Err(err @ SafeError::InvalidText { .. }) => {
            // Tampering must still surface as an integrity failure.
            while reader.read_field()?.is_some() {}
            reader.verify()?;
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    reader.verify()?;

    Ok(safe)
}

fn read_safe(fields: &mut FieldReader<'_>) -> Result<Safe> {
    let (headers, ended) = read_headers(fields)?;
    debug!(offset = fields.position(), "read header group");

    let mut records = Vec::new();
    if !ended {
        while let Some(record) = read_record(fields)? {
            records.push(record);
        }
    }
    debug!(records = records.len(), "reached end of field stream");

    Ok(Safe { headers, records })
}

/// Encodes `safe` under `passphrase` with fresh random salt, IV and keys.
///
/// # Errors
///
/// Returns [`SafeError::Random`](crate::SafeError::Random) if the OS random
/// generator fails.
pub fn encode(safe: &Safe, passphrase: &str) -> Result<Vec<u8>> {
    let material = EncodeMaterial::generate()?;
    encode_with_material(safe, passphrase, &material)
}

/// Encodes `safe` with caller-supplied key material. Output is deterministic.
pub fn encode_with_material(
    safe: &Safe,
    passphrase: &str,
    material: &EncodeMaterial,
) -> Result<Vec<u8>> {
    let header = Header::seal(material, passphrase);

    let cipher = FieldCipher::encryptor(material.data_key(), material.iv());
    let tracker = IntegrityTracker::new(material.hmac_key());
    let mut writer = FieldWriter::new(header.to_bytes(), cipher, tracker);

    write_headers(&mut writer, &safe.headers)?;
    for record in &safe.records {
        write_record(&mut writer, record)?;
    }
    debug!(records = safe.records.len(), "encoded safe");

    Ok(writer.finish())
}
