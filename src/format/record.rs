//! Mapping between the field stream and [`Headers`] / [`Record`] values.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::{FieldReader, FieldWriter, HeaderField, RecordField};
use crate::error::{Result, SafeError};
use crate::safe::{Headers, Record};

/// Decodes a 4- or 8-byte little-endian count of seconds since the Unix epoch.
fn parse_time(data: &[u8]) -> Option<DateTime<Utc>> {
    let secs = match data.len() {
        4 => i64::from(u32::from_le_bytes(<[u8; 4]>::try_from(data).ok()?)),
        8 => u64::from_le_bytes(<[u8; 8]>::try_from(data).ok()?) as i64,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

/// Four bytes when the instant fits a `u32`, eight otherwise.
fn encode_time(time: &DateTime<Utc>) -> Vec<u8> {
    let secs = time.timestamp();
    match u32::try_from(secs) {
        Ok(short) => short.to_le_bytes().to_vec(),
        Err(_) => secs.to_le_bytes().to_vec(),
    }
}

/// Text attributes must be valid UTF-8; anything else would not survive a re-save.
fn text(data: Vec<u8>, field: &'static str) -> Result<String> {
    String::from_utf8(data).map_err(|e| {
        warn!(field, valid_up_to = e.utf8_error().valid_up_to(), "invalid UTF-8 in text field");
        SafeError::InvalidText { field }
    })
}

fn time(data: &[u8], field: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_time(data);
    if parsed.is_none() {
        warn!(field, len = data.len(), "ignoring unparseable timestamp");
    }
    parsed
}

/// Reads the header group up to its terminator.
///
/// The returned flag is `true` if the stream sentinel showed up instead of the
/// terminator, meaning no records follow.
pub fn read_headers(reader: &mut FieldReader<'_>) -> Result<(Headers, bool)> {
    let mut headers = Headers::default();

    while let Some(field) = reader.read_field()? {
        if field.is_end_of_entry() {
            return Ok((headers, false));
        }

        match HeaderField::from_code(field.kind) {
            Some(HeaderField::Version) => match field.data[..] {
                [minor, major, ..] => {
                    headers.version_minor = minor;
                    headers.version_major = major;
                }
                _ => warn!(len = field.data.len(), "ignoring short version field"),
            },
            Some(HeaderField::LastSaveTime) => {
                headers.last_save = time(&field.data, "last save time");
            }
            Some(HeaderField::LastSaveProgram) => {
                headers.program = text(field.data, "last save program")?;
            }
            Some(HeaderField::LastSaveUser) => headers.user = text(field.data, "last save user")?,
            Some(HeaderField::LastSaveHost) => headers.host = text(field.data, "last save host")?,
            _ => {}
        }
    }

    warn!("field stream ended inside the header group");
    Ok((headers, true))
}

/// Reads one record group.
///
/// Returns `None` at the stream sentinel. A record cut short by the sentinel is
/// dropped; its fields are still covered by the HMAC.
pub fn read_record(reader: &mut FieldReader<'_>) -> Result<Option<Record>> {
    let mut record = Record::default();
    let mut partial = false;

    while let Some(field) = reader.read_field()? {
        if field.is_end_of_entry() {
            return Ok(Some(record));
        }
        partial = true;

        match RecordField::from_code(field.kind) {
            Some(RecordField::Uuid) => match Uuid::from_slice(&field.data) {
                Ok(uuid) => record.uuid = uuid,
                Err(_) => warn!(len = field.data.len(), "ignoring malformed record uuid"),
            },
            Some(RecordField::Group) => record.group = text(field.data, "group")?,
            Some(RecordField::Title) => record.title = text(field.data, "title")?,
            Some(RecordField::Username) => record.username = text(field.data, "username")?,
            Some(RecordField::Notes) => record.notes = text(field.data, "notes")?,
            Some(RecordField::Password) => record.password = text(field.data, "password")?,
            Some(RecordField::CreationTime) => {
                record.created = time(&field.data, "creation time");
            }
            Some(RecordField::Url) => record.url = text(field.data, "url")?,
            Some(RecordField::Email) => record.email = text(field.data, "email")?,
            None => {}
        }
    }

    if partial {
        warn!("dropping record not closed before end of stream");
    }
    Ok(None)
}

pub fn write_headers(writer: &mut FieldWriter, headers: &Headers) -> Result<()> {
    writer.write_field(
        HeaderField::Version.code(),
        &[headers.version_minor, headers.version_major],
    )?;
    if let Some(saved) = &headers.last_save {
        writer.write_field(HeaderField::LastSaveTime.code(), &encode_time(saved))?;
    }
    writer.write_field(HeaderField::LastSaveProgram.code(), headers.program.as_bytes())?;
    writer.write_field(HeaderField::LastSaveUser.code(), headers.user.as_bytes())?;
    writer.write_field(HeaderField::LastSaveHost.code(), headers.host.as_bytes())?;
    writer.write_terminator();
    Ok(())
}

pub fn write_record(writer: &mut FieldWriter, record: &Record) -> Result<()> {
    if !record.uuid.is_nil() {
        writer.write_field(RecordField::Uuid.code(), record.uuid.as_bytes())?;
    }

    let texts = [
        (RecordField::Group, &record.group),
        (RecordField::Title, &record.title),
        (RecordField::Username, &record.username),
        (RecordField::Notes, &record.notes),
        (RecordField::Password, &record.password),
    ];
    for (field, value) in texts {
        writer.write_field(field.code(), value.as_bytes())?;
    }

    if let Some(created) = &record.created {
        writer.write_field(RecordField::CreationTime.code(), &encode_time(created))?;
    }
    writer.write_field(RecordField::Url.code(), record.url.as_bytes())?;
    writer.write_field(RecordField::Email.code(), record.email.as_bytes())?;

    writer.write_terminator();
    Ok(())
}
