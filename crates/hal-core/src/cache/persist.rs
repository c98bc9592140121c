//! On-disk snapshot layout for [`super::CapabilityCache`]: a
//! length-prefixed sequence of `(key_bytes, value_bytes, metadata_bytes)`
//! records behind a magic/version header, exactly as mandated by the
//! external-interfaces contract.
//!
//! Hand-rolled big-endian encode/decode, not `serde`+`bincode`: the
//! contract fixes an exact, versioned, forward-compatible-to-unknown-
//! fields byte layout that a derive-based serializer does not give
//! control over.

use super::{CacheValue, CapabilityRecord, RecordMetadata};
use crate::error::{codes, Error, ErrorCategory, HalResult};

const MAGIC: &[u8; 4] = b"HALC";
const FORMAT_VERSION: u16 = 1;

/// Serializes `records` into the versioned snapshot byte layout.
pub fn encode_snapshot<V: CacheValue>(records: &[CapabilityRecord<V>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&(records.len() as u32).to_be_bytes());
    for record in records {
        encode_record(&mut out, record);
    }
    out
}

fn encode_record<V: CacheValue>(out: &mut Vec<u8>, record: &CapabilityRecord<V>) {
    out.extend_from_slice(&record.key.to_be_bytes());

    let value_bytes = record.value.to_bytes();
    out.extend_from_slice(&(value_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&value_bytes);

    let metadata_bytes = encode_metadata(&record.metadata);
    out.extend_from_slice(&(metadata_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&metadata_bytes);
}

fn encode_metadata(metadata: &RecordMetadata) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&metadata.created_at_ms.to_be_bytes());
    out.extend_from_slice(&metadata.last_accessed_ms.to_be_bytes());
    out.extend_from_slice(&metadata.expires_at_ms.to_be_bytes());
    out.extend_from_slice(&metadata.access_count.to_be_bytes());
    out.push(u8::from(metadata.dirty));
    out.extend_from_slice(&metadata.content_hash.to_be_bytes());
    let source_bytes = metadata.source.as_bytes();
    out.extend_from_slice(&(source_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(source_bytes);
    out
}

/// Deserializes a snapshot previously produced by [`encode_snapshot`].
/// Unknown trailing bytes within a sub-record are ignored, per the
/// wire-format contract's "unknown fields must be ignored" rule.
pub fn decode_snapshot<V: CacheValue>(bytes: &[u8]) -> HalResult<Vec<CapabilityRecord<V>>> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.take(4)?;
    if magic != MAGIC.as_slice() {
        return Err(malformed("bad magic"));
    }
    let version = u16::from_be_bytes(cursor.take(2)?.try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(malformed("unsupported snapshot format version"));
    }
    let count = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap());

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(decode_record(&mut cursor)?);
    }
    Ok(records)
}

fn decode_record<V: CacheValue>(cursor: &mut Cursor<'_>) -> HalResult<CapabilityRecord<V>> {
    let key = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());

    let value_len = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    let value_bytes = cursor.take(value_len)?;
    let value = V::from_bytes(value_bytes)?;

    let metadata_len = u32::from_be_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
    let metadata_bytes = cursor.take(metadata_len)?;
    let metadata = decode_metadata(metadata_bytes)?;

    Ok(CapabilityRecord { key, value, metadata })
}

fn decode_metadata(bytes: &[u8]) -> HalResult<RecordMetadata> {
    let mut cursor = Cursor::new(bytes);
    let created_at_ms = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());
    let last_accessed_ms = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());
    let expires_at_ms = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());
    let access_count = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());
    let dirty = cursor.take(1)?[0] != 0;
    let content_hash = u64::from_be_bytes(cursor.take(8)?.try_into().unwrap());
    let source_len = u16::from_be_bytes(cursor.take(2)?.try_into().unwrap()) as usize;
    let source_bytes = cursor.take(source_len)?;
    let source = String::from_utf8_lossy(source_bytes).into_owned();
    // Trailing bytes, if any (future fields), are ignored by design.
    Ok(RecordMetadata {
        created_at_ms,
        last_accessed_ms,
        expires_at_ms,
        access_count,
        dirty,
        source,
        content_hash,
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize) -> HalResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .ok_or_else(|| malformed("length overflow"))?;
        if end > self.bytes.len() {
            return Err(malformed("truncated snapshot"));
        }
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }
}

fn malformed(detail: &'static str) -> Error {
    Error::new(
        ErrorCategory::Configuration,
        codes::configuration::INVALID_PARAMETER,
        "malformed capability cache snapshot",
    )
    .with_context(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordMetadata;

    fn sample_record() -> CapabilityRecord<Vec<u8>> {
        CapabilityRecord {
            key: 42,
            value: vec![1, 2, 3, 4],
            metadata: RecordMetadata {
                created_at_ms: 1_000,
                last_accessed_ms: 1_500,
                expires_at_ms: 9_000,
                access_count: 3,
                dirty: true,
                source: "probe".to_owned(),
                content_hash: 0xDEAD_BEEF,
            },
        }
    }

    #[test]
    fn round_trips_a_snapshot() {
        let records = vec![sample_record()];
        let bytes = encode_snapshot(&records);
        let decoded: Vec<CapabilityRecord<Vec<u8>>> = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 16];
        let result: HalResult<Vec<CapabilityRecord<Vec<u8>>>> = decode_snapshot(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        let records = vec![sample_record()];
        let mut bytes = encode_snapshot(&records);
        bytes.truncate(bytes.len() - 2);
        let result: HalResult<Vec<CapabilityRecord<Vec<u8>>>> = decode_snapshot(&bytes);
        assert!(result.is_err());
    }
}
