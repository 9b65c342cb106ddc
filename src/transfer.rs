//! Byte transfer between the field and the filesystem.
//!
//! Reads from disk are streamed and bounded by `maximum_content_length`; the size is
//! checked against file metadata before any buffer is allocated, and again while
//! reading in case the file grows underneath us.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::errors::EditError;
use crate::field::{Blob, Field, FieldKind};
use crate::util::fs::clear_readonly;

const CHUNK: usize = 64 * 1024;

#[derive(Clone)]
pub struct ContentTransfer {
    field: Arc<dyn Field>,
    maximum_content_length: u64,
}

impl ContentTransfer {
    pub fn new(field: Arc<dyn Field>, maximum_content_length: u64) -> Self {
        Self {
            field,
            maximum_content_length,
        }
    }

    fn field_bytes(&self) -> Option<Blob> {
        if self.field.has_value() {
            self.field.read_value()
        } else {
            None
        }
    }

    #[cfg_attr(feature = "telemetry", instrument(level = "debug", skip(self), err))]
    /// Write the field's current value to `path`, replacing any existing file.
    ///
    /// Side effect: a read-only attribute on an existing destination is cleared first.
    /// A field without a value produces an empty file.
    pub fn write_field_to_file(&self, path: &Path) -> io::Result<()> {
        clear_readonly(path)?;
        let value = self.field_bytes();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut out = BufWriter::with_capacity(CHUNK, file);
        if let Some(v) = value {
            let mut src = v.as_bytes();
            io::copy(&mut src, &mut out)?;
        }
        out.flush()?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }

    #[cfg_attr(feature = "telemetry", instrument(level = "debug", skip(self), err))]
    /// Load `path` into the field. Fails with `ContentTooLarge` (leaving the field
    /// untouched) when the file exceeds the configured maximum.
    pub fn write_file_to_field(&self, path: &Path) -> Result<(), EditError> {
        let bytes = self.read_bounded(path)?;
        let blob = match self.field.kind() {
            FieldKind::Binary => Blob::Bytes(bytes),
            FieldKind::Text => Blob::Text(String::from_utf8(bytes).map_err(|_| EditError::InvalidText)?),
        };
        self.field.write_value(blob)?;
        Ok(())
    }

    fn read_bounded(&self, path: &Path) -> Result<Vec<u8>, EditError> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        if length > self.maximum_content_length {
            return Err(EditError::ContentTooLarge {
                length,
                maximum: self.maximum_content_length,
            });
        }
        let mut buf = Vec::with_capacity(length as usize);
        // One byte past the limit is enough to detect growth since the metadata check
        BufReader::with_capacity(CHUNK, file)
            .take(self.maximum_content_length + 1)
            .read_to_end(&mut buf)?;
        if buf.len() as u64 > self.maximum_content_length {
            return Err(EditError::ContentTooLarge {
                length: buf.len() as u64,
                maximum: self.maximum_content_length,
            });
        }
        Ok(buf)
    }

    /// Byte-equality between the field value and the file. An unreadable file is
    /// reported as different so a needed save is never skipped.
    pub fn content_equals(&self, path: &Path) -> bool {
        let value = self.field_bytes();
        let expected: &[u8] = value.as_ref().map(|b| b.as_bytes()).unwrap_or(&[]);
        stream_equals(path, expected).unwrap_or(false)
    }
}

/// Compare a file to an in-memory buffer chunk by chunk.
pub fn stream_equals(path: &Path, expected: &[u8]) -> io::Result<bool> {
    let file = File::open(path)?;
    if file.metadata()?.len() != expected.len() as u64 {
        return Ok(false);
    }
    let mut reader = BufReader::with_capacity(CHUNK, file);
    let mut chunk = vec![0u8; CHUNK];
    let mut offset = 0usize;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(offset == expected.len());
        }
        let end = offset + n;
        if end > expected.len() || chunk[..n] != expected[offset..end] {
            return Ok(false);
        }
        offset = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::MemoryField;

    fn transfer(field: Arc<MemoryField>, max: u64) -> ContentTransfer {
        ContentTransfer::new(field, max)
    }

    #[test]
    fn test_write_then_equals_then_mutate() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("v.bin");
        let field = Arc::new(MemoryField::binary(vec![0u8, 159, 146, 150]));
        let t = transfer(field, 1024);
        t.write_field_to_file(&p).expect("write");
        assert!(t.content_equals(&p));
        std::fs::write(&p, [0u8, 159, 146, 151]).expect("mutate");
        assert!(!t.content_equals(&p));
    }

    #[test]
    fn test_unreadable_file_is_not_equal() {
        let td = tempfile::tempdir().expect("tmpdir");
        let t = transfer(Arc::new(MemoryField::binary(Vec::new())), 1024);
        assert!(!t.content_equals(&td.path().join("missing")));
    }

    #[test]
    fn test_overwrite_clears_readonly_attribute() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("ro.txt");
        std::fs::write(&p, "old").expect("write");
        crate::util::fs::set_readonly(&p).expect("set ro");
        let t = transfer(Arc::new(MemoryField::text("new")), 1024);
        t.write_field_to_file(&p).expect("overwrite read-only file");
        assert_eq!(std::fs::read_to_string(&p).expect("read"), "new");
        assert!(!std::fs::metadata(&p).expect("meta").permissions().readonly());
    }

    #[test]
    fn test_too_large_leaves_field_untouched() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("big.bin");
        std::fs::write(&p, vec![7u8; 11]).expect("write");
        let field = Arc::new(MemoryField::binary(vec![1u8]));
        let t = transfer(field.clone(), 10);
        match t.write_file_to_field(&p) {
            Err(EditError::ContentTooLarge { length, maximum }) => {
                assert_eq!(length, 11);
                assert_eq!(maximum, 10);
            }
            other => panic!("expected ContentTooLarge, got {other:?}"),
        }
        assert_eq!(field.snapshot(), Some(Blob::Bytes(vec![1u8])));
        assert_eq!(field.write_count(), 0);

        std::fs::write(&p, vec![7u8; 10]).expect("rewrite at limit");
        t.write_file_to_field(&p).expect("exactly at limit is accepted");
        assert_eq!(field.snapshot(), Some(Blob::Bytes(vec![7u8; 10])));
    }

    #[test]
    fn test_text_field_rejects_invalid_utf8() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("bad.txt");
        std::fs::write(&p, [0xffu8, 0xfe, 0x00]).expect("write");
        let field = Arc::new(MemoryField::text("ok"));
        let t = transfer(field.clone(), 1024);
        assert!(matches!(t.write_file_to_field(&p), Err(EditError::InvalidText)));
        assert_eq!(field.snapshot(), Some(Blob::Text("ok".into())));
    }

    #[test]
    fn test_empty_field_writes_empty_file() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("empty.bin");
        let field = Arc::new(MemoryField::new(FieldKind::Binary, None, false));
        let t = transfer(field, 1024);
        t.write_field_to_file(&p).expect("write");
        assert_eq!(std::fs::metadata(&p).expect("meta").len(), 0);
        assert!(t.content_equals(&p));
    }
}
