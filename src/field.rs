//! Field abstraction: the value being edited and its optional name/extension hints.
//!
//! The owning host implements `Field`; `MemoryField` and `FileField` are the two
//! implementations shipped here (tests and the CLI respectively).

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Whether the field stores raw bytes or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Binary,
    Text,
}

/// A field value as handed across the field boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blob {
    Bytes(Vec<u8>),
    Text(String),
}

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Blob::Bytes(b) => b,
            Blob::Text(s) => s.as_bytes(),
        }
    }
}

pub trait Field: Send + Sync {
    fn kind(&self) -> FieldKind;
    fn has_value(&self) -> bool;
    /// Current value; `None` when the field holds no value.
    fn read_value(&self) -> Option<Blob>;
    fn write_value(&self, value: Blob) -> io::Result<()>;
    fn clear_value(&self) -> io::Result<()>;
    fn is_read_only(&self) -> bool;
}

/// Secondary field providing a suggested file stem or extension.
pub trait Hint: Send + Sync {
    fn value(&self) -> Option<String>;
}

/// Fixed hint value.
#[derive(Debug, Clone)]
pub struct StaticHint(pub Option<String>);

impl StaticHint {
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        StaticHint(if s.trim().is_empty() { None } else { Some(s) })
    }
}

impl Hint for StaticHint {
    fn value(&self) -> Option<String> {
        self.0.clone()
    }
}

/// In-process field; the reference implementation used by tests and embedding hosts.
#[derive(Debug)]
pub struct MemoryField {
    kind: FieldKind,
    read_only: bool,
    value: Mutex<Option<Blob>>,
    writes: Mutex<usize>,
}

impl MemoryField {
    pub fn new(kind: FieldKind, value: Option<Blob>, read_only: bool) -> Self {
        Self {
            kind,
            read_only,
            value: Mutex::new(value),
            writes: Mutex::new(0),
        }
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(FieldKind::Binary, Some(Blob::Bytes(bytes.into())), false)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(FieldKind::Text, Some(Blob::Text(s.into())), false)
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Number of successful `write_value`/`clear_value` calls.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Option<Blob> {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Field for MemoryField {
    fn kind(&self) -> FieldKind {
        self.kind
    }

    fn has_value(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn read_value(&self) -> Option<Blob> {
        self.snapshot()
    }

    fn write_value(&self, value: Blob) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "field is read-only",
            ));
        }
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(value);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn clear_value(&self) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "field is read-only",
            ));
        }
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Field persisted as a file on disk; a missing file means "no value".
#[derive(Debug, Clone)]
pub struct FileField {
    path: PathBuf,
    kind: FieldKind,
    read_only: bool,
}

impl FileField {
    pub fn new(path: impl Into<PathBuf>, kind: FieldKind, read_only: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            read_only,
        }
    }
}

impl Field for FileField {
    fn kind(&self) -> FieldKind {
        self.kind
    }

    fn has_value(&self) -> bool {
        self.path.is_file()
    }

    fn read_value(&self) -> Option<Blob> {
        let bytes = fs::read(&self.path).ok()?;
        Some(match self.kind {
            FieldKind::Binary => Blob::Bytes(bytes),
            FieldKind::Text => Blob::Text(String::from_utf8_lossy(&bytes).into_owned()),
        })
    }

    fn write_value(&self, value: Blob) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is opened read-only", self.path.display()),
            ));
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, value.as_bytes())
    }

    fn clear_value(&self) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is opened read-only", self.path.display()),
            ));
        }
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
