//! Cancellation and scoped partial-artifact cleanup
//!
//! A build shares one [`CancelFlag`] between the signal handler, the scheduler
//! and every transfer. Writers never create a destination directly: they write
//! into a [`PartialFile`] next to it, which is removed on every exit path unless
//! it is explicitly committed by an atomic rename.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::TransportError;

const COPY_CHUNK: usize = 64 * 1024;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A destination being written
///
/// Dropping it without [`PartialFile::commit`] deletes the partial file
/// (the temporary file removes itself).
pub struct PartialFile {
    destination: PathBuf,
    file: NamedTempFile,
}

impl PartialFile {
    /// Open a temporary file in the destination's directory
    pub fn create(destination: impl Into<PathBuf>) -> io::Result<Self> {
        let destination = destination.into();
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let file = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(dir)?;
        Ok(Self { destination, file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn as_file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Flush and atomically rename into place
    pub fn commit(mut self) -> io::Result<PathBuf> {
        self.file.as_file_mut().sync_all()?;
        let destination = self.destination;
        self.file.persist(&destination).map_err(|e| e.error)?;
        Ok(destination)
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Chunked copy that stops at the next chunk once the flag is set
pub fn copy(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    cancel: &CancelFlag,
) -> Result<u64, TransportError> {
    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_partial_file_removed_when_dropped() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("out.tif");

        let partial_path = {
            let mut partial = PartialFile::create(&destination).unwrap();
            partial.write_all(b"half").unwrap();
            partial.path().to_path_buf()
        };

        assert!(!partial_path.exists());
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_partial_file_commit_renames() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("nested").join("out.tif");

        let mut partial = PartialFile::create(&destination).unwrap();
        partial.write_all(b"complete").unwrap();
        let path = partial.commit().unwrap();

        assert_eq!(path, destination);
        assert_eq!(std::fs::read(&destination).unwrap(), b"complete");
    }

    #[test]
    fn test_copy_stops_when_cancelled() {
        let flag = CancelFlag::new();
        flag.cancel();
        let mut reader: &[u8] = b"data";
        let mut out = Vec::new();
        assert!(matches!(
            copy(&mut reader, &mut out, &flag),
            Err(TransportError::Cancelled)
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_copy_counts_bytes() {
        let data = vec![7u8; COPY_CHUNK * 2 + 3];
        let mut reader: &[u8] = &data;
        let mut out = Vec::new();
        let copied = copy(&mut reader, &mut out, &CancelFlag::new()).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }
}
