//! In-memory zip writer that takes entries one at a time

use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the entry written into an archive that would otherwise be empty
pub const PLACEHOLDER_ENTRY: &str = "README.txt";

const PLACEHOLDER_TEXT: &str = "None of the requested files could be downloaded.\n\
Check that they still exist and that you have access to them, then export again.\n";

/// One file to append to the archive
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    /// Unique path inside the archive
    pub name: String,
    /// Raw file content
    pub data: Bytes,
    /// Store without compression (content is compressed already)
    pub store_raw: bool,
}

/// Incremental archive builder
///
/// Each entry's bytes are compressed into the archive buffer as soon as it is
/// added, so the caller can release them right away. [`finish`](Self::finish)
/// consumes the writer. An unfinished writer owns nothing but memory and can
/// be dropped at any point.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    compression_level: i32,
    entries: usize,
}

impl ArchiveWriter {
    /// Create an empty archive; `compression_level` applies to deflated entries
    pub fn new(compression_level: i32) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            compression_level,
            entries: 0,
        }
    }

    /// Compress and append one entry
    ///
    /// CPU-bound for deflated entries; async callers should run it on a
    /// blocking thread.
    pub fn add_entry(&mut self, entry: ArchiveEntry) -> Result<()> {
        let options = if entry.store_raw {
            FileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.compression_level))
        };

        self.zip
            .start_file(entry.name.as_str(), options)
            .map_err(|e| Error::Archive(format!("failed to start entry '{}': {}", entry.name, e)))?;
        self.zip.write_all(&entry.data)?;
        self.entries += 1;

        debug!(
            name = %entry.name,
            size = entry.data.len(),
            stored = entry.store_raw,
            "archive entry added"
        );
        Ok(())
    }

    /// Entries added so far
    pub fn len(&self) -> usize {
        self.entries
    }

    /// True when no entry has been added
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Write the central directory and return the archive bytes
    ///
    /// An archive without entries gets a [`PLACEHOLDER_ENTRY`] explaining that
    /// nothing could be downloaded, so the result always opens as a normal
    /// archive.
    pub fn finish(mut self) -> Result<Bytes> {
        if self.is_empty() {
            self.add_entry(ArchiveEntry {
                name: PLACEHOLDER_ENTRY.to_string(),
                data: Bytes::from_static(PLACEHOLDER_TEXT.as_bytes()),
                store_raw: false,
            })?;
        }

        let cursor = self
            .zip
            .finish()
            .map_err(|e| Error::Archive(format!("failed to finalize archive: {}", e)))?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("entries", &self.entries)
            .field("compression_level", &self.compression_level)
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(name: &str, data: &'static [u8], store_raw: bool) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            data: Bytes::from_static(data),
            store_raw,
        }
    }

    fn open(bytes: Bytes) -> ZipArchive<Cursor<Bytes>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_entries_round_trip_with_method() {
        let mut writer = ArchiveWriter::new(6);
        writer
            .add_entry(entry("notes.txt", b"plain text plain text plain text", false))
            .unwrap();
        writer
            .add_entry(entry("scan.pdf", b"%PDF-1.7 fake", true))
            .unwrap();
        assert_eq!(writer.len(), 2);

        let mut archive = open(writer.finish().unwrap());
        assert_eq!(archive.len(), 2);

        let mut notes = archive.by_name("notes.txt").unwrap();
        assert_eq!(notes.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        notes.read_to_string(&mut content).unwrap();
        assert_eq!(content, "plain text plain text plain text");
        drop(notes);

        let scan = archive.by_name("scan.pdf").unwrap();
        assert_eq!(scan.compression(), CompressionMethod::Stored);
        assert_eq!(scan.size(), 13);
    }

    #[test]
    fn test_empty_archive_gets_placeholder() {
        let writer = ArchiveWriter::new(6);
        assert!(writer.is_empty());

        let mut archive = open(writer.finish().unwrap());
        assert_eq!(archive.len(), 1);

        let mut readme = archive.by_index(0).unwrap();
        assert_eq!(readme.name(), PLACEHOLDER_ENTRY);
        let mut content = String::new();
        readme.read_to_string(&mut content).unwrap();
        assert!(content.contains("could be downloaded"));
    }

    #[test]
    fn test_unfinished_writer_can_be_dropped() {
        let mut writer = ArchiveWriter::new(1);
        writer.add_entry(entry("a.txt", b"a", false)).unwrap();
        drop(writer);
    }
}
