//! Archive assertions for integration tests

use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::{CompressionMethod, ZipArchive};

/// One entry read back from a finished archive
#[derive(Debug)]
pub struct ReadEntry {
    pub method: CompressionMethod,
    pub content: Vec<u8>,
}

/// Open an archive and read every entry, keyed by name
///
/// Panics if the bytes are not a valid zip archive.
pub fn read_archive(archive: &Bytes) -> BTreeMap<String, ReadEntry> {
    let mut zip = ZipArchive::new(Cursor::new(archive.clone())).expect("archive should open");
    let mut entries = BTreeMap::new();

    for index in 0..zip.len() {
        let mut file = zip.by_index(index).expect("entry should be readable");
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .expect("entry content should decompress");
        entries.insert(
            file.name().to_string(),
            ReadEntry {
                method: file.compression(),
                content,
            },
        );
    }

    entries
}

/// Assert the archive holds exactly these names (any order)
pub fn assert_entry_names(entries: &BTreeMap<String, ReadEntry>, expected: &[&str]) {
    let mut expected: Vec<&str> = expected.to_vec();
    expected.sort_unstable();
    let actual: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(actual, expected, "unexpected archive entries");
}
