//! Shared fixtures for unit tests: in-memory archives and compressed payloads.

use crate::db::Database;
use bytes::Bytes;
use std::io::{Cursor, Write};
use tempfile::TempDir;

/// Build an in-memory ZIP holding `entries` in the given order
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }

    Bytes::from(writer.finish().unwrap().into_inner())
}

/// xz-compress `data`
pub(crate) fn xz_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// gzip-compress `data`
pub(crate) fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// bzip2-compress `data`
pub(crate) fn bzip2_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A ten-field registry line with the given key, name, date and status
pub(crate) fn registry_line(rnc: &str, name: &str, date: &str, status: &str) -> String {
    format!("{rnc}|{name}|{name} SRL|COMERCIO|||||{date}|{status}")
}

/// Fresh SQLite store in a temp dir; keep the `TempDir` alive for the test
pub(crate) async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::new(&temp_dir.path().join("registry.db"))
        .await
        .unwrap();
    (db, temp_dir)
}
