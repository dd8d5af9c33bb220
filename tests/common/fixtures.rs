//! Registry archive fixtures built in memory

use std::io::{Cursor, Write};

/// Entry path the default configuration selects
pub const DEFAULT_ENTRY: &str = "TMP/DGII_RNC.TXT";

/// A ten-field registry line
pub fn registry_line(rnc: &str, name: &str, date: &str, status: &str) -> String {
    format!("{rnc}|{name}|{name} SRL|SERVICIOS DIVERSOS|||||{date}|{status}")
}

/// Eleven fields: the trailing column is the payment regime
pub fn registry_line_with_regime(rnc: &str, name: &str, regime: &str) -> String {
    format!("{}|{regime}", registry_line(rnc, name, "15/08/1999", "ACTIVO"))
}

/// `count` valid lines with sequential keys starting at `first`
pub fn registry_lines(first: u64, count: u64) -> Vec<String> {
    (first..first + count)
        .map(|rnc| {
            registry_line(
                &rnc.to_string(),
                &format!("EMPRESA {rnc}"),
                "01/01/2010",
                "ACTIVO",
            )
        })
        .collect()
}

/// Join lines with `\n`, the way the registry file is published
pub fn registry_text(lines: &[String]) -> Vec<u8> {
    lines.join("\n").into_bytes()
}

/// In-memory ZIP holding `entries` in order
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// xz-compress `data`
pub fn xz_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// gzip-compress `data`
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
