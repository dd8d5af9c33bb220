//! Secondary codec selection for the registry entry
//!
//! The published archive has shipped the registry both as plain text and as an
//! `.xz`-compressed entry. The codec is chosen from the entry name suffix and
//! the stream is checked for the codec's magic bytes before a decoder is built,
//! so a misnamed or truncated entry fails before any record is produced.

use crate::error::DecodeError;
use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use std::io::{self, Chain, Cursor, Read};
use xz2::read::XzDecoder;

/// Secondary compression applied to the entry inside the container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    /// Plain text
    None,
    /// `.xz` (LZMA2)
    Xz,
    /// `.gz`
    Gzip,
    /// `.bz2`
    Bzip2,
}

impl Codec {
    /// Pick a codec from the entry name suffix (case-insensitive)
    pub fn from_entry_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".xz") {
            Codec::Xz
        } else if lower.ends_with(".gz") {
            Codec::Gzip
        } else if lower.ends_with(".bz2") {
            Codec::Bzip2
        } else {
            Codec::None
        }
    }

    /// Leading bytes every stream in this encoding starts with
    pub fn magic(self) -> &'static [u8] {
        match self {
            Codec::None => &[],
            Codec::Xz => &[0xFD, b'7', b'z', b'X', b'Z', 0x00],
            Codec::Gzip => &[0x1F, 0x8B],
            Codec::Bzip2 => b"BZh",
        }
    }

    /// Short codec name for logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Xz => "xz",
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The already-consumed magic bytes chained back in front of the rest of the entry
pub type Prefixed<R> = Chain<Cursor<Vec<u8>>, R>;

/// Entry stream with the selected codec applied
pub enum EntryReader<R: Read> {
    /// No secondary codec
    Plain(R),
    /// xz decoder
    Xz(XzDecoder<Prefixed<R>>),
    /// gzip decoder (multi-member)
    Gzip(MultiGzDecoder<Prefixed<R>>),
    /// bzip2 decoder
    Bzip2(BzDecoder<Prefixed<R>>),
}

impl<R: Read> EntryReader<R> {
    /// Codec this reader decodes
    pub fn codec(&self) -> Codec {
        match self {
            EntryReader::Plain(_) => Codec::None,
            EntryReader::Xz(_) => Codec::Xz,
            EntryReader::Gzip(_) => Codec::Gzip,
            EntryReader::Bzip2(_) => Codec::Bzip2,
        }
    }
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryReader::Plain(r) => r.read(buf),
            EntryReader::Xz(r) => r.read(buf),
            EntryReader::Gzip(r) => r.read(buf),
            EntryReader::Bzip2(r) => r.read(buf),
        }
    }
}

/// Wrap `reader` with the decoder the entry name calls for
///
/// Decoding is lazy: nothing beyond the magic bytes is read here.
pub fn wrap<R: Read>(entry_name: &str, mut reader: R) -> Result<EntryReader<R>, DecodeError> {
    let codec = Codec::from_entry_name(entry_name);
    if codec == Codec::None {
        return Ok(EntryReader::Plain(reader));
    }

    let magic = codec.magic();
    let mut prefix = vec![0u8; magic.len()];
    let filled = read_prefix(&mut reader, &mut prefix).map_err(|e| corrupt(entry_name, codec, e))?;

    if filled < magic.len() {
        return Err(corrupt(
            entry_name,
            codec,
            format!("stream ended after {filled} bytes, before the {codec} header"),
        ));
    }
    if prefix != magic {
        return Err(corrupt(
            entry_name,
            codec,
            format!("missing {codec} header (found {prefix:02x?})"),
        ));
    }

    tracing::debug!(entry = entry_name, %codec, "secondary codec selected");

    let prefixed = Cursor::new(prefix).chain(reader);
    Ok(match codec {
        Codec::Xz => EntryReader::Xz(XzDecoder::new(prefixed)),
        Codec::Gzip => EntryReader::Gzip(MultiGzDecoder::new(prefixed)),
        Codec::Bzip2 => EntryReader::Bzip2(BzDecoder::new(prefixed)),
        Codec::None => EntryReader::Plain(prefixed.into_inner().1),
    })
}

/// Build the error reported when a decoder cannot start on an entry
pub(crate) fn corrupt(entry: &str, codec: Codec, reason: impl ToString) -> DecodeError {
    DecodeError::UnsupportedOrCorrupt {
        entry: entry.to_string(),
        codec: codec.as_str().to_string(),
        reason: reason.to_string(),
    }
}

/// Fill `buf` as far as the stream allows, returning the byte count
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
