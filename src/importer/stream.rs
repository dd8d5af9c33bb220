//! Blocking producer: entry bytes → lines → records → batches.
//!
//! Runs on a `spawn_blocking` worker. Decompression and parsing are CPU and
//! read bound, so they stay off the async runtime and hand finished batches to
//! the persister through a bounded channel.

use crate::archive::LocatedArchive;
use crate::decompress::{self, Codec};
use crate::error::{DecodeError, ParseError};
use crate::parser;
use crate::persister::BatchAccumulator;
use crate::types::{ParseFailure, RegistryRecord, RunFailure};
use std::io::{self, BufRead, BufReader, Read};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Longest accepted line, terminator excluded; longer lines are skipped
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// Knobs the producer needs from the run
pub(crate) struct StreamParams {
    pub run_id: u64,
    pub batch_size: usize,
    pub max_failure_samples: usize,
    pub cancel: CancellationToken,
}

/// What the producer saw, handed back when it stops
#[derive(Debug, Default)]
pub(crate) struct StreamOutput {
    pub lines_read: u64,
    pub blank_lines: u64,
    pub parsed_ok: u64,
    pub parsed_failed: u64,
    pub parse_failures: Vec<ParseFailure>,
    /// Partial last batch, not yet sent
    pub remainder: Option<Vec<RegistryRecord>>,
    /// Read error after records started flowing
    pub interrupted: Option<DecodeError>,
    /// Stopped early because of cancellation or a closed channel
    pub stopped: bool,
}

/// Open, decode and parse the located entry
///
/// `ready` receives the selected codec once the decoder produced its first
/// bytes, or the failure that prevented it. Nothing is sent on `batches`
/// before `ready` resolves.
pub(crate) fn stream_entry(
    mut located: LocatedArchive,
    params: StreamParams,
    batches: mpsc::Sender<Vec<RegistryRecord>>,
    ready: oneshot::Sender<Result<Codec, RunFailure>>,
) -> StreamOutput {
    let entry = located.entry().name.clone();

    let file = match located.open() {
        Ok(file) => file,
        Err(e) => {
            let _ = ready.send(Err(RunFailure::Locate(e)));
            return StreamOutput::default();
        }
    };

    let decoder = match decompress::wrap(&entry, file) {
        Ok(decoder) => decoder,
        Err(e) => {
            let _ = ready.send(Err(RunFailure::Decode(e)));
            return StreamOutput::default();
        }
    };
    let codec = decoder.codec();
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, decoder);

    // Pull the first block so a broken stream header fails before any record flows
    if let Err(e) = reader.fill_buf() {
        let _ = ready.send(Err(RunFailure::Decode(decompress::corrupt(
            &entry, codec, e,
        ))));
        return StreamOutput::default();
    }

    if ready.send(Ok(codec)).is_err() {
        return StreamOutput {
            stopped: true,
            ..StreamOutput::default()
        };
    }

    let mut output = StreamOutput::default();
    let mut accumulator = BatchAccumulator::new(params.batch_size);
    let mut line_number = 0u64;
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        let read = match read_capped_line(&mut reader, &mut buf) {
            Ok(LineRead::Eof) => break,
            Ok(read) => read,
            Err(e) => {
                output.interrupted = Some(DecodeError::StreamInterrupted {
                    entry: entry.clone(),
                    line: line_number,
                    reason: e.to_string(),
                });
                break;
            }
        };
        line_number += 1;

        if read == LineRead::TooLong {
            output.lines_read += 1;
            output.parsed_failed += 1;
            let error = ParseError::LineTooLong {
                limit: MAX_LINE_BYTES,
            };
            debug!(run_id = params.run_id, line_number, %error, "skipping oversized line");
            if output.parse_failures.len() < params.max_failure_samples {
                output.parse_failures.push(ParseFailure { line_number, error });
            }
            continue;
        }

        let line = parser::decode_line(&buf);
        if parser::is_blank(&line) {
            output.blank_lines += 1;
            continue;
        }
        output.lines_read += 1;

        match parser::parse_line(&line) {
            Ok(record) => {
                output.parsed_ok += 1;
                if let Some(batch) = accumulator.push(record) {
                    if params.cancel.is_cancelled() || batches.blocking_send(batch).is_err() {
                        debug!(run_id = params.run_id, line_number, "producer stopping early");
                        output.stopped = true;
                        return output;
                    }
                }
            }
            Err(error) => {
                output.parsed_failed += 1;
                debug!(run_id = params.run_id, line_number, %error, "skipping malformed line");
                if output.parse_failures.len() < params.max_failure_samples {
                    output.parse_failures.push(ParseFailure { line_number, error });
                }
            }
        }
    }

    output.remainder = accumulator.finish();
    output
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    /// Over [`MAX_LINE_BYTES`]; the rest of the line was discarded
    TooLong,
}

/// Read one line into `buf`, never buffering more than `MAX_LINE_BYTES + 1` bytes
fn read_capped_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead> {
    let cap = MAX_LINE_BYTES as u64 + 1;
    let n = reader.by_ref().take(cap).read_until(b'\n', buf)?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }

    let content = match buf.last() {
        Some(b'\n') => buf.len() - 1,
        _ => buf.len(),
    };
    if content <= MAX_LINE_BYTES {
        return Ok(LineRead::Line);
    }

    skip_past_newline(reader)?;
    Ok(LineRead::TooLong)
}

/// Discard input up to and including the next `\n` (or to EOF)
fn skip_past_newline<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &[u8]) -> Vec<(LineRead, Vec<u8>)> {
        let mut reader = BufReader::with_capacity(1024, Cursor::new(input.to_vec()));
        let mut lines = Vec::new();
        loop {
            let mut buf = Vec::new();
            match read_capped_line(&mut reader, &mut buf).unwrap() {
                LineRead::Eof => return lines,
                read => lines.push((read, buf)),
            }
        }
    }

    #[test]
    fn oversized_line_is_skipped_and_reading_resumes() {
        let mut input = b"first\n".to_vec();
        input.extend(std::iter::repeat_n(b'x', MAX_LINE_BYTES * 3));
        input.extend_from_slice(b"\nlast\n");

        let lines = read_all(&input);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], (LineRead::Line, b"first\n".to_vec()));
        assert_eq!(lines[1].0, LineRead::TooLong);
        assert!(lines[1].1.len() <= MAX_LINE_BYTES + 1);
        assert_eq!(lines[2], (LineRead::Line, b"last\n".to_vec()));
    }

    #[test]
    fn line_at_the_limit_is_accepted() {
        let mut input = vec![b'y'; MAX_LINE_BYTES];
        input.push(b'\n');
        let lines = read_all(&input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LineRead::Line);

        let unterminated = vec![b'y'; MAX_LINE_BYTES];
        let lines = read_all(&unterminated);
        assert_eq!(lines[0].0, LineRead::Line);
    }

    #[test]
    fn unterminated_oversized_tail_stops_at_eof() {
        let input = vec![b'z'; MAX_LINE_BYTES + 10];
        let lines = read_all(&input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LineRead::TooLong);
    }
}
