use std::cmp::min;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::catalog::FileIO;
use crate::{Error, ErrorKind, Result};

/// Size of one ranged read.
pub(crate) const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;

struct LineReader {
    io: FileIO,
    path: String,
    chunk_size: u64,
    length: Option<u64>,
    offset: u64,
    buf: BytesMut,
    /// Leading bytes of `buf` known to hold no newline.
    scanned: usize,
}

impl LineReader {
    async fn next_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(pos) = self.find_newline() {
                let line = self.buf.split_to(pos + 1).freeze().slice(..pos);
                if is_blank(&line) {
                    continue;
                }
                return Ok(Some(line));
            }

            let length = match self.length {
                Some(length) => length,
                None => {
                    let length = self
                        .io
                        .file_length(&self.path)
                        .await
                        .map_err(|e| self.io_failure(e))?;
                    self.length = Some(length);
                    length
                }
            };

            if self.offset >= length {
                let rest = self.buf.split().freeze();
                return Ok((!is_blank(&rest)).then_some(rest));
            }

            let end = min(self.offset + self.chunk_size, length);
            let chunk = self
                .io
                .read_range(&self.path, self.offset..end)
                .await
                .map_err(|e| self.io_failure(e))?;
            if chunk.is_empty() {
                return Err(self.io_failure(Error::new(
                    ErrorKind::Unexpected,
                    format!("unexpected end of file at offset {}", self.offset),
                )));
            }
            self.offset += chunk.len() as u64;
            self.buf.extend_from_slice(&chunk);
        }
    }

    /// Position of the first newline in `buf`, only bytes appended since
    /// the last call are searched.
    fn find_newline(&mut self) -> Option<usize> {
        match self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let pos = self.scanned + pos;
                self.scanned = 0;
                Some(pos)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    fn io_failure(&self, e: Error) -> Error {
        Error::new(
            ErrorKind::PlanningIoFailure,
            format!("Failed to read {}", self.path),
        )
        .set_source(e)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Stream the non blank lines of the file at `path`.
///
/// The file is read with ranged reads of `chunk_size` bytes, at most one
/// chunk and one partial line are buffered. No handle is kept between two
/// reads, dropping the stream releases everything.
pub(crate) fn read_lines(
    io: FileIO,
    path: impl Into<String>,
    chunk_size: u64,
) -> BoxStream<'static, Result<Bytes>> {
    let reader = LineReader {
        io,
        path: path.into(),
        chunk_size: chunk_size.max(1),
        length: None,
        offset: 0,
        buf: BytesMut::new(),
        scanned: 0,
    };

    futures::stream::try_unfold(reader, |mut reader| async move {
        Ok(reader.next_line().await?.map(|line| (line, reader)))
    })
    .boxed()
}
