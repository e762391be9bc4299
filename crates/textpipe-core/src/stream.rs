//! Chunked readable streams.
//!
//! Implementers provide one primitive, [`ChunkSource::next_chunk`]. Everything
//! a consumer calls (`read`, `read_all`, `read_line`, line iteration, and
//! `std::io::Read`) lives once in [`ChunkedReader`], which owns the read cursor
//! into the current chunk.
//!
//! Invariants:
//! - `pos` is always a char boundary of `buf`.
//! - Text is handed out in source order; leftovers of a chunk are served
//!   before the next chunk is pulled.
//! - A chunk is pulled only when the buffered text cannot satisfy the call.

use std::fmt;
use std::io;

use crate::error::{Error, Result};

/// The one primitive a readable stream needs.
pub trait ChunkSource {
    /// Next chunk of text, or `Ok(None)` once the source is exhausted.
    ///
    /// Empty chunks are allowed and skipped by the reader.
    fn next_chunk(&mut self) -> Result<Option<String>>;

    /// Release whatever the source holds (threads, queues). Must be idempotent.
    fn close(&mut self) {}
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> Result<Option<String>> {
        (**self).next_chunk()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Pull-style text reader over any [`ChunkSource`].
///
/// Sources release their resources on drop, so dropping the reader is as
/// good as calling [`ChunkedReader::close`].
pub struct ChunkedReader<S: ChunkSource> {
    source: S,
    buf: String,
    pos: usize,
    // Failure raised by the source while a call had already gathered text;
    // surfaced by the next call.
    pending: Option<Error>,
    // Trailing bytes of a character that a byte-level read could only
    // partly hand out. Drained before anything else is read.
    spill: Vec<u8>,
    closed: bool,
}

impl<S: ChunkSource> ChunkedReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: String::new(),
            pos: 0,
            pending: None,
            spill: Vec::new(),
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Unwrap the source. Any buffered but unread text is discarded.
    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Text already pulled from the source but not yet read.
    pub fn buffered(&self) -> &str {
        &self.buf[self.pos..]
    }

    /// Close the reader and release the source. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending = None;
        self.spill.clear();
        self.buf = String::new();
        self.pos = 0;
        self.source.close();
    }

    /// Read up to `n` characters.
    ///
    /// Returns fewer only when the stream is exhausted; `""` means end of
    /// stream. `read(0)` never pulls from the source.
    pub fn read(&mut self, n: usize) -> Result<String> {
        self.ensure_text()?;

        let mut out = String::new();
        let mut want = n;
        while want > 0 {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return self.defer(out, e),
            }
            let rest = &self.buf[self.pos..];
            let (len, count) = split_chars(rest, want);
            out.push_str(&rest[..len]);
            self.pos += len;
            want -= count;
        }
        Ok(out)
    }

    /// Read everything that remains.
    pub fn read_all(&mut self) -> Result<String> {
        self.ensure_text()?;

        let mut out = String::new();
        loop {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return self.defer(out, e),
            }
            if out.is_empty() && self.pos == 0 {
                out = std::mem::take(&mut self.buf);
            } else {
                out.push_str(&self.buf[self.pos..]);
                self.buf.clear();
            }
            self.pos = 0;
        }
        Ok(out)
    }

    /// Read through the next `\n` (inclusive).
    ///
    /// Returns the tail without a terminator if the stream ends first, and
    /// `""` at end of stream.
    pub fn read_line(&mut self) -> Result<String> {
        self.ensure_text()?;

        let mut out = String::new();
        loop {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return self.defer(out, e),
            }
            let rest = &self.buf[self.pos..];
            if let Some(i) = rest.find('\n') {
                out.push_str(&rest[..=i]);
                self.pos += i + 1;
                break;
            }
            out.push_str(rest);
            self.pos = self.buf.len();
        }
        Ok(out)
    }

    /// Lazy line iterator sharing this reader's cursor.
    pub fn lines(&mut self) -> Lines<'_, S> {
        Lines {
            reader: self,
            done: false,
        }
    }

    /// Collect all remaining lines.
    pub fn readlines(&mut self) -> Result<Vec<String>> {
        self.lines().collect()
    }

    fn ensure_open(&mut self) -> Result<()> {
        if let Some(err) = self.pending.take() {
            self.fail();
            return Err(err);
        }
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Text-level reads cannot start inside a character.
    fn ensure_text(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.spill.is_empty() {
            Ok(())
        } else {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "stream is positioned inside a character; finish it with byte reads",
            )))
        }
    }

    /// Make sure unread text is buffered. `Ok(false)` at end of stream.
    fn fill(&mut self) -> Result<bool> {
        while self.pos >= self.buf.len() {
            match self.source.next_chunk()? {
                Some(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                None => {
                    self.buf.clear();
                    self.pos = 0;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn defer(&mut self, out: String, err: Error) -> Result<String> {
        if out.is_empty() {
            self.fail();
            Err(err)
        } else {
            self.pending = Some(err);
            Ok(out)
        }
    }

    fn fail(&mut self) {
        self.close();
    }
}

impl<S: ChunkSource> fmt::Debug for ChunkedReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedReader")
            .field("buffered", &(self.buf.len() - self.pos))
            .field("pending_error", &self.pending.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<S: ChunkSource> io::Read for ChunkedReader<S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.ensure_open()?;
        if !self.spill.is_empty() {
            let n = self.spill.len().min(out.len());
            out[..n].copy_from_slice(&self.spill[..n]);
            self.spill.drain(..n);
            return Ok(n);
        }
        match self.fill() {
            Ok(true) => {}
            Ok(false) => return Ok(0),
            Err(e) => {
                self.fail();
                return Err(e.into());
            }
        }

        let rest = &self.buf[self.pos..];
        let mut n = rest.len().min(out.len());
        while !rest.is_char_boundary(n) {
            n -= 1;
        }
        if n == 0 {
            // Next character is wider than `out`: hand out its leading bytes.
            let width = rest.chars().next().map_or(0, char::len_utf8);
            let bytes = &rest.as_bytes()[..width];
            let k = out.len();
            out.copy_from_slice(&bytes[..k]);
            self.spill.extend_from_slice(&bytes[k..]);
            self.pos += width;
            return Ok(k);
        }
        out[..n].copy_from_slice(&rest.as_bytes()[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Iterator over the lines of a [`ChunkedReader`].
///
/// Each item keeps its `\n`. Fused after the end of stream or an error.
pub struct Lines<'a, S: ChunkSource> {
    reader: &'a mut ChunkedReader<S>,
    done: bool,
}

impl<S: ChunkSource> Iterator for Lines<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_line() {
            Ok(line) if line.is_empty() => {
                self.done = true;
                None
            }
            Ok(line) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: ChunkSource> std::iter::FusedIterator for Lines<'_, S> {}

/// Byte length and char count of the first `n` chars of `s` (or all of it).
fn split_chars(s: &str, n: usize) -> (usize, usize) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => (idx, n),
        None => (s.len(), s.chars().count()),
    }
}
