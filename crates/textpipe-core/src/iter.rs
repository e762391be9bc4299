//! Readable stream over any iterator of text fragments.
//!
//! Fragments are pulled synchronously, one per chunk request, on the
//! caller's thread.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::stream::{ChunkSource, ChunkedReader};

/// Something an iterator may yield as a chunk.
pub trait IntoChunk {
    fn into_chunk(self) -> Result<String>;
}

impl IntoChunk for String {
    fn into_chunk(self) -> Result<String> {
        Ok(self)
    }
}

impl IntoChunk for &str {
    fn into_chunk(self) -> Result<String> {
        Ok(self.to_owned())
    }
}

impl IntoChunk for Box<str> {
    fn into_chunk(self) -> Result<String> {
        Ok(self.into_string())
    }
}

impl IntoChunk for Cow<'_, str> {
    fn into_chunk(self) -> Result<String> {
        Ok(self.into_owned())
    }
}

impl<T, E> IntoChunk for std::result::Result<T, E>
where
    T: IntoChunk,
    E: Into<Error>,
{
    fn into_chunk(self) -> Result<String> {
        self.map_err(Into::into)?.into_chunk()
    }
}

pub struct IterSource<I> {
    iter: I,
    exhausted: bool,
}

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self {
            iter,
            exhausted: false,
        }
    }
}

impl<I> ChunkSource for IterSource<I>
where
    I: Iterator,
    I::Item: IntoChunk,
{
    fn next_chunk(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.iter.next() {
            Some(item) => item.into_chunk().map(Some),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.exhausted = true;
    }
}

pub type IterReader<I> = ChunkedReader<IterSource<I>>;

/// Wrap an iterable of text fragments as a readable stream.
///
/// ```rust
/// use textpipe_core::iter::iter_reader;
///
/// let mut r = iter_reader(["a\n", "b\n", "c"]);
/// assert_eq!(r.read(3).unwrap(), "a\nb");
/// assert_eq!(r.read_all().unwrap(), "\nc");
/// ```
pub fn iter_reader<I>(iterable: I) -> IterReader<I::IntoIter>
where
    I: IntoIterator,
    I::Item: IntoChunk,
{
    ChunkedReader::new(IterSource::new(iterable.into_iter()))
}
