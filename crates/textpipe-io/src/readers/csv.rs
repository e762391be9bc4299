//! Readable CSV text from rows, encoded lazily.
//!
//! Input rows are pulled only as far as outstanding read demand requires:
//! a `CsvSource` chunk holds at most `chunk_rows` rows, `CsvLines` encodes
//! one row per item, and `CsvBuffer` holds exactly what has been written to
//! it and not yet read.

use textpipe_core::stream::{ChunkSource, ChunkedReader, Lines};

use crate::error::{Error, Result};
use crate::options::CsvOptions;
use crate::row::Row;
use crate::writers::csv::{into_text, RowEncoder};

/// Chunk source encoding up to `chunk_rows` rows per chunk.
pub struct CsvSource<I> {
    rows: I,
    encoder: RowEncoder,
    chunk_rows: usize,
    exhausted: bool,
    // Encoding failure hit after earlier rows of the same chunk were encoded.
    deferred: Option<Error>,
}

impl<I> CsvSource<I> {
    pub fn new(rows: I, opts: &CsvOptions) -> Result<Self> {
        Ok(Self {
            rows,
            encoder: RowEncoder::new(opts)?,
            chunk_rows: opts.chunk_rows,
            exhausted: false,
            deferred: None,
        })
    }

    pub fn rows_encoded(&self) -> usize {
        self.encoder.rows_encoded()
    }
}

impl<I, R> ChunkSource for CsvSource<I>
where
    I: Iterator<Item = R>,
    R: Into<Row>,
{
    fn next_chunk(&mut self) -> Result<Option<String>> {
        if let Some(err) = self.deferred.take() {
            self.exhausted = true;
            return Err(err);
        }
        if self.exhausted {
            return Ok(None);
        }

        let mut w = self.encoder.writer(Vec::new());
        let mut failure = None;
        for _ in 0..self.chunk_rows {
            match self.rows.next() {
                Some(row) => {
                    if let Err(e) = self.encoder.write_row(&mut w, &row.into()) {
                        failure = Some(e);
                        break;
                    }
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if self.exhausted && failure.is_none() {
            self.encoder.finish(&mut w)?;
        }

        let text = into_text(w)?;
        match failure {
            Some(e) if text.is_empty() => {
                self.exhausted = true;
                Err(e)
            }
            Some(e) => {
                self.deferred = Some(e);
                Ok(Some(text))
            }
            None if text.is_empty() => Ok(None),
            None => Ok(Some(text)),
        }
    }

    fn close(&mut self) {
        self.exhausted = true;
        self.deferred = None;
    }
}

pub type CsvTextReader<I> = ChunkedReader<CsvSource<I>>;

/// Lazily encoded CSV as a readable stream.
pub fn csv_reader<I, R>(rows: I, opts: &CsvOptions) -> Result<CsvTextReader<I::IntoIter>>
where
    I: IntoIterator<Item = R>,
    R: Into<Row>,
{
    Ok(ChunkedReader::new(CsvSource::new(rows.into_iter(), opts)?))
}

/// Iterator of encoded CSV lines, one per row (header first if enabled).
pub struct CsvLines<I> {
    rows: I,
    encoder: RowEncoder,
    done: bool,
}

impl<I, R> Iterator for CsvLines<I>
where
    I: Iterator<Item = R>,
    R: Into<Row>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.encoder.header_pending() {
            return Some(self.encoder.encode_header());
        }
        let Some(row) = self.rows.next() else {
            self.done = true;
            return None;
        };
        let line = self.encoder.encode_row(&row.into());
        if line.is_err() {
            self.done = true;
        }
        Some(line)
    }
}

pub fn iter_csv<I, R>(rows: I, opts: &CsvOptions) -> Result<CsvLines<I::IntoIter>>
where
    I: IntoIterator<Item = R>,
    R: Into<Row>,
{
    Ok(CsvLines {
        rows: rows.into_iter(),
        encoder: RowEncoder::new(opts)?,
        done: false,
    })
}

/// Encoded text written to a `CsvBuffer` and not yet read.
struct Written {
    encoder: RowEncoder,
    text: String,
}

impl ChunkSource for Written {
    fn next_chunk(&mut self) -> Result<Option<String>> {
        if self.text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(std::mem::take(&mut self.text)))
        }
    }

    fn close(&mut self) {
        self.text = String::new();
    }
}

/// Write rows in, read CSV text out.
///
/// Reading drains what has been written so far; an empty read does not end
/// the buffer, later writes become readable.
pub struct CsvBuffer {
    reader: ChunkedReader<Written>,
}

impl CsvBuffer {
    pub fn new(opts: &CsvOptions) -> Result<Self> {
        Ok(Self {
            reader: ChunkedReader::new(Written {
                encoder: RowEncoder::new(opts)?,
                text: String::new(),
            }),
        })
    }

    pub fn write_row(&mut self, row: impl Into<Row>) -> Result<()> {
        let written = self.writable()?;
        let line = written.encoder.encode_row(&row.into())?;
        written.text.push_str(&line);
        Ok(())
    }

    /// Write every row, stopping at the first that fails to encode.
    pub fn write_rows<I, R>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: Into<Row>,
    {
        rows.into_iter().try_for_each(|row| self.write_row(row))
    }

    pub fn write_header(&mut self) -> Result<()> {
        let written = self.writable()?;
        let line = written.encoder.encode_header()?;
        written.text.push_str(&line);
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.reader.get_ref().encoder.rows_encoded()
    }

    pub fn read(&mut self, n: usize) -> Result<String> {
        self.reader.read(n)
    }

    pub fn read_all(&mut self) -> Result<String> {
        self.reader.read_all()
    }

    pub fn read_line(&mut self) -> Result<String> {
        self.reader.read_line()
    }

    pub fn lines(&mut self) -> Lines<'_, impl ChunkSource> {
        self.reader.lines()
    }

    pub fn close(&mut self) {
        self.reader.close();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_closed()
    }

    fn writable(&mut self) -> Result<&mut Written> {
        if self.reader.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.reader.get_mut())
    }
}
