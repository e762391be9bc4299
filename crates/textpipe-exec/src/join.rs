//! Line-wise join of several readable streams.
//!
//! Reads one line from every input in turn, strips the line terminator,
//! joins the pieces with `sep` and appends `end`. Typical inputs are pipes
//! whose producers each stream a column-subset of the same rows (e.g. one
//! bulk-copy query per subset), which are then stitched back together
//! without buffering any of them.

use textpipe_core::error::Result;
use textpipe_core::stream::{ChunkSource, ChunkedReader};

pub const JOIN_SEP: &str = ",";
pub const JOIN_END: &str = "\n";

pub struct JoinLines<S: ChunkSource> {
    readers: Vec<ChunkedReader<S>>,
    sep: String,
    end: String,
    done: bool,
}

/// Join `readers` line by line with `,` and `\n`.
///
/// Stops as soon as any input runs out of lines.
pub fn join_lines<S, I>(readers: I) -> JoinLines<S>
where
    S: ChunkSource,
    I: IntoIterator<Item = ChunkedReader<S>>,
{
    JoinLines {
        readers: readers.into_iter().collect(),
        sep: JOIN_SEP.to_string(),
        end: JOIN_END.to_string(),
        done: false,
    }
}

impl<S: ChunkSource> JoinLines<S> {
    pub fn sep(mut self, sep: impl Into<String>) -> Self {
        self.sep = sep.into();
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = end.into();
        self
    }

    /// Close every input (stopping their producers).
    pub fn close(&mut self) {
        self.done = true;
        for r in &mut self.readers {
            r.close();
        }
    }
}

impl<S: ChunkSource> Iterator for JoinLines<S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.readers.is_empty() {
            return None;
        }

        let mut parts = Vec::with_capacity(self.readers.len());
        for r in &mut self.readers {
            match r.read_line() {
                Ok(line) if line.is_empty() => {
                    self.done = true;
                    return None;
                }
                Ok(line) => parts.push(line),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let mut joined = String::new();
        for (i, line) in parts.iter().enumerate() {
            if i > 0 {
                joined.push_str(&self.sep);
            }
            joined.push_str(line.trim_end_matches(|c| c == '\r' || c == '\n'));
        }
        joined.push_str(&self.end);
        Some(Ok(joined))
    }
}
