#![forbid(unsafe_code)]
//! textpipe: bounded producer/consumer text pipes.
//!
//! A producer closure runs on its own thread and writes text chunks into a
//! bounded queue; the consumer reads the same text back through a
//! file-like API (`read(n)`, `read_line`, `lines`, `std::io::Read`). Writes
//! block while the queue is full, so memory stays proportional to
//! `buffer_size` however much the producer emits.
//!
//! ```rust
//! use textpipe::{csv_pipe, CsvOptions, PipeConfig, Row};
//!
//! let rows = vec![Row::from(["a", "1"]), Row::from(["b", "2"])];
//! let mut reader = csv_pipe(rows, CsvOptions::default(), PipeConfig::default()).unwrap();
//! assert_eq!(reader.read_all().unwrap(), "a,1\r\nb,2\r\n");
//! ```

pub use textpipe_core::prelude::*;
pub use textpipe_core::{config, error, iter, stream};
pub use textpipe_exec::{join, pipe};
pub use textpipe_exec::{
    join_lines, pipe_text, pipe_with, JoinLines, Pipe, PipeBuilder, PipeReader, PipeState,
    PipeWriter, ProducerResult,
};
pub use textpipe_io::{
    csv_pipe, csv_reader, encode_csv, iter_csv, write_csv, CsvBuffer, CsvLines, CsvOptions,
    CsvSource, CsvTextReader, Dialect, ExtraFields, QuoteStyle, Row, RowEncoder, Terminator,
};
