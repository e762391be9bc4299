#![forbid(unsafe_code)]
//! textpipe-io: CSV adapters on either side of a pipe.
//!
//! - `writers`: `RowEncoder`, eager `encode_csv`, and `write_csv`/`csv_pipe`
//!   for the producer side of a pipe.
//! - `readers`: lazily encoded CSV as a readable stream (`csv_reader`), as
//!   lines (`iter_csv`), or as a write-then-read `CsvBuffer`.
//! - `options`: `CsvOptions` writer policy and dialect presets.

pub mod error;
pub mod options;
pub mod readers;
pub mod row;
pub mod writers;

pub use options::{CsvOptions, Dialect, ExtraFields, QuoteStyle, Terminator};
pub use readers::csv::{csv_reader, iter_csv, CsvBuffer, CsvLines, CsvSource, CsvTextReader};
pub use row::Row;
pub use writers::csv::{csv_pipe, encode_csv, write_csv, RowEncoder};
