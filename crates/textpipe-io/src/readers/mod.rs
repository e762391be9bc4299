//! Readable CSV text (chunked stream, line iterator, write-then-read buffer).

pub mod csv;
