#![forbid(unsafe_code)]
//! textpipe-core: shared kernel for textpipe.
//!
//! Pure types and the pull-style stream contract. There are **no threads**
//! here; the pipe that drives a producer concurrently lives in
//! `textpipe-exec`.
//!
//! - `stream`: the `ChunkSource` primitive and `ChunkedReader` built on it.
//! - `iter`: readable stream over an iterator of text fragments.
//! - `config`: `PipeConfig` (queue depth, thread naming).
//! - `error`: the error taxonomy shared by every crate.

pub mod config;
pub mod error;
pub mod iter;
pub mod prelude;
pub mod stream;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
