#![forbid(unsafe_code)]
//! textpipe-exec: the concurrent half of textpipe.
//!
//! - `pipe`: bounded handoff pipe running a producer thread behind a
//!   `ChunkedReader`.
//! - `join`: line-wise join of several readers (usually several pipes).

pub mod join;
pub mod pipe;

pub use join::{join_lines, JoinLines};
pub use pipe::{
    pipe_text, pipe_with, Pipe, PipeBuilder, PipeReader, PipeState, PipeWriter, ProducerResult,
};
