pub use crate::config::PipeConfig;
pub use crate::error::{BoxError, Error, Result};
pub use crate::iter::{iter_reader, IntoChunk, IterReader, IterSource};
pub use crate::stream::{ChunkSource, ChunkedReader, Lines};
