pub use textpipe_core::error::{Error, Result};

/// Map a `csv` crate error into ours. A broken pipe means the reader closed.
pub(crate) fn csv_error(e: csv::Error) -> Error {
    if !e.is_io_error() {
        return Error::Csv(e.to_string());
    }
    match e.into_kind() {
        csv::ErrorKind::Io(io) => io_error(io),
        other => Error::Csv(format!("{other:?}")),
    }
}

pub(crate) fn encoding(row: usize, message: impl Into<String>) -> Error {
    Error::Encoding {
        row,
        message: message.into(),
    }
}

/// Map an IO error from a pipe sink; a broken pipe means the reader closed.
pub(crate) fn io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        Error::Closed
    } else {
        Error::Io(e)
    }
}
