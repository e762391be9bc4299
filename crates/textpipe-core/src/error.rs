use thiserror::Error;

/// Canonical result for textpipe.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by producer callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation on closed stream")]
    Closed,

    #[error("producer failed: {0}")]
    Producer(#[source] BoxError),

    #[error("producer panicked: {0}")]
    ProducerPanic(String),

    #[error("cannot encode row {row}: {message}")]
    Encoding { row: usize, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(String),

    /// Error with context chain for better debugging
    #[error("Error in {context}: {source}")]
    Context {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap an arbitrary producer failure.
    pub fn producer(err: impl Into<BoxError>) -> Self {
        Error::Producer(err.into())
    }

    /// Add context to an error, creating an error chain.
    ///
    /// # Example
    /// ```rust,no_run
    /// use textpipe_core::error::Error;
    /// let err = Error::Config("buffer_size must be at least 1".into());
    /// let err = err.with_context("while building pipe");
    /// ```
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self) as BoxError,
        }
    }

    /// True when the error means the stream (or the other end of a pipe) is gone.
    pub fn is_closed(&self) -> bool {
        match self {
            Error::Closed => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::BrokenPipe,
            Error::Context { source, .. } => source
                .downcast_ref::<Error>()
                .map(Error::is_closed)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Get suggestions for common errors.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Closed => vec![
                "The stream was closed or its reader dropped; stop writing".into(),
                "Keep the reader alive until the producer has finished".into(),
            ],
            Error::Encoding { message, .. } => {
                if message.contains("missing field") {
                    vec![
                        "Supply every configured field name in each mapping row".into(),
                        "Disable strict mode to fill missing fields with rest_value".into(),
                    ]
                } else if message.contains("unexpected field") {
                    vec!["Set extra_fields to 'ignore' to drop unknown keys".into()]
                } else {
                    vec!["Check that the row matches the configured fieldnames".into()]
                }
            }
            Error::Config(msg) => {
                if msg.contains("buffer_size") {
                    vec!["buffer_size must be a positive number of chunks".into()]
                } else if msg.contains("fieldnames") {
                    vec!["Mapping rows need an explicit fieldnames ordering".into()]
                } else {
                    vec![]
                }
            }
            _ => vec![],
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io) => io,
            Error::Closed => std::io::Error::new(std::io::ErrorKind::BrokenPipe, Error::Closed),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}
