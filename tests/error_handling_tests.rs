//! Error handling and context tests

use std::io;

use textpipe::{Error, PipeConfig};

#[test]
fn test_error_with_context() {
    let base_error = Error::Config("buffer_size must be at least 1 (got 0)".to_string());
    let contextual_error = base_error.with_context("while building export pipe");

    match &contextual_error {
        Error::Context { context, .. } => {
            assert_eq!(context, "while building export pipe");
        }
        _ => panic!("Expected Context variant"),
    }
    assert!(contextual_error.to_string().contains("buffer_size"));
}

#[test]
fn test_closed_detection_through_context() {
    assert!(Error::Closed.is_closed());
    assert!(Error::Closed.with_context("writing rows").is_closed());
    assert!(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_closed());
    assert!(!Error::Csv("bad".into()).is_closed());
}

#[test]
fn test_encoding_error_suggestions() {
    let missing = Error::Encoding {
        row: 4,
        message: "missing field 'zip'".to_string(),
    };
    assert_eq!(missing.to_string(), "cannot encode row 4: missing field 'zip'");
    assert!(missing.suggestions().iter().any(|s| s.contains("strict")));

    let extra = Error::Encoding {
        row: 0,
        message: "unexpected field 'x'".to_string(),
    };
    assert!(extra.suggestions().iter().any(|s| s.contains("extra_fields")));
}

#[test]
fn test_config_error_suggestions() {
    let err = PipeConfig::with_buffer_size(0).validate().unwrap_err();
    let suggestions = err.suggestions();
    assert!(!suggestions.is_empty());
    assert!(suggestions.iter().any(|s| s.contains("buffer_size")));
}

#[test]
fn test_into_io_error() {
    let closed: io::Error = Error::Closed.into();
    assert_eq!(closed.kind(), io::ErrorKind::BrokenPipe);

    let inner = io::Error::new(io::ErrorKind::NotFound, "rows.jsonl");
    let passthrough: io::Error = Error::Io(inner).into();
    assert_eq!(passthrough.kind(), io::ErrorKind::NotFound);

    let other: io::Error = Error::ProducerPanic("boom".into()).into();
    assert_eq!(other.kind(), io::ErrorKind::Other);
}

#[test]
fn test_producer_wraps_any_error() {
    let err = Error::producer("connection reset");
    assert!(matches!(err, Error::Producer(_)));
    assert_eq!(err.to_string(), "producer failed: connection reset");
}
