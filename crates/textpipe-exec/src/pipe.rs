//! Bounded handoff pipe: drive write-style producers from read-style demand.
//!
//! A producer closure runs on its own thread and writes text into a
//! [`PipeWriter`]. Every write becomes one chunk on a bounded
//! `crossbeam_channel`; a full channel blocks the writer until the reader
//! takes a chunk. The read side is a plain [`ChunkSource`], so the consumer
//! gets the whole `ChunkedReader` API ([`PipeReader`]).
//!
//! Lifecycle:
//! - The producer thread is spawned lazily on the first read (or `start`),
//!   at most once.
//! - When the producer returns, its sender is dropped. The reader drains the
//!   queued chunks, sees the disconnect, joins the thread and reports the
//!   producer's outcome (error or panic) in place of end-of-stream.
//! - Closing the reader drops the receiver. A writer blocked on the full
//!   channel wakes immediately with `Error::Closed`; the thread is joined
//!   before `close` returns.

use std::any::Any;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use textpipe_core::config::PipeConfig;
use textpipe_core::error::{BoxError, Error, Result};
use textpipe_core::stream::{ChunkSource, ChunkedReader};

/// What a producer closure returns.
pub type ProducerResult = std::result::Result<(), BoxError>;

type Producer = Box<dyn FnOnce(&mut PipeWriter) -> ProducerResult + Send + 'static>;

/// Readable end of a pipe.
pub type PipeReader = ChunkedReader<Pipe>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Producer not spawned yet.
    Unstarted,
    Running,
    /// Producer finished; queued chunks remain.
    Draining,
    /// Exhausted, failed, or closed by the consumer.
    Closed,
}

/// State shared between the reader and the producer thread.
#[derive(Debug, Default)]
struct Shared {
    finished: AtomicBool,
    peak_pending: AtomicUsize,
}

/// The sink handed to a producer.
///
/// Each non-empty `write` is one chunk. Also implements `std::fmt::Write`
/// and `std::io::Write`, so `write!` and byte writers such as `csv::Writer`
/// can target it directly.
pub struct PipeWriter {
    tx: Option<Sender<String>>,
    shared: Arc<Shared>,
    // Incomplete UTF-8 tail left by the last `io::Write::write`.
    partial: Vec<u8>,
    chunks: usize,
}

impl PipeWriter {
    fn new(tx: Sender<String>, shared: Arc<Shared>) -> Self {
        Self {
            tx: Some(tx),
            shared,
            partial: Vec::new(),
            chunks: 0,
        }
    }

    /// Enqueue `text` as one chunk, blocking while the queue is full.
    ///
    /// Returns the number of characters written. Empty text is a no-op.
    /// Fails with `Error::Closed` once the reader is gone or the sink was
    /// closed.
    pub fn write(&mut self, text: impl Into<String>) -> Result<usize> {
        let text = text.into();
        if text.is_empty() {
            return Ok(0);
        }
        let count = text.chars().count();
        self.send(text)?;
        Ok(count)
    }

    /// Signal that the producer is done. Later writes fail with `Error::Closed`.
    ///
    /// Errors if the last byte write ended inside a UTF-8 sequence.
    pub fn close(&mut self) -> Result<()> {
        self.tx = None;
        self.shared.finished.store(true, Ordering::Release);
        if self.partial.is_empty() {
            Ok(())
        } else {
            let n = self.partial.len();
            self.partial.clear();
            Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream ended inside a UTF-8 sequence ({n} dangling bytes)"),
            )))
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Chunks successfully enqueued so far.
    pub fn chunks_written(&self) -> usize {
        self.chunks
    }

    fn send(&mut self, text: String) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(Error::Closed);
        };
        if tx.send(text).is_err() {
            // Receiver dropped: the consumer closed the pipe.
            self.tx = None;
            return Err(Error::Closed);
        }
        self.chunks += 1;
        self.shared.peak_pending.fetch_max(tx.len(), Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.finished.store(true, Ordering::Release);
    }
}

impl fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeWriter")
            .field("closed", &self.is_closed())
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl fmt::Write for PipeWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        PipeWriter::write(self, s).map(|_| ()).map_err(|_| fmt::Error)
    }
}

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.extend_from_slice(buf);

        let valid = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            // Incomplete sequence at the end: keep it for the next write.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };
        self.partial = bytes.split_off(valid);
        let text =
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if !text.is_empty() {
            self.send(text)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Chunk source backed by a producer thread.
pub struct Pipe {
    producer: Option<Producer>,
    config: PipeConfig,
    state: PipeState,
    rx: Option<Receiver<String>>,
    handle: Option<JoinHandle<ProducerResult>>,
    shared: Arc<Shared>,
    chunks_read: usize,
    // Set by `close`; exhaustion alone leaves it unset.
    consumer_closed: bool,
}

impl Pipe {
    pub fn new<F>(producer: F, config: PipeConfig) -> Result<Self>
    where
        F: FnOnce(&mut PipeWriter) -> ProducerResult + Send + 'static,
    {
        config.validate()?;
        Ok(Self::from_parts(Box::new(producer), config))
    }

    fn from_parts(producer: Producer, config: PipeConfig) -> Self {
        Self {
            producer: Some(producer),
            config,
            state: PipeState::Unstarted,
            rx: None,
            handle: None,
            shared: Arc::new(Shared::default()),
            chunks_read: 0,
            consumer_closed: false,
        }
    }

    pub fn state(&self) -> PipeState {
        match self.state {
            PipeState::Running if self.shared.finished.load(Ordering::Acquire) => {
                PipeState::Draining
            }
            s => s,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    /// Chunks currently queued between producer and reader.
    pub fn pending(&self) -> usize {
        self.rx.as_ref().map_or(0, |rx| rx.len())
    }

    /// Most chunks ever observed queued at once. Never exceeds `buffer_size`.
    pub fn peak_pending(&self) -> usize {
        self.shared.peak_pending.load(Ordering::Relaxed)
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Spawn the producer thread if it has not run yet.
    ///
    /// A no-op once started or exhausted; never restarts a producer.
    /// Fails with `Error::Closed` after [`ChunkSource::close`].
    pub fn start(&mut self) -> Result<()> {
        if self.consumer_closed {
            return Err(Error::Closed);
        }
        if self.state != PipeState::Unstarted {
            return Ok(());
        }
        let Some(producer) = self.producer.take() else {
            return Err(Error::Closed);
        };

        let (tx, rx) = bounded(self.config.buffer_size);
        let writer = PipeWriter::new(tx, Arc::clone(&self.shared));
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_producer(producer, writer))
            .map_err(|e| Error::Io(e).with_context("spawning pipe producer"))?;

        self.rx = Some(rx);
        self.handle = Some(handle);
        self.state = PipeState::Running;

        #[cfg(feature = "tracing")]
        tracing::debug!(buffer_size = self.config.buffer_size, thread = %self.config.thread_name, "pipe producer started");
        Ok(())
    }

    /// Join the producer thread and turn its outcome into ours.
    fn finish(&mut self) -> Result<()> {
        self.state = PipeState::Closed;
        self.rx = None;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let outcome = match handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Producer(e)),
            Err(payload) => Err(Error::ProducerPanic(panic_message(payload.as_ref()))),
        };

        #[cfg(feature = "tracing")]
        match &outcome {
            Ok(()) => tracing::debug!(chunks = self.chunks_read, "pipe drained"),
            Err(e) => tracing::debug!(chunks = self.chunks_read, error = %e, "pipe producer failed"),
        }
        outcome
    }
}

fn run_producer(producer: Producer, mut writer: PipeWriter) -> ProducerResult {
    let outcome = producer(&mut writer);
    let closed = writer.close();
    drop(writer);
    outcome?;
    closed.map_err(Into::into)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl ChunkSource for Pipe {
    fn next_chunk(&mut self) -> Result<Option<String>> {
        if self.state == PipeState::Unstarted {
            self.start()?;
        }
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(chunk) => {
                self.chunks_read += 1;
                Ok(Some(chunk))
            }
            // All senders gone and the queue is empty.
            Err(_) => self.finish().map(|()| None),
        }
    }

    fn close(&mut self) {
        self.consumer_closed = true;
        if self.state == PipeState::Closed && self.handle.is_none() {
            return;
        }
        self.producer = None;
        // Dropping the receiver wakes a writer blocked on a full queue.
        self.rx = None;
        self.state = PipeState::Closed;
        if let Some(handle) = self.handle.take() {
            let _outcome = handle.join();

            #[cfg(feature = "tracing")]
            match &_outcome {
                Ok(Ok(())) => tracing::debug!("pipe closed after producer finished"),
                Ok(Err(e)) => tracing::debug!(error = %e, "pipe closed; producer stopped"),
                Err(_) => tracing::debug!("pipe closed; producer panicked"),
            }
        }
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        ChunkSource::close(self);
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("state", &self.state())
            .field("buffer_size", &self.config.buffer_size)
            .field("pending", &self.pending())
            .field("chunks_read", &self.chunks_read)
            .finish()
    }
}

/// Configures and builds pipes.
#[derive(Debug, Clone, Default)]
pub struct PipeBuilder {
    config: PipeConfig,
}

impl PipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: PipeConfig) -> Self {
        Self { config }
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn build<F>(self, producer: F) -> Result<PipeReader>
    where
        F: FnOnce(&mut PipeWriter) -> ProducerResult + Send + 'static,
    {
        Ok(ChunkedReader::new(Pipe::new(producer, self.config)?))
    }

    /// Like [`PipeBuilder::build`], forwarding `args` to the producer.
    pub fn build_with<F, A>(self, producer: F, args: A) -> Result<PipeReader>
    where
        F: FnOnce(&mut PipeWriter, A) -> ProducerResult + Send + 'static,
        A: Send + 'static,
    {
        self.build(move |w| producer(w, args))
    }
}

/// Pipe with the default configuration (`buffer_size` 10).
///
/// ```rust
/// use textpipe_exec::pipe::pipe_text;
///
/// let mut pipe = pipe_text(|w| {
///     w.write("Hi there.\r\n")?;
///     w.write("Cool, right?\r\n")?;
///     Ok(())
/// });
/// assert_eq!(pipe.read(5).unwrap(), "Hi th");
/// assert_eq!(pipe.read_line().unwrap(), "ere.\r\n");
/// assert_eq!(pipe.read_all().unwrap(), "Cool, right?\r\n");
/// ```
pub fn pipe_text<F>(producer: F) -> PipeReader
where
    F: FnOnce(&mut PipeWriter) -> ProducerResult + Send + 'static,
{
    ChunkedReader::new(Pipe::from_parts(
        Box::new(producer),
        PipeConfig::default(),
    ))
}

/// Pipe whose producer receives `args` as its second parameter.
pub fn pipe_with<F, A>(producer: F, args: A) -> PipeReader
where
    F: FnOnce(&mut PipeWriter, A) -> ProducerResult + Send + 'static,
    A: Send + 'static,
{
    pipe_text(move |w| producer(w, args))
}
