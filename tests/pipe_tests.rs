//! Pipe behaviour: ordering, backpressure, lifecycle and failure delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use textpipe::{pipe_text, pipe_with, Error, PipeBuilder, PipeReader, PipeState};

/// Spin until `cond` holds or five seconds pass.
fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn chunks_pipe(chunks: Vec<String>, buffer_size: usize) -> PipeReader {
    PipeBuilder::new()
        .buffer_size(buffer_size)
        .build(move |w| {
            for c in chunks {
                w.write(c)?;
            }
            Ok(())
        })
        .unwrap()
}

#[test]
fn test_concatenation_for_every_buffer_size() {
    let chunks: Vec<String> = ["alpha", "β", "gamma\n", "δέλτα", "\r\n", "x", "yz"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let expected: String = chunks.concat();

    for buffer_size in 1..=chunks.len() + 1 {
        let mut reader = chunks_pipe(chunks.clone(), buffer_size);
        assert_eq!(reader.read_all().unwrap(), expected, "buffer_size {}", buffer_size);
        assert_eq!(reader.read_all().unwrap(), "");
    }
}

#[test]
fn test_small_reads_reassemble_stream() {
    let chunks: Vec<String> = (0..50).map(|i| format!("{}-é;", i)).collect();
    let expected: String = chunks.concat();

    let mut reader = chunks_pipe(chunks, 3);
    let mut got = String::new();
    loop {
        let piece = reader.read(7).unwrap();
        if piece.is_empty() {
            break;
        }
        got.push_str(&piece);
    }
    assert_eq!(got, expected);
}

#[test]
fn test_producer_starts_lazily() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let mut reader = pipe_text(move |w| {
        flag.store(true, Ordering::SeqCst);
        w.write("hello")?;
        Ok(())
    });

    thread::sleep(Duration::from_millis(20));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(reader.get_ref().state(), PipeState::Unstarted);

    assert_eq!(reader.read(2).unwrap(), "he");
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_dropping_unstarted_pipe_never_runs_producer() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let reader = pipe_text(move |_w| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    drop(reader);
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_single_slot_backpressure() {
    let (progress_tx, progress_rx) = mpsc::channel();
    let mut reader = PipeBuilder::new()
        .buffer_size(1)
        .build(move |w| {
            for chunk in ["A", "B", "C"] {
                w.write(chunk)?;
                let _ = progress_tx.send(chunk);
            }
            Ok(())
        })
        .unwrap();

    reader.get_mut().start().unwrap();
    assert_eq!(progress_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "A");
    assert!(wait_for(|| reader.get_ref().pending() == 1));

    // "B" cannot be enqueued until "A" is consumed.
    thread::sleep(Duration::from_millis(50));
    assert!(progress_rx.try_recv().is_err());

    assert_eq!(reader.read(1).unwrap(), "A");
    assert_eq!(progress_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "B");
    assert_eq!(reader.read_all().unwrap(), "BC");
    assert_eq!(reader.get_ref().peak_pending(), 1);
}

#[test]
fn test_pending_never_exceeds_buffer_size() {
    for buffer_size in [1, 2, 5] {
        let chunks: Vec<String> = (0..40).map(|i| format!("{}\n", i)).collect();
        let mut reader = chunks_pipe(chunks, buffer_size);
        reader.get_mut().start().unwrap();

        // Let the producer fill the queue before reading slowly.
        assert!(wait_for(|| reader.get_ref().pending() == buffer_size));
        let mut lines = 0;
        while !reader.read_line().unwrap().is_empty() {
            assert!(reader.get_ref().pending() <= buffer_size);
            lines += 1;
        }
        assert_eq!(lines, 40);
        assert_eq!(reader.get_ref().peak_pending(), buffer_size);
        assert_eq!(reader.get_ref().chunks_read(), 40);
    }
}

#[test]
fn test_state_transitions() {
    let mut reader = pipe_text(|w| {
        w.write("one\n")?;
        Ok(())
    });
    assert_eq!(reader.get_ref().state(), PipeState::Unstarted);

    reader.get_mut().start().unwrap();
    assert!(wait_for(|| reader.get_ref().state() == PipeState::Draining));

    assert_eq!(reader.read_all().unwrap(), "one\n");
    assert_eq!(reader.get_ref().state(), PipeState::Closed);
}

#[test]
fn test_close_twice_then_operations_fail() {
    let mut reader = pipe_text(|w| {
        w.write("data")?;
        Ok(())
    });
    assert_eq!(reader.read(1).unwrap(), "d");

    reader.close();
    reader.close();
    assert!(reader.is_closed());
    assert!(matches!(reader.read(1), Err(Error::Closed)));
    assert!(matches!(reader.read_line(), Err(Error::Closed)));
    assert!(matches!(reader.read_all(), Err(Error::Closed)));
}

#[test]
fn test_close_unblocks_waiting_producer() {
    let (done_tx, done_rx) = mpsc::channel();
    let mut reader = PipeBuilder::new()
        .buffer_size(1)
        .build(move |w| {
            let mut result = Ok(());
            for i in 0u64.. {
                if let Err(e) = w.write(format!("{}\n", i)) {
                    result = Err(e);
                    break;
                }
            }
            let first_closed = matches!(&result, Err(e) if e.is_closed());
            let late_closed = matches!(w.write("late\n"), Err(Error::Closed));
            let _ = done_tx.send(first_closed && late_closed);
            result.map_err(Into::into)
        })
        .unwrap();

    assert_eq!(reader.read_line().unwrap(), "0\n");
    reader.close();

    // The producer saw `Closed` on every write after close and exited;
    // close() joined it.
    assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert!(matches!(reader.read(1), Err(Error::Closed)));
}

#[test]
fn test_start_after_close_fails() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let mut reader = pipe_text(move |w| {
        flag.store(true, Ordering::SeqCst);
        w.write("never read")?;
        Ok(())
    });

    reader.close();
    assert!(matches!(reader.get_mut().start(), Err(Error::Closed)));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(reader.get_ref().state(), PipeState::Closed);
}

#[test]
fn test_writes_after_sink_close_fail() {
    let mut reader = pipe_text(|w| {
        w.write("x")?;
        w.close()?;
        assert!(w.is_closed());
        assert!(matches!(w.write("y"), Err(Error::Closed)));
        Ok(())
    });
    assert_eq!(reader.read_all().unwrap(), "x");
}

#[test]
fn test_empty_writes_are_ignored() {
    let mut reader = pipe_text(|w| {
        assert_eq!(w.write("")?, 0);
        assert_eq!(w.write("héllo")?, 5);
        assert_eq!(w.write(String::new())?, 0);
        assert_eq!(w.chunks_written(), 1);
        Ok(())
    });
    assert_eq!(reader.read_all().unwrap(), "héllo");
    assert_eq!(reader.get_ref().chunks_read(), 1);
}

#[test]
fn test_producer_error_after_data() {
    let mut reader = pipe_text(|w| {
        w.write("A")?;
        Err("upstream copy failed".into())
    });

    assert_eq!(reader.read_all().unwrap(), "A");
    match reader.read_all() {
        Err(Error::Producer(e)) => assert!(e.to_string().contains("upstream copy failed")),
        other => panic!("expected producer error, got {:?}", other),
    }
    assert!(matches!(reader.read_all(), Err(Error::Closed)));
}

#[test]
fn test_producer_error_without_data() {
    let mut reader = pipe_text(|_w| Err("no rows".into()));
    assert!(matches!(reader.read(10), Err(Error::Producer(_))));
    assert!(matches!(reader.read(10), Err(Error::Closed)));
}

#[test]
fn test_producer_panic_is_reported() {
    let mut reader = pipe_text(|w| {
        w.write("partial\n")?;
        panic!("producer exploded");
    });

    let mut lines = reader.lines();
    assert_eq!(lines.next().unwrap().unwrap(), "partial\n");
    match lines.next() {
        Some(Err(Error::ProducerPanic(msg))) => assert!(msg.contains("producer exploded")),
        other => panic!("expected panic report, got {:?}", other),
    }
    assert!(lines.next().is_none());
}

#[test]
fn test_zero_buffer_size_is_rejected() {
    let err = PipeBuilder::new()
        .buffer_size(0)
        .build(|_w| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("buffer_size")));
    assert!(!err.suggestions().is_empty());
}

#[test]
fn test_pipe_with_forwards_arguments() {
    let mut reader = pipe_with(
        |w, (prefix, count): (String, usize)| {
            for i in 0..count {
                w.write(format!("{}{}\n", prefix, i))?;
            }
            Ok(())
        },
        ("row-".to_string(), 3),
    );
    assert_eq!(reader.readlines().unwrap(), vec!["row-0\n", "row-1\n", "row-2\n"]);
}

#[test]
fn test_lines_across_chunk_boundaries() {
    let mut reader = pipe_text(|w| {
        w.write("a\nb")?;
        w.write("\nc")?;
        Ok(())
    });
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>().unwrap();
    assert_eq!(lines, vec!["a\n", "b\n", "c"]);
}

#[test]
fn test_formatting_and_byte_writes() {
    let mut reader = pipe_text(|w| {
        {
            use std::fmt::Write;
            write!(w, "{}-{}", 1, 2)?;
        }
        {
            use std::io::Write;
            // "é" split across two byte writes.
            w.write_all(&[b' ', 0xC3])?;
            w.write_all(&[0xA9, b'\n'])?;
        }
        Ok(())
    });
    assert_eq!(reader.read_all().unwrap(), "1-2 é\n");
}
