//! Blocking adapter over `std::io::Write`

use std::io::{self, Write};

use crate::{CriticalStyleStream, StreamStats, StyleSource};

/// `io::Write` that rewrites HTML into an inner writer.
///
/// Output the inner writer has not accepted yet is kept and retried before
/// any new input is fed, so a `write` that returns an error consumed
/// nothing and can be retried with the same buffer.
pub struct CriticalStyleWriter<W: Write, S: StyleSource> {
    inner: W,
    stream: CriticalStyleStream<S>,
    /// Rewritten bytes not yet accepted by `inner`
    pending: Vec<u8>,
}

impl<W: Write, S: StyleSource> CriticalStyleWriter<W, S> {
    pub fn new(inner: W, stream: CriticalStyleStream<S>) -> Self {
        Self {
            inner,
            stream,
            pending: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Flush the final region and hand back the inner writer
    pub fn finish(mut self) -> io::Result<(W, StreamStats)> {
        self.drain_pending()?;
        let stats = self.stream.finish(&mut self.pending);
        drain_into(&mut self.inner, &mut self.pending)?;
        self.inner.flush()?;
        Ok((self.inner, stats))
    }

    fn drain_pending(&mut self) -> io::Result<()> {
        drain_into(&mut self.inner, &mut self.pending)
    }
}

fn drain_into<W: Write>(inner: &mut W, pending: &mut Vec<u8>) -> io::Result<()> {
    let mut written = 0;
    let result = loop {
        if written == pending.len() {
            break Ok(());
        }
        match inner.write(&pending[written..]) {
            Ok(0) => {
                break Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write rewritten output",
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };
    pending.drain(..written);
    result
}

impl<W: Write, S: StyleSource> Write for CriticalStyleWriter<W, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.drain_pending()?;
        self.stream.push(buf, &mut self.pending);

        // `buf` is consumed either way; a failed drain is retried on the
        // next call and reported there
        if let Err(e) = self.drain_pending() {
            tracing::debug!("Deferring {} rewritten bytes: {}", self.pending.len(), e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_pending()?;
        self.inner.flush()
    }
}
