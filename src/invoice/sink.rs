use std::io;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// One destination for a generated document stream.
#[async_trait]
pub trait ByteSink: Send {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;
    async fn finish(&mut self) -> io::Result<()>;
}

/// Durable storage sink with a bounded per-write timeout so a hung
/// filesystem cannot stall the whole stream.
pub struct FileSink {
    file: File,
    write_timeout: Duration,
}

impl FileSink {
    pub fn new(file: File, write_timeout: Duration) -> Self {
        Self {
            file,
            write_timeout,
        }
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        timeout(self.write_timeout, self.file.write_all(&chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "storage sink write timed out"))?
    }

    async fn finish(&mut self) -> io::Result<()> {
        timeout(self.write_timeout, self.file.flush())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "storage sink flush timed out"))?
    }
}

/// Live response sink. A dropped receiver (client disconnect) surfaces as
/// a broken pipe on this sink only.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ByteSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response stream closed"))
    }

    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Slot {
    sink: Box<dyn ByteSink>,
    error: Option<io::Error>,
}

/// Fan-out writer: one generation pass feeding independent sinks. The
/// first error per sink is recorded and that sink is skipped from then
/// on; generation aborts only when no live sink remains.
#[derive(Default)]
pub struct FanoutWriter {
    slots: Vec<Slot>,
}

impl FanoutWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn ByteSink>) {
        self.slots.push(Slot { sink, error: None });
    }

    pub async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        let mut live = 0usize;
        for slot in &mut self.slots {
            if slot.error.is_some() {
                continue;
            }
            match slot.sink.write(chunk.clone()).await {
                Ok(()) => live += 1,
                Err(err) => slot.error = Some(err),
            }
        }
        if live == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "all invoice sinks failed",
            ));
        }
        Ok(())
    }

    /// Flush surviving sinks and drain the per-sink failures for logging.
    pub async fn finish(&mut self) -> Vec<io::Error> {
        for slot in &mut self.slots {
            if slot.error.is_none()
                && let Err(err) = slot.sink.finish().await
            {
                slot.error = Some(err);
            }
        }
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.error.take())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    pub(crate) struct BufferSink {
        pub(crate) buffer: SharedBuffer,
    }

    #[async_trait]
    impl ByteSink for BufferSink {
        async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
            self.buffer.0.lock().unwrap().extend_from_slice(&chunk);
            Ok(())
        }

        async fn finish(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) struct FailingSink {
        pub(crate) fail_after: usize,
        pub(crate) writes: usize,
    }

    #[async_trait]
    impl ByteSink for FailingSink {
        async fn write(&mut self, _chunk: Bytes) -> io::Result<()> {
            if self.writes >= self.fail_after {
                return Err(io::Error::other("sink broke"));
            }
            self.writes += 1;
            Ok(())
        }

        async fn finish(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{BufferSink, FailingSink, SharedBuffer};
    use super::*;

    #[tokio::test]
    async fn one_failing_sink_does_not_corrupt_the_other() {
        let buffer = SharedBuffer::default();
        let mut out = FanoutWriter::new();
        out.push(Box::new(BufferSink {
            buffer: buffer.clone(),
        }));
        out.push(Box::new(FailingSink {
            fail_after: 1,
            writes: 0,
        }));

        out.write(Bytes::from_static(b"one ")).await.unwrap();
        out.write(Bytes::from_static(b"two ")).await.unwrap();
        out.write(Bytes::from_static(b"three")).await.unwrap();

        let failures = out.finish().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(buffer.contents(), b"one two three");
    }

    #[tokio::test]
    async fn write_errors_once_every_sink_is_gone() {
        let mut out = FanoutWriter::new();
        out.push(Box::new(FailingSink {
            fail_after: 0,
            writes: 0,
        }));

        let err = out.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[tokio::test]
    async fn channel_sink_reports_a_dropped_receiver() {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let err = sink.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
