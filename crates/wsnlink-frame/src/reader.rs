use std::io::ErrorKind;
use std::time::Duration;

use tracing::{trace, warn};
use wsnlink_transport::WaitReadable;

use crate::codec::{decode_message, Message, MAX_WIRE_SIZE};
use crate::error::{FrameError, Result};

/// Default size of the reassembly buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Default time waited for input before counting an idle tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Reassembly loop configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Size of the reassembly buffer. Raised to [`MAX_WIRE_SIZE`] if smaller.
    pub buffer_capacity: usize,
    /// How long one wait for input lasts.
    pub poll_interval: Duration,
    /// Inactivity budget. `None` waits forever. Any received byte restores
    /// the full budget.
    pub timeout: Option<Duration>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Returned by handlers to keep the loop going or end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Why a reassembly loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A callback asked to stop and no bytes are left unconsumed.
    Completed,
    /// A callback asked to stop while more bytes were buffered. They are
    /// kept and delivered first by the next run.
    CompletedWithPending,
    /// No byte arrived for the whole inactivity budget.
    TimedOut,
    /// The peer closed the line.
    EndOfStream,
}

/// Reassembles messages from a byte stream read in arbitrary chunks.
///
/// Complete messages are passed to a handler in arrival order, borrowing
/// from the internal buffer. A partial message stays buffered until the
/// rest of it arrives, across reads and across runs.
pub struct MessageReader<T> {
    inner: T,
    buf: Box<[u8]>,
    filled: usize,
    config: ReaderConfig,
}

impl<T: WaitReadable> MessageReader<T> {
    /// Create a reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(inner: T, config: ReaderConfig) -> Self {
        let capacity = config.buffer_capacity.max(MAX_WIRE_SIZE);
        Self {
            inner,
            buf: vec![0u8; capacity].into_boxed_slice(),
            filled: 0,
            config,
        }
    }

    /// Run the loop until `handler` returns [`Flow::Stop`], the inactivity
    /// budget runs out or the peer closes the line.
    pub fn run<H>(&mut self, handler: H) -> Result<LoopExit>
    where
        H: FnMut(Message<'_>) -> Flow,
    {
        self.run_with_idle(handler, || Flow::Continue)
    }

    /// Like [`MessageReader::run`], also calling `on_idle` every time a poll
    /// interval passes without input.
    pub fn run_with_idle<H, I>(&mut self, mut handler: H, mut on_idle: I) -> Result<LoopExit>
    where
        H: FnMut(Message<'_>) -> Flow,
        I: FnMut() -> Flow,
    {
        let budget = self.idle_budget();
        let mut ticks_left = budget;

        loop {
            if let Some(exit) = self.dispatch(&mut handler) {
                return Ok(exit);
            }

            let ready = match self.inner.wait_readable(self.config.poll_interval) {
                Ok(ready) => ready,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if ready {
                match self.inner.read(&mut self.buf[self.filled..]) {
                    Ok(0) => return Ok(LoopExit::EndOfStream),
                    Ok(read) => {
                        self.filled += read;
                        if self.filled == self.buf.len() {
                            warn!(capacity = self.buf.len(), "input buffer full");
                        }
                        ticks_left = budget;
                        continue;
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    // Spurious readiness costs a tick like a silent poll.
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(FrameError::Io(err)),
                }
            }

            if on_idle() == Flow::Stop {
                return Ok(self.stopped());
            }
            if let Some(ticks) = ticks_left.as_mut() {
                *ticks -= 1;
                if *ticks == 0 {
                    trace!(pending = self.filled, "input timed out");
                    return Ok(LoopExit::TimedOut);
                }
            }
        }
    }

    /// Deliver every complete buffered message. Returns the exit status if
    /// the handler stopped the loop.
    fn dispatch<H>(&mut self, handler: &mut H) -> Option<LoopExit>
    where
        H: FnMut(Message<'_>) -> Flow,
    {
        let mut consumed = 0usize;
        let mut flow = Flow::Continue;

        while let Some((message, used)) = decode_message(&self.buf[consumed..self.filled]) {
            consumed += used;
            trace!(kind = message.kind.name(), len = message.payload.len(), "message");
            flow = handler(message);
            if flow == Flow::Stop {
                break;
            }
        }

        self.compact(consumed);
        match flow {
            Flow::Stop => Some(self.stopped()),
            Flow::Continue => None,
        }
    }

    /// Move the unconsumed tail to the start of the buffer.
    fn compact(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }
        let remaining = self.filled - consumed;
        if remaining > 0 {
            self.buf.copy_within(consumed..self.filled, 0);
        }
        self.filled = remaining;
    }

    fn stopped(&self) -> LoopExit {
        if self.filled == 0 {
            LoopExit::Completed
        } else {
            LoopExit::CompletedWithPending
        }
    }

    fn idle_budget(&self) -> Option<u64> {
        let timeout = self.config.timeout?;
        let interval = self.config.poll_interval.as_nanos().max(1);
        let ticks = timeout.as_nanos().div_ceil(interval).max(1);
        Some(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Bytes received but not yet delivered.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Drop any partially received message.
    pub fn clear_pending(&mut self) {
        self.filled = 0;
    }

    /// Change the inactivity budget for subsequent runs.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.timeout = timeout;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
