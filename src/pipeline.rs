//! Mem-to-mem processing.
//!
//! A mem-to-mem device consumes buffers on its output queue and produces results on its
//! capture queue. Every source buffer is submitted together with the destination buffer that
//! receives its result, and completions are expected back in the same pairing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace};

use crate::device::{Driver, Interest, Readiness};
use crate::error::{Error, Result};
use crate::io::{Dequeued, Pool};

/// Completions of one processing round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    /// Drained source buffer
    pub output: Dequeued,
    /// Filled destination buffer
    pub capture: Dequeued,
}

/// An output pool and a capture pool on the same device, processed in pairs
pub struct MemToMem<D: Driver> {
    output: Pool<D>,
    capture: Pool<D>,
    /// Queued (output, capture) index pairs, oldest first
    pending: VecDeque<(u32, u32)>,
    /// Capture completion of the oldest pair whose output side is still outstanding
    partial: Option<Dequeued>,
}

impl<D: Driver> MemToMem<D> {
    /// Combines two pools of the same device
    ///
    /// `output` must be an output-class pool and `capture` a capture-class one.
    pub fn new(output: Pool<D>, capture: Pool<D>) -> Result<Self> {
        if !output.buffer_type().is_output() {
            return Err(Error::violation(format!(
                "{} is not an output queue",
                output.buffer_type()
            )));
        }
        if !capture.buffer_type().is_capture() {
            return Err(Error::violation(format!(
                "{} is not a capture queue",
                capture.buffer_type()
            )));
        }
        if !Arc::ptr_eq(&output.driver, &capture.driver) {
            return Err(Error::violation("pools belong to different devices"));
        }

        Ok(MemToMem {
            output,
            capture,
            pending: VecDeque::new(),
            partial: None,
        })
    }

    pub fn output(&self) -> &Pool<D> {
        &self.output
    }

    /// Source pool, fill its buffers with [`Pool::data_mut`] before queueing them
    pub fn output_mut(&mut self) -> &mut Pool<D> {
        &mut self.output
    }

    pub fn capture(&self) -> &Pool<D> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut Pool<D> {
        &mut self.capture
    }

    /// Number of pairs queued and not yet dequeued
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Submits source buffer `src` together with destination buffer `dst`
    ///
    /// `bytes_used` is the payload of each source plane, `None` submits full planes.
    pub fn queue_pair(&mut self, src: u32, dst: u32, bytes_used: Option<&[u32]>) -> Result<()> {
        self.capture.enqueue(dst)?;
        self.output.enqueue_with(src, bytes_used)?;
        self.pending.push_back((src, dst));
        trace!("queued pair ({}, {})", src, dst);
        Ok(())
    }

    /// Starts both queues, at least one pair must be queued
    pub fn start(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Err(Error::violation("no buffer pair queued before streaming"));
        }
        self.output.stream_on()?;
        if let Err(e) = self.capture.stream_on() {
            self.output.stream_off()?;
            return Err(e);
        }
        debug!("mem-to-mem: streaming with {} pairs queued", self.pending.len());
        Ok(())
    }

    /// Stops both queues, all outstanding pairs are returned to the application
    pub fn stop(&mut self) -> Result<()> {
        let capture = self.capture.stream_off();
        let output = self.output.stream_off();
        self.pending.clear();
        self.partial = None;
        capture.and(output)
    }

    /// Waits until both queues have a completed buffer
    ///
    /// Uses the timeout and the waker installed on the capture pool, the timeout bounds the
    /// whole wait. A triggered waker is returned as [`Readiness::Woken`].
    pub fn wait(&self) -> Result<Readiness> {
        let deadline = self.capture.timeout.map(|t| Instant::now() + t);
        let (mut readable, mut writable) = (false, false);
        while !(readable && writable) {
            // only wait for the side that is still missing
            let interest = Interest {
                read: !readable,
                write: !writable,
            };
            let timeout = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match self
                .capture
                .driver
                .wait(interest, timeout, self.capture.waker.as_deref())?
            {
                Readiness::Ready {
                    readable: r,
                    writable: w,
                } => {
                    readable |= r;
                    writable |= w;
                }
                Readiness::Woken => return Ok(Readiness::Woken),
                Readiness::TimedOut => return Err(Error::Timeout),
            }
        }
        Ok(Readiness::Ready { readable, writable })
    }

    /// Dequeues the completions of the oldest pair, capture side first
    ///
    /// Fails with [`Error::ProtocolViolation`] if the driver completes buffers out of pairing
    /// order. A retryable error on the output side keeps the capture completion, the next call
    /// resumes with the output queue.
    pub fn dequeue_pair(&mut self) -> Result<Completed> {
        let (src, dst) = match self.pending.front() {
            Some(pair) => *pair,
            None => return Err(Error::violation("no buffer pair is outstanding")),
        };

        let capture = match self.partial.take() {
            Some(done) => done,
            None => {
                let done = self.capture.dequeue()?;
                if done.index != dst {
                    return Err(Error::violation(format!(
                        "capture completed buffer {}, expected {} of pair ({}, {})",
                        done.index, dst, src, dst
                    )));
                }
                done
            }
        };

        let output = match self.output.dequeue() {
            Ok(done) => done,
            Err(e) => {
                if e.is_retryable() {
                    self.partial = Some(capture);
                }
                return Err(e);
            }
        };
        if output.index != src {
            return Err(Error::violation(format!(
                "output completed buffer {}, expected {} of pair ({}, {})",
                output.index, src, src, dst
            )));
        }

        self.pending.pop_front();
        trace!("completed pair ({}, {})", src, dst);
        Ok(Completed { output, capture })
    }

    /// Splits the pipeline back into its output and capture pools
    pub fn into_pools(self) -> (Pool<D>, Pool<D>) {
        (self.output, self.capture)
    }
}
