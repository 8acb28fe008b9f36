//! Asynchronous dispatch of finished messages to sinks.
//!
//! Producers push `(event, message)` pairs into a bounded queue; one consumer
//! thread drains it in batches and hands every item to each registered
//! [`Sink`] in registration order. Sink I/O therefore never runs on a
//! logging thread, and sinks are single-writer by construction.
//!
//! # Lifecycle
//!
//! 1. [`LogProcessor::start`] spawns the `nanolog-processor` thread
//! 2. [`LogProcessor::enqueue`] pushes without blocking, unless the queue is full
//! 3. the consumer releases each overflow buffer once all sinks have run
//! 4. [`LogProcessor::stop`] closes the queue, drains it and joins the thread

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::error::{NanoLogError, Result};
use crate::event::LogEvent;
use crate::message::LogMessage;
use crate::pool::BufferPool;
use crate::sink::Sink;

/// Default number of queued items before producers start to block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

/// Name of the consumer thread.
pub const PROCESSOR_THREAD_NAME: &str = "nanolog-processor";

/// Callback receiving sink failures: `(sink name, error)`.
pub type SinkErrorHandler = Arc<dyn Fn(&str, &NanoLogError) + Send + Sync>;

/// One queued record.
#[derive(Debug)]
pub struct LogItem {
    pub event: LogEvent,
    pub message: LogMessage,
}

/// Bounded queue plus its consumer thread.
pub struct LogProcessor {
    sender: RwLock<Option<Sender<LogItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pool: Arc<BufferPool>,
}

impl LogProcessor {
    /// Spawns the consumer thread over `sinks`.
    pub fn start(
        sinks: Vec<Box<dyn Sink>>,
        capacity: usize,
        pool: Arc<BufferPool>,
        on_error: Option<SinkErrorHandler>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(NanoLogError::invalid_config("queue capacity must be non-zero"));
        }
        let (sender, receiver) = channel::bounded(capacity);
        let consumer = Consumer {
            receiver,
            sinks,
            pool: Arc::clone(&pool),
            on_error,
        };
        let worker = thread::Builder::new()
            .name(PROCESSOR_THREAD_NAME.to_string())
            .spawn(move || consumer.run())?;

        tracing::debug!(capacity, "log processor started");
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            pool,
        })
    }

    /// Queues a finished message.
    ///
    /// Blocks only while the queue is full. After [`stop`](Self::stop) the
    /// item is dropped and its overflow buffer goes straight back to the pool.
    pub fn enqueue(&self, event: LogEvent, message: LogMessage) {
        let item = LogItem { event, message };
        let rejected = {
            let guard = self.sender.read();
            match guard.as_ref() {
                None => Some(item),
                Some(sender) => match sender.try_send(item) {
                    Ok(()) => None,
                    // backpressure: wait for the consumer
                    Err(TrySendError::Full(item)) => sender.send(item).err().map(|e| e.0),
                    Err(TrySendError::Disconnected(item)) => Some(item),
                },
            }
        };
        if let Some(item) = rejected {
            item.message.release(&self.pool);
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Closes the queue, waits until every queued item reached the sinks and
    /// joins the consumer. Calling it again is a no-op.
    pub fn stop(&self) {
        // dropping the only sender lets the consumer drain and exit
        drop(self.sender.write().take());
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("log processor thread panicked");
            }
            tracing::debug!("log processor stopped");
        }
    }
}

impl Drop for LogProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for LogProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogProcessor")
            .field("running", &self.is_running())
            .finish()
    }
}

struct Consumer {
    receiver: Receiver<LogItem>,
    sinks: Vec<Box<dyn Sink>>,
    pool: Arc<BufferPool>,
    on_error: Option<SinkErrorHandler>,
}

impl Consumer {
    fn run(mut self) {
        // recv fails only once the queue is closed and empty
        while let Ok(first) = self.receiver.recv() {
            self.dispatch(first);
            loop {
                match self.receiver.try_recv() {
                    Ok(item) => self.dispatch(item),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            self.flush_all();
        }
        self.flush_all();
    }

    fn dispatch(&mut self, item: LogItem) {
        let LogItem { event, message } = item;
        for index in 0..self.sinks.len() {
            if let Err(err) = self.sinks[index].log(&event, &message) {
                self.report(index, &err);
            }
        }
        message.release(&self.pool);
    }

    fn flush_all(&mut self) {
        for index in 0..self.sinks.len() {
            if let Err(err) = self.sinks[index].flush() {
                self.report(index, &err);
            }
        }
    }

    fn report(&self, index: usize, err: &NanoLogError) {
        let name = self.sinks[index].name();
        match &self.on_error {
            Some(handler) => handler(name, err),
            None => tracing::warn!(sink = name, error = %err, "sink failed"),
        }
    }
}
