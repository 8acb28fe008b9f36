use crate::error::Result;
use crate::event::LogEvent;
use crate::message::LogMessage;

/// Destination for dispatched log records.
///
/// Sinks run only on the processor's consumer thread, one record at a time,
/// so implementations need no internal locking. `flush` is called once after
/// each drained batch rather than per record.
///
/// A sink must not keep references to the message past `log`: its overflow
/// buffer goes back to the pool as soon as every sink has seen it.
///
/// # Usage
///
/// ```
/// use nanolog::{LogEvent, LogMessage, Result, Sink};
///
/// struct CountingSink(usize);
///
/// impl Sink for CountingSink {
///     fn log(&mut self, _event: &LogEvent, _message: &LogMessage) -> Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
///
///     fn flush(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send {
    fn log(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn log(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()> {
        (**self).log(event, message)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
