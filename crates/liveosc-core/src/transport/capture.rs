//! Capture-all buffer for diagnostic raw queries.

use rosc::OscType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A captured inbound message.
pub type Captured = (String, Vec<OscType>);

#[derive(Debug, Default)]
pub struct CaptureBuffer {
    enabled: AtomicBool,
    messages: Mutex<Vec<Captured>>,
    /// Held for the whole of a raw query so captures never interleave
    serial: Mutex<()>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Called by the receive loop for every inbound message.
    pub fn record(&self, path: &str, args: &[OscType]) {
        if self.is_enabled() {
            self.messages().push((path.to_string(), args.to_vec()));
        }
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start capturing. Blocks while another capture is running.
    pub fn begin(&self) -> CaptureGuard<'_> {
        let serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        self.messages().clear();
        self.enabled.store(true, Ordering::Release);
        CaptureGuard {
            buffer: self,
            _serial: serial,
        }
    }

    fn messages(&self) -> MutexGuard<'_, Vec<Captured>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Active capture. Dropping it disables capture and clears the buffer,
/// whether the raw query returned normally, early or by unwinding.
pub struct CaptureGuard<'a> {
    buffer: &'a CaptureBuffer,
    _serial: MutexGuard<'a, ()>,
}

impl CaptureGuard<'_> {
    /// Everything captured so far, leaving the buffer empty.
    pub fn take(&self) -> Vec<Captured> {
        std::mem::take(&mut *self.buffer.messages())
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.buffer.enabled.store(false, Ordering::Release);
        self.buffer.messages().clear();
    }
}
