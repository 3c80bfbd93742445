use std::{
    collections::VecDeque,
    io::{ErrorKind, Read, Write},
    sync::{Arc, Mutex},
    time::Duration,
};

use super::TimerDevice;
use crate::communication::{ComResult, CommunicationHandle};

/// The device outlives individual sessions, just like the real board stays powered between
/// port open and close.
pub type SharedDevice = Arc<Mutex<TimerDevice>>;

/// An in-process transport attached to a [`TimerDevice`]. Every write is handed to the device
/// as one frame and its response line is queued for reading. Reading an empty queue behaves
/// like a serial read timeout.
pub struct SimulatedPort {
    device: SharedDevice,
    rx_buffer: VecDeque<u8>,
    response_delay: Duration,
}

impl SimulatedPort {
    pub fn new(device: SharedDevice) -> Self {
        SimulatedPort { device, rx_buffer: VecDeque::new(), response_delay: Duration::ZERO }
    }

    /// Delays every response, e.g. to provoke latency violations
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }
}

impl Read for SimulatedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.rx_buffer.is_empty() {
            return Err(ErrorKind::TimedOut.into());
        }

        let n = buf.len().min(self.rx_buffer.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let response = self
            .device
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "simulated device poisoned"))?
            .handle_frame(buf);

        if !self.response_delay.is_zero() {
            std::thread::sleep(self.response_delay);
        }

        self.rx_buffer.extend(response.bytes());
        self.rx_buffer.extend(b"\r\n");
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CommunicationHandle for SimulatedPort {
    fn set_timeout(&mut self, _timeout: &Duration) -> ComResult<()> {
        Ok(())
    }

    fn release(&mut self) -> ComResult<()> {
        self.rx_buffer.clear();
        Ok(())
    }
}
