mod frame;
pub use frame::{
    CodecError, Command, CommandId, ResponseLine, FAILED_PREFIX, HANDSHAKE_RESPONSE, OK,
};

use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

pub type ComResult<T> = Result<T, CommunicationError>;

/// Upper bound for a single response line. Anything beyond it is read up to the terminator
/// and discarded, so the cut-off line is left to the decoder to reject.
pub const MAXIMUM_LINE_LENGTH: usize = 256;

pub trait CommunicationHandle: Read + Write {
    fn set_timeout(&mut self, timeout: &Duration) -> ComResult<()>;

    /// Writes the frame with a single write call. A transport that accepts fewer bytes than
    /// the frame holds leaves the device with a truncated command, so this is not retried.
    fn send_frame(&mut self, frame: &[u8]) -> ComResult<()> {
        let written = self.write(frame)?;
        if written != frame.len() {
            log::error!("Wrote {written} of {} bytes", frame.len());
            return Err(CommunicationError::ShortWrite { expected: frame.len(), written });
        }
        self.flush()?;

        Ok(())
    }

    /// Reads until `\n` or the read timeout and keeps at most [`MAXIMUM_LINE_LENGTH`] bytes.
    /// The line terminator is stripped. A timeout is not an error here: whatever arrived so
    /// far (possibly nothing) is returned and judged by the caller like any other response.
    fn receive_line(&mut self) -> ComResult<String> {
        let mut line = Vec::new();
        let mut discarded = 0usize;
        let mut byte = [0u8; 1];

        loop {
            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) if line.len() < MAXIMUM_LINE_LENGTH => line.push(byte[0]),
                Ok(_) => discarded += 1,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    log::warn!("Read timed out after {} bytes", line.len());
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if discarded > 0 {
            log::warn!("Discarded {discarded} bytes of an overlong line");
        }
        while line.last() == Some(&b'\r') {
            line.pop();
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Called once when a session ends. Pending output is pushed out.
    fn release(&mut self) -> ComResult<()> {
        self.flush()?;
        Ok(())
    }
}

impl CommunicationHandle for Box<dyn serialport::SerialPort> {
    fn set_timeout(&mut self, timeout: &Duration) -> ComResult<()> {
        serialport::SerialPort::set_timeout(self.as_mut(), *timeout)?;
        Ok(())
    }

    fn release(&mut self) -> ComResult<()> {
        self.flush()?;
        self.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

/// Opens the serial device the timer board is attached to
pub fn open_serial(
    port: &str,
    baudrate: u32,
    timeout: Duration,
) -> ComResult<Box<dyn serialport::SerialPort>> {
    log::info!("Opening {port} at {baudrate} baud");
    let serial = serialport::new(port, baudrate).timeout(timeout).open()?;
    Ok(serial)
}

#[derive(Debug)]
pub enum CommunicationError {
    /// The transport accepted fewer bytes than the frame length
    ShortWrite { expected: usize, written: usize },
    /// Signals that the underlying sending or receiving failed. Not recoverable on its own.
    Io(std::io::Error),
    /// The serial port could not be opened or configured
    Port(serialport::Error),
}

impl std::fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<std::io::Error> for CommunicationError {
    fn from(value: std::io::Error) -> Self {
        CommunicationError::Io(value)
    }
}

impl From<serialport::Error> for CommunicationError {
    fn from(value: serialport::Error) -> Self {
        CommunicationError::Port(value)
    }
}

impl std::error::Error for CommunicationError {}
