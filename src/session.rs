use std::time::{Duration, Instant};

use crate::communication::{
    CodecError, Command, CommandId, CommunicationHandle, ResponseLine, HANDSHAKE_RESPONSE, OK,
};
use crate::device::{AnalogueSamples, Elapsed, Enables, Status, Thresholds};
use crate::oracle::VerificationError;

type SessionResult<T> = Result<T, VerificationError>;

/// Outcome of an analogue read. A device-local failure is a valid answer, not a transport
/// problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalogueReading {
    Samples(AnalogueSamples),
    Failed(String),
}

/// Sends `h` until the device answers `Hello`, at most `max_attempts` times
pub fn handshake(com: &mut impl CommunicationHandle, max_attempts: u32) -> SessionResult<()> {
    let mut last = String::new();
    for attempt in 1..=max_attempts {
        com.send_frame(&Command::Handshake.encode())?;
        last = com.receive_line()?;
        if last == HANDSHAKE_RESPONSE {
            log::debug!("Handshake succeeded after {attempt} attempt(s)");
            return Ok(());
        }
        log::warn!("Handshake attempt {attempt}/{max_attempts} answered with {last:?}");
    }

    Err(VerificationError::HandshakeFailed { attempts: max_attempts, last })
}

/// A greeted device. Owns the transport exclusively; it is released when the session is
/// dropped, no matter how the session ends.
pub struct DeviceSession<C: CommunicationHandle> {
    com: C,
}

impl<C: CommunicationHandle> DeviceSession<C> {
    pub fn establish(mut com: C, timeout: Duration, max_attempts: u32) -> SessionResult<Self> {
        // Release happens in Drop, so take ownership before any setup step can fail
        let mut session = DeviceSession { com };
        session.com.set_timeout(&timeout)?;
        handshake(&mut session.com, max_attempts)?;
        Ok(session)
    }

    /// One write-then-read exchange
    pub fn round_trip(&mut self, command: &Command) -> SessionResult<String> {
        let frame = command.encode();
        log::debug!("cmd = {}", String::from_utf8_lossy(&frame));
        self.com.send_frame(&frame)?;
        let response = self.com.receive_line()?;
        log::debug!("response = {response}");
        Ok(response)
    }

    /// Like [`Self::round_trip`], additionally measuring the time from before the write to
    /// after the read
    pub fn timed_round_trip(&mut self, command: &Command) -> SessionResult<(String, Duration)> {
        let start = Instant::now();
        let response = self.round_trip(command)?;
        Ok((response, start.elapsed()))
    }

    pub fn expect_exact(&mut self, command: &Command, expected: &str) -> SessionResult<()> {
        let response = self.round_trip(command)?;
        check_exact(command.id(), expected, response)
    }

    /// Expects `<tag>ok`
    pub fn expect_ok(&mut self, command: &Command) -> SessionResult<()> {
        self.expect_exact(command, &format!("{}{OK}", command.id().tag()))
    }

    pub fn reset(&mut self) -> SessionResult<()> {
        self.expect_ok(&Command::Reset)
    }

    pub fn clear(&mut self) -> SessionResult<()> {
        self.expect_ok(&Command::Clear)
    }

    pub fn set_enables(&mut self, enables: Enables) -> SessionResult<()> {
        self.expect_ok(&Command::SetEnables(enables))
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) -> SessionResult<()> {
        self.expect_ok(&Command::SetThresholds(thresholds))
    }

    pub fn start(&mut self) -> SessionResult<()> {
        self.expect_ok(&Command::Start)
    }

    pub fn stop(&mut self) -> SessionResult<()> {
        self.expect_ok(&Command::Stop)
    }

    pub fn enables(&mut self) -> SessionResult<Enables> {
        self.query(&Command::GetEnables)
    }

    pub fn thresholds(&mut self) -> SessionResult<Thresholds> {
        self.query(&Command::GetThresholds)
    }

    pub fn elapsed(&mut self) -> SessionResult<Elapsed> {
        self.query(&Command::GetElapsed)
    }

    pub fn status(&mut self) -> SessionResult<Status> {
        self.query(&Command::GetStatus)
    }

    /// The free-form identification, without its tag
    pub fn info(&mut self) -> SessionResult<String> {
        let line = self.round_trip(&Command::GetInfo)?;
        let body = tagged_body(CommandId::GetInfo, &line)?;
        Ok(body.to_string())
    }

    pub fn analogue(&mut self) -> SessionResult<AnalogueReading> {
        let command = CommandId::ReadAnalogue;
        let line = self.round_trip(&Command::ReadAnalogue)?;
        let decoded =
            ResponseLine::decode(&line).map_err(|reason| malformed(command, &line, reason))?;
        check_tag(command, &decoded, &line)?;

        if let Some(reason) = decoded.failure() {
            log::warn!("Analogue read failed on device: {reason}");
            return Ok(AnalogueReading::Failed(reason.to_string()));
        }

        let samples = decoded.body.parse().map_err(|reason| malformed(command, &line, reason))?;
        Ok(AnalogueReading::Samples(samples))
    }

    /// Sends a query and parses the body following the expected tag
    fn query<T>(&mut self, command: &Command) -> SessionResult<T>
    where
        T: std::str::FromStr<Err = CodecError>,
    {
        let line = self.round_trip(command)?;
        let body = tagged_body(command.id(), &line)?;
        body.parse().map_err(|reason| malformed(command.id(), &line, reason))
    }
}

impl<C: CommunicationHandle> Drop for DeviceSession<C> {
    fn drop(&mut self) {
        if let Err(e) = self.com.release() {
            log::warn!("Failed to release transport: {e}");
        }
    }
}

pub(crate) fn check_exact(command: CommandId, expected: &str, actual: String) -> SessionResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(VerificationError::Mismatch { command, expected: expected.to_string(), actual })
    }
}

fn tagged_body(command: CommandId, line: &str) -> SessionResult<&str> {
    let decoded = ResponseLine::decode(line).map_err(|reason| malformed(command, line, reason))?;
    check_tag(command, &decoded, line)?;
    Ok(decoded.body)
}

fn check_tag(command: CommandId, decoded: &ResponseLine, line: &str) -> SessionResult<()> {
    if decoded.tag == command.tag() {
        Ok(())
    } else {
        Err(VerificationError::Mismatch {
            command,
            expected: format!("{}...", command.tag()),
            actual: line.to_string(),
        })
    }
}

fn malformed(command: CommandId, line: &str, reason: CodecError) -> VerificationError {
    VerificationError::Malformed { command, line: line.to_string(), reason }
}
