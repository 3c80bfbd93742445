use crate::communication::{CodecError, CommandId, CommunicationError};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("No Hello after {attempts} handshake attempts, last response {last:?}")]
    HandshakeFailed { attempts: u32, last: String },
    #[error("Communication: {0}")]
    Communication(#[from] CommunicationError),
    #[error("{command}: expected {expected:?}, got {actual:?}")]
    Mismatch { command: CommandId, expected: String, actual: String },
    #[error("{command}: malformed response {line:?}: {reason}")]
    Malformed { command: CommandId, line: String, reason: CodecError },
    #[error("{command}: device reported failure: {reason}")]
    DeviceFailure { command: CommandId, reason: String },
    #[error("Timing: {what} was {measured}, bound {bound}")]
    Timing { what: String, measured: String, bound: String },
}

pub type ScenarioResult = Result<(), VerificationError>;
