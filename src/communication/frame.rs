use crate::device::{Enables, Thresholds};

/// Exact response to a handshake
pub const HANDSHAKE_RESPONSE: &str = "Hello";
/// Body of a successful configuration or control command
pub const OK: &str = "ok";
/// Body prefix a device uses to signal a local failure
pub const FAILED_PREFIX: &str = "failed:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr, strum::EnumIter, strum::Display)]
#[repr(u8)]
pub enum CommandId {
    Handshake = b'h',
    Reset = b'r',
    Clear = b'c',
    SetEnables = b'f',
    SetThresholds = b'u',
    Start = b'g',
    Stop = b's',
    GetEnables = b'e',
    GetThresholds = b't',
    GetElapsed = b'v',
    GetStatus = b'q',
    GetInfo = b'i',
    ReadAnalogue = b'a',
}

impl CommandId {
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// First character of every response to this command
    pub const fn tag(self) -> char {
        self.byte().to_ascii_uppercase() as char
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Handshake,
    Reset,
    Clear,
    SetEnables(Enables),
    SetThresholds(Thresholds),
    Start,
    Stop,
    GetEnables,
    GetThresholds,
    GetElapsed,
    GetStatus,
    GetInfo,
    ReadAnalogue,
}

impl Command {
    pub const fn id(&self) -> CommandId {
        match self {
            Command::Handshake => CommandId::Handshake,
            Command::Reset => CommandId::Reset,
            Command::Clear => CommandId::Clear,
            Command::SetEnables(_) => CommandId::SetEnables,
            Command::SetThresholds(_) => CommandId::SetThresholds,
            Command::Start => CommandId::Start,
            Command::Stop => CommandId::Stop,
            Command::GetEnables => CommandId::GetEnables,
            Command::GetThresholds => CommandId::GetThresholds,
            Command::GetElapsed => CommandId::GetElapsed,
            Command::GetStatus => CommandId::GetStatus,
            Command::GetInfo => CommandId::GetInfo,
            Command::ReadAnalogue => CommandId::ReadAnalogue,
        }
    }

    /// Builds the raw frame: the command byte, directly followed by the ASCII payload if any.
    /// Frames carry no terminator.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.id().byte()];
        match self {
            Command::SetEnables(enables) => frame.extend(enables.to_string().bytes()),
            Command::SetThresholds(thresholds) => frame.extend(thresholds.to_string().bytes()),
            _ => (),
        }
        frame
    }

    /// Parses a raw frame as a device would
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let (&first, payload) = frame.split_first().ok_or(CodecError::Empty)?;
        let id = CommandId::from_repr(first).ok_or(CodecError::UnknownCommand(first))?;
        let payload = std::str::from_utf8(payload).map_err(|_| CodecError::NotAscii)?;

        let command = match id {
            CommandId::SetEnables => Command::SetEnables(payload.parse()?),
            CommandId::SetThresholds => Command::SetThresholds(payload.parse()?),
            _ if !payload.is_empty() => return Err(CodecError::UnexpectedPayload(id)),
            CommandId::Handshake => Command::Handshake,
            CommandId::Reset => Command::Reset,
            CommandId::Clear => Command::Clear,
            CommandId::Start => Command::Start,
            CommandId::Stop => Command::Stop,
            CommandId::GetEnables => Command::GetEnables,
            CommandId::GetThresholds => Command::GetThresholds,
            CommandId::GetElapsed => Command::GetElapsed,
            CommandId::GetStatus => Command::GetStatus,
            CommandId::GetInfo => Command::GetInfo,
            CommandId::ReadAnalogue => Command::ReadAnalogue,
        };

        Ok(command)
    }
}

/// A response line split into its tag character and the rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine<'a> {
    pub tag: char,
    pub body: &'a str,
}

impl<'a> ResponseLine<'a> {
    pub fn decode(line: &'a str) -> Result<Self, CodecError> {
        let tag = line.chars().next().ok_or(CodecError::Empty)?;
        Ok(ResponseLine { tag, body: &line[tag.len_utf8()..] })
    }

    pub fn is_ok(&self) -> bool {
        self.body == OK
    }

    /// The reason of a `failed:` body
    pub fn failure(&self) -> Option<&'a str> {
        self.body.strip_prefix(FAILED_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty")]
    Empty,
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    #[error("{0} takes no payload")]
    UnexpectedPayload(CommandId),
    #[error("not ASCII")]
    NotAscii,
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },
    #[error("invalid field {0:?}")]
    InvalidField(String),
}
