//! Protocol model of the timer board: channel configuration and state as seen over the wire,
//! plus an executable reference device.

mod model;
pub use model::*;
mod sim;
pub use sim::*;

use std::{fmt, str::FromStr};

use crate::communication::CodecError;

pub const CHANNEL_COUNT: usize = 4;

/// One value per channel, in index order
pub type Channels<T> = [T; CHANNEL_COUNT];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// Elapsed milliseconds the threshold state is tied to. 0 disarms it.
    pub threshold: u16,
}

/// Per channel state as reported by the status command.
///
/// `Stopped` is not part of the state names the protocol was described with, but a
/// conforming device reports `S` for a channel that counted and was then stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum ChannelState {
    #[default]
    Disabled = b'D',
    CountingIdle = b'C',
    Counting = b'G',
    Triggered = b'T',
    Stopped = b'S',
}

impl ChannelState {
    pub const fn code(self) -> char {
        self as u8 as char
    }
}

/// Enable flags, written as a bitstring like `0101`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enables(pub Channels<bool>);

/// Thresholds in ms, written as `1,2,3,4`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds(pub Channels<u16>);

/// Elapsed milliseconds per channel, written as `100,0,101,0`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elapsed(pub Channels<u32>);

/// Raw analogue samples, written as `512,0,1023,7`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalogueSamples(pub Channels<u32>);

/// Status codes, written as `GTDD`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub Channels<ChannelState>);

impl Enables {
    pub fn from_bits(bits: u8) -> Self {
        Enables(std::array::from_fn(|i| bits & (0b1000 >> i) != 0))
    }
}

impl fmt::Display for Enables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|&enabled| f.write_str(if enabled { "1" } else { "0" }))
    }
}

impl FromStr for Enables {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags = parse_characters(s, |c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })?;
        Ok(Enables(flags))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|state| write!(f, "{}", state.code()))
    }
}

impl FromStr for Status {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let states = parse_characters(s, |c| {
            u8::try_from(c).ok().and_then(ChannelState::from_repr)
        })?;
        Ok(Status(states))
    }
}

macro_rules! csv_payload {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_csv(f, &self.0)
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_csv(s).map($name)
            }
        }
    };
}

csv_payload!(Thresholds);
csv_payload!(Elapsed);
csv_payload!(AnalogueSamples);

fn write_csv<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

/// Parses exactly [`CHANNEL_COUNT`] comma separated, unsigned decimal fields. Signs, spaces
/// and empty fields are rejected.
fn parse_csv<T: FromStr + Copy + Default>(s: &str) -> Result<Channels<T>, CodecError> {
    let fields: Vec<&str> = s.split(',').collect();
    if fields.len() != CHANNEL_COUNT {
        return Err(CodecError::FieldCount { expected: CHANNEL_COUNT, actual: fields.len() });
    }

    let mut values = [T::default(); CHANNEL_COUNT];
    for (value, field) in values.iter_mut().zip(fields) {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidField(field.into()));
        }
        *value = field.parse().map_err(|_| CodecError::InvalidField(field.into()))?;
    }

    Ok(values)
}

fn parse_characters<T: Copy + Default>(
    s: &str,
    convert: impl Fn(char) -> Option<T>,
) -> Result<Channels<T>, CodecError> {
    let count = s.chars().count();
    if count != CHANNEL_COUNT {
        return Err(CodecError::FieldCount { expected: CHANNEL_COUNT, actual: count });
    }

    let mut values = [T::default(); CHANNEL_COUNT];
    for (value, c) in values.iter_mut().zip(s.chars()) {
        *value = convert(c).ok_or_else(|| CodecError::InvalidField(c.into()))?;
    }

    Ok(values)
}
