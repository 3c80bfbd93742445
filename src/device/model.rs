use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use super::{
    AnalogueSamples, ChannelConfig, ChannelState, Channels, Elapsed, Enables, Status, Thresholds,
};
use crate::communication::{Command, CommandId, FAILED_PREFIX, HANDSHAKE_RESPONSE, OK};

/// Time source of the reference device
pub trait Clock: Send {
    /// Monotonic time since an arbitrary origin
    fn now(&self) -> Duration;
}

pub struct MonotonicClock(Instant);

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock(Instant::now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.0.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RunState {
    #[default]
    Idle,
    Running {
        since: Duration,
        /// Time counted before the last (re)start
        banked: Duration,
    },
    Stopped {
        elapsed: Duration,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    config: ChannelConfig,
    run: RunState,
}

impl Channel {
    fn elapsed(&self, now: Duration) -> Duration {
        match self.run {
            RunState::Idle => Duration::ZERO,
            RunState::Running { since, banked } => banked + now.saturating_sub(since),
            RunState::Stopped { elapsed } => elapsed,
        }
    }

    /// A channel with a non-zero threshold reports `Triggered` from the moment it starts,
    /// and keeps doing so after a stop. Only threshold-less channels go through
    /// `Counting` and `Stopped`.
    fn state(&self) -> ChannelState {
        if !self.config.enabled {
            return ChannelState::Disabled;
        }

        let armed = self.config.threshold != 0;
        match self.run {
            RunState::Idle => ChannelState::CountingIdle,
            RunState::Running { .. } | RunState::Stopped { .. } if armed => ChannelState::Triggered,
            RunState::Running { .. } => ChannelState::Counting,
            RunState::Stopped { .. } => ChannelState::Stopped,
        }
    }
}

/// Executable model of a conforming timer board. Takes raw command frames and answers with
/// response lines (without terminator).
pub struct TimerDevice {
    channels: Channels<Channel>,
    clock: Box<dyn Clock>,
    analogue: Result<AnalogueSamples, String>,
}

impl Default for TimerDevice {
    fn default() -> Self {
        Self::with_clock(MonotonicClock::default())
    }
}

impl TimerDevice {
    pub const INFO: &'static str = "timer reference model, 4 channels";

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        TimerDevice {
            channels: Default::default(),
            clock: Box::new(clock),
            analogue: Ok(AnalogueSamples([512; 4])),
        }
    }

    /// Sets what the next analogue reads return. `Err` holds the failure reason.
    pub fn set_analogue(&mut self, reading: Result<AnalogueSamples, String>) {
        self.analogue = reading;
    }

    pub fn handle_frame(&mut self, frame: &[u8]) -> String {
        match Command::decode(frame) {
            Ok(command) => self.execute(&command),
            Err(e) => {
                log::warn!("Device rejected frame {:?}: {e}", String::from_utf8_lossy(frame));
                match frame.first().copied().and_then(CommandId::from_repr) {
                    Some(id) => format!("{}{FAILED_PREFIX}{e}", id.tag()),
                    None => format!("?{e}"),
                }
            }
        }
    }

    pub fn execute(&mut self, command: &Command) -> String {
        let now = self.clock.now();
        let tag = command.id().tag();

        match command {
            Command::Handshake => return HANDSHAKE_RESPONSE.to_string(),
            Command::Reset => self.channels = Default::default(),
            Command::Clear => self.channels.iter_mut().for_each(|c| c.run = RunState::Idle),
            Command::SetEnables(Enables(flags)) => {
                for (channel, &enabled) in self.channels.iter_mut().zip(flags) {
                    channel.config.enabled = enabled;
                    if !enabled {
                        channel.run = RunState::Idle;
                    }
                }
            }
            Command::SetThresholds(Thresholds(values)) => {
                for (channel, &threshold) in self.channels.iter_mut().zip(values) {
                    channel.config.threshold = threshold;
                }
            }
            Command::Start => {
                for channel in self.channels.iter_mut().filter(|c| c.config.enabled) {
                    channel.run = match channel.run {
                        RunState::Idle => RunState::Running { since: now, banked: Duration::ZERO },
                        RunState::Stopped { elapsed } => {
                            RunState::Running { since: now, banked: elapsed }
                        }
                        running => running,
                    };
                }
            }
            Command::Stop => {
                for channel in self.channels.iter_mut() {
                    if let RunState::Running { .. } = channel.run {
                        channel.run = RunState::Stopped { elapsed: channel.elapsed(now) };
                    }
                }
            }
            Command::GetEnables => {
                return format!("{tag}{}", Enables(self.channels.map(|c| c.config.enabled)))
            }
            Command::GetThresholds => {
                return format!("{tag}{}", Thresholds(self.channels.map(|c| c.config.threshold)))
            }
            Command::GetElapsed => {
                let elapsed = self.channels.map(|c| whole_millis(c.elapsed(now)));
                return format!("{tag}{}", Elapsed(elapsed));
            }
            Command::GetStatus => {
                return format!("{tag}{}", Status(self.channels.map(|c| c.state())))
            }
            Command::GetInfo => return format!("{tag}{}", Self::INFO),
            Command::ReadAnalogue => {
                return match &self.analogue {
                    Ok(samples) => format!("{tag}{samples}"),
                    Err(reason) => format!("{tag}{FAILED_PREFIX}{reason}"),
                }
            }
        }

        format!("{tag}{OK}")
    }
}

/// Started milliseconds: any fraction counts as a full tick
fn whole_millis(d: Duration) -> u32 {
    u32::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(u32::MAX)
}
