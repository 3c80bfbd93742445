use std::time::Duration;

use super::{LatencyStats, ScenarioResult, VerificationError};
use crate::communication::{Command, CommandId, CommunicationHandle};
use crate::device::{Enables, Status, Thresholds, CHANNEL_COUNT};
use crate::session::{check_exact, AnalogueReading, DeviceSession};

/// Bounds and repetition counts of the timing scenarios
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioLimits {
    pub latency_iterations: u32,
    pub latency_bound: Duration,
    pub elapsed_sleep: Duration,
}

impl Default for ScenarioLimits {
    fn default() -> Self {
        ScenarioLimits {
            latency_iterations: 100,
            latency_bound: Duration::from_millis(5),
            elapsed_sleep: Duration::from_millis(100),
        }
    }
}

pub fn reset<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    session.reset()
}

/// The fixture patterns first, then every other bitstring
pub fn enables<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    session.reset()?;

    let fixtures = [Enables([false, true, false, true]), Enables([true, false, true, false])];
    let exhaustive = (0..1u8 << CHANNEL_COUNT).map(Enables::from_bits);
    for enables in fixtures.into_iter().chain(exhaustive) {
        session.set_enables(enables)?;
        let read_back = session.enables()?;
        check_value(CommandId::GetEnables, enables, read_back)?;
    }

    Ok(())
}

/// Only the tag of the identification is checked
pub fn info<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    let info = session.info()?;
    log::info!("Device identifies as {info:?}");
    Ok(())
}

pub fn thresholds<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    session.reset()?;

    for values in [[1, 2, 3, 4], [0, 0, 0, 0], [u16::MAX, 32767, 1, 0]] {
        let thresholds = Thresholds(values);
        session.set_thresholds(thresholds)?;
        let read_back = session.thresholds()?;
        check_value(CommandId::GetThresholds, thresholds, read_back)?;
    }

    Ok(())
}

pub fn analogue_read<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    match session.analogue()? {
        AnalogueReading::Samples(samples) => {
            log::info!("Analogue samples {samples}");
            Ok(())
        }
        AnalogueReading::Failed(reason) => {
            Err(VerificationError::DeviceFailure { command: CommandId::ReadAnalogue, reason })
        }
    }
}

/// Measures the `g` round trip with all channels enabled. Every iteration stops and clears
/// the timers again, outside of the measurement.
pub fn start_latency<C: CommunicationHandle>(
    session: &mut DeviceSession<C>,
    limits: &ScenarioLimits,
) -> ScenarioResult {
    session.reset()?;
    session.set_enables(Enables([true; CHANNEL_COUNT]))?;

    let mut stats = LatencyStats::default();
    for _ in 0..limits.latency_iterations {
        let (response, latency) = session.timed_round_trip(&Command::Start)?;
        check_exact(CommandId::Start, "Gok", response)?;
        stats.record(latency);

        session.stop()?;
        session.clear()?;
    }

    log::info!(
        "Start latency over {} iterations: mean {:?}, max {:?}",
        stats.iterations,
        stats.mean(),
        stats.max
    );
    stats.check_below(limits.latency_bound)
}

/// Counts on channels 0 and 2 for a known time. Device overhead can only add to the sleep,
/// so anything at or below it is wrong.
pub fn elapsed_time<C: CommunicationHandle>(
    session: &mut DeviceSession<C>,
    limits: &ScenarioLimits,
) -> ScenarioResult {
    session.reset()?;
    let enables = Enables([true, false, true, false]);
    session.set_enables(enables)?;
    session.expect_exact(&Command::GetElapsed, "V0,0,0,0")?;

    session.start()?;
    std::thread::sleep(limits.elapsed_sleep);
    session.stop()?;

    let elapsed = session.elapsed()?;
    let sleep_ms = limits.elapsed_sleep.as_millis();
    for (channel, (&enabled, &ms)) in enables.0.iter().zip(&elapsed.0).enumerate() {
        if enabled && u128::from(ms) <= sleep_ms {
            return Err(VerificationError::Timing {
                what: format!("elapsed time of channel {channel}"),
                measured: format!("{ms}ms"),
                bound: format!("> {sleep_ms}ms"),
            });
        }
        if !enabled && ms != 0 {
            return Err(VerificationError::Mismatch {
                command: CommandId::GetElapsed,
                expected: format!("0 on channel {channel}"),
                actual: format!("V{elapsed}"),
            });
        }
    }

    Ok(())
}

/// Walks through the state codes of the reference fixture
pub fn status<C: CommunicationHandle>(
    session: &mut DeviceSession<C>,
    limits: &ScenarioLimits,
) -> ScenarioResult {
    session.reset()?;
    session.expect_exact(&Command::GetStatus, "QDDDD")?;

    session.set_enables(Enables([true, true, false, false]))?;
    session.expect_exact(&Command::GetStatus, "QCCDD")?;

    session.set_thresholds(Thresholds([0, 32767, 0, 0]))?;
    session.start()?;
    std::thread::sleep(limits.elapsed_sleep);
    session.expect_exact(&Command::GetStatus, "QGTDD")?;

    session.stop()?;
    session.expect_exact(&Command::GetStatus, "QSTDD")
}

/// A second stop answers `Sok` again and changes neither status nor elapsed times
pub fn stop_idempotence<C: CommunicationHandle>(session: &mut DeviceSession<C>) -> ScenarioResult {
    session.reset()?;
    session.set_enables(Enables([true, true, false, false]))?;
    session.start()?;
    session.stop()?;

    let status: Status = session.status()?;
    let elapsed = session.elapsed()?;

    session.stop()?;
    check_value(CommandId::GetStatus, status, session.status()?)?;
    check_value(CommandId::GetElapsed, elapsed, session.elapsed()?)
}

fn check_value<T>(command: CommandId, expected: T, actual: T) -> ScenarioResult
where
    T: PartialEq + std::fmt::Display,
{
    if expected == actual {
        Ok(())
    } else {
        Err(VerificationError::Mismatch {
            command,
            expected: format!("{}{expected}", command.tag()),
            actual: format!("{}{actual}", command.tag()),
        })
    }
}
