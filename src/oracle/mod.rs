use std::time::{Duration, Instant};

use crate::communication::{ComResult, CommunicationHandle};
use crate::config::Configuration;
use crate::session::DeviceSession;

mod common;
pub use common::*;
mod error;
pub use error::*;
mod scenarios;
pub use scenarios::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, strum::EnumIter, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    Reset,
    Enables,
    Info,
    Thresholds,
    AnalogueRead,
    StartLatency,
    ElapsedTime,
    Status,
    StopIdempotence,
}

impl Scenario {
    pub fn run<C: CommunicationHandle>(
        self,
        session: &mut DeviceSession<C>,
        limits: &ScenarioLimits,
    ) -> ScenarioResult {
        match self {
            Scenario::Reset => reset(session),
            Scenario::Enables => enables(session),
            Scenario::Info => info(session),
            Scenario::Thresholds => thresholds(session),
            Scenario::AnalogueRead => analogue_read(session),
            Scenario::StartLatency => start_latency(session, limits),
            Scenario::ElapsedTime => elapsed_time(session, limits),
            Scenario::Status => status(session, limits),
            Scenario::StopIdempotence => stop_idempotence(session),
        }
    }
}

pub struct ScenarioReport {
    pub scenario: Scenario,
    pub duration: Duration,
    pub result: ScenarioResult,
}

#[derive(Default)]
pub struct SuiteReport {
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn failed(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(|r| r.result.is_err())
    }

    pub fn all_passed(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn result_of(&self, scenario: Scenario) -> Option<&ScenarioResult> {
        self.reports.iter().find(|r| r.scenario == scenario).map(|r| &r.result)
    }

    pub fn log_summary(&self) {
        let failed = self.failed().count();
        log::info!("{} of {} scenarios passed", self.reports.len() - failed, self.reports.len());
        for report in self.failed() {
            if let Err(e) = &report.result {
                log::error!("  {}: {e}", report.scenario);
            }
        }
    }
}

/// Runs every scenario in its own session: open the transport, greet the device, run,
/// release. A failing scenario does not stop the ones after it.
pub fn run_suite<C, F>(config: &Configuration, mut open: F) -> SuiteReport
where
    C: CommunicationHandle,
    F: FnMut() -> ComResult<C>,
{
    let limits = config.limits();
    let mut suite = SuiteReport::default();

    for scenario in config.selected_scenarios() {
        log::info!("Running {scenario}");
        let start = Instant::now();
        let result = run_isolated(scenario, config, &limits, &mut open);
        let duration = start.elapsed();

        match &result {
            Ok(()) => log::info!("{scenario} passed in {duration:?}"),
            Err(e) => log::error!("{scenario} failed: {e}"),
        }
        suite.reports.push(ScenarioReport { scenario, duration, result });
    }

    suite
}

fn run_isolated<C, F>(
    scenario: Scenario,
    config: &Configuration,
    limits: &ScenarioLimits,
    open: &mut F,
) -> ScenarioResult
where
    C: CommunicationHandle,
    F: FnMut() -> ComResult<C>,
{
    let com = open()?;
    let mut session = DeviceSession::establish(com, config.timeout(), config.handshake_attempts)?;
    scenario.run(&mut session, limits)
}
