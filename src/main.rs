use simplelog as sl;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use timer_harness::communication::open_serial;
use timer_harness::config::Configuration;
use timer_harness::device::{SimulatedPort, TimerDevice};
use timer_harness::oracle::{run_suite, SuiteReport};

const CONFIG_FILE: &str = "config.toml";

fn main() -> ExitCode {
    match run() {
        Ok(report) if report.all_passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<SuiteReport> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Configuration::from_file(path)?,
        None if std::path::Path::new(CONFIG_FILE).exists() => {
            Configuration::from_file(CONFIG_FILE)?
        }
        None => Configuration::default(),
    };

    let level = config.log_level();
    sl::CombinedLogger::init(vec![
        sl::TermLogger::new(
            level,
            sl::Config::default(),
            sl::TerminalMode::Mixed,
            sl::ColorChoice::Auto,
        ),
        sl::WriteLogger::new(
            level,
            sl::Config::default(),
            std::fs::File::create(&config.log_path)
                .with_context(|| format!("Could not create log file {}", config.log_path))?,
        ),
    ])?;
    log::info!("Configuration: {config:?}");

    let report = if config.simulate {
        log::info!("Running against the reference device");
        let device = Arc::new(Mutex::new(TimerDevice::default()));
        run_suite(&config, || Ok(SimulatedPort::new(device.clone())))
    } else {
        run_suite(&config, || open_serial(&config.port, config.baudrate, config.timeout()))
    };

    report.log_summary();
    Ok(report)
}
