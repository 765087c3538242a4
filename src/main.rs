//! suiterun - Test-Run Orchestrator
//!
//! Resolves a YAML run definition, compiles the selected groups, named suite
//! or ad hoc tests into task units, runs them one after another and prints a
//! single JSON or JUnit-style XML report on stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Run one group and two tests, XML report
//! suiterun --dir ./runs --run ./runs/nightly.yaml -g smoke -t ping -t dns
//!
//! # Run part of a named suite with a parameter override, JSON report
//! suiterun --dir ./runs --run nightly.yaml -s api:login,logout -p HOST=staging --json
//! ```
//!
//! Logs go to stderr. The exit code is non-zero when the run could not be
//! built, the report could not be written, or a unit failed to produce a
//! result; counted test failures inside the report do not affect it.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};

mod cli;
mod config;
mod executor;
mod models;
mod results;
mod utils;

use cli::Args;
use config::{EnvConfig, RunParameters, YamlIncludes};
use executor::{ProcessEngine, TestRun};
use utils::logger::init_logger;

fn main() -> ExitCode {
    let args = Args::parse();
    let env = EnvConfig::load();
    let from_env = env.has_any();

    let engine = match &args.interpreter {
        Some(interpreter) => ProcessEngine::new().with_interpreter(interpreter),
        None => ProcessEngine::new(),
    };

    let params = match args.into_parameters(env) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logger(params.effective_log_level());
    if from_env {
        debug!("Applied SUITERUN_* environment fallbacks");
    }

    match run(&params, &engine) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(params: &RunParameters, engine: &ProcessEngine) -> Result<()> {
    let mut test_run = TestRun::new(params, &YamlIncludes::new())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    test_run.exec(engine, &mut out)?;
    Ok(())
}
