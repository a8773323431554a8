//! Selfheal CLI library
//!
//! Command-line front end for the `selfheal` recovery layer: print and
//! validate recovery configuration, and replay recovery scenarios against a
//! scripted interface.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod simulate;

pub use commands::{Cli, ColorArg, Commands, ConfigAction, ConfigArgs, ReportFormat, SimulateArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use simulate::{
    render_report, simulate, ScenarioFile, SimulationReport, Step, StepRecord,
};
