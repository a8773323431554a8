//! Scenario simulation against a scripted interface.
//!
//! A scenario file describes the page (elements, their render delays and
//! visibility, submissions that report errors) and a list of steps. The steps
//! run through [`Scenario::run`], so the session is ensured first and the
//! user is signed out afterwards whatever happens.
//!
//! ```yaml
//! credentials: { username: john, password: demo }
//! logged_in: false
//! elements:
//!   - selector: a[href*="overview"]
//!     appears_after: 2
//! submissions:
//!   - selector: input[type="submit"]
//!     errors: 1
//! steps:
//!   - alert: Unexpected popup!
//!   - click: a[href*="overview"]
//!   - submit: input[type="submit"]
//! ```

use crate::commands::ReportFormat;
use crate::error::{CliError, CliResult};
use console::style;
use selfheal::mock::{LoginScript, ScriptedDriver, SubmissionScript};
use selfheal::{
    CleanupOutcome, Clock, Credentials, DialogEvent, HealConfig, HealResult, Scenario, Selector,
    SelfHealing, SessionStatus,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::Path;
use tracing::info;

/// Scenario file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Credentials the scenario logs in with
    #[serde(default = "default_credentials")]
    pub credentials: Credentials,
    /// Credentials the login form accepts (any, if unset)
    #[serde(default)]
    pub valid_credentials: Option<Credentials>,
    /// Whether the session is established before the scenario starts
    #[serde(default)]
    pub logged_in: bool,
    /// Elements rendered on the page
    #[serde(default)]
    pub elements: Vec<ElementFixture>,
    /// Submit controls and how often they report an error
    #[serde(default)]
    pub submissions: Vec<SubmissionFixture>,
    /// Steps to run, each a single-key map such as `click: <selector>`
    #[serde(with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

fn default_credentials() -> Credentials {
    Credentials::new("john", "demo")
}

const fn default_visible() -> bool {
    true
}

const fn default_count() -> usize {
    1
}

/// An element on the scripted page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementFixture {
    /// Selector matching the element
    pub selector: Selector,
    /// Empty lookups before the element renders
    #[serde(default)]
    pub appears_after: usize,
    /// Number of matching elements
    #[serde(default = "default_count")]
    pub count: usize,
    /// Whether the matches are visible
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Index of the single visible match among hidden duplicates
    #[serde(default)]
    pub visible_index: Option<usize>,
    /// Interactions that fail before one succeeds
    #[serde(default)]
    pub fails: usize,
}

impl ElementFixture {
    fn visibility(&self) -> Vec<bool> {
        (0..self.count.max(1))
            .map(|i| self.visible_index.map_or(self.visible, |v| v == i))
            .collect()
    }
}

/// A submit control on the scripted page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionFixture {
    /// Selector of the submit control
    pub selector: Selector,
    /// Submissions that report an error before one goes through
    #[serde(default)]
    pub errors: usize,
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Ensure the session
    Login,
    /// Click with retry
    Click(Selector),
    /// Clear and type with retry
    Type {
        /// Field selector
        selector: Selector,
        /// Text to type
        text: String,
    },
    /// Select an option with retry
    Select {
        /// Select element selector
        selector: Selector,
        /// Option index
        index: usize,
    },
    /// Submit with retry
    Submit(Selector),
    /// Raise an alert
    Alert(String),
    /// Raise a confirm
    Confirm(String),
    /// Sign out
    SignOut,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Click(selector) => write!(f, "click {selector}"),
            Self::Type { selector, text } => {
                write!(f, "type {} chars into {selector}", text.chars().count())
            }
            Self::Select { selector, index } => write!(f, "select #{index} in {selector}"),
            Self::Submit(selector) => write!(f, "submit {selector}"),
            Self::Alert(text) => write!(f, "alert \"{text}\""),
            Self::Confirm(text) => write!(f, "confirm \"{text}\""),
            Self::SignOut => write!(f, "sign out"),
        }
    }
}

impl ScenarioFile {
    /// Parse a scenario document
    pub fn from_yaml_str(yaml: &str) -> CliResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        if scenario.steps.is_empty() {
            return Err(CliError::config("scenario has no steps"));
        }
        Ok(scenario)
    }

    /// Load a scenario file
    pub fn load(path: &Path) -> CliResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Build the scripted interface this scenario describes
    #[must_use]
    pub fn driver(&self, config: &HealConfig) -> ScriptedDriver {
        let mut login = LoginScript::new()
            .with_selectors(config.session.clone())
            .with_sign_out(config.sign_out.clone())
            .logged_in(self.logged_in);
        if let Some(valid) = &self.valid_credentials {
            login = login.with_credentials(valid.username.clone(), valid.password.clone());
        }

        let mut driver = ScriptedDriver::new().with_login(login);
        for element in &self.elements {
            driver = driver.with_scheduled_element(
                element.selector.clone(),
                element.visibility(),
                element.appears_after,
            );
            if element.fails > 0 {
                driver = driver.with_failing_action(element.selector.clone(), element.fails);
            }
        }
        for submission in &self.submissions {
            driver = driver.with_submission(
                submission.selector.clone(),
                SubmissionScript::failing(submission.errors),
            );
        }
        driver
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Step description
    pub step: String,
    /// Whether the step succeeded
    pub ok: bool,
    /// What happened
    pub detail: String,
}

/// Result of a simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Session guard status before the first step
    pub session: Option<SessionStatus>,
    /// Steps in order, up to the first failure
    pub steps: Vec<StepRecord>,
    /// Dialogs auto-responded to
    pub dialogs: usize,
    /// Whether cleanup signed out
    pub signed_out: bool,
    /// Total waits between attempts, in milliseconds
    pub waited_ms: u64,
    /// Failure that ended the scenario
    pub error: Option<String>,
}

impl SimulationReport {
    /// Whether every step succeeded
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Render a report in the requested format
pub fn render_report(report: &SimulationReport, format: ReportFormat) -> CliResult<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    if let Some(session) = report.session {
        let _ = writeln!(out, "session: {session}");
    }
    for (i, record) in report.steps.iter().enumerate() {
        let mark = if record.ok {
            style("ok").green()
        } else {
            style("FAIL").red().bold()
        };
        let _ = writeln!(out, "{:>3}. [{mark}] {} ({})", i + 1, record.step, record.detail);
    }
    let _ = writeln!(
        out,
        "dialogs: {}, waited: {}ms, signed out: {}",
        report.dialogs, report.waited_ms, report.signed_out
    );
    let verdict = if report.passed() {
        style("PASSED").green().bold()
    } else {
        style("FAILED").red().bold()
    };
    let _ = writeln!(out, "{verdict}");
    out
}

async fn run_step<C: Clock>(
    heal: &SelfHealing<ScriptedDriver, C>,
    credentials: &Credentials,
    step: &Step,
) -> HealResult<String> {
    let detail = match step {
        Step::Login => heal
            .ensure_logged_in_verified(credentials.username.clone(), credentials.password.clone())
            .await?
            .to_string(),
        Step::Click(selector) => attempts(heal.retry_click(selector.clone()).await?.attempts),
        Step::Type { selector, text } => {
            attempts(heal.retry_type(selector.clone(), text.clone()).await?.attempts)
        }
        Step::Select { selector, index } => {
            attempts(heal.retry_select(selector.clone(), *index).await?.attempts)
        }
        Step::Submit(selector) => {
            let exec = heal.submit_with_retry(selector.clone()).await?;
            format!("{} submission(s)", exec.attempts)
        }
        Step::Alert(text) => {
            let response = heal.driver().raise_dialog(DialogEvent::alert(text.clone()));
            format!("{response:?}").to_lowercase()
        }
        Step::Confirm(text) => {
            let response = heal.driver().raise_dialog(DialogEvent::confirm(text.clone()));
            format!("{response:?}").to_lowercase()
        }
        Step::SignOut => format!("{:?}", heal.cleanup_session().await),
    };
    Ok(detail)
}

fn attempts(n: usize) -> String {
    format!("{n} attempt(s)")
}

/// Run a scenario to completion
pub async fn simulate<C: Clock>(
    scenario_file: &ScenarioFile,
    config: HealConfig,
    clock: C,
    elapsed_ms: impl Fn(&C) -> u64,
) -> CliResult<SimulationReport> {
    let driver = scenario_file.driver(&config);
    let heal = SelfHealing::new(driver, clock, config)?;
    let scenario = Scenario::new(heal, scenario_file.credentials.clone());

    let mut steps = Vec::with_capacity(scenario_file.steps.len());
    let records = &mut steps;
    let credentials = &scenario_file.credentials;
    let report = scenario
        .run(move |heal| {
            async move {
                for step in &scenario_file.steps {
                    info!(%step, "running step");
                    match run_step(heal, credentials, step).await {
                        Ok(detail) => records.push(StepRecord {
                            step: step.to_string(),
                            ok: true,
                            detail,
                        }),
                        Err(e) => {
                            records.push(StepRecord {
                                step: step.to_string(),
                                ok: false,
                                detail: e.to_string(),
                            });
                            return Err(e);
                        }
                    }
                }
                Ok(())
            }
        })
        .await;

    Ok(SimulationReport {
        session: report.session,
        steps,
        dialogs: report.dialogs.len(),
        signed_out: report.cleanup == CleanupOutcome::SignedOut,
        waited_ms: elapsed_ms(scenario.healing().clock()),
        error: report.result.err().map(|e| e.to_string()),
    })
}
