use crate::advance::{AdvanceOutcome, Advancer};
use crate::challenge::{self, ChallengeSpec, HoldOutcome};
use crate::driver::{PointerController, UiDriver};
use crate::errors::AutomationError;
use crate::process::{ProcessRecord, ProcessStatus, ProcessStore, SubjectIdentity};
use crate::resolver::{self, Resolution};
use crate::selector::{
    input_roles, HeuristicScan, StrategyList, EMAIL_KEYWORDS, FIRST_NAME_KEYWORDS,
    LAST_NAME_KEYWORDS, PASSWORD_KEYWORDS, YEAR_KEYWORDS,
};
use crate::writer::{self, FieldRole, WriteOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Caller-supplied inputs for one run. Everything a stage writes comes from
/// here, so stage definitions stay static data.
#[derive(Debug, Clone, Default)]
pub struct RunParameters {
    /// Opaque process id; generated when absent.
    pub process_id: Option<String>,
    pub signup_url: String,
    pub username: String,
    pub password: String,
    pub birth_month: String,
    pub birth_day: String,
    pub birth_year: String,
    pub first_name: String,
    pub last_name: String,
    /// External case id carried through to the process record.
    pub case_id: Option<String>,
}

/// Which run parameter a field writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKey {
    SignupUrl,
    Username,
    Password,
    BirthMonth,
    BirthDay,
    BirthYear,
    FirstName,
    LastName,
}

/// Value source for a field: a run parameter or a literal baked into the
/// stage definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    Param(ParamKey),
    Literal(String),
}

impl ValueSource {
    fn resolve(&self, params: &RunParameters) -> String {
        match self {
            ValueSource::Literal(v) => v.clone(),
            ValueSource::Param(key) => match key {
                ParamKey::SignupUrl => params.signup_url.clone(),
                ParamKey::Username => params.username.clone(),
                ParamKey::Password => params.password.clone(),
                ParamKey::BirthMonth => params.birth_month.clone(),
                ParamKey::BirthDay => params.birth_day.clone(),
                ParamKey::BirthYear => params.birth_year.clone(),
                ParamKey::FirstName => params.first_name.clone(),
                ParamKey::LastName => params.last_name.clone(),
            },
        }
    }
}

/// One field a stage must write: its own strategy cascade, a semantic role,
/// and where the value comes from.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub label: String,
    pub role: FieldRole,
    pub source: ValueSource,
    pub target: StrategyList,
}

/// What a stage does when it runs.
#[derive(Debug, Clone)]
pub enum StageAction {
    /// Enter the flow at a URL (or deep link) and wait for settle.
    Navigate { url: ValueSource },
    /// Write fields in order, then activate the proceed control.
    Form { fields: Vec<FieldSpec> },
    /// Best-effort resolve-and-click of a prompt control, no field writes.
    Dismiss { target: StrategyList },
    /// The sustained-presence pointer hold.
    Challenge(ChallengeSpec),
}

/// One ordered unit of the pipeline.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub id: usize,
    pub name: String,
    pub required: bool,
    /// Progress percentage reached when this stage completes.
    pub milestone: u8,
    pub action: StageAction,
}

/// Engine tuning for one run. Plain struct with defaults; the hosting
/// service owns any external configuration format.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Overall resolution budget per logical target.
    pub resolve_budget: Duration,
    /// Wait for a surface to settle after navigation or advance.
    pub settle_timeout: Duration,
    /// Canonical challenge hold duration.
    pub challenge_hold: Duration,
    /// Interval between success-predicate polls during the hold.
    pub challenge_poll: Duration,
    /// Optional whole-run deadline, checked at stage boundaries.
    pub max_run_time: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resolve_budget: Duration::from_secs(20),
            settle_timeout: Duration::from_secs(10),
            challenge_hold: challenge::DEFAULT_HOLD_DURATION,
            challenge_poll: challenge::DEFAULT_POLL_INTERVAL,
            max_run_time: None,
        }
    }
}

fn field(
    label: &str,
    role: FieldRole,
    key: ParamKey,
    strategies: &[&str],
    fallback: HeuristicScan,
) -> FieldSpec {
    FieldSpec {
        label: label.to_string(),
        role,
        source: ValueSource::Param(key),
        target: StrategyList::parse(label, strategies).with_fallback(fallback),
    }
}

/// The fixed signup workflow, one stage per screen of the target flow.
/// Strategy lists carry every attribute vocabulary the target has used
/// across observed revisions, most specific first.
pub fn signup_stages(config: &RunConfig) -> Vec<StageDefinition> {
    let mut challenge_spec = ChallengeSpec::signup_default();
    challenge_spec.hold_duration = config.challenge_hold;
    challenge_spec.poll_interval = config.challenge_poll;

    vec![
        StageDefinition {
            id: 0,
            name: "open-signup".to_string(),
            required: true,
            milestone: 10,
            action: StageAction::Navigate {
                url: ValueSource::Param(ParamKey::SignupUrl),
            },
        },
        StageDefinition {
            id: 1,
            name: "account-alias".to_string(),
            required: true,
            milestone: 30,
            action: StageAction::Form {
                fields: vec![field(
                    "email alias",
                    FieldRole::Text,
                    ParamKey::Username,
                    &[
                        "attr:input[aria-label='New email'][type='email']",
                        "attr:input[name='MemberName']",
                        "attr:input[name='LiveEmailAddress']",
                        "attr:input[type='email']",
                    ],
                    HeuristicScan::new(input_roles(), EMAIL_KEYWORDS.iter().copied()),
                )],
            },
        },
        StageDefinition {
            id: 2,
            name: "credential".to_string(),
            required: true,
            milestone: 45,
            action: StageAction::Form {
                fields: vec![field(
                    "password",
                    FieldRole::Secret,
                    ParamKey::Password,
                    &[
                        "attr:input[type='password']",
                        "attr:input[name='Password']",
                        "attr:input[name='NewPassword']",
                    ],
                    HeuristicScan::new(input_roles(), PASSWORD_KEYWORDS.iter().copied()),
                )],
            },
        },
        StageDefinition {
            id: 3,
            name: "birth-date".to_string(),
            required: true,
            milestone: 60,
            action: StageAction::Form {
                fields: vec![
                    field(
                        "birth month",
                        FieldRole::Choice,
                        ParamKey::BirthMonth,
                        &[
                            "attr:button[name='BirthMonth']",
                            "attr:button[id='BirthMonthDropdown']",
                            "attr:button[aria-label='Birth month']",
                        ],
                        HeuristicScan::new(
                            ["button", "combobox"],
                            ["month", "mes"],
                        ),
                    ),
                    field(
                        "birth day",
                        FieldRole::Choice,
                        ParamKey::BirthDay,
                        &[
                            "attr:button[name='BirthDay']",
                            "attr:button[id='BirthDayDropdown']",
                            "attr:button[aria-label='Birth day']",
                        ],
                        HeuristicScan::new(["button", "combobox"], ["day", "día"]),
                    ),
                    field(
                        "birth year",
                        FieldRole::Text,
                        ParamKey::BirthYear,
                        &[
                            "attr:input[name='BirthYear']",
                            "attr:input[aria-label='Birth year']",
                            "attr:input[type='number']",
                        ],
                        HeuristicScan::new(input_roles(), YEAR_KEYWORDS.iter().copied()),
                    ),
                ],
            },
        },
        StageDefinition {
            id: 4,
            name: "identity".to_string(),
            required: true,
            milestone: 75,
            action: StageAction::Form {
                fields: vec![
                    field(
                        "first name",
                        FieldRole::Text,
                        ParamKey::FirstName,
                        &[
                            "attr:input[id='firstNameInput']",
                            "attr:input[name='firstNameInput']",
                        ],
                        HeuristicScan::new(input_roles(), FIRST_NAME_KEYWORDS.iter().copied()),
                    ),
                    field(
                        "last name",
                        FieldRole::Text,
                        ParamKey::LastName,
                        &[
                            "attr:input[id='lastNameInput']",
                            "attr:input[name='lastNameInput']",
                        ],
                        HeuristicScan::new(input_roles(), LAST_NAME_KEYWORDS.iter().copied()),
                    ),
                ],
            },
        },
        StageDefinition {
            id: 5,
            name: "presence-challenge".to_string(),
            required: false,
            milestone: 85,
            action: StageAction::Challenge(challenge_spec),
        },
        StageDefinition {
            id: 6,
            name: "post-verification".to_string(),
            required: false,
            milestone: 100,
            action: StageAction::Dismiss {
                target: StrategyList::parse(
                    "stay-signed-in decline",
                    &[
                        "role:button|text:No",
                        "attr:input[value='No']",
                        "attr:button[aria-label='No']",
                    ],
                ),
            },
        },
    ]
}

/// Option cascade for one dropdown value, generated from the value text.
pub fn choice_option_strategies(value: &str) -> StrategyList {
    StrategyList::new(
        format!("option '{value}'"),
        vec![
            crate::selector::Strategy::RoleText {
                role: "option".to_string(),
                text: value.to_string(),
            },
            crate::selector::Strategy::RoleText {
                role: "listitem".to_string(),
                text: value.to_string(),
            },
            crate::selector::Strategy::RoleText {
                role: "button".to_string(),
                text: value.to_string(),
            },
        ],
    )
}

/// Drives one process through an ordered stage list, persisting progress
/// through the store. Owns the process record for the duration of the run.
pub struct PipelineController {
    driver: Arc<dyn UiDriver>,
    pointer: Arc<dyn PointerController>,
    store: Arc<dyn ProcessStore>,
    config: RunConfig,
}

impl PipelineController {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        pointer: Arc<dyn PointerController>,
        store: Arc<dyn ProcessStore>,
        config: RunConfig,
    ) -> Self {
        Self {
            driver,
            pointer,
            store,
            config,
        }
    }

    /// Run the pipeline to a terminal status.
    ///
    /// Required-stage failure records the reason verbatim and halts with
    /// `Failed`, progress frozen at the last confirmed milestone.
    /// Optional-stage failure logs a warning and caps the terminal status
    /// at `Partial`. A cancellation surfaced by the challenge stage is
    /// benign and the pipeline continues.
    #[instrument(level = "info", skip(self, params, stages), fields(process_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        params: RunParameters,
        stages: Vec<StageDefinition>,
    ) -> Result<ProcessStatus, AutomationError> {
        let process_id = params
            .process_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::Span::current().record("process_id", process_id.as_str());

        let subject = SubjectIdentity {
            username: params.username.clone(),
            case_id: params.case_id.clone(),
        };
        self.store
            .create(ProcessRecord::new(process_id.clone(), subject))
            .await?;
        self.store
            .append_log(&process_id, &format!("starting run for '{}'", params.username))
            .await?;

        let started = Instant::now();
        let mut degraded = false;
        let mut confirmed_progress: u8 = 0;

        for stage in &stages {
            if let Some(max) = self.config.max_run_time {
                if started.elapsed() > max {
                    let message = format!(
                        "run deadline exceeded before stage '{}' ({max:?})",
                        stage.name
                    );
                    warn!(%message);
                    self.store.append_log(&process_id, &message).await?;
                    self.store
                        .update_status(
                            &process_id,
                            ProcessStatus::Failed,
                            &stage.name,
                            confirmed_progress,
                        )
                        .await?;
                    return Ok(ProcessStatus::Failed);
                }
            }

            self.store
                .update_status(
                    &process_id,
                    ProcessStatus::Running,
                    &stage.name,
                    confirmed_progress,
                )
                .await?;
            self.store
                .append_log(&process_id, &format!("stage '{}' starting", stage.name))
                .await?;

            match self.run_stage(stage, &params).await {
                Ok(notes) => {
                    for note in notes {
                        self.store.append_log(&process_id, &note).await?;
                    }
                    confirmed_progress = confirmed_progress.max(stage.milestone);
                    self.store
                        .update_status(
                            &process_id,
                            ProcessStatus::Running,
                            &stage.name,
                            confirmed_progress,
                        )
                        .await?;
                    self.store
                        .append_log(&process_id, &format!("stage '{}' complete", stage.name))
                        .await?;
                }
                Err(e)
                    if e.is_cancellation()
                        && matches!(stage.action, StageAction::Challenge(_)) =>
                {
                    // Session torn down mid-hold; the pointer is already
                    // released and the closure itself is not a failure.
                    self.store
                        .append_log(
                            &process_id,
                            &format!("stage '{}': session closed during hold ({e})", stage.name),
                        )
                        .await?;
                }
                Err(e) if stage.required => {
                    let message = format!("stage '{}' failed: {e}", stage.name);
                    warn!(%message);
                    self.store.append_log(&process_id, &message).await?;
                    self.store
                        .update_status(
                            &process_id,
                            ProcessStatus::Failed,
                            &stage.name,
                            confirmed_progress,
                        )
                        .await?;
                    return Ok(ProcessStatus::Failed);
                }
                Err(e) => {
                    degraded = true;
                    let message = format!("warning: optional stage '{}' failed: {e}", stage.name);
                    warn!(%message);
                    self.store.append_log(&process_id, &message).await?;
                }
            }
        }

        let terminal = if degraded {
            ProcessStatus::Partial
        } else {
            ProcessStatus::Completed
        };
        let last_stage = stages.last().map(|s| s.name.clone()).unwrap_or_default();
        self.store
            .append_log(&process_id, &format!("run finished: {terminal}"))
            .await?;
        self.store
            .update_status(&process_id, terminal, &last_stage, confirmed_progress)
            .await?;
        info!(%terminal, progress = confirmed_progress, "run finished");
        Ok(terminal)
    }

    /// Execute one stage; the returned notes go into the process log.
    async fn run_stage(
        &self,
        stage: &StageDefinition,
        params: &RunParameters,
    ) -> Result<Vec<String>, AutomationError> {
        let driver = self.driver.as_ref();
        match &stage.action {
            StageAction::Navigate { url } => {
                let url = url.resolve(params);
                driver.navigate(&url).await?;
                if !driver.wait_settled(self.config.settle_timeout).await? {
                    return Err(AutomationError::NavigationFailed(format!(
                        "surface never settled after navigating to {url}"
                    )));
                }
                Ok(vec![format!("opened {url}")])
            }
            StageAction::Form { fields } => {
                let mut notes = Vec::with_capacity(fields.len() + 1);
                for spec in fields {
                    notes.push(self.write_field(spec, params).await?);
                }
                let advancer = Advancer::new(self.config.settle_timeout);
                match advancer.advance(driver, self.config.resolve_budget).await? {
                    AdvanceOutcome::Advanced => {
                        notes.push("advanced to next stage".to_string());
                        Ok(notes)
                    }
                    AdvanceOutcome::NotFound => Err(AutomationError::NavigationFailed(format!(
                        "proceed control not accepted on stage '{}'",
                        stage.name
                    ))),
                }
            }
            StageAction::Dismiss { target } => {
                match resolver::resolve(driver, target, self.config.resolve_budget).await? {
                    Resolution::Found(control) => {
                        driver.click(&control.handle).await?;
                        driver.wait_settled(self.config.settle_timeout).await?;
                        Ok(vec![format!("dismissed '{}'", target.target)])
                    }
                    Resolution::NotFound => Err(AutomationError::ElementNotFound(format!(
                        "'{}' cascade exhausted",
                        target.target
                    ))),
                }
            }
            StageAction::Challenge(spec) => {
                let report = challenge::perform_hold(
                    driver,
                    self.pointer.as_ref(),
                    spec,
                    self.config.resolve_budget,
                )
                .await?;

                let mut notes = Vec::new();
                if report.degraded_pointer {
                    notes.push(
                        "degraded mode: pointer target outside display, used display center"
                            .to_string(),
                    );
                }
                match report.outcome {
                    HoldOutcome::Success => {
                        let signal = report.fired.unwrap_or("surface gone after hold");
                        notes.push(format!("challenge hold succeeded ({signal})"));
                        Ok(notes)
                    }
                    HoldOutcome::TimedOut => {
                        let detail = if report.degraded_pointer {
                            "hold completed without a success signal (degraded pointer target)"
                        } else {
                            "hold completed without a success signal"
                        };
                        Err(AutomationError::ChallengeTimedOut(detail.to_string()))
                    }
                }
            }
        }
    }

    /// Resolve one field's control and write its value according to role.
    async fn write_field(
        &self,
        spec: &FieldSpec,
        params: &RunParameters,
    ) -> Result<String, AutomationError> {
        let driver = self.driver.as_ref();
        let value = spec.source.resolve(params);

        let control = match resolver::resolve(driver, &spec.target, self.config.resolve_budget)
            .await?
        {
            Resolution::Found(control) => control,
            Resolution::NotFound => {
                return Err(AutomationError::ElementNotFound(format!(
                    "'{}' cascade exhausted",
                    spec.label
                )))
            }
        };

        let outcome = match spec.role {
            FieldRole::Choice => {
                writer::select_choice(
                    driver,
                    &control.handle,
                    &choice_option_strategies(&value),
                    &value,
                    self.config.resolve_budget,
                )
                .await?
            }
            _ => writer::write_and_verify(driver, &control.handle, &value, spec.role).await?,
        };

        match outcome {
            WriteOutcome::Confirmed => Ok(match spec.role {
                FieldRole::Secret => format!("wrote '{}' ({} chars)", spec.label, value.chars().count()),
                _ => format!("wrote '{}' = '{value}'", spec.label),
            }),
            WriteOutcome::Mismatch => Err(AutomationError::WriteVerificationFailed(format!(
                "'{}' read-back never matched",
                spec.label
            ))),
        }
    }
}
