//! Pipeline automation for an unmodifiable third-party signup flow
//!
//! This crate drives a fixed sequence of data-entry stages against a UI
//! that changes attributes and structure between runs: each on-screen
//! target resolves through an ordered cascade of fallback strategies,
//! every write is confirmed by read-back, and the sustained human-presence
//! challenge is satisfied with a timed real-pointer hold that guarantees
//! release on every exit path. Progress, status, and logs persist through
//! an injected store keyed by process id.
//!
//! The automation surface is abstract: anything implementing [`UiDriver`]
//! and [`PointerController`] (a browser page, a mobile device session, or
//! the scripted backends in [`simulation`]) can host a run.

use std::sync::Arc;
use tracing::instrument;

pub mod advance;
pub mod challenge;
pub mod driver;
pub mod errors;
pub mod pipeline;
pub mod process;
pub mod resolver;
pub mod selector;
pub mod simulation;
#[cfg(test)]
mod tests;
pub mod writer;

pub use advance::{AdvanceOutcome, Advancer};
pub use challenge::{ChallengeSpec, HoldOutcome, HoldReport, SuccessPredicate};
pub use driver::{ControlFacts, Point, PointerController, Rect, UiDriver, UiHandle};
pub use errors::AutomationError;
pub use pipeline::{
    signup_stages, FieldSpec, ParamKey, PipelineController, RunConfig, RunParameters, StageAction,
    StageDefinition, ValueSource,
};
pub use process::{MemoryStore, ProcessRecord, ProcessStatus, ProcessStore};
pub use resolver::{resolve, Resolution, ResolvedControl};
pub use selector::{HeuristicScan, Strategy, StrategyList};
pub use writer::{FieldRole, WriteOutcome};

/// One automation session: a driver, a pointer, a store, and the tuning
/// for runs executed through it. The main entry point for consumers.
pub struct Session {
    driver: Arc<dyn UiDriver>,
    pointer: Arc<dyn PointerController>,
    store: Arc<dyn ProcessStore>,
    config: RunConfig,
}

impl Session {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        pointer: Arc<dyn PointerController>,
        store: Arc<dyn ProcessStore>,
    ) -> Self {
        Self {
            driver,
            pointer,
            store,
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    fn controller(&self) -> PipelineController {
        PipelineController::new(
            self.driver.clone(),
            self.pointer.clone(),
            self.store.clone(),
            self.config.clone(),
        )
    }

    /// Start the fixed signup workflow in the background and return its
    /// process id. The caller polls [`Session::status`] for progress; the
    /// hosting service owns any cap on simultaneous runs.
    #[instrument(skip(self, params))]
    pub fn start(&self, mut params: RunParameters) -> String {
        let process_id = params
            .process_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        params.process_id = Some(process_id.clone());

        let controller = self.controller();
        let stages = signup_stages(&self.config);
        tokio::spawn(async move {
            if let Err(e) = controller.run(params, stages).await {
                tracing::error!("run aborted outside stage policy: {e}");
            }
        });
        process_id
    }

    /// Run the fixed signup workflow on the current task and return its
    /// terminal status.
    #[instrument(skip(self, params))]
    pub async fn run_to_completion(
        &self,
        params: RunParameters,
    ) -> Result<ProcessStatus, AutomationError> {
        let stages = signup_stages(&self.config);
        self.controller().run(params, stages).await
    }

    /// Run a caller-defined stage list, for flows other than the default
    /// catalog (e.g. the companion mobile submission).
    pub async fn run_stages(
        &self,
        params: RunParameters,
        stages: Vec<StageDefinition>,
    ) -> Result<ProcessStatus, AutomationError> {
        self.controller().run(params, stages).await
    }

    /// Current persisted state for one process.
    #[instrument(skip(self))]
    pub async fn status(
        &self,
        process_id: &str,
    ) -> Result<Option<ProcessRecord>, AutomationError> {
        self.store.get(process_id).await
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            pointer: self.pointer.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}
