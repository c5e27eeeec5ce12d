//! The step/substep engine.
//!
//! A `Step` drives one phase of the upgrade as an ordered sequence of substeps. Every substep
//! transition is persisted to the status log so that a failed or interrupted phase can be run
//! again, skipping whatever already completed.

mod store;
#[cfg(test)]
mod store_test;

use std::fmt;
use std::future::Future;
use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::StepError;

pub use store::{Entry, StatusStore};

/// A top-level operator-invoked stage of the upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initialize,
    Execute,
    Finalize,
    Revert,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::Execute => f.write_str("execute"),
            Self::Finalize => f.write_str("finalize"),
            Self::Revert => f.write_str("revert"),
        }
    }
}

impl Phase {
    /// The phase which must be complete before this one may start.
    fn prerequisite(self) -> Option<Phase> {
        match self {
            Self::Initialize | Self::Revert => None,
            Self::Execute => Some(Self::Initialize),
            Self::Finalize => Some(Self::Execute),
        }
    }

    /// Phases which, once started, rule this phase out.
    fn superseded_by(self) -> &'static [Phase] {
        match self {
            Self::Initialize | Self::Execute => &[Self::Finalize, Self::Revert],
            Self::Finalize => &[Self::Revert],
            Self::Revert => &[Self::Finalize],
        }
    }

    /// Check that this phase may start given the phases recorded in the status log.
    pub async fn validate_order(self, store: &StatusStore) -> Result<()> {
        if let Some(required) = self.prerequisite() {
            if store.phase_status(required).await? != Status::Complete {
                return Err(StepError::PhaseOrder {
                    phase: self,
                    reason: format!("{} has not completed, run `gpupgrade {}` first", required, required),
                }
                .into());
            }
        }
        for later in self.superseded_by() {
            if store.phase_status(*later).await? != Status::Pending {
                return Err(StepError::PhaseOrder {
                    phase: self,
                    reason: format!("{} has already started", later),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// A unit of work within a phase, independently tracked for resumability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Substep {
    CreateStateDirectory,
    StartHub,
    SaveSourceClusterConfig,
    StartAgents,
    CreateIntermediateCluster,
    UpgradePrimaries,
    SwapDataDirectories,
    DeleteIntermediateCluster,
    StopHubAndAgents,
    ArchiveLogDirectories,
    DeleteStateDirectory,
    ExecuteStatsDataMigrationScripts,
    ExecuteInitializeDataMigrationScripts,
    ExecuteFinalizeDataMigrationScripts,
    ExecuteRevertDataMigrationScripts,
}

impl Substep {
    /// The operator facing description of this substep.
    pub fn description(self) -> &'static str {
        match self {
            Self::CreateStateDirectory => "Creating directories",
            Self::StartHub => "Starting gpupgrade hub process",
            Self::SaveSourceClusterConfig => "Saving source cluster configuration",
            Self::StartAgents => "Starting gpupgrade agent processes",
            Self::CreateIntermediateCluster => "Creating intermediate target cluster",
            Self::UpgradePrimaries => "Upgrading primary segments",
            Self::SwapDataDirectories => "Updating data directories",
            Self::DeleteIntermediateCluster => "Deleting intermediate target cluster",
            Self::StopHubAndAgents => "Stopping hub and agents",
            Self::ArchiveLogDirectories => "Archiving log directories",
            Self::DeleteStateDirectory => "Deleting state directory",
            Self::ExecuteStatsDataMigrationScripts => "Executing stats data migration scripts",
            Self::ExecuteInitializeDataMigrationScripts => "Executing initialize data migration scripts",
            Self::ExecuteFinalizeDataMigrationScripts => "Executing finalize data migration scripts",
            Self::ExecuteRevertDataMigrationScripts => "Executing revert data migration scripts",
        }
    }
}

impl fmt::Display for Substep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateStateDirectory => "create_state_directory",
            Self::StartHub => "start_hub",
            Self::SaveSourceClusterConfig => "save_source_cluster_config",
            Self::StartAgents => "start_agents",
            Self::CreateIntermediateCluster => "create_intermediate_cluster",
            Self::UpgradePrimaries => "upgrade_primaries",
            Self::SwapDataDirectories => "swap_data_directories",
            Self::DeleteIntermediateCluster => "delete_intermediate_cluster",
            Self::StopHubAndAgents => "stop_hub_and_agents",
            Self::ArchiveLogDirectories => "archive_log_directories",
            Self::DeleteStateDirectory => "delete_state_directory",
            Self::ExecuteStatsDataMigrationScripts => "execute_stats_data_migration_scripts",
            Self::ExecuteInitializeDataMigrationScripts => "execute_initialize_data_migration_scripts",
            Self::ExecuteFinalizeDataMigrationScripts => "execute_finalize_data_migration_scripts",
            Self::ExecuteRevertDataMigrationScripts => "execute_revert_data_migration_scripts",
        };
        f.write_str(name)
    }
}

/// The status of a phase or substep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Complete,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Complete => f.write_str("complete"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

impl Status {
    /// Check if the state machine allows moving from this status to `next`.
    ///
    /// `complete` is terminal. A `running` entry may be re-entered after a crash or quit, and
    /// `failed` or `skipped` entries run again on the next invocation.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Running, Running)
                | (Running, Complete)
                | (Running, Failed)
                | (Running, Skipped)
                | (Failed, Running)
                | (Failed, Skipped)
                | (Skipped, Running)
                | (Skipped, Skipped)
        )
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "IN PROGRESS",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

/// The result of a substep body.
#[derive(Debug)]
pub enum Outcome {
    /// The substep did its work.
    Success,
    /// The substep does not apply to this run.
    Skip,
    /// The operator chose to stop the phase. Nothing is marked failed.
    Quit,
    /// The substep failed; the phase stops and resumes here on the next invocation.
    Failure(anyhow::Error),
}

impl From<anyhow::Error> for Outcome {
    fn from(err: anyhow::Error) -> Self {
        Self::Failure(err)
    }
}

/// Options controlling how a step interacts with the operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOptions {
    /// Show the details of every substep.
    pub verbose: bool,
    /// Never prompt for confirmation.
    pub non_interactive: bool,
}

#[derive(Clone, Copy, Debug)]
enum SubstepKind {
    Cli,
    Hub,
}

const STATUS_COLUMN: usize = 60;

/// One running phase of the upgrade.
pub struct Step {
    phase: Phase,
    store: StatusStore,
    opts: StepOptions,
    out: Box<dyn Write + Send>,
    started: Instant,
    /// The first failure of this phase; once set, no further substeps run.
    failure: Option<anyhow::Error>,
    /// Set when a substep quit the phase.
    quit: bool,
}

impl Step {
    /// Begin the given phase.
    ///
    /// The phase order is validated against the status log, then the confirmation text is
    /// printed and, unless running non-interactively, the operator must confirm. Declining
    /// returns `StepError::UserCanceled` without recording anything.
    pub async fn begin(
        phase: Phase, store: StatusStore, opts: StepOptions, confirmation: &str, input: &mut (dyn BufRead + Send),
        mut out: Box<dyn Write + Send>,
    ) -> Result<Self> {
        phase.validate_order(&store).await?;

        if !confirmation.is_empty() {
            writeln!(out, "{}", confirmation).context("error writing to output")?;
        }
        if !opts.non_interactive && !confirm(phase, input, &mut out)? {
            return Err(StepError::UserCanceled.into());
        }

        if store.phase_status(phase).await? != Status::Complete {
            store.write_phase(phase, Status::Running).await?;
        }
        tracing::info!(%phase, "phase started");
        writeln!(out, "\n{} in progress.\n", capitalize(&phase.to_string())).context("error writing to output")?;

        Ok(Self {
            phase,
            store,
            opts,
            out,
            started: Instant::now(),
            failure: None,
            quit: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The status log backing this step.
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Stop persisting status; used before deleting the state directory.
    pub fn disable_store(&self) {
        self.store.disable();
    }

    /// Check if a previous substep failed or quit.
    pub fn is_stopped(&self) -> bool {
        self.failure.is_some() || self.quit
    }

    /// Run a substep entirely within the driving process.
    pub async fn run_cli_substep<F>(&mut self, substep: Substep, body: F)
    where
        F: Future<Output = Result<Outcome>>,
    {
        self.run_substep(substep, SubstepKind::Cli, body).await
    }

    /// Run a substep if `condition` holds, otherwise record it as skipped.
    ///
    /// The body is dropped without being polled when the condition does not hold.
    pub async fn run_cli_substep_conditionally<F>(&mut self, substep: Substep, condition: bool, body: F)
    where
        F: Future<Output = Result<Outcome>>,
    {
        if condition {
            return self.run_substep(substep, SubstepKind::Cli, body).await;
        }
        drop(body);
        if self.is_stopped() {
            return;
        }
        let res = async {
            if self.store.substep_status(self.phase, substep).await? == Status::Complete {
                return Ok(());
            }
            self.store.write(self.phase, substep, Status::Skipped).await
        }
        .await;
        match res {
            Ok(()) => self.print_status(substep, Status::Skipped),
            Err(err) => self.fail(substep, err),
        }
    }

    /// Run a substep which issues one RPC to the hub and waits for its reply.
    pub async fn run_hub_substep<F>(&mut self, substep: Substep, body: F)
    where
        F: Future<Output = Result<Outcome>>,
    {
        self.run_substep(substep, SubstepKind::Hub, body).await
    }

    /// Run an in-process helper which is not recorded in the status log.
    ///
    /// A failure stops the phase exactly as a failed substep would.
    pub async fn run_internal_substep<F>(&mut self, body: F)
    where
        F: Future<Output = Result<()>>,
    {
        if self.is_stopped() {
            return;
        }
        if let Err(err) = body.await {
            tracing::error!(phase = %self.phase, error = ?err, "internal substep failed");
            self.failure = Some(err);
        }
    }

    async fn run_substep<F>(&mut self, substep: Substep, kind: SubstepKind, body: F)
    where
        F: Future<Output = Result<Outcome>>,
    {
        if self.is_stopped() {
            return;
        }
        let span = tracing::info_span!("substep", phase = %self.phase, %substep, kind = ?kind);
        self.drive_substep(substep, body).instrument(span).await
    }

    async fn drive_substep<F>(&mut self, substep: Substep, body: F)
    where
        F: Future<Output = Result<Outcome>>,
    {
        match self.store.substep_status(self.phase, substep).await {
            Ok(Status::Complete) => {
                tracing::debug!("substep already complete, skipping");
                self.print_status(substep, Status::Complete);
                return;
            }
            Ok(_) => (),
            Err(err) => return self.fail(substep, err),
        }
        if let Err(err) = self.store.write(self.phase, substep, Status::Running).await {
            return self.fail(substep, err);
        }
        self.print_progress(substep);

        let start = Instant::now();
        let outcome = body.await.unwrap_or_else(Outcome::Failure);
        if self.opts.verbose {
            tracing::info!(elapsed = ?start.elapsed(), outcome = ?outcome, "substep finished");
        }
        let status = match outcome {
            Outcome::Success => Status::Complete,
            Outcome::Skip => Status::Skipped,
            Outcome::Failure(err) => {
                if let Err(write_err) = self.store.write(self.phase, substep, Status::Failed).await {
                    tracing::error!(error = ?write_err, "error recording substep failure");
                }
                return self.fail(substep, err);
            }
            Outcome::Quit => {
                tracing::info!("substep quit the phase");
                self.quit = true;
                let _ = writeln!(self.out);
                return;
            }
        };
        match self.store.write(self.phase, substep, status).await {
            Ok(()) => self.print_status(substep, status),
            Err(err) => self.fail(substep, err),
        }
    }

    fn fail(&mut self, substep: Substep, err: anyhow::Error) {
        tracing::error!(phase = %self.phase, %substep, error = ?err, "substep failed");
        self.print_status(substep, Status::Failed);
        if self.opts.verbose {
            let _ = writeln!(self.out, "{:#}", err);
        }
        self.failure = Some(err.context(format!("substep {:?} failed", substep.description())));
    }

    fn print_progress(&mut self, substep: Substep) {
        let line = format!("{}...", substep.description());
        let _ = write!(self.out, "\r{:<width$}[{}]", line, Status::Running.label(), width = STATUS_COLUMN);
        let _ = self.out.flush();
    }

    fn print_status(&mut self, substep: Substep, status: Status) {
        let line = format!("{}...", substep.description());
        let _ = writeln!(self.out, "\r{:<width$}[{}]", line, status.label(), width = STATUS_COLUMN);
    }

    /// Finish the phase.
    ///
    /// On success the phase is recorded complete and `message` is printed. Otherwise the phase
    /// is recorded failed and the first failure is returned with a hint on how to resume.
    pub async fn complete(mut self, message: &str) -> Result<()> {
        if self.quit {
            let _ = self.out.flush();
            return Err(StepError::Quit(self.phase).into());
        }
        if let Some(err) = self.failure.take() {
            if let Err(write_err) = self.store.write_phase(self.phase, Status::Failed).await {
                tracing::warn!(error = ?write_err, "error recording phase failure");
            }
            let _ = writeln!(
                self.out,
                "\n{} failed. Once the cause is resolved, run `gpupgrade {}` again to resume.",
                capitalize(&self.phase.to_string()),
                self.phase
            );
            let _ = self.out.flush();
            return Err(err.context(format!("{} failed", self.phase)));
        }

        if self.store.phase_status(self.phase).await? != Status::Complete {
            self.store.write_phase(self.phase, Status::Complete).await?;
        }
        tracing::info!(phase = %self.phase, elapsed = ?self.started.elapsed(), "phase complete");
        if !message.is_empty() {
            writeln!(self.out, "\n{}", message).context("error writing to output")?;
        }
        self.out.flush().context("error flushing output")?;
        Ok(())
    }
}

/// Prompt the operator until they answer yes or no. End of input counts as no.
fn confirm(phase: Phase, input: &mut (dyn BufRead + Send), out: &mut Box<dyn Write + Send>) -> Result<bool> {
    loop {
        write!(out, "\nContinue with gpupgrade {}?  Yy|Nn: ", phase).context("error writing to output")?;
        out.flush().context("error flushing output")?;
        let mut answer = String::new();
        if input.read_line(&mut answer).context("error reading confirmation")? == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => {
                writeln!(out, "\nCanceled.").context("error writing to output")?;
                return Ok(false);
            }
            _ => continue,
        }
    }
}

fn capitalize(val: &str) -> String {
    let mut chars = val.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Check if the given error is a cancellation or quit rather than a failure.
pub fn is_user_stop(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<StepError>(), Some(StepError::UserCanceled) | Some(StepError::Quit(_)))
}
