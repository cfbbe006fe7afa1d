//! Run orchestration.
//!
//! A run executes the stages strictly in order:
//! consolidation → eligibility → calculation → output → audit. Each stage is
//! a function of the previous stage's snapshot; its result is published to a
//! [`SnapshotStore`] as soon as it succeeds, unless the run has been
//! cancelled. A fatal error or cancellation stops the run before any later
//! snapshot is published.
//!
//! Any stage can be re-run on its own by loading the previous snapshot with
//! [`snapshot::load`] and calling the stage function directly.

mod context;
pub mod snapshot;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

pub use context::{CancelHandle, CancelSignal, RunContext, cancel_pair};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore, Stage};

use crate::audit::audit_run;
use crate::calculation::{CalculationSnapshot, calculate_entries};
use crate::consolidation::{ConsolidatedSnapshot, consolidate};
use crate::eligibility::{EligibilitySnapshot, filter_eligibility};
use crate::error::EngineResult;
use crate::models::{AuditReport, OutputFile, SourceTables};
use crate::output::assemble_output;

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// The run id.
    pub run_id: Uuid,
    /// Consolidation result.
    pub consolidated: ConsolidatedSnapshot,
    /// Eligibility result.
    pub eligibility: EligibilitySnapshot,
    /// Calculation result.
    pub calculation: CalculationSnapshot,
    /// The validated output file.
    pub output: OutputFile,
    /// The audit report.
    pub audit: AuditReport,
}

/// Publishes a stage result unless the run has been cancelled.
fn publish_stage<T: Serialize>(
    ctx: &RunContext,
    store: &dyn SnapshotStore,
    stage: Stage,
    payload: &T,
) -> EngineResult<()> {
    ctx.cancel().check(stage.as_str())?;
    snapshot::publish(store, &Snapshot::new(ctx.run_id(), stage, payload))?;
    info!(run_id = %ctx.run_id(), stage = %stage, "Snapshot published");
    Ok(())
}

/// Runs every stage.
///
/// # Arguments
///
/// * `ctx` - The run context (configuration, oracle clients, cancellation)
/// * `tables` - Parsed source tables
/// * `store` - Where stage snapshots are published
///
/// # Returns
///
/// The run outcome, or the first fatal error.
pub async fn run_pipeline(
    ctx: &RunContext,
    tables: &SourceTables,
    store: &dyn SnapshotStore,
) -> EngineResult<RunOutcome> {
    let result = run_stages(ctx, tables, store).await;
    if let Err(e) = &result {
        error!(run_id = %ctx.run_id(), error = %e, "Run aborted");
    }
    result
}

async fn run_stages(
    ctx: &RunContext,
    tables: &SourceTables,
    store: &dyn SnapshotStore,
) -> EngineResult<RunOutcome> {
    info!(run_id = %ctx.run_id(), run = %ctx.config().settings().name, "Run started");

    ctx.cancel().check(Stage::Consolidation.as_str())?;
    let consolidated = consolidate(tables, ctx.config())?;
    publish_stage(ctx, store, Stage::Consolidation, &consolidated)?;

    let eligibility = filter_eligibility(ctx, &consolidated).await?;
    publish_stage(ctx, store, Stage::Eligibility, &eligibility)?;

    let calculation = calculate_entries(ctx, &eligibility).await?;
    publish_stage(ctx, store, Stage::Calculation, &calculation)?;

    let output = assemble_output(&eligibility, &calculation, &ctx.config().period())?;
    publish_stage(ctx, store, Stage::Output, &output)?;

    let audit = audit_run(
        &consolidated,
        &eligibility,
        &calculation,
        &output,
        &ctx.config().settings().audit,
    );
    publish_stage(ctx, store, Stage::Audit, &audit)?;

    info!(
        run_id = %ctx.run_id(),
        rows = output.totals.rows,
        gross_value = %output.totals.gross_value,
        signed_off = audit.signed_off,
        "Run complete"
    );

    Ok(RunOutcome {
        run_id: ctx.run_id(),
        consolidated,
        eligibility,
        calculation,
        output,
        audit,
    })
}
