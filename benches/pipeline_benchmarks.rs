//! Performance benchmarks for the meal benefit pipeline.
//!
//! - Consolidation of 1,000 and 10,000 employees
//! - Full runs (in-memory oracles and snapshot store) of 100 and 1,000 employees
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use meal_benefit_engine::config::{ConfigLoader, RunConfig};
use meal_benefit_engine::consolidation::consolidate;
use meal_benefit_engine::error::OracleError;
use meal_benefit_engine::models::{SourceRow, SourceTables};
use meal_benefit_engine::oracle::{
    CalendarRequest, CalendarResolver, ClassificationOracle, ClassificationRequest,
};
use meal_benefit_engine::pipeline::{CancelSignal, MemorySnapshotStore, RunContext, run_pipeline};

const TITLES: [&str; 5] = ["ANALISTA", "ASSISTENTE", "COORDENADOR", "DIRETOR", "CONSULTOR"];
const STATES: [&str; 4] = ["SP", "RS", "PR", "RJ"];

struct InstantOracle;

#[async_trait]
impl ClassificationOracle for InstantOracle {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Value, OracleError> {
        Ok(json!({
            "excluded": request.job_title == "CONSULTOR",
            "justification": "benchmark"
        }))
    }
}

struct InstantCalendar;

#[async_trait]
impl CalendarResolver for InstantCalendar {
    async fn holidays_for(&self, _request: &CalendarRequest) -> Result<Value, OracleError> {
        Ok(json!({"dates": ["2025-04-18", "2025-04-21", "2025-05-01"]}))
    }
}

fn load_config() -> Arc<RunConfig> {
    let loader = ConfigLoader::load("./config/vr_2025_05").expect("Failed to load config");
    Arc::new(loader.into_config())
}

/// Builds tables with `count` active employees, every tenth one on vacation.
fn create_tables(count: usize) -> SourceTables {
    let active = (0..count)
        .map(|i| SourceRow {
            row_number: i + 2,
            job_title: Some(TITLES[i % TITLES.len()].to_string()),
            state: Some(STATES[i % STATES.len()].to_string()),
            ..SourceRow::new(format!("{:06}", i))
        })
        .collect();
    let vacations = (0..count)
        .step_by(10)
        .map(|i| SourceRow {
            vacation_start: chrono::NaiveDate::from_ymd_opt(2025, 5, 5),
            vacation_end: chrono::NaiveDate::from_ymd_opt(2025, 5, 9),
            ..SourceRow::new(format!("{:06}", i))
        })
        .collect();

    SourceTables {
        active,
        vacations,
        ..SourceTables::default()
    }
}

fn bench_consolidation(c: &mut Criterion) {
    let config = load_config();
    let mut group = c.benchmark_group("consolidation");

    for count in [1_000usize, 10_000] {
        let tables = create_tables(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &tables, |b, tables| {
            b.iter(|| black_box(consolidate(tables, &config).unwrap()))
        });
    }

    group.finish();
}

fn bench_full_run(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = load_config();
    let mut group = c.benchmark_group("full_run");

    for count in [100usize, 1_000] {
        let tables = create_tables(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &tables, |b, tables| {
            b.to_async(&rt).iter(|| async {
                let ctx = RunContext::new(
                    Arc::clone(&config),
                    Arc::new(InstantOracle),
                    Arc::new(InstantCalendar),
                    CancelSignal::never(),
                );
                let store = MemorySnapshotStore::new();
                black_box(run_pipeline(&ctx, tables, &store).await.unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_consolidation, bench_full_run);
criterion_main!(benches);
