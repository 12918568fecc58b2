//! Upload orchestration against the in-process mock server
//!
//! Covers chunk grouping into sequential jobs, job boundary ordering,
//! per-chunk failures, and lifecycle failures that abort the run.

use std::time::Duration;

use hound_ingest::job::{OrchestratorConfig, PollPolicy};
use hound_ingest::mock::{FailureConfig, MockEvent, MockServer, Route};
use hound_ingest::pipeline::{IngestionPipeline, PipelineConfig};
use hound_ingest::{CancelToken, ExitCode, Payload, RunOutcome};
use hound_protocol::{JobStatus, UploadMeta};
use serde_json::json;

fn config(chunk_size: usize, chunks_per_job: u32) -> PipelineConfig {
    PipelineConfig {
        chunk_size,
        orchestrator: OrchestratorConfig {
            chunks_per_job,
            poll: PollPolicy {
                interval: Duration::from_millis(2),
                max_wait: Duration::from_secs(5),
            },
        },
    }
}

fn payload(data_type: &str, records: u64) -> Payload {
    Payload {
        meta: UploadMeta {
            data_type: data_type.to_string(),
            count: records,
            ..Default::default()
        },
        data: (0..records)
            .map(|i| json!({ "ObjectIdentifier": format!("S-1-5-21-{}", i) }))
            .collect(),
    }
}

fn position(events: &[MockEvent], wanted: &MockEvent) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("missing event {:?} in {:?}", wanted, events))
}

// =============================================================================
// Test 1: 620 records, 250 per chunk, 2 chunks per job
// =============================================================================

#[test]
fn test_620_records_in_two_jobs() {
    let server = MockServer::new();
    let client = server.client();
    let pipeline = IngestionPipeline::new(&client, config(250, 2), CancelToken::new());

    let report = pipeline.run(payload("users", 620)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert_eq!(server.job_ids(), vec![1, 2]);
    assert_eq!(server.chunks_for(1), vec![250, 250]);
    assert_eq!(server.chunks_for(2), vec![120]);
    assert!(server.is_ended(1));
    assert!(server.is_ended(2));
    assert_eq!(report.records_submitted, 620);
    assert_eq!(
        report.human_summary(),
        "[users] Uploaded 3 chunks of 250 objects each to API (620 records, 2 job(s))"
    );
}

#[test]
fn test_second_job_starts_after_first_is_observed_complete() {
    let server = MockServer::new();
    let client = server.client();
    let pipeline = IngestionPipeline::new(&client, config(250, 2), CancelToken::new());
    pipeline.run(payload("users", 620)).unwrap();

    let events = server.events();
    let ended_first = position(&events, &MockEvent::JobEnded(1));
    let started_second = position(&events, &MockEvent::JobStarted(2));
    assert!(ended_first < started_second);
    assert!(events[ended_first..started_second].contains(&MockEvent::JobsListed));

    let accepted_into_second: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, MockEvent::ChunkAccepted { job_id: 2, .. }))
        .map(|(i, _)| i)
        .collect();
    assert!(accepted_into_second.iter().all(|&i| i > started_second));
}

#[test]
fn test_default_grouping_uses_one_job() {
    let server = MockServer::new();
    let client = server.client();
    let mut cfg = PipelineConfig::default();
    cfg.orchestrator.poll.interval = Duration::from_millis(2);
    let pipeline = IngestionPipeline::new(&client, cfg, CancelToken::new());

    let report = pipeline.run(payload("computers", 1000)).unwrap();

    assert_eq!(server.job_ids(), vec![1]);
    assert_eq!(server.chunks_for(1), vec![250, 250, 250, 250]);
    assert_eq!(report.jobs.len(), 1);
}

#[test]
fn test_exact_multiple_opens_no_empty_job() {
    let server = MockServer::new();
    let client = server.client();
    let pipeline = IngestionPipeline::new(&client, config(10, 2), CancelToken::new());

    pipeline.run(payload("groups", 40)).unwrap();

    assert_eq!(server.job_ids(), vec![1, 2]);
    assert_eq!(server.chunks_for(2), vec![10, 10]);
}

// =============================================================================
// Test 2: per-chunk failures are recorded, the run continues
// =============================================================================

#[test]
fn test_rejected_chunk_recorded_and_run_continues() {
    let server = MockServer::new();
    let client = server.client();
    server.inject(Route::UploadChunk, FailureConfig::status(400, "malformed chunk").with_fail_count(1));
    let pipeline = IngestionPipeline::new(&client, config(100, 50), CancelToken::new());

    let report = pipeline.run(payload("users", 300)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.chunk_failures.len(), 1);
    assert_eq!(report.chunk_failures[0].status, 400);
    assert_eq!(report.chunk_failures[0].ordinal, 1);
    assert_eq!(server.chunks_for(1), vec![100, 100]);
    assert_eq!(report.exit_code(), ExitCode::CompletedWithFailures);
    assert!(report.human_summary().contains("completed with 1 chunk failure(s)"));
}

#[test]
fn test_timed_out_job_recorded() {
    let server = MockServer::new();
    let client = server.client();
    server.set_default_progression(vec![JobStatus::Ingesting, JobStatus::Timeout]);
    let pipeline = IngestionPipeline::new(&client, config(250, 50), CancelToken::new());

    let report = pipeline.run(payload("users", 10)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.jobs[0].final_status, Some(JobStatus::Timeout));
    assert_eq!(report.exit_code(), ExitCode::CompletedWithFailures);
    assert!(report.human_summary().contains("job(s) not complete: 1"));
}

// =============================================================================
// Test 3: lifecycle failures abort after stopping the open job
// =============================================================================

#[test]
fn test_network_failure_on_submit_aborts_and_stops_job() {
    let server = MockServer::new();
    let client = server.client();
    server.inject(
        Route::UploadChunk,
        FailureConfig::network("connection reset").with_fail_count(1),
    );
    let pipeline = IngestionPipeline::new(&client, config(250, 50), CancelToken::new());

    let report = pipeline.run(payload("users", 600)).unwrap();

    assert!(matches!(report.outcome, RunOutcome::Aborted { network: true, .. }));
    assert_eq!(report.exit_code(), ExitCode::Network);
    assert_eq!(report.chunks_submitted, 0);
    assert!(server.is_ended(1));
    assert_eq!(server.job_ids(), vec![1]);
}

#[test]
fn test_job_start_rejected_aborts_before_upload() {
    let server = MockServer::new();
    let client = server.client();
    server.inject_status(Route::StartJob, 500, "database unavailable");
    let pipeline = IngestionPipeline::new(&client, config(250, 50), CancelToken::new());

    let report = pipeline.run(payload("users", 10)).unwrap();

    assert_eq!(report.exit_code(), ExitCode::Aborted);
    assert!(server.job_ids().is_empty());
    assert!(report.human_summary().starts_with("[users] Run aborted at job 1 of 1 after 0 of 1 chunks"));
}

#[test]
fn test_job_missing_from_listing_aborts() {
    let server = MockServer::new();
    let client = server.client();
    server.hide_job(1);
    let pipeline = IngestionPipeline::new(&client, config(250, 1), CancelToken::new());

    let report = pipeline.run(payload("users", 600)).unwrap();

    assert_eq!(report.exit_code(), ExitCode::Aborted);
    assert_eq!(server.job_ids(), vec![1]);
    assert_eq!(report.chunks_submitted, 1);
}

#[test]
fn test_cancelled_run_exit_code() {
    let server = MockServer::new();
    let client = server.client();
    let cancel = CancelToken::new();
    cancel.cancel();
    let pipeline = IngestionPipeline::new(&client, config(250, 50), cancel);

    let report = pipeline.run(payload("users", 10)).unwrap();

    assert!(matches!(report.outcome, RunOutcome::Cancelled { .. }));
    assert_eq!(report.exit_code(), ExitCode::Cancelled);
    assert!(server.job_ids().is_empty());
}

// =============================================================================
// Test 4: report serialization
// =============================================================================

#[test]
fn test_report_json_shape() {
    let server = MockServer::new();
    let client = server.client();
    let pipeline = IngestionPipeline::new(&client, config(250, 2), CancelToken::new());
    let report = pipeline.run(payload("users", 620)).unwrap();

    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(value["outcome"]["kind"], "completed");
    assert_eq!(value["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(value["jobs"][1]["job_id"], 2);
    assert_eq!(value["run_id"].as_str().unwrap().len(), 26);
}

// =============================================================================
// Test 5: several files, one run each
// =============================================================================

#[test]
fn test_files_uploaded_in_order_as_separate_runs() {
    let dir = tempfile::tempdir().unwrap();
    let computers = dir.path().join("20240305_computers.json");
    let users = dir.path().join("20240305_users.json");

    let mut bom = b"\xEF\xBB\xBF".to_vec();
    bom.extend_from_slice(
        br#"{"data":[{"ObjectIdentifier":"S-1-5-21-1000"},{"ObjectIdentifier":"S-1-5-21-1001"}],
             "meta":{"methods":46067,"type":"computers","count":2,"version":5}}"#,
    );
    std::fs::write(&computers, bom).unwrap();
    std::fs::write(
        &users,
        br#"{"data":[{"ObjectIdentifier":"S-1-5-21-500"}],"meta":{"methods":46067,"type":"users","count":1,"version":5}}"#,
    )
    .unwrap();

    let server = MockServer::new();
    let client = server.client();
    let pipeline = IngestionPipeline::new(&client, config(250, 50), CancelToken::new());
    let runs = pipeline.run_files(&[&computers, &users]);

    assert_eq!(runs.len(), 2);
    let first = runs[0].result.as_ref().unwrap();
    let second = runs[1].result.as_ref().unwrap();
    assert_eq!(first.data_type, "computers");
    assert_eq!(second.data_type, "users");
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(server.chunks_for(1), vec![2]);
    assert_eq!(server.chunks_for(2), vec![1]);
}

// =============================================================================
// Test 6: every opened job is ended exactly once
// =============================================================================

#[test]
fn test_each_job_ended_exactly_once() {
    for &(records, chunk_size, chunks_per_job) in &[(620, 250, 2), (7, 1, 3), (9, 1, 3), (1, 1, 1), (500, 250, 50)] {
        let server = MockServer::new();
        let client = server.client();
        let pipeline = IngestionPipeline::new(&client, config(chunk_size, chunks_per_job), CancelToken::new());

        let report = pipeline.run(payload("groups", records)).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);

        let chunks = records.div_ceil(chunk_size as u64);
        let expected_jobs = chunks.div_ceil(u64::from(chunks_per_job)) as usize;
        let end_requests = server
            .requests()
            .iter()
            .filter(|r| matches!(Route::resolve(r.method, &r.uri), Some((Route::EndJob, _))))
            .count();

        assert_eq!(server.job_ids().len(), expected_jobs, "jobs for {:?}", (records, chunk_size, chunks_per_job));
        assert_eq!(end_requests, expected_jobs, "ends for {:?}", (records, chunk_size, chunks_per_job));
    }
}

#[test]
fn test_aborted_job_ended_exactly_once() {
    let server = MockServer::new();
    let client = server.client();
    server.inject(Route::UploadChunk, FailureConfig::network("connection reset"));
    let pipeline = IngestionPipeline::new(&client, config(1, 50), CancelToken::new());

    let report = pipeline.run(payload("groups", 3)).unwrap();
    assert_eq!(report.exit_code(), ExitCode::Network);

    let end_requests = server
        .requests()
        .iter()
        .filter(|r| matches!(Route::resolve(r.method, &r.uri), Some((Route::EndJob, _))))
        .count();
    assert_eq!(server.job_ids(), vec![1]);
    assert_eq!(end_requests, 1);
}
