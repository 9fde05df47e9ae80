//! End-to-end tests: config -> dispatcher -> HTTP provider -> recovery
//!
//! Tests cover:
//! - A generation against a stub provider
//! - Rate limit and timeout classification at the pipeline boundary
//! - Status polling while another user's job holds the only slot
//! - Per-job queue positions for one user submitting several jobs

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taleforge::config::TaleforgeConfig;
use taleforge::content::ContentKind;
use taleforge::error::{ErrorKind, PipelineError};
use taleforge::pipeline::{GenerationPipeline, GenerationRequest};
use taleforge::provider::{RawText, ScriptedProvider};
use taleforge::queue::{JobId, JobState, QueueConfig, QueueDispatcher};
use taleforge::status::{Stage, StatusReporter};
use tokio::sync::oneshot;

use super::test_utils::{completion_body, StubProvider, StubReply};

fn config_for(stub: &StubProvider, timeout_secs: u64) -> TaleforgeConfig {
    TaleforgeConfig {
        provider: stub.provider_config(timeout_secs),
        ..TaleforgeConfig::default()
    }
}

#[tokio::test]
async fn generates_item_through_http_provider() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 200,
        body: completion_body(
            "Here is your item:\n```json\n{\"name\":\"Lantern of Echoes\",\"rarity\":\"rare\"}\n```",
            "stop",
        ),
    })
    .await;
    let pipeline = GenerationPipeline::from_config(&config_for(&stub, 5)).unwrap();
    pipeline.start().unwrap();

    let generated = pipeline
        .generate("u1", GenerationRequest::new(ContentKind::Item, "a haunted lantern"))
        .await
        .unwrap();

    assert_eq!(generated.tier, 1);
    assert_eq!(
        generated.data,
        json!({"name": "Lantern of Echoes", "rarity": "rare"})
    );
    assert_eq!(stub.hits(), 1);
    assert_eq!(pipeline.status("u1").stage, Stage::Complete);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn rate_limit_maps_to_429_after_one_call() {
    let stub = StubProvider::start(StubReply::Respond {
        status: 429,
        body: "{\"error\":\"rate_limited\"}".to_string(),
    })
    .await;
    let pipeline = GenerationPipeline::from_config(&config_for(&stub, 5)).unwrap();
    pipeline.start().unwrap();

    let err = pipeline
        .generate("u1", GenerationRequest::new(ContentKind::Npc, "a smuggler"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.http_status(), 429);
    assert_eq!(stub.hits(), 1);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn hanging_provider_maps_to_408() {
    let stub = StubProvider::start(StubReply::Hang).await;
    let pipeline = GenerationPipeline::from_config(&config_for(&stub, 1)).unwrap();
    pipeline.start().unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.generate("u1", GenerationRequest::new(ContentKind::Encounter, "an ambush")),
    )
    .await
    .expect("pipeline must not hang past the provider timeout")
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.http_status(), 408);
    assert!(err.user_message().contains("simpler prompt"));

    // The slot is released after a timeout
    let status = pipeline.status("u1");
    assert_eq!(status.queue.queue_length, 0);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn waiting_user_sees_queued_status() {
    let dispatcher = Arc::new(QueueDispatcher::new(QueueConfig::default()));
    let provider = Arc::new(ScriptedProvider::always("{\"name\":\"Wren\"}", 1));
    let pipeline = Arc::new(GenerationPipeline::new(
        Arc::clone(&dispatcher),
        provider,
        StatusReporter::new(20),
    ));
    pipeline.start().unwrap();

    // Hold the only slot with a job that waits on a gate
    let (release, gate) = oneshot::channel::<()>();
    let blocker = dispatcher
        .enqueue("busy-user", move || async move {
            let _ = gate.await;
            Ok(RawText::new("{}"))
        })
        .unwrap();

    let task_pipeline = Arc::clone(&pipeline);
    let waiting = tokio::spawn(async move {
        task_pipeline
            .generate("u2", GenerationRequest::new(ContentKind::Character, "a ranger"))
            .await
    });

    for _ in 0..200 {
        let status = pipeline.status("u2");
        if status.stage == Stage::Queued && status.queue.is_processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let status = pipeline.status("u2");
    assert_eq!(status.stage, Stage::Queued);
    assert_eq!(status.queue.queue_length, 2);
    assert_eq!(status.queue.user_position, 0);
    assert!(status.queue.is_processing);
    assert_eq!(status.report.progress_percent, 5);
    assert_eq!(status.report.estimated_seconds, 20);

    let busy = pipeline.status("busy-user");
    assert_eq!(busy.stage, Stage::Generating);

    release.send(()).unwrap();
    blocker.await.unwrap();
    let generated = waiting.await.unwrap().unwrap();
    assert_eq!(generated.data["name"], "Wren");
    pipeline.shutdown().await;
}

#[tokio::test]
async fn same_user_jobs_report_fifo_positions() {
    let dispatcher = QueueDispatcher::new(QueueConfig::default());
    let mut gates = Vec::new();
    let mut handles = Vec::new();

    for _ in 0..5 {
        let (tx, rx) = oneshot::channel::<()>();
        gates.push(tx);
        let handle = dispatcher
            .enqueue("same-user", move || async move {
                let _ = rx.await;
                Ok(RawText::new("{}"))
            })
            .unwrap();
        handles.push(handle);
    }

    let positions: Vec<Option<JobState>> = handles.iter().map(|h| dispatcher.job_state(h.id())).collect();
    assert_eq!(
        positions,
        (0..5)
            .map(|position| Some(JobState::Queued { position }))
            .collect::<Vec<_>>()
    );

    let ids: Vec<JobId> = handles.iter().map(|h| h.id()).collect();
    dispatcher.start().unwrap();

    for (round, (gate, handle)) in gates.into_iter().zip(handles).enumerate() {
        for _ in 0..200 {
            if dispatcher.job_state(ids[round]) == Some(JobState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(dispatcher.job_state(ids[round]), Some(JobState::Running));

        // Everyone behind the running job moved up by one per finished predecessor
        for (index, id) in ids.iter().enumerate().skip(round + 1) {
            assert_eq!(
                dispatcher.job_state(*id),
                Some(JobState::Queued {
                    position: index - round - 1
                })
            );
        }

        gate.send(()).unwrap();
        handle.await.unwrap();
    }
    assert_eq!(dispatcher.stats().completed, 5);
}

#[tokio::test]
async fn closed_pipeline_reports_busy() {
    let pipeline = GenerationPipeline::new(
        Arc::new(QueueDispatcher::new(QueueConfig::default())),
        Arc::new(ScriptedProvider::new(Vec::new())),
        StatusReporter::default(),
    );
    pipeline.shutdown().await;

    let err = pipeline
        .generate("u1", GenerationRequest::new(ContentKind::Item, "a ring"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Dispatch(_)));
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(err.http_status(), 503);
}
