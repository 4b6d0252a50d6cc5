//! Workflow orchestration tests
//!
//! End-to-end runs of the supervisor-driven stage loop against mock
//! vision models: the reference scenario, recovery paths, idempotence,
//! cancellation, and the OTHER terminal trap.

mod helpers;

use drdx_common::events::{DiagnosisEvent, EventBus};
use drdx_common::{Grade, Severity};
use drdx_engine::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use drdx_engine::llm::VisionModel;
use drdx_engine::models::DiagnosisStage;
use drdx_engine::stages::orchestrator::Orchestrator;
use helpers::{agreeing_vision_reply, moderate_payload, FailingVision, ScriptedVision};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn orchestrator_with(
    model: Arc<dyn VisionModel>,
) -> (Orchestrator, Arc<MemoryCheckpointStore>, EventBus) {
    let store = Arc::new(MemoryCheckpointStore::new());
    let bus = EventBus::new(64);
    let orchestrator = Orchestrator::new(
        store.clone(),
        bus.clone(),
        model,
        Duration::from_secs(5),
    );
    (orchestrator, store, bus)
}

/// TC-WF-001: Reference scenario end to end
///
/// Given grade 2 at 85% and an agreeing vision reply, the session reaches
/// DONE with final grade 2, agreement, low-to-moderate severity and the
/// 4-6 month follow-up interval.
#[tokio::test]
async fn tc_wf_001_end_to_end_moderate_agreement() {
    let model = Arc::new(ScriptedVision::new(agreeing_vision_reply()));
    let (orchestrator, _store, _bus) = orchestrator_with(model);

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let done = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(done.current_stage, Some(DiagnosisStage::Done));
    let report = done.final_report.as_ref().unwrap();
    assert_eq!(report.summary.grade, Grade::Moderate);
    assert_eq!(report.summary.severity, Severity::LowToModerate);
    assert!(report.model_analysis.agreement);
    assert_eq!(report.recommendations.followup_interval, "4-6 months");
    assert_eq!(report.patient_info.age, Some(58));

    // The rendered report is appended to the message log, never replacing
    // the bootstrap payload
    assert_eq!(done.messages.len(), 2);
    assert!(done.messages[1]
        .content
        .contains("Diabetic Retinopathy Diagnosis Report"));
}

/// TC-WF-002: Stage outputs are observed in the fixed topological order
#[tokio::test]
async fn tc_wf_002_stage_events_in_order() {
    let model = Arc::new(ScriptedVision::new(agreeing_vision_reply()));
    let (orchestrator, _store, bus) = orchestrator_with(model);
    let mut rx = bus.subscribe();

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();

    let mut stages = Vec::new();
    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            DiagnosisEvent::StageCompleted { stage, .. } => stages.push(stage),
            DiagnosisEvent::DiagnosisCompleted {
                final_grade,
                agreement,
                ..
            } => {
                completed = true;
                assert_eq!(final_grade, Grade::Moderate);
                assert!(agreement);
            }
            _ => {}
        }
    }
    assert_eq!(
        stages,
        vec![
            "GRADING_ANALYSIS",
            "VISION_ANALYSIS",
            "INTEGRATION",
            "KNOWLEDGE_QUERY",
            "REPORT_GENERATION",
        ]
    );
    assert!(completed);
}

/// TC-WF-003: Re-running a finished session is a no-op
///
/// The vision model's call counter shows no stage re-ran, and the report
/// is byte-identical to the first run's.
#[tokio::test]
async fn tc_wf_003_idempotent_rerun() {
    let model = ScriptedVision::new(agreeing_vision_reply());
    let calls = model.call_counter();
    let (orchestrator, _store, _bus) = orchestrator_with(Arc::new(model));

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let first = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.current_stage, Some(DiagnosisStage::Done));
    assert_eq!(
        first.final_report.as_ref().unwrap().generated_at,
        second.final_report.as_ref().unwrap().generated_at
    );
    assert_eq!(first.messages.len(), second.messages.len());
}

/// TC-WF-004: Malformed intake payload recovers with the zero default
#[tokio::test]
async fn tc_wf_004_intake_default_continues_session() {
    let model = Arc::new(FailingVision);
    let (orchestrator, _store, bus) = orchestrator_with(model);
    let mut rx = bus.subscribe();

    let session = orchestrator
        .create_session("definitely not json".to_string())
        .await
        .unwrap();
    let done = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();

    // Intake defaulted to grade 0, the vision fallback mirrored it, so the
    // fused grade is 0 with agreement
    assert_eq!(done.current_stage, Some(DiagnosisStage::Done));
    let report = done.final_report.as_ref().unwrap();
    assert_eq!(report.summary.grade, Grade::None);
    assert!(report.model_analysis.agreement);

    let mut saw_intake_default = false;
    let mut saw_vision_fallback = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            DiagnosisEvent::IntakeDefaulted { .. } => saw_intake_default = true,
            DiagnosisEvent::VisionFallback { .. } => saw_vision_fallback = true,
            _ => {}
        }
    }
    assert!(saw_intake_default);
    assert!(saw_vision_fallback);
}

/// TC-WF-005: Vision-service failure degrades to agreement, not an
/// arbitrary grade
#[tokio::test]
async fn tc_wf_005_vision_failure_mirrors_grading_grade() {
    let model = Arc::new(FailingVision);
    let (orchestrator, _store, _bus) = orchestrator_with(model);

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let done = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();

    let vision = done.vision_result.as_ref().unwrap();
    assert_eq!(vision.predicted_grade, Grade::Moderate);
    assert_eq!(vision.confidence, 0.7);
    assert!(done.final_report.as_ref().unwrap().model_analysis.agreement);
}

/// TC-WF-006: A hanging vision model is bounded by the call budget
#[tokio::test]
async fn tc_wf_006_vision_timeout_falls_back() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let bus = EventBus::new(64);
    let orchestrator = Orchestrator::new(
        store.clone(),
        bus,
        Arc::new(helpers::HangingVision),
        Duration::from_millis(50),
    );

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let done = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(done.current_stage, Some(DiagnosisStage::Done));
    assert_eq!(
        done.vision_result.as_ref().unwrap().predicted_grade,
        Grade::Moderate
    );
}

/// TC-WF-007: A cancelled token stops the workflow before any stage runs
#[tokio::test]
async fn tc_wf_007_pre_cancelled_session() {
    let model = ScriptedVision::new(agreeing_vision_reply());
    let calls = model.call_counter();
    let (orchestrator, store, _bus) = orchestrator_with(Arc::new(model));

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let result = orchestrator.run(session.session_id, token).await.unwrap();
    assert_eq!(result.current_stage, Some(DiagnosisStage::Cancelled));
    assert!(result.ended_at.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // The cancelled state is checkpointed
    let stored = store.get(session.session_id).await.unwrap().unwrap();
    assert_eq!(stored.current_stage, Some(DiagnosisStage::Cancelled));
}

/// TC-WF-008: Cancellation is honored at the LLM suspension point
#[tokio::test]
async fn tc_wf_008_cancel_during_vision_call() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let bus = EventBus::new(64);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        bus,
        Arc::new(helpers::HangingVision),
        Duration::from_secs(3600),
    ));

    let session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let token = CancellationToken::new();

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        let token = token.clone();
        tokio::spawn(async move { orchestrator.run(session.session_id, token).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.current_stage, Some(DiagnosisStage::Cancelled));
    // Grading intake completed before the cancel; its output survives
    assert!(result.grading_result.is_some());
    assert!(result.vision_result.is_none());
}

/// TC-WF-009: A session stranded in an unrouted stage terminates in OTHER
/// with a user-visible notice instead of looping
#[tokio::test]
async fn tc_wf_009_other_is_terminal_not_a_loop() {
    let model = Arc::new(ScriptedVision::new(agreeing_vision_reply()));
    let (orchestrator, store, _bus) = orchestrator_with(model);

    let mut session = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    session.current_stage = Some(DiagnosisStage::Failed);
    store.put(&session).await.unwrap();

    let result = orchestrator
        .run(session.session_id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.current_stage, Some(DiagnosisStage::Other));
    assert!(result.is_terminal());
    assert!(result
        .messages
        .last()
        .unwrap()
        .content
        .contains("cannot process this request"));
}

/// TC-WF-010: Unknown session id is a NotFound error
#[tokio::test]
async fn tc_wf_010_unknown_session_is_not_found() {
    let model = Arc::new(ScriptedVision::new(agreeing_vision_reply()));
    let (orchestrator, _store, _bus) = orchestrator_with(model);

    let result = orchestrator
        .run(uuid::Uuid::new_v4(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(drdx_common::Error::NotFound(_))));
}

/// TC-WF-011: Concurrent sessions are isolated from each other
#[tokio::test]
async fn tc_wf_011_concurrent_sessions_are_isolated() {
    let model = Arc::new(ScriptedVision::new(agreeing_vision_reply()));
    let store = Arc::new(MemoryCheckpointStore::new());
    let bus = EventBus::new(256);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        bus,
        model,
        Duration::from_secs(5),
    ));

    let severe_payload = r#"{"model_grade": 3, "confidence": 90, "image_path": "", "patient_info": {}}"#;
    let a = orchestrator
        .create_session(moderate_payload())
        .await
        .unwrap();
    let b = orchestrator
        .create_session(severe_payload.to_string())
        .await
        .unwrap();

    let run_a = {
        let o = Arc::clone(&orchestrator);
        tokio::spawn(async move { o.run(a.session_id, CancellationToken::new()).await })
    };
    let run_b = {
        let o = Arc::clone(&orchestrator);
        tokio::spawn(async move { o.run(b.session_id, CancellationToken::new()).await })
    };

    let done_a = run_a.await.unwrap().unwrap();
    let done_b = run_b.await.unwrap().unwrap();

    assert_eq!(
        done_a.grading_result.as_ref().unwrap().grade,
        Grade::Moderate
    );
    assert_eq!(done_b.grading_result.as_ref().unwrap().grade, Grade::Severe);
    // Vision replied grade 2 for both; session B disagrees
    assert!(done_a.final_report.as_ref().unwrap().model_analysis.agreement);
    assert!(!done_b.final_report.as_ref().unwrap().model_analysis.agreement);
}
