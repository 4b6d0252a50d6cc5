//! Supervisor routing state machine
//!
//! **[DRX-WF-030]** Pure decision function over the session; executes no
//! stage logic itself. The successor table is the single source of truth
//! for stage ordering.

use crate::models::{DiagnosisSession, DiagnosisStage};

/// Decide which stage runs next for `session`
///
/// - A populated `final_report` always routes to `DONE`, so re-invoking a
///   finished session is a no-op.
/// - An unset stage routes to `GRADING_ANALYSIS` (session bootstrap).
/// - Otherwise the fixed successor table applies; any stage without a
///   successor resolves to `OTHER`, which the orchestrator treats as
///   terminal rather than re-entering the loop.
pub fn decide_next(session: &DiagnosisSession) -> DiagnosisStage {
    if session.final_report.is_some() {
        return DiagnosisStage::Done;
    }

    let Some(current) = session.current_stage else {
        return DiagnosisStage::GradingAnalysis;
    };

    successor(current).unwrap_or(DiagnosisStage::Other)
}

/// Fixed successor table for the forward pipeline
fn successor(stage: DiagnosisStage) -> Option<DiagnosisStage> {
    match stage {
        DiagnosisStage::GradingAnalysis => Some(DiagnosisStage::VisionAnalysis),
        DiagnosisStage::VisionAnalysis => Some(DiagnosisStage::Integration),
        DiagnosisStage::Integration => Some(DiagnosisStage::KnowledgeQuery),
        DiagnosisStage::KnowledgeQuery => Some(DiagnosisStage::ReportGeneration),
        DiagnosisStage::ReportGeneration => Some(DiagnosisStage::Done),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagnosisSession;

    #[test]
    fn unset_stage_bootstraps_to_grading_analysis() {
        let session = DiagnosisSession::new("payload");
        assert_eq!(decide_next(&session), DiagnosisStage::GradingAnalysis);
    }

    #[test]
    fn successor_table_walk() {
        let mut session = DiagnosisSession::new("payload");
        let walk = [
            (DiagnosisStage::GradingAnalysis, DiagnosisStage::VisionAnalysis),
            (DiagnosisStage::VisionAnalysis, DiagnosisStage::Integration),
            (DiagnosisStage::Integration, DiagnosisStage::KnowledgeQuery),
            (DiagnosisStage::KnowledgeQuery, DiagnosisStage::ReportGeneration),
            (DiagnosisStage::ReportGeneration, DiagnosisStage::Done),
        ];
        for (current, expected) in walk {
            session.current_stage = Some(current);
            assert_eq!(decide_next(&session), expected);
        }
    }

    #[test]
    fn unrouted_stages_resolve_to_other() {
        let mut session = DiagnosisSession::new("payload");
        for stage in [
            DiagnosisStage::Other,
            DiagnosisStage::Cancelled,
            DiagnosisStage::Failed,
            DiagnosisStage::Done,
        ] {
            session.current_stage = Some(stage);
            assert_eq!(decide_next(&session), DiagnosisStage::Other);
        }
    }

    #[test]
    fn populated_report_routes_to_done_regardless_of_stage() {
        use crate::stages::{integration, knowledge, report};
        use crate::models::GradingResult;
        use crate::models::VisionResult;
        use drdx_common::Grade;

        let mut session = DiagnosisSession::new("payload");
        let grading = GradingResult {
            grade: Grade::Mild,
            confidence: 90.0,
            image_path: String::new(),
            patient_info: Default::default(),
        };
        let vision = VisionResult {
            predicted_grade: Grade::Mild,
            confidence: 0.9,
            findings: vec![],
            rationale: String::new(),
        };
        let integrated = integration::fuse(&grading, &vision);
        let recommendations = knowledge::recommend(integrated.final_grade);
        let assembled =
            report::assemble(&integrated, session.patient_info.clone(), recommendations);
        session.record_report(assembled).unwrap();

        session.current_stage = Some(DiagnosisStage::Integration);
        assert_eq!(decide_next(&session), DiagnosisStage::Done);
        // Idempotent: deciding again changes nothing
        assert_eq!(decide_next(&session), DiagnosisStage::Done);
    }
}
