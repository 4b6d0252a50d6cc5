//! Report assembly stage
//!
//! **[DRX-RPT-010]** Composes the structured `DiagnosisReport` from the
//! fusion output and renders the deterministic human-readable form. The
//! rendering omits empty medication/procedure lines rather than printing
//! empty bullets.

use crate::models::{
    DiagnosisReport, DiagnosisSummary, IntegratedResult, ModelAnalysis, PatientInfo,
    RecommendationSet,
};
use chrono::Utc;

/// Assemble the terminal report artifact
pub fn assemble(
    integrated: &IntegratedResult,
    patient_info: PatientInfo,
    recommendations: RecommendationSet,
) -> DiagnosisReport {
    DiagnosisReport {
        summary: DiagnosisSummary {
            grade: integrated.final_grade,
            description: integrated.final_grade.description().to_string(),
            severity: integrated.final_grade.severity(),
        },
        model_analysis: ModelAnalysis {
            grading_grade: integrated.grading_grade,
            vision_grade: integrated.vision_grade,
            agreement: integrated.agreement,
            confidence_scores: integrated.confidence_scores,
        },
        recommendations,
        patient_info,
        generated_at: Utc::now(),
    }
}

/// Render the report as Markdown, section by section
pub fn render(report: &DiagnosisReport) -> String {
    let summary = &report.summary;
    let analysis = &report.model_analysis;
    let recommendations = &report.recommendations;

    let mut text = String::from("## Diabetic Retinopathy Diagnosis Report\n\n");

    text.push_str("### Diagnosis Summary\n");
    text.push_str(&format!(
        "- **Lesion grade**: grade {} ({})\n",
        summary.grade, summary.description
    ));
    text.push_str(&format!("- **Severity**: {}\n\n", summary.severity.label()));

    text.push_str("### Model Analysis\n");
    text.push_str(&format!(
        "- **Grading model**: grade {}\n",
        analysis.grading_grade
    ));
    text.push_str(&format!(
        "- **Vision analysis**: grade {}\n",
        analysis.vision_grade
    ));
    text.push_str(&format!(
        "- **Model agreement**: {}\n\n",
        if analysis.agreement {
            "consistent"
        } else {
            "inconsistent"
        }
    ));

    text.push_str("### Treatment Recommendations\n");
    if !recommendations.medications.is_empty() {
        text.push_str(&format!(
            "- **Medication**: {}\n",
            recommendations.medications.join(", ")
        ));
    }
    if !recommendations.procedures.is_empty() {
        text.push_str(&format!(
            "- **Procedures**: {}\n",
            recommendations.procedures.join(", ")
        ));
    }
    text.push_str(&format!(
        "- **Follow-up interval**: {}\n",
        recommendations.followup_interval
    ));
    text.push_str(&format!(
        "- **Glycemic target**: {}\n\n",
        recommendations.targets.hba1c
    ));

    text.push_str("---\n*This report was generated by an AI system and is for reference only*");
    text
}
