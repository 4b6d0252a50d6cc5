//! Vision consultation stage
//!
//! **[DRX-VIS-010]** Builds a deterministic prompt from the intake result,
//! submits it to the external vision model, and parses the free-text reply.
//! Every failure mode (transport error, timeout, unparseable reply)
//! degrades to a fallback that mirrors the upstream grade, so a broken LLM
//! integration produces agreement rather than an arbitrary grade.

use crate::llm::VisionModel;
use crate::models::{GradingResult, VisionReply, VisionResult};
use drdx_common::Grade;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

/// Confidence assigned to the fallback result
const FALLBACK_CONFIDENCE: f64 = 0.7;

/// Build the consultation prompt for one grading result
///
/// Deterministic: the same grading result always yields the same prompt.
/// Embeds the full five-level rubric and the upstream grade, and pins the
/// JSON reply contract.
pub fn build_prompt(grading: &GradingResult) -> String {
    let mut prompt = String::from(
        "Analyze the diabetic retinopathy fundus image and assign a lesion grade.\n\
         \n\
         Grading scale:\n",
    );
    for grade in Grade::ALL {
        prompt.push_str(&format!("Grade {} - {}\n", grade, grade.description()));
    }
    prompt.push_str(&format!(
        "\nCurrent grading model result: grade {}\n\
         \n\
         Reply with JSON only:\n\
         {{\n\
             \"predicted_grade\": <grade number>,\n\
             \"confidence\": <confidence 0-1>,\n\
             \"key_findings\": [\"finding\"],\n\
             \"rationale\": \"reasoning\"\n\
         }}\n",
        grading.grade
    ));
    prompt
}

/// Parse a free-text reply into the structured contract
///
/// Tries a direct decode first, then salvages the span from the first `{`
/// to the last `}` to cope with fenced or prefixed replies. `None` means
/// the reply is unusable and the fallback applies.
pub fn parse_reply(text: &str) -> Option<VisionReply> {
    if let Ok(reply) = serde_json::from_str::<VisionReply>(text.trim()) {
        return Some(reply);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<VisionReply>(&text[start..=end]).ok()
}

/// The grading-mirroring fallback result
pub fn fallback(grading: &GradingResult) -> VisionResult {
    VisionResult {
        predicted_grade: grading.grade,
        confidence: FALLBACK_CONFIDENCE,
        findings: vec!["visual analysis completed".to_string()],
        rationale: "feature-based analysis".to_string(),
    }
}

/// Outcome of one consultation: the result plus the fallback reason, if any
#[derive(Debug)]
pub struct ConsultationOutcome {
    /// Always well-formed; the fallback on any failure
    pub result: VisionResult,
    /// Why the fallback engaged, when it did
    pub fell_back: Option<String>,
}

/// Run the consultation against `model` with a whole-call budget
///
/// Never fails past this boundary. Cancellation is the orchestrator's
/// concern; it races this future against the session's token.
pub async fn consult(
    model: &dyn VisionModel,
    grading: &GradingResult,
    budget: Duration,
) -> ConsultationOutcome {
    let prompt = build_prompt(grading);

    let reply = match tokio::time::timeout(budget, model.consult(&prompt)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "Vision model call failed, using fallback");
            return ConsultationOutcome {
                result: fallback(grading),
                fell_back: Some(format!("vision model call failed: {}", e)),
            };
        }
        Err(_) => {
            warn!(budget_secs = budget.as_secs(), "Vision model call timed out, using fallback");
            return ConsultationOutcome {
                result: fallback(grading),
                fell_back: Some(format!(
                    "vision model call exceeded {}s budget",
                    budget.as_secs()
                )),
            };
        }
    };

    match parse_reply(&reply) {
        Some(parsed) => {
            debug!(predicted_grade = %parsed.predicted_grade, "Vision reply parsed");
            ConsultationOutcome {
                result: VisionResult {
                    predicted_grade: parsed.predicted_grade,
                    confidence: parsed.confidence,
                    findings: parsed.key_findings,
                    rationale: parsed.rationale,
                },
                fell_back: None,
            }
        }
        None => {
            warn!("Vision reply was not parseable as the JSON contract, using fallback");
            ConsultationOutcome {
                result: fallback(grading),
                fell_back: Some("vision reply did not match the JSON contract".to_string()),
            }
        }
    }
}

/// A vision opinion in either of its two shapes
///
/// Structured replies carry the grade directly; raw text is scanned for a
/// digit following the "grade" label.
#[derive(Debug, Clone, PartialEq)]
pub enum VisionOutput {
    /// Parsed JSON reply
    Structured(VisionReply),
    /// Unstructured text
    Raw(String),
}

static GRADE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)grade[\s:：]*([0-4])").expect("grade label pattern"));

impl VisionOutput {
    /// Extract the predicted grade; total over both shapes
    ///
    /// Raw text without a matching label token (or with only out-of-scale
    /// digits after it) yields grade 0.
    pub fn grade(&self) -> Grade {
        match self {
            VisionOutput::Structured(reply) => reply.predicted_grade,
            VisionOutput::Raw(text) => GRADE_LABEL
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u8>().ok())
                .and_then(|raw| Grade::try_from(raw).ok())
                .unwrap_or(Grade::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientInfo;

    fn grading(grade: Grade) -> GradingResult {
        GradingResult {
            grade,
            confidence: 85.0,
            image_path: "/data/retina/x.jpg".to_string(),
            patient_info: PatientInfo::default(),
        }
    }

    #[test]
    fn prompt_is_deterministic_and_embeds_rubric_and_grade() {
        let g = grading(Grade::Severe);
        let a = build_prompt(&g);
        let b = build_prompt(&g);
        assert_eq!(a, b);
        assert!(a.contains("Grade 0 - No diabetic retinopathy"));
        assert!(a.contains("Grade 4 - Proliferative diabetic retinopathy (PDR)"));
        assert!(a.contains("Current grading model result: grade 3"));
        assert!(a.contains("predicted_grade"));
    }

    #[test]
    fn direct_json_reply_parses() {
        let reply = parse_reply(
            r#"{"predicted_grade": 2, "confidence": 0.9, "key_findings": ["microaneurysms"], "rationale": "typical moderate NPDR"}"#,
        )
        .unwrap();
        assert_eq!(reply.predicted_grade, Grade::Moderate);
        assert_eq!(reply.key_findings, vec!["microaneurysms"]);
    }

    #[test]
    fn fenced_reply_is_salvaged() {
        let text = "Here is my assessment:\n```json\n{\"predicted_grade\": 3, \"confidence\": 0.8}\n```\nLet me know.";
        let reply = parse_reply(text).unwrap();
        assert_eq!(reply.predicted_grade, Grade::Severe);
        assert!(reply.key_findings.is_empty());
    }

    #[test]
    fn unusable_reply_yields_none() {
        assert!(parse_reply("I cannot analyze this image.").is_none());
        assert!(parse_reply("{broken json").is_none());
        assert!(parse_reply(r#"{"predicted_grade": 11}"#).is_none());
    }

    #[test]
    fn fallback_mirrors_upstream_grade() {
        let result = fallback(&grading(Grade::Severe));
        assert_eq!(result.predicted_grade, Grade::Severe);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.findings, vec!["visual analysis completed"]);
        assert_eq!(result.rationale, "feature-based analysis");
    }

    #[test]
    fn raw_text_grade_extraction_finds_labeled_digit() {
        let output = VisionOutput::Raw("assessment: grade 3, severe NPDR".to_string());
        assert_eq!(output.grade(), Grade::Severe);

        let colon = VisionOutput::Raw("Grade: 2".to_string());
        assert_eq!(colon.grade(), Grade::Moderate);
    }

    #[test]
    fn raw_text_without_label_defaults_to_zero() {
        let output = VisionOutput::Raw("no retinopathy visible, level 3 lighting".to_string());
        assert_eq!(output.grade(), Grade::None);
    }

    #[test]
    fn out_of_scale_digit_after_label_does_not_match() {
        let output = VisionOutput::Raw("grade 7 is not a thing".to_string());
        assert_eq!(output.grade(), Grade::None);
        // A later in-scale label still matches
        let mixed = VisionOutput::Raw("grade 9 nonsense, revised grade 1".to_string());
        assert_eq!(mixed.grade(), Grade::Mild);
    }

    #[test]
    fn structured_output_reads_grade_directly() {
        let output = VisionOutput::Structured(VisionReply {
            predicted_grade: Grade::Proliferative,
            confidence: 0.95,
            key_findings: vec![],
            rationale: String::new(),
        });
        assert_eq!(output.grade(), Grade::Proliferative);
    }
}
