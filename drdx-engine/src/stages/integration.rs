//! Ensemble fusion stage
//!
//! **[DRX-FUS-010]** Combines the numeric classifier grade and the vision
//! opinion into one final grade under confidence weighting. Pure and
//! deterministic; the closed `Grade` enum guarantees no out-of-scale value
//! can reach this stage.

use crate::models::{ConfidenceScores, GradingResult, IntegratedResult, ModelWeights, VisionResult};
use drdx_common::Grade;

/// Configured ensemble weights
///
/// Not required to sum to 1 by construction, though this pair does.
/// Altering either weight requires re-validating the fused score range:
/// final-grade clamping assumes `weighted_score` stays within roughly
/// [0, 4].
pub const MODEL_WEIGHTS: ModelWeights = ModelWeights {
    grading: 0.6,
    vision: 0.4,
};

/// Fixed confidence applied to the vision opinion
///
/// The vision model's self-reported confidence is deliberately not
/// trusted; fusion always uses this constant.
pub const VISION_CONFIDENCE: f64 = 0.8;

/// Fuse the two grade estimates into one `IntegratedResult`
///
/// `weighted_score = grading * w_g * (confidence/100) + vision * w_v * 0.8`;
/// the final grade is the score rounded half-to-even and clamped to the
/// 0-4 scale. Agreement is computed on the raw grades, independent of the
/// fused score.
pub fn fuse(grading: &GradingResult, vision: &VisionResult) -> IntegratedResult {
    let grading_confidence = (grading.confidence / 100.0).clamp(0.0, 1.0);

    let weighted_score = f64::from(grading.grade.value()) * MODEL_WEIGHTS.grading * grading_confidence
        + f64::from(vision.predicted_grade.value()) * MODEL_WEIGHTS.vision * VISION_CONFIDENCE;

    IntegratedResult {
        final_grade: grade_from_score(weighted_score),
        grading_grade: grading.grade,
        vision_grade: vision.predicted_grade,
        confidence_scores: ConfidenceScores {
            grading: grading_confidence,
            vision: VISION_CONFIDENCE,
        },
        weighted_score,
        model_weights: MODEL_WEIGHTS,
        agreement: grading.grade == vision.predicted_grade,
    }
}

/// Round half-to-even and clamp onto the closed grade scale
fn grade_from_score(score: f64) -> Grade {
    match score.round_ties_even().clamp(0.0, 4.0) as i64 {
        0 => Grade::None,
        1 => Grade::Mild,
        2 => Grade::Moderate,
        3 => Grade::Severe,
        _ => Grade::Proliferative,
    }
}
