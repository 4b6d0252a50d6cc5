//! Recommendation lookup stage
//!
//! **[DRX-REC-010]** Pure, total lookup from final grade to the fixed
//! clinical-guidance table. No error path: the closed `Grade` enum means
//! every possible input has an entry. Follow-up intervals tighten
//! monotonically with severity.

use crate::models::{ClinicalTargets, RecommendationSet};
use drdx_common::Grade;

/// Treatment guidance for one final grade
pub fn recommend(grade: Grade) -> RecommendationSet {
    let (medications, procedures, lifestyle, followup_interval, patient_education) = match grade {
        Grade::None => (
            vec![],
            vec![],
            vec![
                "Strict glycemic control".to_string(),
                "Healthy diet".to_string(),
                "Regular exercise".to_string(),
            ],
            "12 months".to_string(),
            vec![
                "Schedule regular ophthalmic examinations".to_string(),
                "Keep blood glucose and blood pressure controlled".to_string(),
            ],
        ),
        Grade::Mild => (
            vec!["Calcium dobesilate".to_string()],
            vec![],
            vec![
                "Strict glycemic control".to_string(),
                "Control blood pressure and lipids".to_string(),
            ],
            "6-12 months".to_string(),
            vec![],
        ),
        Grade::Moderate => (
            vec![
                "Calcium dobesilate".to_string(),
                "Microcirculation-improving agents".to_string(),
            ],
            vec!["Evaluate need for laser photocoagulation".to_string()],
            vec![],
            "4-6 months".to_string(),
            vec![],
        ),
        Grade::Severe => (
            vec![],
            vec![
                "Panretinal photocoagulation".to_string(),
                "Evaluate anti-VEGF therapy".to_string(),
            ],
            vec![],
            "3-4 months".to_string(),
            vec!["High-risk status; timely intervention is required".to_string()],
        ),
        Grade::Proliferative => (
            vec![],
            vec![
                "Urgent panretinal photocoagulation".to_string(),
                "Evaluate vitrectomy".to_string(),
            ],
            vec![],
            "1 month or immediate follow-up".to_string(),
            vec!["Emergency status; risk of vision loss".to_string()],
        ),
    };

    RecommendationSet {
        medications,
        procedures,
        lifestyle,
        followup_interval,
        next_exams: vec![
            "Visual acuity test".to_string(),
            "Fundus photography".to_string(),
            "OCT examination".to_string(),
        ],
        targets: ClinicalTargets {
            hba1c: "<7.0%".to_string(),
            blood_pressure: "<130/80 mmHg".to_string(),
        },
        patient_education,
        warning_signs: vec![
            "Sudden vision loss".to_string(),
            "Visual distortion".to_string(),
            "Floaters or dark shadows".to_string(),
        ],
    }
}
