//! Diabetic retinopathy grading scale
//!
//! **[DRX-GRADE-010]** Every grade in the pipeline is one of five ordinal
//! levels, 0 (no retinopathy) through 4 (proliferative). Out-of-range wire
//! values are rejected at the deserialization boundary, so downstream
//! components never see an invalid grade.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Five-level ordinal retinopathy grade
///
/// Serialized as a bare JSON integer (`0`..`4`) to match the upstream
/// classifier and LLM wire contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    /// Grade 0 - no retinopathy
    None,
    /// Grade 1 - mild non-proliferative DR
    Mild,
    /// Grade 2 - moderate non-proliferative DR
    Moderate,
    /// Grade 3 - severe non-proliferative DR
    Severe,
    /// Grade 4 - proliferative DR
    Proliferative,
}

impl Grade {
    /// All grades in ascending severity order
    pub const ALL: [Grade; 5] = [
        Grade::None,
        Grade::Mild,
        Grade::Moderate,
        Grade::Severe,
        Grade::Proliferative,
    ];

    /// Numeric value on the 0-4 clinical scale
    pub fn value(self) -> u8 {
        match self {
            Grade::None => 0,
            Grade::Mild => 1,
            Grade::Moderate => 2,
            Grade::Severe => 3,
            Grade::Proliferative => 4,
        }
    }

    /// Fixed clinical description used in prompts and reports
    pub fn description(self) -> &'static str {
        match self {
            Grade::None => "No diabetic retinopathy",
            Grade::Mild => "Mild non-proliferative diabetic retinopathy (mild NPDR)",
            Grade::Moderate => "Moderate non-proliferative diabetic retinopathy (moderate NPDR)",
            Grade::Severe => "Severe non-proliferative diabetic retinopathy (severe NPDR)",
            Grade::Proliferative => "Proliferative diabetic retinopathy (PDR)",
        }
    }

    /// Severity band for report rendering
    ///
    /// **[DRX-RPT-020]** Fixed thresholds: 0 none, 1-2 low-to-moderate,
    /// 3 high, 4 very high.
    pub fn severity(self) -> Severity {
        match self {
            Grade::None => Severity::None,
            Grade::Mild | Grade::Moderate => Severity::LowToModerate,
            Grade::Severe => Severity::High,
            Grade::Proliferative => Severity::VeryHigh,
        }
    }
}

impl TryFrom<u8> for Grade {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Grade::None),
            1 => Ok(Grade::Mild),
            2 => Ok(Grade::Moderate),
            3 => Ok(Grade::Severe),
            4 => Ok(Grade::Proliferative),
            other => Err(crate::Error::InvalidInput(format!(
                "grade {} outside the 0-4 clinical scale",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Grade::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Clinical severity band derived from the final grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    LowToModerate,
    High,
    VeryHigh,
}

impl Severity {
    /// Human-readable label for report rendering
    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "No risk",
            Severity::LowToModerate => "Low to moderate risk",
            Severity::High => "High risk",
            Severity::VeryHigh => "Very high risk",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_round_trips_through_value() {
        for grade in Grade::ALL {
            assert_eq!(Grade::try_from(grade.value()).unwrap(), grade);
        }
    }

    #[test]
    fn out_of_range_grade_is_rejected() {
        assert!(Grade::try_from(5).is_err());
        assert!(Grade::try_from(255).is_err());
    }

    #[test]
    fn grade_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Grade::Severe).unwrap(), "3");
        let parsed: Grade = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Grade::Moderate);
    }

    #[test]
    fn wire_value_outside_scale_fails_deserialization() {
        assert!(serde_json::from_str::<Grade>("7").is_err());
        assert!(serde_json::from_str::<Grade>("-1").is_err());
    }

    #[test]
    fn severity_thresholds() {
        assert_eq!(Grade::None.severity(), Severity::None);
        assert_eq!(Grade::Mild.severity(), Severity::LowToModerate);
        assert_eq!(Grade::Moderate.severity(), Severity::LowToModerate);
        assert_eq!(Grade::Severe.severity(), Severity::High);
        assert_eq!(Grade::Proliferative.severity(), Severity::VeryHigh);
    }
}
