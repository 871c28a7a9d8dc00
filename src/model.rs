use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub class_id: String,
    pub term: String,
    pub weight_percent: f64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub id: String,
    pub assessment_id: String,
    pub name: String,
    pub max_score: f64,
}

/// A recorded score. `total_score` overrides the item's `max_score` when
/// present and nonzero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub student_id: String,
    pub assessment_item_id: String,
    pub student_class_id: String,
    pub points: f64,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Professor-entered term and final grades, on the 1.0-5.0 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGrade {
    pub student_id: String,
    pub student_class_id: String,
    #[serde(default)]
    pub prelim: Option<f64>,
    #[serde(default)]
    pub midterm: Option<f64>,
    #[serde(default)]
    pub final_term: Option<f64>,
    #[serde(default)]
    pub final_grade: Option<f64>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl FinalGrade {
    pub fn has_values(&self) -> bool {
        self.prelim.is_some()
            || self.midterm.is_some()
            || self.final_term.is_some()
            || self.final_grade.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Identifies one student's enrollment in one class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_class_id: String,
    pub student_id: String,
    pub class_id: String,
}
