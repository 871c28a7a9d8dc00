//! Pure grade and attendance computations over already-fetched records.
//!
//! Data flows one way: item scores feed assessment percentages, which feed
//! the term/final resolver. Attendance aggregation is independent.

pub mod assessment;
pub mod attendance;
pub mod class_stats;
pub mod grades;
pub mod scorer;

pub use assessment::{
    aggregate_assessment, aggregate_assessments, canonical_term, validate_assessment,
    validate_item, AssessmentDraft, AssessmentResult,
};
pub use attendance::{
    monthly_trend, records_in_month, summarize, summarize_by_class, AttendanceBreakdown,
    AttendanceCounts, AttendanceFilter, AttendanceRates, AttendanceSummary, MonthlyAttendance,
};
pub use class_stats::{class_stats, ClassStats, GradeDistribution, RankedStudent, TopPerformers};
pub use grades::{
    general_weighted_average, grade_to_percentage, percentage_to_grade, resolve_final_grade,
    GradeInputs, GradeMode, GradeStanding, ResolvedGrade,
};
pub use scorer::{score_item, ItemScore, StudentRef};

pub fn clamp_percent(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Decimal places every reported percentage is held to.
pub const PERCENT_PLACES: i32 = 2;

/// Half-away-from-zero rounding to `places` decimals, for display values.
pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (x * factor).round() / factor
}

/// Clamps and rounds a percentage to [`PERCENT_PLACES`]. Grade lookups use
/// this value so that a ratio landing exactly on a table boundary is not
/// pushed below it by binary float error.
pub fn quantize_percent(x: f64) -> f64 {
    round_to(clamp_percent(x), PERCENT_PLACES)
}
