use super::assessment::{aggregate_assessments, AssessmentResult};
use super::scorer::StudentRef;
use super::quantize_percent;
use crate::model::{Assessment, AssessmentItem, FinalGrade, Score};
use serde::Serialize;
use std::collections::BTreeMap;

pub const BEST_GRADE: f64 = 1.0;
pub const WORST_GRADE: f64 = 5.0;
pub const DEFAULT_PASSING_GRADE: f64 = 3.0;

/// Philippine scale, `(minimum percentage, grade)` from best to worst.
const GRADE_SCALE: [(f64, f64); 16] = [
    (96.0, 1.00),
    (94.0, 1.25),
    (92.0, 1.50),
    (90.0, 1.75),
    (87.0, 2.00),
    (84.0, 2.25),
    (81.0, 2.50),
    (78.0, 2.75),
    (75.0, 3.00),
    (72.0, 3.25),
    (69.0, 3.50),
    (66.0, 3.75),
    (63.0, 4.00),
    (60.0, 4.25),
    (55.0, 4.50),
    (50.0, 4.75),
];

/// Step conversion from a percentage to the 1.0-5.0 scale. This table is
/// the grading authority.
pub fn percentage_to_grade(percentage: f64) -> f64 {
    GRADE_SCALE
        .iter()
        .find(|(min, _)| percentage >= *min)
        .map(|(_, grade)| *grade)
        .unwrap_or(WORST_GRADE)
}

/// Linear display scaling from a grade back to a percentage (1.0 => 100,
/// 5.0 => 50). Not the inverse of [`percentage_to_grade`].
pub fn grade_to_percentage(grade: f64) -> f64 {
    (100.0 - ((grade - BEST_GRADE) / 4.0) * 50.0).clamp(50.0, 100.0)
}

pub fn is_valid_grade(grade: f64) -> bool {
    grade.is_finite() && (BEST_GRADE..=WORST_GRADE).contains(&grade)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeStanding {
    Excellent,
    VeryGood,
    Good,
    Satisfactory,
    Conditional,
    Failing,
}

impl GradeStanding {
    pub fn from_grade(grade: f64) -> Self {
        if grade <= 1.5 {
            GradeStanding::Excellent
        } else if grade <= 2.0 {
            GradeStanding::VeryGood
        } else if grade <= 2.5 {
            GradeStanding::Good
        } else if grade <= 3.0 {
            GradeStanding::Satisfactory
        } else if grade <= 4.0 {
            GradeStanding::Conditional
        } else {
            GradeStanding::Failing
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeStanding::Excellent => "Excellent",
            GradeStanding::VeryGood => "Very Good",
            GradeStanding::Good => "Good",
            GradeStanding::Satisfactory => "Satisfactory",
            GradeStanding::Conditional => "Conditional",
            GradeStanding::Failing => "Failing",
        }
    }
}

pub fn derived_remarks(grade: f64, passing_grade: f64) -> &'static str {
    if grade <= passing_grade {
        "Passed"
    } else {
        "Failed"
    }
}

/// Weighted mean of assessment percentages: `sum(pct * w) / sum(w)` over
/// assessments that produced a percentage, quantized like every reported
/// percentage. Zero-weight assessments carry no influence; `None` when
/// nothing is left to average.
pub fn weighted_final_percentage(results: &[AssessmentResult]) -> Option<f64> {
    let mut contributing: Vec<(&str, f64, f64)> = results
        .iter()
        .filter_map(|r| r.percentage.map(|p| (r.assessment_id.as_str(), p, r.weight_percent)))
        .filter(|(_, _, w)| *w > 0.0)
        .collect();
    contributing.sort_by(|a, b| a.0.cmp(b.0));

    let (sum, weight) = contributing
        .iter()
        .fold((0.0_f64, 0.0_f64), |(s, w), (_, p, wt)| (s + p * wt, w + wt));
    if weight > 0.0 {
        Some(quantize_percent(sum / weight))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResult {
    pub term: String,
    pub weight_total: f64,
    pub percentage: Option<f64>,
    pub grade: Option<f64>,
}

pub fn term_breakdown(results: &[AssessmentResult]) -> Vec<TermResult> {
    let mut by_term: BTreeMap<&str, Vec<AssessmentResult>> = BTreeMap::new();
    for r in results {
        by_term.entry(r.term.as_str()).or_default().push(r.clone());
    }
    by_term
        .into_iter()
        .map(|(term, rs)| {
            let percentage = weighted_final_percentage(&rs);
            TermResult {
                term: term.to_string(),
                weight_total: rs.iter().map(|r| r.weight_percent).sum(),
                percentage,
                grade: percentage.map(percentage_to_grade),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeMode {
    Override,
    Derived,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGrade {
    pub student_id: String,
    pub student_class_id: String,
    pub mode: GradeMode,
    pub prelim: Option<f64>,
    pub midterm: Option<f64>,
    pub final_term: Option<f64>,
    pub final_percentage: Option<f64>,
    pub final_grade: Option<f64>,
    pub remarks: Option<String>,
    pub standing: Option<GradeStanding>,
    pub terms: Vec<TermResult>,
    pub assessments: Vec<AssessmentResult>,
}

/// Everything the resolver needs for one `(student, enrollment)` pair.
#[derive(Debug, Clone, Copy)]
pub struct GradeInputs<'a> {
    pub student: StudentRef<'a>,
    pub assessments: &'a [Assessment],
    pub items: &'a [AssessmentItem],
    pub scores: &'a [Score],
    pub final_grade: Option<&'a FinalGrade>,
    pub passing_grade: f64,
}

/// Professor overrides win as entered; otherwise the final grade is derived
/// from the weighted assessment percentages.
pub fn resolve_final_grade(inputs: GradeInputs<'_>) -> ResolvedGrade {
    let assessments = aggregate_assessments(
        inputs.assessments,
        inputs.items,
        inputs.scores,
        inputs.student,
    );
    let terms = term_breakdown(&assessments);
    let student_id = inputs.student.student_id.to_string();
    let student_class_id = inputs.student.student_class_id.to_string();

    if let Some(fg) = inputs.final_grade.filter(|fg| fg.has_values()) {
        return ResolvedGrade {
            student_id,
            student_class_id,
            mode: GradeMode::Override,
            prelim: fg.prelim,
            midterm: fg.midterm,
            final_term: fg.final_term,
            final_percentage: fg.final_grade.map(grade_to_percentage),
            final_grade: fg.final_grade,
            remarks: fg.remarks.clone().filter(|r| !r.trim().is_empty()),
            standing: fg.final_grade.map(GradeStanding::from_grade),
            terms,
            assessments,
        };
    }

    let Some(final_percentage) = weighted_final_percentage(&assessments) else {
        return ResolvedGrade {
            student_id,
            student_class_id,
            mode: GradeMode::NoData,
            prelim: None,
            midterm: None,
            final_term: None,
            final_percentage: None,
            final_grade: None,
            remarks: None,
            standing: None,
            terms,
            assessments,
        };
    };

    // Grade and reported percentage come from the same quantized value.
    let final_grade = percentage_to_grade(final_percentage);
    ResolvedGrade {
        student_id,
        student_class_id,
        mode: GradeMode::Derived,
        prelim: None,
        midterm: None,
        final_term: None,
        final_percentage: Some(final_percentage),
        final_grade: Some(final_grade),
        remarks: Some(derived_remarks(final_grade, inputs.passing_grade).to_string()),
        standing: Some(GradeStanding::from_grade(final_grade)),
        terms,
        assessments,
    }
}

/// Unweighted mean of the available final grades. Ungraded classes are
/// skipped; `None` when no class has a grade.
pub fn general_weighted_average<I>(grades: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = grades
        .into_iter()
        .flatten()
        .fold((0.0_f64, 0_usize), |(s, c), g| (s + g, c + 1));
    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENT: StudentRef<'static> = StudentRef {
        student_id: "s1",
        student_class_id: "sc1",
    };

    fn result(id: &str, term: &str, weight: f64, pct: Option<f64>) -> AssessmentResult {
        AssessmentResult {
            assessment_id: id.into(),
            name: id.into(),
            term: term.into(),
            weight_percent: weight,
            points: 0.0,
            possible: 0.0,
            percentage: pct,
            items: vec![],
        }
    }

    #[test]
    fn scale_boundaries() {
        assert_eq!(percentage_to_grade(96.0), 1.00);
        assert_eq!(percentage_to_grade(95.9), 1.25);
        assert_eq!(percentage_to_grade(100.0), 1.00);
        assert_eq!(percentage_to_grade(75.0), 3.00);
        assert_eq!(percentage_to_grade(74.99), 3.25);
        assert_eq!(percentage_to_grade(50.0), 4.75);
        assert_eq!(percentage_to_grade(49.0), 5.00);
        assert_eq!(percentage_to_grade(0.0), 5.00);
    }

    #[test]
    fn scale_is_monotonically_non_increasing() {
        let mut prev = percentage_to_grade(0.0);
        let mut p = 0.0;
        while p <= 100.0 {
            let g = percentage_to_grade(p);
            assert!(g <= prev, "grade rose at {p}: {g} > {prev}");
            assert!(is_valid_grade(g));
            prev = g;
            p += 0.25;
        }
    }

    #[test]
    fn linear_display_scaling_is_clamped() {
        assert_eq!(grade_to_percentage(1.0), 100.0);
        assert_eq!(grade_to_percentage(3.0), 75.0);
        assert_eq!(grade_to_percentage(5.0), 50.0);
        assert_eq!(grade_to_percentage(0.0), 100.0);
        assert_eq!(grade_to_percentage(7.0), 50.0);
        // Display scaling is deliberately not the step table's inverse.
        assert_eq!(percentage_to_grade(grade_to_percentage(1.25)), 1.00);
    }

    #[test]
    fn weighted_mean_of_two_assessments() {
        let rs = vec![
            result("a1", "midterm", 60.0, Some(80.0)),
            result("a2", "midterm", 40.0, Some(90.0)),
        ];
        let pct = weighted_final_percentage(&rs).unwrap();
        assert!((pct - 84.0).abs() < 1e-9);
        assert_eq!(percentage_to_grade(pct), 2.25);
    }

    #[test]
    fn unscorable_assessments_are_excluded_not_zeroed() {
        let rs = vec![
            result("a1", "midterm", 60.0, Some(80.0)),
            result("a2", "midterm", 40.0, None),
        ];
        assert_eq!(weighted_final_percentage(&rs), Some(80.0));
        assert_eq!(weighted_final_percentage(&rs[1..]), None);
    }

    #[test]
    fn terms_are_reported_separately() {
        let rs = vec![
            result("a1", "midterm", 100.0, Some(90.0)),
            result("a2", "final_term", 50.0, Some(70.0)),
            result("a3", "final_term", 50.0, None),
        ];
        let terms = term_breakdown(&rs);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "final_term");
        assert_eq!(terms[0].weight_total, 100.0);
        assert_eq!(terms[0].percentage, Some(70.0));
        assert_eq!(terms[0].grade, Some(3.50));
        assert_eq!(terms[1].grade, Some(1.75));
    }

    #[test]
    fn override_values_are_returned_as_entered() {
        let fg = FinalGrade {
            student_id: "s1".into(),
            student_class_id: "sc1".into(),
            prelim: Some(2.0),
            midterm: Some(1.75),
            final_term: None,
            final_grade: Some(1.5),
            remarks: Some("Good work".into()),
        };
        let r = resolve_final_grade(GradeInputs {
            student: STUDENT,
            assessments: &[],
            items: &[],
            scores: &[],
            final_grade: Some(&fg),
            passing_grade: DEFAULT_PASSING_GRADE,
        });
        assert_eq!(r.mode, GradeMode::Override);
        assert_eq!(r.final_grade, Some(1.5));
        assert_eq!(r.prelim, Some(2.0));
        assert_eq!(r.final_percentage, Some(93.75));
        assert_eq!(r.remarks.as_deref(), Some("Good work"));
        assert_eq!(r.standing, Some(GradeStanding::Excellent));
    }

    #[test]
    fn empty_override_row_falls_back_to_derived() {
        let fg = FinalGrade {
            student_id: "s1".into(),
            student_class_id: "sc1".into(),
            ..FinalGrade::default()
        };
        let assessments = vec![Assessment {
            id: "a1".into(),
            class_id: "c1".into(),
            term: "midterm".into(),
            weight_percent: 100.0,
            name: "Exam".into(),
        }];
        let items = vec![AssessmentItem {
            id: "i1".into(),
            assessment_id: "a1".into(),
            name: "Exam".into(),
            max_score: 50.0,
        }];
        let scores = vec![Score {
            student_id: "s1".into(),
            assessment_item_id: "i1".into(),
            student_class_id: "sc1".into(),
            points: 30.0,
            total_score: None,
            remarks: None,
        }];
        let inputs = GradeInputs {
            student: STUDENT,
            assessments: &assessments,
            items: &items,
            scores: &scores,
            final_grade: Some(&fg),
            passing_grade: DEFAULT_PASSING_GRADE,
        };
        let r = resolve_final_grade(inputs);
        assert_eq!(r.mode, GradeMode::Derived);
        assert_eq!(r.final_percentage, Some(60.0));
        assert_eq!(r.final_grade, Some(4.25));
        assert_eq!(r.remarks.as_deref(), Some("Failed"));
        assert_eq!(r.standing, Some(GradeStanding::Failing));
        assert_eq!(resolve_final_grade(inputs), r);
    }

    /// `(weight, [(max, points)])` per assessment, all in one term.
    fn derived_for(spec: &[(f64, Vec<(f64, f64)>)]) -> ResolvedGrade {
        let mut assessments = Vec::new();
        let mut items = Vec::new();
        let mut scores = Vec::new();
        for (a, (weight, marks)) in spec.iter().enumerate() {
            let assessment_id = format!("a{a}");
            assessments.push(Assessment {
                id: assessment_id.clone(),
                class_id: "c1".into(),
                term: "midterm".into(),
                weight_percent: *weight,
                name: format!("Assessment {a}"),
            });
            for (i, (max, points)) in marks.iter().enumerate() {
                let item_id = format!("{assessment_id}-i{i}");
                items.push(AssessmentItem {
                    id: item_id.clone(),
                    assessment_id: assessment_id.clone(),
                    name: item_id.clone(),
                    max_score: *max,
                });
                scores.push(Score {
                    student_id: "s1".into(),
                    assessment_item_id: item_id,
                    student_class_id: "sc1".into(),
                    points: *points,
                    total_score: None,
                    remarks: None,
                });
            }
        }
        resolve_final_grade(GradeInputs {
            student: STUDENT,
            assessments: &assessments,
            items: &items,
            scores: &scores,
            final_grade: None,
            passing_grade: DEFAULT_PASSING_GRADE,
        })
    }

    #[test]
    fn score_on_a_table_boundary_gets_that_boundarys_grade() {
        let r = derived_for(&[(100.0, vec![(10.0, 4.7), (10.0, 9.7)])]);
        assert_eq!(r.final_percentage, Some(72.0));
        assert_eq!(r.final_grade, Some(3.25));
        assert_eq!(r.terms[0].grade, Some(3.25));
    }

    #[test]
    fn reported_percentage_and_grade_agree() {
        let r = derived_for(&[(50.0, vec![(1000.0, 959.96)]), (50.0, vec![(1000.0, 960.0)])]);
        assert_eq!(r.final_percentage, Some(96.0));
        assert_eq!(r.final_grade, Some(1.0));

        let r = derived_for(&[(50.0, vec![(100.0, 95.99)]), (50.0, vec![(100.0, 96.0)])]);
        let pct = r.final_percentage.expect("derived percentage");
        assert_eq!(r.final_grade, Some(percentage_to_grade(pct)));
    }

    #[test]
    fn no_assessments_and_no_override_is_no_data() {
        let r = resolve_final_grade(GradeInputs {
            student: STUDENT,
            assessments: &[],
            items: &[],
            scores: &[],
            final_grade: None,
            passing_grade: DEFAULT_PASSING_GRADE,
        });
        assert_eq!(r.mode, GradeMode::NoData);
        assert_eq!(r.final_grade, None);
    }

    #[test]
    fn gwa_skips_ungraded_classes() {
        assert_eq!(
            general_weighted_average([Some(1.5), Some(2.0), None]),
            Some(1.75)
        );
        assert_eq!(general_weighted_average([None, None]), None);
        assert_eq!(general_weighted_average(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn standing_bands() {
        assert_eq!(GradeStanding::from_grade(1.0), GradeStanding::Excellent);
        assert_eq!(GradeStanding::from_grade(1.75), GradeStanding::VeryGood);
        assert_eq!(GradeStanding::from_grade(2.5), GradeStanding::Good);
        assert_eq!(GradeStanding::from_grade(3.0), GradeStanding::Satisfactory);
        assert_eq!(GradeStanding::from_grade(4.0), GradeStanding::Conditional);
        assert_eq!(GradeStanding::from_grade(4.25), GradeStanding::Failing);
        assert_eq!(derived_remarks(3.0, DEFAULT_PASSING_GRADE), "Passed");
        assert_eq!(derived_remarks(3.25, DEFAULT_PASSING_GRADE), "Failed");
    }
}
