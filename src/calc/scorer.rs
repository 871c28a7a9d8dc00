use crate::model::{AssessmentItem, Score};
use serde::Serialize;

/// The student whose scores are being resolved.
#[derive(Debug, Clone, Copy)]
pub struct StudentRef<'a> {
    pub student_id: &'a str,
    pub student_class_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemScore {
    pub item_id: String,
    pub name: String,
    pub points: f64,
    pub effective_max: f64,
    pub graded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl ItemScore {
    /// Items with no positive denominator are left out of aggregation.
    pub fn is_scorable(&self) -> bool {
        self.effective_max > 0.0
    }
}

pub fn find_score<'s>(
    item: &AssessmentItem,
    scores: &'s [Score],
    student: StudentRef<'_>,
) -> Option<&'s Score> {
    scores.iter().find(|s| {
        s.assessment_item_id == item.id
            && s.student_id == student.student_id
            && s.student_class_id == student.student_class_id
    })
}

/// Resolves `(points, effective_max)` for one item. Ungraded items score 0
/// against the item's own max.
pub fn score_item(item: &AssessmentItem, scores: &[Score], student: StudentRef<'_>) -> ItemScore {
    match find_score(item, scores, student) {
        Some(score) => {
            let effective_max = match score.total_score {
                Some(t) if t > 0.0 => t,
                _ => item.max_score,
            };
            ItemScore {
                item_id: item.id.clone(),
                name: item.name.clone(),
                points: score.points.max(0.0),
                effective_max,
                graded: true,
                remarks: score.remarks.clone().filter(|r| !r.trim().is_empty()),
            }
        }
        None => ItemScore {
            item_id: item.id.clone(),
            name: item.name.clone(),
            points: 0.0,
            effective_max: item.max_score,
            graded: false,
            remarks: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, max: f64) -> AssessmentItem {
        AssessmentItem {
            id: id.into(),
            assessment_id: "a1".into(),
            name: format!("Item {id}"),
            max_score: max,
        }
    }

    fn score(item_id: &str, points: f64, total: Option<f64>) -> Score {
        Score {
            student_id: "s1".into(),
            assessment_item_id: item_id.into(),
            student_class_id: "sc1".into(),
            points,
            total_score: total,
            remarks: None,
        }
    }

    const STUDENT: StudentRef<'static> = StudentRef {
        student_id: "s1",
        student_class_id: "sc1",
    };

    #[test]
    fn ungraded_item_scores_zero_against_item_max() {
        let r = score_item(&item("i1", 20.0), &[], STUDENT);
        assert_eq!(r.points, 0.0);
        assert_eq!(r.effective_max, 20.0);
        assert!(!r.graded);
        assert!(r.is_scorable());
    }

    #[test]
    fn nonzero_total_score_overrides_item_max() {
        let scores = vec![score("i1", 8.0, Some(10.0))];
        let r = score_item(&item("i1", 20.0), &scores, STUDENT);
        assert_eq!(r.points, 8.0);
        assert_eq!(r.effective_max, 10.0);

        let scores = vec![score("i1", 8.0, Some(0.0))];
        let r = score_item(&item("i1", 20.0), &scores, STUDENT);
        assert_eq!(r.effective_max, 20.0);
    }

    #[test]
    fn scores_for_other_enrollments_are_ignored() {
        let mut other = score("i1", 9.0, None);
        other.student_class_id = "sc2".into();
        let r = score_item(&item("i1", 10.0), &[other], STUDENT);
        assert!(!r.graded);
        assert_eq!(r.points, 0.0);
    }

    #[test]
    fn zero_max_item_is_not_scorable() {
        let r = score_item(&item("i1", 0.0), &[], STUDENT);
        assert!(!r.is_scorable());
    }
}
