use super::scorer::{score_item, ItemScore, StudentRef};
use super::quantize_percent;
use crate::error::{GradeError, Result};
use crate::model::{Assessment, AssessmentItem, Score};
use serde::Serialize;

const WEIGHT_CAP: f64 = 100.0;
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub assessment_id: String,
    pub name: String,
    pub term: String,
    pub weight_percent: f64,
    pub points: f64,
    pub possible: f64,
    /// `None` when the assessment has no scorable items.
    pub percentage: Option<f64>,
    pub items: Vec<ItemScore>,
}

/// Weighted percentage for one assessment:
/// `100 * sum(points) / sum(effective_max)` over scorable items.
pub fn aggregate_assessment(
    assessment: &Assessment,
    items: &[AssessmentItem],
    scores: &[Score],
    student: StudentRef<'_>,
) -> AssessmentResult {
    let mut item_scores: Vec<ItemScore> = items
        .iter()
        .filter(|i| i.assessment_id == assessment.id)
        .map(|i| score_item(i, scores, student))
        .collect();
    // Fixed summation order keeps the float result independent of input order.
    item_scores.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    let (points, possible) = item_scores
        .iter()
        .filter(|s| s.is_scorable())
        .fold((0.0_f64, 0.0_f64), |(p, m), s| (p + s.points, m + s.effective_max));

    let percentage = if possible > 0.0 {
        Some(quantize_percent(100.0 * points / possible))
    } else {
        None
    };

    AssessmentResult {
        assessment_id: assessment.id.clone(),
        name: assessment.name.clone(),
        term: assessment.term.clone(),
        weight_percent: assessment.weight_percent,
        points,
        possible,
        percentage,
        items: item_scores,
    }
}

/// Aggregates every assessment, ordered by term then name.
pub fn aggregate_assessments(
    assessments: &[Assessment],
    items: &[AssessmentItem],
    scores: &[Score],
    student: StudentRef<'_>,
) -> Vec<AssessmentResult> {
    let mut out: Vec<AssessmentResult> = assessments
        .iter()
        .map(|a| aggregate_assessment(a, items, scores, student))
        .collect();
    out.sort_by(|a, b| {
        a.term
            .cmp(&b.term)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.assessment_id.cmp(&b.assessment_id))
    });
    out
}

/// Proposed assessment values for a create or update.
#[derive(Debug, Clone)]
pub struct AssessmentDraft<'a> {
    pub class_id: &'a str,
    pub term: &'a str,
    pub name: &'a str,
    pub weight_percent: f64,
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn in_scope(a: &Assessment, class_id: &str, term: &str) -> bool {
    a.class_id == class_id && same_name(&a.term, term)
}

/// The spelling already stored for `term` in the class, so that "Prelim"
/// and " prelim" share one weight budget and one term label.
pub fn canonical_term<'a>(existing: &'a [Assessment], class_id: &str, term: &'a str) -> &'a str {
    existing
        .iter()
        .find(|a| a.class_id == class_id && same_name(&a.term, term))
        .map(|a| a.term.as_str())
        .unwrap_or_else(|| term.trim())
}

/// Checks a create (`editing = None`) or an update of `editing` against the
/// other assessments of the same `(class_id, term)`.
pub fn validate_assessment(
    existing: &[Assessment],
    draft: &AssessmentDraft<'_>,
    editing: Option<&str>,
) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(GradeError::validation("assessment name must not be empty"));
    }
    if draft.term.trim().is_empty() {
        return Err(GradeError::validation("term must not be empty"));
    }
    if !draft.weight_percent.is_finite() || !(0.0..=WEIGHT_CAP).contains(&draft.weight_percent) {
        return Err(GradeError::validation("weight must be between 0 and 100"));
    }

    let others = existing
        .iter()
        .filter(|a| in_scope(a, draft.class_id, draft.term))
        .filter(|a| editing.map(|id| a.id != id).unwrap_or(true));

    let mut current_total = 0.0_f64;
    for a in others {
        if same_name(&a.name, draft.name) {
            return Err(GradeError::DuplicateName {
                class_id: draft.class_id.to_string(),
                term: draft.term.to_string(),
                name: draft.name.trim().to_string(),
            });
        }
        current_total += a.weight_percent;
    }

    let total = current_total + draft.weight_percent;
    if total > WEIGHT_CAP + WEIGHT_EPSILON {
        return Err(GradeError::WeightExceeded {
            class_id: draft.class_id.to_string(),
            term: draft.term.to_string(),
            total,
        });
    }
    Ok(())
}

/// Item names are unique across every assessment sharing the parent's
/// `(class_id, term)`.
pub fn validate_item(
    parent: &Assessment,
    assessments: &[Assessment],
    items: &[AssessmentItem],
    name: &str,
    max_score: f64,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GradeError::validation("item name must not be empty"));
    }
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(GradeError::validation("max score must be greater than 0"));
    }

    let scope_ids: Vec<&str> = assessments
        .iter()
        .filter(|a| in_scope(a, &parent.class_id, &parent.term))
        .map(|a| a.id.as_str())
        .chain(std::iter::once(parent.id.as_str()))
        .collect();

    let duplicate = items
        .iter()
        .any(|i| scope_ids.contains(&i.assessment_id.as_str()) && same_name(&i.name, name));
    if duplicate {
        return Err(GradeError::DuplicateItemName {
            class_id: parent.class_id.clone(),
            term: parent.term.clone(),
            name: name.trim().to_string(),
        });
    }
    Ok(())
}
