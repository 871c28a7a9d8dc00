//! Class-wide analytics over already resolved grades.

use super::grades::ResolvedGrade;
use super::{quantize_percent, round_to};
use serde::Serialize;

pub const TOP_PERFORMER_LIMIT: usize = 10;

/// Letter buckets over final percentages: A >= 90, B >= 80, C >= 70,
/// D >= 60, F below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub f: u32,
}

impl GradeDistribution {
    pub fn add(&mut self, percentage: f64) {
        let bucket = if percentage >= 90.0 {
            &mut self.a
        } else if percentage >= 80.0 {
            &mut self.b
        } else if percentage >= 70.0 {
            &mut self.c
        } else if percentage >= 60.0 {
            &mut self.d
        } else {
            &mut self.f
        };
        *bucket += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: String,
    pub student_class_id: String,
    pub grade: f64,
}

/// Best first (lowest Philippine grade), one list per grading column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformers {
    pub prelim: Vec<RankedStudent>,
    pub midterm: Vec<RankedStudent>,
    pub final_term: Vec<RankedStudent>,
    pub final_grade: Vec<RankedStudent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub student_count: u32,
    pub graded_count: u32,
    /// `None` when no student has a final percentage.
    pub average_percentage: Option<f64>,
    pub average_grade: Option<f64>,
    pub distribution: GradeDistribution,
    pub top_performers: TopPerformers,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0_f64, 0_u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn rank<F>(grades: &[ResolvedGrade], column: F, limit: usize) -> Vec<RankedStudent>
where
    F: Fn(&ResolvedGrade) -> Option<f64>,
{
    let mut ranked: Vec<RankedStudent> = grades
        .iter()
        .filter_map(|g| {
            column(g).map(|grade| RankedStudent {
                student_id: g.student_id.clone(),
                student_class_id: g.student_class_id.clone(),
                grade,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.grade
            .total_cmp(&b.grade)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    ranked.truncate(limit);
    ranked
}

/// Average, letter distribution and top performers for one class. Students
/// without a final percentage are counted but not bucketed.
pub fn class_stats(grades: &[ResolvedGrade], limit: usize) -> ClassStats {
    let mut distribution = GradeDistribution::default();
    for pct in grades.iter().filter_map(|g| g.final_percentage) {
        distribution.add(pct);
    }

    ClassStats {
        student_count: grades.len() as u32,
        graded_count: grades.iter().filter(|g| g.final_grade.is_some()).count() as u32,
        average_percentage: mean(grades.iter().filter_map(|g| g.final_percentage))
            .map(quantize_percent),
        average_grade: mean(grades.iter().filter_map(|g| g.final_grade)).map(|g| round_to(g, 2)),
        distribution,
        top_performers: TopPerformers {
            prelim: rank(grades, |g| g.prelim, limit),
            midterm: rank(grades, |g| g.midterm, limit),
            final_term: rank(grades, |g| g.final_term, limit),
            final_grade: rank(grades, |g| g.final_grade, limit),
        },
    }
}
