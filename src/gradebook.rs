//! Read models assembled from the store and the calc pipeline.
//!
//! Each function loads the records it needs through [`crate::db`] and hands
//! plain slices to [`crate::calc`]; nothing here writes.

use crate::calc::attendance::{
    summarize, summarize_by_class, AttendanceBreakdown, AttendanceFilter, AttendanceSummary,
};
use crate::calc::class_stats::{class_stats, ClassStats, TOP_PERFORMER_LIMIT};
use crate::calc::grades::{
    general_weighted_average, resolve_final_grade, GradeInputs, ResolvedGrade,
};
use crate::calc::round_to;
use crate::calc::scorer::StudentRef;
use crate::db::{self, ClassRow, StudentRow};
use crate::error::{GradeError, Result};
use crate::model::{Assessment, AssessmentItem, Enrollment};
use rusqlite::Connection;
use serde::Serialize;

/// Class-level grading structure, loaded once and shared by every student
/// enrolled in the class.
struct ClassStructure {
    assessments: Vec<Assessment>,
    items: Vec<AssessmentItem>,
}

impl ClassStructure {
    fn load(conn: &Connection, class_id: &str) -> Result<Self> {
        Ok(Self {
            assessments: db::load_class_assessments(conn, class_id)?,
            items: db::load_class_items(conn, class_id)?,
        })
    }

    fn resolve(
        &self,
        conn: &Connection,
        enrollment: &Enrollment,
        passing_grade: f64,
    ) -> Result<ResolvedGrade> {
        let scores = db::load_scores(conn, &enrollment.student_class_id)?;
        let final_grade =
            db::load_final_grade(conn, &enrollment.student_id, &enrollment.student_class_id)?;
        Ok(resolve_final_grade(GradeInputs {
            student: StudentRef {
                student_id: &enrollment.student_id,
                student_class_id: &enrollment.student_class_id,
            },
            assessments: &self.assessments,
            items: &self.items,
            scores: &scores,
            final_grade: final_grade.as_ref(),
            passing_grade,
        }))
    }
}

fn require_student(conn: &Connection, student_id: &str) -> Result<StudentRow> {
    db::get_student(conn, student_id)?
        .ok_or_else(|| GradeError::StudentNotFound(student_id.to_string()))
}

fn require_class(conn: &Connection, class_id: &str) -> Result<ClassRow> {
    db::get_class(conn, class_id)?.ok_or_else(|| GradeError::not_found("class", class_id))
}

pub fn resolve_student_class(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
    passing_grade: f64,
) -> Result<ResolvedGrade> {
    require_student(conn, student_id)?;
    require_class(conn, class_id)?;
    let Some(enrollment) = db::enrollment_for(conn, student_id, class_id)? else {
        return Err(GradeError::not_found("enrollment", format!("{student_id}/{class_id}")));
    };
    ClassStructure::load(conn, class_id)?.resolve(conn, &enrollment, passing_grade)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGradeRow {
    pub student: StudentRow,
    pub grade: ResolvedGrade,
    pub latest_remark: Option<String>,
}

/// Resolved grades for every student enrolled in a class, in roster order.
pub fn resolve_class(
    conn: &Connection,
    class_id: &str,
    passing_grade: f64,
) -> Result<Vec<ClassGradeRow>> {
    require_class(conn, class_id)?;
    let structure = ClassStructure::load(conn, class_id)?;
    let mut rows = Vec::new();
    for enrolled in db::class_enrollments(conn, class_id)? {
        let grade = structure.resolve(conn, &enrolled.enrollment, passing_grade)?;
        let latest_remark = db::latest_score_remark(conn, &enrolled.enrollment.student_class_id)?;
        rows.push(ClassGradeRow {
            student: enrolled.student,
            grade,
            latest_remark,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGrades {
    pub class_id: String,
    pub rows: Vec<ClassGradeRow>,
    pub stats: ClassStats,
}

/// [`resolve_class`] plus the class average, letter distribution and top
/// performers computed over the same rows.
pub fn class_grades(conn: &Connection, class_id: &str, passing_grade: f64) -> Result<ClassGrades> {
    let rows = resolve_class(conn, class_id, passing_grade)?;
    let grades: Vec<ResolvedGrade> = rows.iter().map(|r| r.grade.clone()).collect();
    Ok(ClassGrades {
        class_id: class_id.to_string(),
        stats: class_stats(&grades, TOP_PERFORMER_LIMIT),
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GwaEntry {
    pub class_id: String,
    pub class_name: String,
    pub term: Option<String>,
    pub final_grade: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GwaReport {
    pub student_id: String,
    pub term: Option<String>,
    pub gwa: Option<f64>,
    /// Two decimals, or "N/A" when no class has a final grade.
    pub display: String,
    pub classes: Vec<GwaEntry>,
}

fn term_matches(class: &ClassRow, term: Option<&str>) -> bool {
    match term.map(str::trim).filter(|t| !t.is_empty()) {
        None => true,
        Some(wanted) => class
            .term
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(wanted)),
    }
}

fn gwa_display(gwa: Option<f64>) -> String {
    match gwa {
        Some(v) => format!("{:.2}", round_to(v, 2)),
        None => "N/A".to_string(),
    }
}

struct ClassGrade {
    class: ClassRow,
    enrollment: Enrollment,
    grade: ResolvedGrade,
}

fn resolve_student_classes(
    conn: &Connection,
    student_id: &str,
    term: Option<&str>,
    passing_grade: f64,
) -> Result<Vec<ClassGrade>> {
    let mut out = Vec::new();
    for enrolled in db::enrollments_for_student(conn, student_id)? {
        if !term_matches(&enrolled.class, term) {
            continue;
        }
        let structure = ClassStructure::load(conn, &enrolled.class.id)?;
        let grade = structure.resolve(conn, &enrolled.enrollment, passing_grade)?;
        out.push(ClassGrade {
            class: enrolled.class,
            enrollment: enrolled.enrollment,
            grade,
        });
    }
    Ok(out)
}

fn gwa_report(student_id: &str, term: Option<&str>, grades: &[ClassGrade]) -> GwaReport {
    let gwa = general_weighted_average(grades.iter().map(|g| g.grade.final_grade));
    GwaReport {
        student_id: student_id.to_string(),
        term: term.map(str::to_string),
        gwa,
        display: gwa_display(gwa),
        classes: grades
            .iter()
            .map(|g| GwaEntry {
                class_id: g.class.id.clone(),
                class_name: g.class.name.clone(),
                term: g.class.term.clone(),
                final_grade: g.grade.final_grade,
            })
            .collect(),
    }
}

/// GWA over the student's enrolled classes, optionally restricted to classes
/// whose term label matches `term`.
pub fn student_gwa(
    conn: &Connection,
    student_id: &str,
    term: Option<&str>,
    passing_grade: f64,
) -> Result<GwaReport> {
    require_student(conn, student_id)?;
    let grades = resolve_student_classes(conn, student_id, term, passing_grade)?;
    Ok(gwa_report(student_id, term, &grades))
}

pub fn student_attendance(
    conn: &Connection,
    filter: &AttendanceFilter,
    class_ids: &[String],
) -> Result<AttendanceBreakdown> {
    let records = db::load_attendance(conn, filter)?;
    Ok(summarize_by_class(&records, filter, class_ids))
}

pub fn class_attendance(conn: &Connection, filter: &AttendanceFilter) -> Result<AttendanceSummary> {
    let records = db::load_attendance(conn, filter)?;
    Ok(summarize(&records, filter))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardClass {
    pub class: ClassRow,
    pub student_class_id: String,
    pub grade: ResolvedGrade,
    pub latest_remark: Option<String>,
    pub attendance: AttendanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCard {
    pub student: StudentRow,
    pub classes: Vec<CardClass>,
    pub gwa: GwaReport,
    pub attendance: AttendanceSummary,
}

/// Report-card model: one entry per enrolled class plus GWA and pooled
/// attendance over the same classes.
pub fn student_card(
    conn: &Connection,
    student_id: &str,
    term: Option<&str>,
    passing_grade: f64,
) -> Result<StudentCard> {
    let student = require_student(conn, student_id)?;
    let grades = resolve_student_classes(conn, student_id, term, passing_grade)?;
    let class_ids: Vec<String> = grades.iter().map(|g| g.class.id.clone()).collect();

    let filter = AttendanceFilter::for_student(student_id);
    let records: Vec<_> = db::load_attendance(conn, &filter)?
        .into_iter()
        .filter(|r| class_ids.contains(&r.class_id))
        .collect();
    let breakdown = summarize_by_class(&records, &filter, &class_ids);

    let gwa = gwa_report(student_id, term, &grades);
    let mut classes = Vec::with_capacity(grades.len());
    for g in grades {
        let latest_remark = db::latest_score_remark(conn, &g.enrollment.student_class_id)?;
        let attendance = breakdown
            .per_class
            .iter()
            .find(|c| c.class_id == g.class.id)
            .map(|c| c.summary)
            .unwrap_or_default();
        classes.push(CardClass {
            class: g.class,
            student_class_id: g.enrollment.student_class_id,
            grade: g.grade,
            latest_remark,
            attendance,
        });
    }

    Ok(StudentCard {
        student,
        classes,
        gwa,
        attendance: breakdown.overall,
    })
}
