use crate::calc::assessment::{canonical_term, validate_assessment, validate_item, AssessmentDraft};
use crate::calc::attendance::AttendanceFilter;
use crate::calc::grades::is_valid_grade;
use crate::error::{GradeError, Result};
use crate::model::{
    Assessment, AssessmentItem, AttendanceRecord, AttendanceStatus, Enrollment, FinalGrade, Score,
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{
    params_from_iter, Connection, OptionalExtension, ToSql, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS classes(
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    term TEXT
);

CREATE TABLE IF NOT EXISTS students(
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_classes(
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    class_id TEXT NOT NULL,
    FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
    FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE,
    UNIQUE(student_id, class_id)
);
CREATE INDEX IF NOT EXISTS idx_student_classes_class ON student_classes(class_id);

CREATE TABLE IF NOT EXISTS assessments(
    id TEXT PRIMARY KEY,
    class_id TEXT NOT NULL,
    term TEXT NOT NULL,
    name TEXT NOT NULL,
    weight REAL NOT NULL,
    FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_assessments_class_term ON assessments(class_id, term);

CREATE TABLE IF NOT EXISTS assessment_items(
    id TEXT PRIMARY KEY,
    assessment_id TEXT NOT NULL,
    name TEXT NOT NULL,
    max_score REAL NOT NULL,
    FOREIGN KEY(assessment_id) REFERENCES assessments(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_assessment_items_assessment ON assessment_items(assessment_id);

CREATE TABLE IF NOT EXISTS scores(
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    assessment_item_id TEXT NOT NULL,
    student_class_id TEXT NOT NULL,
    points REAL NOT NULL,
    total_score REAL,
    remarks TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
    FOREIGN KEY(assessment_item_id) REFERENCES assessment_items(id) ON DELETE CASCADE,
    FOREIGN KEY(student_class_id) REFERENCES student_classes(id) ON DELETE CASCADE,
    UNIQUE(student_id, assessment_item_id, student_class_id)
);
CREATE INDEX IF NOT EXISTS idx_scores_student_class ON scores(student_class_id);

CREATE TABLE IF NOT EXISTS final_grades(
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    student_class_id TEXT NOT NULL,
    prelim REAL,
    midterm REAL,
    final_term REAL,
    final_grade REAL,
    remarks TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
    FOREIGN KEY(student_class_id) REFERENCES student_classes(id) ON DELETE CASCADE,
    UNIQUE(student_id, student_class_id)
);

CREATE TABLE IF NOT EXISTS attendance(
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    class_id TEXT NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL CHECK(status IN ('present', 'absent', 'late', 'excused')),
    notes TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
    FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE,
    UNIQUE(student_id, class_id, date)
);
CREATE INDEX IF NOT EXISTS idx_attendance_student_date ON attendance(student_id, date);
CREATE INDEX IF NOT EXISTS idx_attendance_class ON attendance(class_id);
";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&path)?;
    init_schema(&conn)?;
    info!(path = %path.display(), "database opened");
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.execute_batch(SCHEMA)
}

/// Writes take the database write lock up front so that the
/// read-validate-write sequence of an upsert cannot interleave with another
/// writer.
fn write_tx(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl ToSql for AttendanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AttendanceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub created: usize,
    pub updated: usize,
}

impl UpsertReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Roster

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub term: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSync {
    #[serde(default)]
    pub classes: Vec<ClassRow>,
    #[serde(default)]
    pub students: Vec<StudentRow>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RosterReport {
    pub classes: usize,
    pub students: usize,
    pub enrollments: usize,
}

pub fn roster_sync(conn: &Connection, roster: &RosterSync) -> Result<RosterReport> {
    let tx = write_tx(conn)?;
    for c in &roster.classes {
        tx.execute(
            "INSERT INTO classes(id, name, term) VALUES(?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, term = excluded.term",
            (&c.id, &c.name, &c.term),
        )?;
    }
    for s in &roster.students {
        tx.execute(
            "INSERT INTO students(id, name) VALUES(?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            (&s.id, &s.name),
        )?;
    }
    for e in &roster.enrollments {
        if !student_exists(&tx, &e.student_id)? {
            return Err(GradeError::StudentNotFound(e.student_id.clone()));
        }
        if !class_exists(&tx, &e.class_id)? {
            return Err(GradeError::not_found("class", &e.class_id));
        }
        let existing = enrollment_for(&tx, &e.student_id, &e.class_id)?;
        if let Some(existing) = existing {
            if existing.student_class_id != e.student_class_id {
                return Err(GradeError::validation(format!(
                    "student {} is already enrolled in class {} as {}",
                    e.student_id, e.class_id, existing.student_class_id
                )));
            }
            continue;
        }
        tx.execute(
            "INSERT INTO student_classes(id, student_id, class_id) VALUES(?, ?, ?)",
            (&e.student_class_id, &e.student_id, &e.class_id),
        )?;
    }
    tx.commit()?;
    let report = RosterReport {
        classes: roster.classes.len(),
        students: roster.students.len(),
        enrollments: roster.enrollments.len(),
    };
    info!(?report, "roster synced");
    Ok(report)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<bool> {
    Ok(get_class(conn, class_id)?.is_some())
}

pub fn get_class(conn: &Connection, class_id: &str) -> Result<Option<ClassRow>> {
    Ok(conn
        .query_row(
            "SELECT id, name, term FROM classes WHERE id = ?",
            [class_id],
            |r| {
                Ok(ClassRow {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    term: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Option<StudentRow>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM students WHERE id = ?",
            [student_id],
            |r| {
                Ok(StudentRow {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?)
}

pub fn enrollment_for(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
) -> Result<Option<Enrollment>> {
    Ok(conn
        .query_row(
            "SELECT id, student_id, class_id FROM student_classes
             WHERE student_id = ? AND class_id = ?",
            (student_id, class_id),
            |r| {
                Ok(Enrollment {
                    student_class_id: r.get(0)?,
                    student_id: r.get(1)?,
                    class_id: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn get_enrollment(conn: &Connection, student_class_id: &str) -> Result<Option<Enrollment>> {
    Ok(conn
        .query_row(
            "SELECT id, student_id, class_id FROM student_classes WHERE id = ?",
            [student_class_id],
            |r| {
                Ok(Enrollment {
                    student_class_id: r.get(0)?,
                    student_id: r.get(1)?,
                    class_id: r.get(2)?,
                })
            },
        )
        .optional()?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledClass {
    pub enrollment: Enrollment,
    pub class: ClassRow,
}

pub fn enrollments_for_student(conn: &Connection, student_id: &str) -> Result<Vec<EnrolledClass>> {
    let mut stmt = conn.prepare(
        "SELECT sc.id, sc.student_id, sc.class_id, c.name, c.term
         FROM student_classes sc
         JOIN classes c ON c.id = sc.class_id
         WHERE sc.student_id = ?
         ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            let class_id: String = r.get(2)?;
            Ok(EnrolledClass {
                enrollment: Enrollment {
                    student_class_id: r.get(0)?,
                    student_id: r.get(1)?,
                    class_id: class_id.clone(),
                },
                class: ClassRow {
                    id: class_id,
                    name: r.get(3)?,
                    term: r.get(4)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    pub enrollment: Enrollment,
    pub student: StudentRow,
}

pub fn class_enrollments(conn: &Connection, class_id: &str) -> Result<Vec<EnrolledStudent>> {
    let mut stmt = conn.prepare(
        "SELECT sc.id, sc.student_id, sc.class_id, s.name
         FROM student_classes sc
         JOIN students s ON s.id = sc.student_id
         WHERE sc.class_id = ?
         ORDER BY s.name, s.id",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            let student_id: String = r.get(1)?;
            Ok(EnrolledStudent {
                enrollment: Enrollment {
                    student_class_id: r.get(0)?,
                    student_id: student_id.clone(),
                    class_id: r.get(2)?,
                },
                student: StudentRow {
                    id: student_id,
                    name: r.get(3)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Assessments and items

fn assessment_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Assessment> {
    Ok(Assessment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        term: r.get(2)?,
        name: r.get(3)?,
        weight_percent: r.get(4)?,
    })
}

pub fn load_class_assessments(conn: &Connection, class_id: &str) -> Result<Vec<Assessment>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, term, name, weight
         FROM assessments
         WHERE class_id = ?
         ORDER BY term, name",
    )?;
    let rows = stmt
        .query_map([class_id], assessment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_assessment(conn: &Connection, assessment_id: &str) -> Result<Option<Assessment>> {
    Ok(conn
        .query_row(
            "SELECT id, class_id, term, name, weight FROM assessments WHERE id = ?",
            [assessment_id],
            assessment_from_row,
        )
        .optional()?)
}

pub fn load_class_items(conn: &Connection, class_id: &str) -> Result<Vec<AssessmentItem>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.assessment_id, i.name, i.max_score
         FROM assessment_items i
         JOIN assessments a ON a.id = i.assessment_id
         WHERE a.class_id = ?
         ORDER BY i.assessment_id, i.rowid",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(AssessmentItem {
                id: r.get(0)?,
                assessment_id: r.get(1)?,
                name: r.get(2)?,
                max_score: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    pub class_id: String,
    pub term: String,
    pub name: String,
    pub weight_percent: f64,
}

impl NewAssessment {
    fn draft<'a>(&'a self, term: &'a str) -> AssessmentDraft<'a> {
        AssessmentDraft {
            class_id: &self.class_id,
            term,
            name: self.name.trim(),
            weight_percent: self.weight_percent,
        }
    }
}

pub fn create_assessment(conn: &Connection, input: &NewAssessment) -> Result<Assessment> {
    let tx = write_tx(conn)?;
    if !class_exists(&tx, &input.class_id)? {
        return Err(GradeError::not_found("class", &input.class_id));
    }
    let existing = load_class_assessments(&tx, &input.class_id)?;
    let term = canonical_term(&existing, &input.class_id, &input.term).to_string();
    validate_assessment(&existing, &input.draft(&term), None)?;

    let assessment = Assessment {
        id: new_id(),
        class_id: input.class_id.clone(),
        term,
        weight_percent: input.weight_percent,
        name: input.name.trim().to_string(),
    };
    tx.execute(
        "INSERT INTO assessments(id, class_id, term, name, weight) VALUES(?, ?, ?, ?, ?)",
        (
            &assessment.id,
            &assessment.class_id,
            &assessment.term,
            &assessment.name,
            assessment.weight_percent,
        ),
    )?;
    tx.commit()?;
    debug!(
        id = %assessment.id,
        class_id = %assessment.class_id,
        term = %assessment.term,
        "assessment created"
    );
    Ok(assessment)
}

pub fn update_assessment(
    conn: &Connection,
    assessment_id: &str,
    input: &NewAssessment,
) -> Result<Assessment> {
    let tx = write_tx(conn)?;
    let Some(current) = get_assessment(&tx, assessment_id)? else {
        return Err(GradeError::not_found("assessment", assessment_id));
    };
    if !class_exists(&tx, &input.class_id)? {
        return Err(GradeError::not_found("class", &input.class_id));
    }
    let existing = load_class_assessments(&tx, &input.class_id)?;
    let peers: Vec<Assessment> = existing
        .iter()
        .filter(|a| a.id != assessment_id)
        .cloned()
        .collect();
    let term = canonical_term(&peers, &input.class_id, &input.term).to_string();
    validate_assessment(&existing, &input.draft(&term), Some(assessment_id))?;

    let updated = Assessment {
        id: current.id.clone(),
        class_id: input.class_id.clone(),
        term,
        weight_percent: input.weight_percent,
        name: input.name.trim().to_string(),
    };

    // Moving to another (class, term) scope must not collide with item names there.
    if updated.class_id != current.class_id || updated.term != current.term {
        let all_items = load_class_items(&tx, &current.class_id)?;
        let target_items = load_class_items(&tx, &updated.class_id)?;
        let foreign_items: Vec<AssessmentItem> = target_items
            .into_iter()
            .filter(|i| i.assessment_id != current.id)
            .collect();
        for item in all_items.iter().filter(|i| i.assessment_id == current.id) {
            validate_item(&updated, &peers, &foreign_items, &item.name, item.max_score)?;
        }
    }

    tx.execute(
        "UPDATE assessments SET class_id = ?, term = ?, name = ?, weight = ? WHERE id = ?",
        (
            &updated.class_id,
            &updated.term,
            &updated.name,
            updated.weight_percent,
            &updated.id,
        ),
    )?;
    tx.commit()?;
    debug!(id = %updated.id, "assessment updated");
    Ok(updated)
}

pub fn delete_assessment(conn: &Connection, assessment_id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM assessments WHERE id = ?", [assessment_id])?;
    if n == 0 {
        return Err(GradeError::not_found("assessment", assessment_id));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub assessment_id: String,
    pub name: String,
    pub max_score: f64,
}

pub fn create_item(conn: &Connection, input: &NewItem) -> Result<AssessmentItem> {
    let tx = write_tx(conn)?;
    let Some(parent) = get_assessment(&tx, &input.assessment_id)? else {
        return Err(GradeError::not_found("assessment", &input.assessment_id));
    };
    let assessments = load_class_assessments(&tx, &parent.class_id)?;
    let items = load_class_items(&tx, &parent.class_id)?;
    validate_item(&parent, &assessments, &items, &input.name, input.max_score)?;

    let item = AssessmentItem {
        id: new_id(),
        assessment_id: parent.id,
        name: input.name.trim().to_string(),
        max_score: input.max_score,
    };
    tx.execute(
        "INSERT INTO assessment_items(id, assessment_id, name, max_score) VALUES(?, ?, ?, ?)",
        (&item.id, &item.assessment_id, &item.name, item.max_score),
    )?;
    tx.commit()?;
    debug!(id = %item.id, assessment_id = %item.assessment_id, "item created");
    Ok(item)
}

pub fn delete_item(conn: &Connection, item_id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM assessment_items WHERE id = ?", [item_id])?;
    if n == 0 {
        return Err(GradeError::not_found("assessment item", item_id));
    }
    Ok(())
}

fn item_class_id(conn: &Connection, item_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT a.class_id FROM assessment_items i
             JOIN assessments a ON a.id = i.assessment_id
             WHERE i.id = ?",
            [item_id],
            |r| r.get(0),
        )
        .optional()?)
}

// ---------------------------------------------------------------------------
// Scores and final grades

/// Resolves the enrollment a grade row points at and checks it belongs to
/// the student.
fn checked_enrollment(
    conn: &Connection,
    student_id: &str,
    student_class_id: &str,
) -> Result<Enrollment> {
    if !student_exists(conn, student_id)? {
        return Err(GradeError::StudentNotFound(student_id.to_string()));
    }
    let Some(enrollment) = get_enrollment(conn, student_class_id)? else {
        return Err(GradeError::not_found("enrollment", student_class_id));
    };
    if enrollment.student_id != student_id {
        return Err(GradeError::validation(format!(
            "enrollment {student_class_id} does not belong to student {student_id}"
        )));
    }
    Ok(enrollment)
}

fn validate_score_values(score: &Score) -> Result<()> {
    if !score.points.is_finite() || score.points < 0.0 {
        return Err(GradeError::validation("score must be a number >= 0"));
    }
    if let Some(t) = score.total_score {
        if !t.is_finite() || t < 0.0 {
            return Err(GradeError::validation("total score must be a number >= 0"));
        }
    }
    Ok(())
}

/// Create-or-overwrite on `(student_id, assessment_item_id,
/// student_class_id)`. Every record is checked before anything is kept; a
/// failure rolls back the whole batch.
pub fn upsert_scores(conn: &Connection, scores: &[Score]) -> Result<UpsertReport> {
    let tx = write_tx(conn)?;
    let mut report = UpsertReport::default();
    let stamp = now_stamp();
    for score in scores {
        validate_score_values(score)?;
        let enrollment = checked_enrollment(&tx, &score.student_id, &score.student_class_id)?;
        let Some(item_class) = item_class_id(&tx, &score.assessment_item_id)? else {
            return Err(GradeError::not_found("assessment item", &score.assessment_item_id));
        };
        if item_class != enrollment.class_id {
            return Err(GradeError::validation(format!(
                "assessment item {} is not part of class {}",
                score.assessment_item_id, enrollment.class_id
            )));
        }

        let exists = tx
            .query_row(
                "SELECT 1 FROM scores
                 WHERE student_id = ? AND assessment_item_id = ? AND student_class_id = ?",
                (&score.student_id, &score.assessment_item_id, &score.student_class_id),
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some();

        tx.execute(
            "INSERT INTO scores(id, student_id, assessment_item_id, student_class_id,
                                points, total_score, remarks, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, assessment_item_id, student_class_id) DO UPDATE SET
               points = excluded.points,
               total_score = excluded.total_score,
               remarks = excluded.remarks,
               updated_at = excluded.updated_at",
            (
                new_id(),
                &score.student_id,
                &score.assessment_item_id,
                &score.student_class_id,
                score.points,
                score.total_score,
                &score.remarks,
                &stamp,
            ),
        )?;
        report.record(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        });
    }
    tx.commit()?;
    debug!(created = report.created, updated = report.updated, "scores upserted");
    Ok(report)
}

pub fn load_scores(conn: &Connection, student_class_id: &str) -> Result<Vec<Score>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, assessment_item_id, student_class_id, points, total_score, remarks
         FROM scores
         WHERE student_class_id = ?",
    )?;
    let rows = stmt
        .query_map([student_class_id], |r| {
            Ok(Score {
                student_id: r.get(0)?,
                assessment_item_id: r.get(1)?,
                student_class_id: r.get(2)?,
                points: r.get(3)?,
                total_score: r.get(4)?,
                remarks: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_scores(conn: &Connection, student_class_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM scores WHERE student_class_id = ?",
        [student_class_id],
        |r| r.get(0),
    )?)
}

/// Most recently written non-empty score remark for an enrollment.
pub fn latest_score_remark(conn: &Connection, student_class_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT remarks FROM scores
             WHERE student_class_id = ? AND remarks IS NOT NULL AND TRIM(remarks) <> ''
             ORDER BY updated_at DESC, rowid DESC
             LIMIT 1",
            [student_class_id],
            |r| r.get(0),
        )
        .optional()?)
}

fn validate_final_grade_values(fg: &FinalGrade) -> Result<()> {
    let fields = [
        ("prelim", fg.prelim),
        ("midterm", fg.midterm),
        ("finalTerm", fg.final_term),
        ("finalGrade", fg.final_grade),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            if !is_valid_grade(v) {
                return Err(GradeError::validation(format!(
                    "{name} must be between 1.0 and 5.0"
                )));
            }
        }
    }
    Ok(())
}

pub fn upsert_final_grades(conn: &Connection, grades: &[FinalGrade]) -> Result<UpsertReport> {
    let tx = write_tx(conn)?;
    let mut report = UpsertReport::default();
    let stamp = now_stamp();
    for fg in grades {
        validate_final_grade_values(fg)?;
        checked_enrollment(&tx, &fg.student_id, &fg.student_class_id)?;
        let exists = load_final_grade(&tx, &fg.student_id, &fg.student_class_id)?.is_some();
        tx.execute(
            "INSERT INTO final_grades(id, student_id, student_class_id, prelim, midterm,
                                      final_term, final_grade, remarks, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, student_class_id) DO UPDATE SET
               prelim = excluded.prelim,
               midterm = excluded.midterm,
               final_term = excluded.final_term,
               final_grade = excluded.final_grade,
               remarks = excluded.remarks,
               updated_at = excluded.updated_at",
            (
                new_id(),
                &fg.student_id,
                &fg.student_class_id,
                fg.prelim,
                fg.midterm,
                fg.final_term,
                fg.final_grade,
                &fg.remarks,
                &stamp,
            ),
        )?;
        report.record(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        });
    }
    tx.commit()?;
    debug!(created = report.created, updated = report.updated, "final grades upserted");
    Ok(report)
}

pub fn load_final_grade(
    conn: &Connection,
    student_id: &str,
    student_class_id: &str,
) -> Result<Option<FinalGrade>> {
    Ok(conn
        .query_row(
            "SELECT student_id, student_class_id, prelim, midterm, final_term, final_grade, remarks
             FROM final_grades
             WHERE student_id = ? AND student_class_id = ?",
            (student_id, student_class_id),
            |r| {
                Ok(FinalGrade {
                    student_id: r.get(0)?,
                    student_class_id: r.get(1)?,
                    prelim: r.get(2)?,
                    midterm: r.get(3)?,
                    final_term: r.get(4)?,
                    final_grade: r.get(5)?,
                    remarks: r.get(6)?,
                })
            },
        )
        .optional()?)
}

// ---------------------------------------------------------------------------
// Attendance

fn upsert_attendance_row(
    tx: &Transaction<'_>,
    record: &AttendanceRecord,
    stamp: &str,
) -> Result<UpsertOutcome> {
    if !student_exists(tx, &record.student_id)? {
        return Err(GradeError::StudentNotFound(record.student_id.clone()));
    }
    if !class_exists(tx, &record.class_id)? {
        return Err(GradeError::not_found("class", &record.class_id));
    }
    if enrollment_for(tx, &record.student_id, &record.class_id)?.is_none() {
        return Err(GradeError::not_found(
            "enrollment",
            format!("{}/{}", record.student_id, record.class_id),
        ));
    }

    let exists = tx
        .query_row(
            "SELECT 1 FROM attendance WHERE student_id = ? AND class_id = ? AND date = ?",
            (&record.student_id, &record.class_id, record.date),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some();

    tx.execute(
        "INSERT INTO attendance(id, student_id, class_id, date, status, notes, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, class_id, date) DO UPDATE SET
           status = excluded.status,
           notes = excluded.notes,
           updated_at = excluded.updated_at",
        (
            new_id(),
            &record.student_id,
            &record.class_id,
            record.date,
            record.status,
            &record.notes,
            stamp,
        ),
    )?;
    Ok(if exists {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Created
    })
}

pub fn upsert_attendance(conn: &Connection, record: &AttendanceRecord) -> Result<UpsertOutcome> {
    let tx = write_tx(conn)?;
    let outcome = upsert_attendance_row(&tx, record, &now_stamp())?;
    tx.commit()?;
    Ok(outcome)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollCallEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One class, one date, many students.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollCall {
    pub class_id: String,
    pub date: NaiveDate,
    pub records: Vec<RollCallEntry>,
}

pub fn bulk_upsert_attendance(conn: &Connection, roll: &RollCall) -> Result<UpsertReport> {
    let tx = write_tx(conn)?;
    let stamp = now_stamp();
    let mut report = UpsertReport::default();
    for entry in &roll.records {
        let record = AttendanceRecord {
            student_id: entry.student_id.clone(),
            class_id: roll.class_id.clone(),
            date: roll.date,
            status: entry.status,
            notes: entry.notes.clone(),
        };
        report.record(upsert_attendance_row(&tx, &record, &stamp)?);
    }
    tx.commit()?;
    debug!(
        class_id = %roll.class_id,
        date = %roll.date,
        created = report.created,
        updated = report.updated,
        "roll call saved"
    );
    Ok(report)
}

pub fn load_attendance(
    conn: &Connection,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRecord>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(s) = &filter.student_id {
        clauses.push("student_id = ?");
        bind_values.push(Value::Text(s.clone()));
    }
    if let Some(c) = &filter.class_id {
        clauses.push("class_id = ?");
        bind_values.push(Value::Text(c.clone()));
    }
    if let Some(d) = filter.from {
        clauses.push("date >= ?");
        bind_values.push(Value::Text(d.format("%Y-%m-%d").to_string()));
    }
    if let Some(d) = filter.to {
        clauses.push("date <= ?");
        bind_values.push(Value::Text(d.format("%Y-%m-%d").to_string()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT student_id, class_id, date, status, notes
         FROM attendance
         {}
         ORDER BY date, class_id, student_id",
        where_sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values), |r| {
            Ok(AttendanceRecord {
                student_id: r.get(0)?,
                class_id: r.get(1)?,
                date: r.get(2)?,
                status: r.get(3)?,
                notes: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
