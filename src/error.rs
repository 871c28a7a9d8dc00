use serde_json::json;

pub type Result<T, E = GradeError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("total weight for term {term} would be {total}%, which exceeds 100%")]
    WeightExceeded {
        class_id: String,
        term: String,
        total: f64,
    },

    #[error("assessment name {name:?} already exists in term {term}")]
    DuplicateName {
        class_id: String,
        term: String,
        name: String,
    },

    #[error("assessment item name {name:?} already exists in term {term}")]
    DuplicateItemName {
        class_id: String,
        term: String,
        name: String,
    },

    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl GradeError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        GradeError::RecordNotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GradeError::Validation(message.into())
    }

    /// Stable wire code reported in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::WeightExceeded { .. } => "weight_exceeded",
            GradeError::DuplicateName { .. } => "duplicate_name",
            GradeError::DuplicateItemName { .. } => "duplicate_item_name",
            GradeError::StudentNotFound(_) => "student_not_found",
            GradeError::RecordNotFound { .. } => "not_found",
            GradeError::Validation(_) => "bad_params",
            GradeError::NoWorkspace => "no_workspace",
            GradeError::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradeError::WeightExceeded {
                class_id,
                term,
                total,
            } => Some(json!({ "classId": class_id, "term": term, "total": total })),
            GradeError::DuplicateName {
                class_id,
                term,
                name,
            }
            | GradeError::DuplicateItemName {
                class_id,
                term,
                name,
            } => Some(json!({ "classId": class_id, "term": term, "name": name })),
            GradeError::StudentNotFound(id) => Some(json!({ "studentId": id })),
            GradeError::RecordNotFound { entity, id } => {
                Some(json!({ "entity": entity, "id": id }))
            }
            _ => None,
        }
    }
}
