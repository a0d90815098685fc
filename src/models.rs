use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub avg_rating: Option<f64>,
    pub avg_difficulty: Option<f64>,
    pub num_ratings: Option<u32>,
    pub would_take_again_percent: Option<f64>,
    pub school: School,
}

impl RatingRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Normalized "First Last" query key derived from a row's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalName {
    query: String,
}

impl CanonicalName {
    pub fn from_query(query: String) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Vec<RatingRecord>),
    NotFound,
    TransportError(String),
    ServiceError { status: u16, detail: String },
}

pub const FETCH_ACTION: &str = "fetchProfessorData";

/// Message sent across the trusted boundary, one per claimed row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub action: String,
    pub professor_name: String,
}

impl FetchRequest {
    pub fn fetch_professor(name: &CanonicalName) -> Self {
        Self {
            action: FETCH_ACTION.to_string(),
            professor_name: name.query().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<RatingRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BoundaryResponse {
    pub fn success(data: Vec<RatingRecord>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            status: None,
            error: None,
        }
    }

    pub fn failure(status: u16, error: String) -> Self {
        Self {
            ok: false,
            data: None,
            status: Some(status),
            error: Some(error),
        }
    }
}
