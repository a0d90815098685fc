use std::rc::Rc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BoundaryResponse, CanonicalName, FetchOutcome, FetchRequest};

/// The boundary channel itself failed; no response crossed back.
#[derive(Debug, Error)]
#[error("boundary channel failure: {0}")]
pub struct BoundaryError(pub String);

/// Trusted intermediary that performs the authenticated cross-origin call
/// on the page's behalf.
#[async_trait(?Send)]
pub trait RatingsBoundary {
    async fn send_fetch(&self, request: FetchRequest) -> Result<BoundaryResponse, BoundaryError>;
}

pub struct RatingsClient {
    boundary: Rc<dyn RatingsBoundary>,
}

impl RatingsClient {
    pub fn new(boundary: Rc<dyn RatingsBoundary>) -> Self {
        Self { boundary }
    }

    /// One request per canonical name. No retries here: a miss is terminal
    /// for the row, and whether to retry is the caller's call.
    pub async fn fetch(&self, name: &CanonicalName) -> FetchOutcome {
        let request = FetchRequest::fetch_professor(name);
        let response = match self.boundary.send_fetch(request).await {
            Ok(response) => response,
            Err(err) => return FetchOutcome::TransportError(err.to_string()),
        };

        if !response.ok {
            return FetchOutcome::ServiceError {
                status: response.status.unwrap_or(0),
                detail: response.error.unwrap_or_default(),
            };
        }

        let records = response.data.unwrap_or_default();
        if records.is_empty() {
            FetchOutcome::NotFound
        } else {
            FetchOutcome::Success(records)
        }
    }
}
