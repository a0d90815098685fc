use async_trait::async_trait;
use serde_json::json;

use crate::client::{BoundaryError, RatingsBoundary};
use crate::models::{BoundaryResponse, FetchRequest, RatingRecord};

/// The trusted half of the boundary: takes fetch messages from the page side
/// and performs the real remote call with the shared service credential.
/// The token is injected at construction, never baked in.
pub struct Relay {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl Relay {
    pub fn new(endpoint: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            token,
        }
    }
}

#[async_trait(?Send)]
impl RatingsBoundary for Relay {
    async fn send_fetch(&self, request: FetchRequest) -> Result<BoundaryResponse, BoundaryError> {
        let body = json!({ "professorName": request.professor_name });
        let response = self
            .http
            .post(self.endpoint.as_str())
            .header(reqwest::header::AUTHORIZATION, self.token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|err| BoundaryError(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| BoundaryError(err.to_string()))?;

        if !status.is_success() {
            return Ok(BoundaryResponse::failure(status.as_u16(), text));
        }

        match serde_json::from_str::<Vec<RatingRecord>>(&text) {
            Ok(records) => Ok(BoundaryResponse::success(records)),
            Err(err) => Ok(BoundaryResponse::failure(
                status.as_u16(),
                format!("malformed ratings payload: {}", err),
            )),
        }
    }
}
