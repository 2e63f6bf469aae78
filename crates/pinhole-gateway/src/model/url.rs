use pinhole_core::BatchRequest;
use serde::{Deserialize, Serialize};

/// Body of `POST /` when sent as a form.
#[derive(Deserialize)]
pub struct CreateUrlForm {
    pub url: String,
}

#[derive(Deserialize)]
pub struct CreateUrlRequest {
    pub url: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreateUrlResponse {
    pub result: String,
}

pub type BatchUrlRequest = Vec<BatchRequest>;

#[derive(Serialize, Deserialize)]
pub struct BatchUrlResponse {
    pub correlation_id: String,
    pub short_url: String,
}
