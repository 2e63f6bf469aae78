use crate::error::{AppError, Result};
use crate::model::{
    BatchUrlRequest, BatchUrlResponse, CreateUrlForm, CreateUrlRequest, CreateUrlResponse,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use pinhole_core::ShortCode;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `POST /`: the URL arrives as a plain-text body or as the `url` form field.
pub async fn create_url_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response> {
    let mime = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let original_url = match mime.as_str() {
        FORM_CONTENT_TYPE => {
            let Form(form) = Form::<CreateUrlForm>::from_request(request, &state).await?;
            form.url
        }
        "text/plain" | "application/x-gzip" => {
            let body = String::from_request(request, &state)
                .await
                .map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;
            body.trim_end_matches(['\r', '\n']).to_string()
        }
        "" => return Err(AppError::UnsupportedContentType("missing".to_string())),
        other => return Err(AppError::UnsupportedContentType(other.to_string())),
    };

    let code = state.shortener().shorten(&original_url).await?;
    Ok((
        StatusCode::CREATED,
        [(CONTENT_TYPE, "text/plain")],
        state.short_url(&code),
    )
        .into_response())
}

/// `POST /api/shorten`
pub async fn create_url_json_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUrlResponse>)> {
    let Json(request) = payload?;

    let code = state.shortener().shorten(&request.url).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateUrlResponse {
            result: state.short_url(&code),
        }),
    ))
}

/// `POST /api/shorten/batch`
pub async fn create_urls_batch_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchUrlResponse>>)> {
    let Json(requests) = payload?;
    if requests.is_empty() {
        return Err(AppError::InvalidBody("batch cannot be empty".to_string()));
    }

    let keys = state.shortener().shorten_batch(&requests).await?;
    let response = keys
        .into_iter()
        .map(|key| BatchUrlResponse {
            short_url: state.short_url(&key.code),
            correlation_id: key.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /{key}`: answers with a temporary redirect to the stored URL.
pub async fn redirect_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let code = ShortCode::parse(key)?;
    let original_url = state.shortener().resolve(&code).await?;
    Ok(Redirect::temporary(&original_url))
}
