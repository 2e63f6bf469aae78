use crate::error::Result;
use crate::state::AppState;
use axum::extract::State;

pub async fn ping_handler(State(state): State<AppState>) -> Result<&'static str> {
    state.shortener().ping(state.ping_timeout()).await?;
    Ok("OK")
}
