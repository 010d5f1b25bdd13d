//! Script execution webhook handler.

use axum::{body::Bytes, extract::State, response::Response};

use crate::state::AppState;

/// Execute a script on behalf of an API key holder.
///
/// # Endpoint
///
/// `POST /api/v1/webhook`
///
/// # Request Body
///
/// ```json
/// {
///   "title": "Weekly report",
///   "script": "return \"hi\";",
///   "apiKey": "8a6f0c1e-..."
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{success, result, timestamp, executionTimeMs}`
/// - **Error (400)**: Malformed body, missing fields, or script failure
/// - **Error (401)**: Invalid API key
/// - **Error (500)**: Storage or internal failure
///
/// The body is taken raw so that malformed JSON gets the standard error
/// envelope instead of axum's extractor rejection.
pub async fn execute_script(State(state): State<AppState>, body: Bytes) -> Response {
    state.request_handler.handle(&body).await
}
