//! APOD page handler

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{Html, IntoResponse, Response},
};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::ApodDate;
use crate::renderer::PageRenderer;
use crate::web::{
    AppState,
    extractors::{IndexQuery, RequestContext},
};

/// Render the picture for `?date=YYYY-MM-DD`, or today's
pub async fn index(
    State(state): State<AppState>,
    context: RequestContext,
    query: IndexQuery,
) -> AppResult<Response> {
    let date = query.apod_date();
    debug!(
        request_id = %context.request_id,
        user_agent = context.user_agent.as_deref().unwrap_or("-"),
        "Serving APOD page for {}",
        date.map(|d| d.key()).unwrap_or_else(|| "today".to_string())
    );

    let result = state.apod_service.get(date).await;
    let today = ApodDate::today().as_naive();
    match result {
        Ok(served) => {
            let html = PageRenderer::render(&served.record, served.media_file.as_deref(), today)?;
            Ok(Html(html).into_response())
        }
        Err(error) => error_page(error, today),
    }
}

/// Turn a pipeline failure into the error page. Render failures bubble up
/// as a bare 500.
fn error_page(error: AppError, today: NaiveDate) -> AppResult<Response> {
    let status = error.status_code();
    warn!("APOD page failed with {}: {}", status.as_u16(), error);

    let html = PageRenderer::render_error(error.user_message(), today)?;
    let mut response = (status, Html(html)).into_response();

    if status == StatusCode::SERVICE_UNAVAILABLE
        && let Some(seconds) = error.retry_after()
    {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(seconds));
    }

    Ok(response)
}
