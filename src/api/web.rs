use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use tracing::error;
use uuid::Uuid;

use crate::api::pages::FormState;
use crate::api::AppState;
use crate::content::ContentRequest;
use crate::error::status_of;

pub fn create_web_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/articles/:id", get(article_page))
        .route("/articles/:id/download", get(download))
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

fn page_response(status: StatusCode, page: crate::error::Result<String>) -> Response {
    match page {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

async fn index(State(state): State<AppState>) -> Response {
    let form = FormState {
        temperature: state.generator.default_temperature(),
        ..Default::default()
    };
    let recent = state.store.list().await;
    page_response(StatusCode::OK, state.pages.index(&form, &recent))
}

async fn generate(
    State(state): State<AppState>,
    form: Result<Form<ContentRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            let form = FormState {
                temperature: state.generator.default_temperature(),
                error: Some(rejection.body_text()),
                ..Default::default()
            };
            let recent = state.store.list().await;
            return page_response(rejection.status(), state.pages.index(&form, &recent));
        }
    };
    let topic = request.topic.clone();
    let temperature = request
        .temperature
        .unwrap_or_else(|| state.generator.default_temperature());

    let generated = state.generator.generate(request).await;
    let stored = match generated {
        Ok(article) => state.store.insert(article.clone()).await.map(|_| article),
        Err(e) => Err(e),
    };

    match stored {
        Ok(article) => page_response(StatusCode::OK, state.pages.article(&article)),
        Err(e) => {
            let form = FormState {
                topic,
                temperature,
                error: Some(e.to_string()),
            };
            let recent = state.store.list().await;
            page_response(status_of(e.as_ref()), state.pages.index(&form, &recent))
        }
    }
}

async fn article_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.require(id).await {
        Ok(article) => page_response(StatusCode::OK, state.pages.article(&article)),
        Err(e) => {
            let form = FormState {
                temperature: state.generator.default_temperature(),
                error: Some(e.to_string()),
                ..Default::default()
            };
            page_response(status_of(e.as_ref()), state.pages.index(&form, &[]))
        }
    }
}

async fn download(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let article = match state.store.require(id).await {
        Ok(article) => article,
        Err(e) => return (status_of(e.as_ref()), e.to_string()).into_response(),
    };

    let disposition = content_disposition(&article.file_name);
    match HeaderValue::from_str(&disposition) {
        Ok(value) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/markdown; charset=utf-8")),
                (header::CONTENT_DISPOSITION, value),
            ],
            article.markdown,
        )
            .into_response(),
        Err(e) => {
            error!("Invalid Content-Disposition for {}: {}", article.id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create download").into_response()
        }
    }
}

/// `attachment` header with an ASCII fallback name and an RFC 5987 UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}
