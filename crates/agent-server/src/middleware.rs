//! Conversation ID middleware
//!
//! Takes the id from the `X-Conversation-ID` request header, or generates
//! one, exposes it to handlers as [`ConversationId`] and echoes it on the
//! response.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub static CONVERSATION_ID_HEADER: HeaderName = HeaderName::from_static("x-conversation-id");

/// Request-scoped (ambient) conversation id
#[derive(Clone, Debug)]
pub struct ConversationId(pub String);

pub async fn conversation_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&CONVERSATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

    tracing::debug!(conversation_id = %id, "Conversation id resolved");
    request.extensions_mut().insert(ConversationId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(CONVERSATION_ID_HEADER.clone(), value);
    }
    response
}
