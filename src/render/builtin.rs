//! Built-in renderers.

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::response::Response;
use serde_json::Value;

use super::RenderError;
use crate::proxy::ProxyResponse;

const EMPTY_OBJECT: &str = "{}";
const EMPTY_COLLECTION: &str = "[]";

fn write(out: &mut Response, content_type: &'static str, body: Body) {
    out.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    *out.body_mut() = body;
}

pub(super) fn json(out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError> {
    let body = match response {
        Some(response) => Body::from(serde_json::to_vec(&response.data)?),
        None => Body::from(EMPTY_OBJECT),
    };
    write(out, "application/json", body);
    Ok(())
}

/// Renders the `collection` field as a top-level array.
pub(super) fn json_collection(
    out: &mut Response,
    response: Option<ProxyResponse>,
) -> Result<(), RenderError> {
    let collection = response.and_then(|mut r| r.data.remove("collection"));
    let body = match collection {
        Some(collection) => Body::from(serde_json::to_vec(&collection)?),
        None => Body::from(EMPTY_COLLECTION),
    };
    write(out, "application/json", body);
    Ok(())
}

/// Renders the `content` field as plain text.
pub(super) fn string(out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError> {
    let content = match response.as_ref().and_then(|r| r.data.get("content")) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    write(out, "text/plain", Body::from(content));
    Ok(())
}

/// Passthrough of the single backend's status, headers and body.
pub(super) fn noop(out: &mut Response, response: Option<ProxyResponse>) -> Result<(), RenderError> {
    let Some(response) = response else {
        return Err(RenderError::EmptyResponse);
    };

    for (name, value) in response.metadata.headers.iter() {
        out.headers_mut().append(name.clone(), value.clone());
    }
    if let Some(status) = response.metadata.status_code {
        *out.status_mut() = status;
    }
    if let Some(io) = response.io {
        *out.body_mut() = io;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use crate::proxy::Metadata;

    #[tokio::test]
    async fn test_noop_copies_metadata_and_body() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-upstream", HeaderValue::from_static("1"));
        let response = ProxyResponse {
            metadata: Metadata {
                status_code: Some(StatusCode::CREATED),
                headers,
            },
            io: Some(Body::from("raw bytes")),
            ..ProxyResponse::default()
        };

        let mut out = Response::new(Body::empty());
        out.headers_mut()
            .insert("x-upstream", HeaderValue::from_static("0"));
        noop(&mut out, Some(response)).unwrap();

        assert_eq!(out.status(), StatusCode::CREATED);
        let values: Vec<_> = out.headers().get_all("x-upstream").iter().collect();
        assert_eq!(values, ["0", "1"]);
        let body = to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"raw bytes");
    }
}
