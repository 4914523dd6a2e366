use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Request id carried through request extensions. A dedicated type so the
/// extension key cannot collide with another middleware's `HeaderValue`.
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

impl RequestId {
    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or("unknown")
    }
}

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // Preserve an incoming request id; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });

    // Expose to inner layers and handlers via extensions
    req.extensions_mut()
        .insert(RequestId(req_id_value.clone()));

    let mut res = next.run(req).await;

    res.headers_mut().insert(header_name, req_id_value);

    res
}
