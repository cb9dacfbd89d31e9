use crate::setup::Proxy;
use fileproxy::content::Content;
use fileproxy::handler::{ProxyRequest, ProxyResponse};
use poem::web::Data;
use poem::{Body, Request, Response, handler};
use std::sync::Arc;

/// Converts the request for the proxy handler and its response back.
#[handler]
pub async fn proxy(request: &Request, handler: Data<&Arc<Proxy>>) -> Response {
    let request = ProxyRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        headers: request.headers().clone(),
    };
    into_response(handler.handle(request).await)
}

fn into_response(proxied: ProxyResponse) -> Response {
    let mut response = Response::default();
    response.set_status(proxied.status);
    *response.headers_mut() = proxied.headers;
    match proxied.body {
        Some(Content::Buffered(bytes)) => response.set_body(Body::from_bytes(bytes)),
        Some(content) => response.set_body(Body::from_bytes_stream(content.into_stream())),
        None => {}
    }
    response
}
