use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{COOKIE, HOST},
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    response::Response,
};
use url::Url;

use super::AppState;
use crate::error::ApiError;
use crate::fetch::{is_hop_by_hop, storable_header, DocumentRequest, FetchedDocument};

pub const CACHE_STATUS_HEADER: &str = "x-prefetch-cache";

const MAX_FORWARD_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Top-level document navigation, as browsers mark it with `Sec-Fetch-Mode`
pub fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::GET
        && headers
            .get("sec-fetch-mode")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|mode| mode.eq_ignore_ascii_case("navigate"))
}

/// Fallback handler: intercept navigations, forward everything else
pub async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let target = state
        .upstream
        .join(path_and_query)
        .map_err(|e| ApiError::bad_request(format!("Invalid path {}: {}", path_and_query, e)))?;

    if is_navigation(&parts.method, &parts.headers) {
        let credentials = parts
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let request = DocumentRequest::navigation(target.to_string())
            .with_credentials(credentials)
            .with_forwarded_headers(forwardable_headers(&parts.headers));
        let intercepted = state.agent.intercept(&request).await?;

        let hit = intercepted.is_cache_hit();
        let mut response = document_response(intercepted.into_document(), hit);
        if hit {
            response
                .headers_mut()
                .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));
        }
        return Ok(response);
    }

    forward(&state.client, parts.method, &parts.headers, body, target).await
}

/// Turn a stored or fetched document into a response. Cached replays
/// never carry `Set-Cookie`; live responses keep it.
pub fn document_response(doc: FetchedDocument, from_cache: bool) -> Response {
    let status = StatusCode::from_u16(doc.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(doc.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &doc.headers {
        let relayed = if from_cache { storable_header(name) } else { !is_hop_by_hop(name) };
        if !relayed {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }
    response
}

async fn forward(
    client: &reqwest::Client,
    method: Method,
    headers: &HeaderMap,
    body: Body,
    target: Url,
) -> Result<Response, ApiError> {
    let bytes = to_bytes(body, MAX_FORWARD_BODY_BYTES)
        .await
        .map_err(|e| ApiError::bad_request(format!("Unreadable request body: {}", e)))?;

    let upstream = client
        .request(method, target)
        .headers(forwardable_headers(headers))
        .body(bytes)
        .send()
        .await
        .map_err(crate::error::FetchError::from)?;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name.as_str()) {
            response_headers.append(name.clone(), value.clone());
        }
    }
    let body = upstream.bytes().await.map_err(crate::error::FetchError::from)?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// The caller's request headers minus `Host` and hop-by-hop ones
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut outgoing = HeaderMap::new();
    for (name, value) in headers {
        if name != HOST && !is_hop_by_hop(name.as_str()) {
            outgoing.append(name.clone(), value.clone());
        }
    }
    outgoing
}
