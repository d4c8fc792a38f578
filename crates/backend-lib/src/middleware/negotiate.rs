// ============================
// crates/backend-lib/src/middleware/negotiate.rs
// ============================
//! Error rendering by content negotiation.
//!
//! Errors leave the handlers as JSON. Unless the client ranks
//! `application/json` above `text/html`, they are re-rendered as HTML, and
//! authentication failures become a redirect to the sign-in page.
use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::error::RenderedError;

const HTML: (&str, &str) = ("text", "html");
const JSON: (&str, &str) = ("application", "json");

pub async fn negotiate_errors(request: Request<Body>, next: Next) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let path = request
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

    let mut response = next.run(request).await;
    if prefers_json(accept.as_deref()) {
        return response;
    }
    match response.extensions_mut().remove::<RenderedError>() {
        Some(rendered) => rendered.into_html(response, &path),
        None => response,
    }
}

/// True when `accept` ranks JSON strictly above HTML. A missing header or a tie
/// goes to HTML.
pub fn prefers_json(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    quality(accept, JSON) > quality(accept, HTML)
}

/// q-value the most specific matching media range gives `media`, in thousandths
fn quality(accept: &str, media: (&str, &str)) -> u16 {
    let mut best: Option<(u8, u16)> = None;
    for range in accept.split(',') {
        let mut params = range.split(';');
        let Some((kind, subtype)) = params.next().and_then(|m| m.trim().split_once('/')) else {
            continue;
        };
        let (kind, subtype) = (kind.trim(), subtype.trim());

        let specificity = if kind.eq_ignore_ascii_case(media.0) && subtype.eq_ignore_ascii_case(media.1) {
            2
        } else if kind.eq_ignore_ascii_case(media.0) && subtype == "*" {
            1
        } else if kind == "*" && subtype == "*" {
            0
        } else {
            continue;
        };

        let q = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .map_or(1000, |q| (q.clamp(0.0, 1.0) * 1000.0) as u16);

        if best.map_or(true, |(s, _)| specificity > s) {
            best = Some((specificity, q));
        }
    }
    best.map_or(0, |(_, q)| q)
}
