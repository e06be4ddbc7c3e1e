//! Response headers for the storefront pages.
//!
//! Every page is same-origin only: scripts, styles and forms come from
//! this host, nothing may frame it. Product images are the one exception
//! and may load from any https host. Pages carry customer data (carts,
//! orders, addresses) and are never cached; `/static/` keeps the caching
//! `ServeDir` applies.
//!
//! `Strict-Transport-Security` and `upgrade-insecure-requests` are only
//! sent when the store is served over https. On a plain-http base URL
//! (local development, the test harness) they would lock browsers out.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Path prefix of the static asset service.
const STATIC_PREFIX: &str = "/static/";

const CSP: &str = "default-src 'none'; \
                   script-src 'self'; \
                   style-src 'self'; \
                   font-src 'self'; \
                   img-src 'self' data: https:; \
                   connect-src 'self'; \
                   object-src 'none'; \
                   base-uri 'self'; \
                   form-action 'self'; \
                   frame-ancestors 'none'";

const CSP_HTTPS: &str = "default-src 'none'; \
                         script-src 'self'; \
                         style-src 'self'; \
                         font-src 'self'; \
                         img-src 'self' data: https:; \
                         connect-src 'self'; \
                         object-src 'none'; \
                         base-uri 'self'; \
                         form-action 'self'; \
                         frame-ancestors 'none'; \
                         upgrade-insecure-requests";

/// One year, the minimum browsers accept for preload lists.
const HSTS: &str = "max-age=31536000; includeSubDomains";

/// The storefront uses no device APIs. Payment happens on the provider's
/// site, so `payment` is off too.
const PERMISSIONS_POLICY: &str = "camera=(), geolocation=(), microphone=(), payment=(), usb=()";

/// Set the storefront's security headers on every response.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let is_static = request.uri().path().starts_with(STATIC_PREFIX);
    let https = state.config().serves_https();

    let mut response = next.run(request).await;
    apply(response.headers_mut(), is_static, https);
    response
}

fn apply(headers: &mut HeaderMap, is_static: bool, https: bool) {
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    // Order and account URLs carry ids; keep them off third-party logs.
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(if https { CSP_HTTPS } else { CSP }),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    if https {
        headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }

    if !is_static {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }
}
