/// Token extraction and cookie construction helpers
use crate::config::CookieOptions;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Cookie names the server sets and reads
pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Extract the access token: cookie takes precedence over the header
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| extract_bearer_token(headers))
}

/// Extract the refresh token cookie, if present
pub fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
}

/// Build a server-only-writable auth cookie from the configured attributes.
/// Options arrive as a plain value; there is no shared cookie state.
pub fn auth_cookie(name: &'static str, value: String, options: &CookieOptions) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(options.secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie
}

/// Add both token cookies to a jar
pub fn with_token_cookies(
    jar: CookieJar,
    access_token: String,
    refresh_token: String,
    options: &CookieOptions,
) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, access_token, options))
        .add(auth_cookie(REFRESH_COOKIE, refresh_token, options))
}

/// Remove both token cookies from a jar
pub fn without_token_cookies(jar: CookieJar, options: &CookieOptions) -> CookieJar {
    jar.remove(auth_cookie(ACCESS_COOKIE, String::new(), options))
        .remove(auth_cookie(REFRESH_COOKIE, String::new(), options))
}
