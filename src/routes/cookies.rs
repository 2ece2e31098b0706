// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookies.
//!
//! Both cookies are `HttpOnly` and `Secure`. Removal cookies repeat the
//! creation attributes so browsers match and drop the originals.

use crate::models::TokenPair;
use crate::services::TokenService;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn base_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

fn with_max_age(mut cookie: Cookie<'static>, age: chrono::Duration) -> Cookie<'static> {
    cookie.set_max_age(time::Duration::seconds(age.num_seconds()));
    cookie
}

/// Set both session cookies for `pair`.
pub fn set_session_cookies(jar: CookieJar, pair: &TokenPair, tokens: &TokenService) -> CookieJar {
    jar.add(with_max_age(
        base_cookie(ACCESS_TOKEN_COOKIE, pair.access_token.clone()),
        tokens.access_ttl(),
    ))
    .add(with_max_age(
        base_cookie(REFRESH_TOKEN_COOKIE, pair.refresh_token.clone()),
        tokens.refresh_ttl(),
    ))
}

fn removal(name: &'static str) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

/// Expire both session cookies.
///
/// `CookieJar::remove` only emits a removal for cookies the request carried,
/// and a bearer-authenticated logout may carry none.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.add(removal(ACCESS_TOKEN_COOKIE))
        .add(removal(REFRESH_TOKEN_COOKIE))
}

/// Non-empty value of the named cookie.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use chrono::Duration;

    fn set_cookies(jar: CookieJar) -> Vec<String> {
        jar.into_response()
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_session_cookie_attributes() {
        let tokens = TokenService::new(
            b"a".to_vec(),
            Duration::minutes(15),
            b"r".to_vec(),
            Duration::days(10),
        );
        let pair = TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        };

        let headers = set_cookies(set_session_cookies(CookieJar::new(), &pair, &tokens));
        let access = headers.iter().find(|h| h.starts_with("accessToken=acc")).unwrap();
        let refresh = headers.iter().find(|h| h.starts_with("refreshToken=ref")).unwrap();

        for cookie in [access, refresh] {
            assert!(cookie.contains("HttpOnly"));
            assert!(cookie.contains("Secure"));
            assert!(cookie.contains("Path=/"));
            assert!(cookie.contains("SameSite=Lax"));
        }
        assert!(access.contains("Max-Age=900"));
        assert!(refresh.contains("Max-Age=864000"));
    }

    #[test]
    fn test_clear_without_request_cookies() {
        let headers = set_cookies(clear_session_cookies(CookieJar::new()));
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.contains("Max-Age=0")));
    }
}
