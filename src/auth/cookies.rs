use axum::http::{header, HeaderMap};

use crate::config::AuthConfig;

fn attributes(config: &AuthConfig) -> &'static str {
    if config.cookie_secure {
        "HttpOnly; Secure; SameSite=None; Path=/"
    } else {
        "HttpOnly; SameSite=Lax; Path=/"
    }
}

pub fn refresh_cookie(config: &AuthConfig, token: &str) -> String {
    let max_age_secs = config.refresh_token_hours * 3600;
    format!(
        "{}={}; {}; Max-Age={}",
        config.cookie_name,
        token,
        attributes(config),
        max_age_secs
    )
}

pub fn clear_refresh_cookie(config: &AuthConfig) -> String {
    format!("{}=; {}; Max-Age=0", config.cookie_name, attributes(config))
}

pub fn get_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
