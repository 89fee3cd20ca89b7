//! Owner fingerprinting and filename validation (§6 "Owner fingerprint").

use std::net::SocketAddr;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// `ownerId = "anon_" + first16hex(SHA-256(ip + "|" + ua + "|" + acceptLanguage))`.
pub fn derive_owner_fingerprint(ip: &str, user_agent: &str, accept_language: &str) -> String {
    let material = format!("{ip}|{user_agent}|{accept_language}");
    let digest = Sha256::digest(material.as_bytes());
    let hex = hex::encode(digest);
    format!("anon_{}", &hex[..16])
}

/// IP resolution: first entry of `X-Forwarded-For`, else `X-Real-IP`, else `"unknown"`.
pub fn resolve_client_ip(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("X-Forwarded-For") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(value) = real_ip.to_str() {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    connect_info.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

/// Derives the owner fingerprint for an incoming request (§6's internal contract).
pub fn owner_fingerprint(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> String {
    let ip = resolve_client_ip(headers, connect_info);
    let user_agent = header_str(headers, "User-Agent");
    let accept_language = header_str(headers, "Accept-Language");
    derive_owner_fingerprint(&ip, user_agent, accept_language)
}

/// Rejects filenames containing `..`, `/`, or `\` (§6 download handler contract).
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_prefixed() {
        let a = derive_owner_fingerprint("1.2.3.4", "curl/8.0", "en-US");
        let b = derive_owner_fingerprint("1.2.3.4", "curl/8.0", "en-US");
        assert_eq!(a, b);
        assert!(a.starts_with("anon_"));
        assert_eq!(a.len(), "anon_".len() + 16);
    }

    #[test]
    fn fingerprint_changes_with_any_input() {
        let a = derive_owner_fingerprint("1.2.3.4", "curl/8.0", "en-US");
        let b = derive_owner_fingerprint("1.2.3.5", "curl/8.0", "en-US");
        assert_ne!(a, b);
    }

    #[test]
    fn filename_validation_rejects_traversal() {
        assert!(is_safe_filename("clip.mp4"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a/b.mp4"));
        assert!(!is_safe_filename("a\\b.mp4"));
        assert!(!is_safe_filename(""));
    }
}
