use axum::http::HeaderValue;
use axum::response::Response;
use http::header::{CACHE_CONTROL, PRAGMA};

/// Cache-Control directives
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    pub no_store: bool,
    pub public: bool,
    pub max_age: Option<u32>,
}

impl CacheControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn to_header_value(&self) -> HeaderValue {
        let mut parts = Vec::new();
        if self.no_store {
            parts.push("no-store".to_string());
        }
        if self.public {
            parts.push("public".to_string());
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("max-age={max_age}"));
        }
        HeaderValue::from_str(&parts.join(", ")).unwrap_or(HeaderValue::from_static("no-store"))
    }

    /// Apply the directives to a response
    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, self.to_header_value());
        // RFC 6749 section 5.1 asks for both headers on token responses
        if self.no_store {
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }
    }
}

pub mod presets {
    use super::*;

    /// Token responses must never be cached
    pub fn no_store() -> CacheControl {
        CacheControl::new().no_store()
    }

    pub fn public_cache(max_age_seconds: u32) -> CacheControl {
        CacheControl::new().public().max_age(max_age_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_no_store() {
        let mut response = "tokens".into_response();
        presets::no_store().apply(&mut response);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[PRAGMA], "no-cache");
    }

    #[test]
    fn test_public_cache() {
        let mut response = "metadata".into_response();
        presets::public_cache(3600).apply(&mut response);
        assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=3600");
        assert!(response.headers().get(PRAGMA).is_none());
    }
}
