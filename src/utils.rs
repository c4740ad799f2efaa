use url::{ParseError, Url};

/// Resolves a server-returned URL (often relative, e.g. `api/transform/image/abc`)
/// against the configured base URL. Absolute URLs pass through unchanged.
pub fn resolve_url(base: &Url, value: &str) -> String {
    match Url::parse(value) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => base
            .join(value)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| value.to_string()),
    }
}

/// Joins path segments onto a base URL, percent-encoding each segment.
pub fn endpoint_url(base: &Url, prefix: &str, segments: &[&str]) -> Result<Url, ParseError> {
    let mut path = prefix.trim_matches('/').to_string();
    for segment in segments {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&urlencoding::encode(segment));
    }
    base.join(&path)
}

/// Ensures the base URL ends with a slash so `Url::join` appends instead of replacing.
pub fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

pub fn parse_f64_input(value: &str, fallback: f64) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    trimmed.parse::<f64>().unwrap_or(fallback)
}

pub fn parse_u64_input(value: &str, fallback: u64) -> u64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    trimmed.parse::<u64>().unwrap_or(fallback)
}

pub fn progress_label(progress: u8) -> String {
    format!("{}%", progress.min(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://studio.local/demo/").unwrap()
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        assert_eq!(
            resolve_url(&base(), "api/transform/image/abc"),
            "http://studio.local/demo/api/transform/image/abc"
        );
        assert_eq!(
            resolve_url(&base(), "https://cdn.example.com/m/t1.glb"),
            "https://cdn.example.com/m/t1.glb"
        );
    }

    #[test]
    fn test_endpoint_segments_are_encoded() {
        let url = endpoint_url(&base(), "api/transform", &["3d-model", "status", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://studio.local/demo/api/transform/3d-model/status/a%20b%2Fc"
        );
    }

    #[test]
    fn test_normalize_base_url_appends_slash() {
        assert_eq!(normalize_base_url(" http://host:5000 "), "http://host:5000/");
        assert_eq!(normalize_base_url("http://host/demo/"), "http://host/demo/");
    }

    #[test]
    fn test_parse_inputs_fall_back() {
        assert_eq!(parse_f64_input("  ", 0.5), 0.5);
        assert_eq!(parse_f64_input("0.7", 0.5), 0.7);
        assert_eq!(parse_u64_input("abc", 9), 9);
        assert_eq!(progress_label(140), "100%");
    }
}
