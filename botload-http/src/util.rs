use super::{Error, Result};

pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn parse_http_url(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(Error::UnsupportedScheme(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        assert!(has_header(&headers, "content-type"));
        assert!(!has_header(&headers, "content-length"));
    }

    #[test]
    fn only_http_schemes_are_accepted() {
        assert!(parse_http_url("http://127.0.0.1:8080/bot/sendMessage").is_ok());
        assert!(parse_http_url("https://api.example.org/bot123/sendMessage").is_ok());
        assert!(matches!(
            parse_http_url("ftp://example.org/"),
            Err(Error::UnsupportedScheme(_))
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
