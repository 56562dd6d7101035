use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use strand_core::Error;
use strand_model::{Headers, Method};

pub(crate) fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Outgoing headers. Repeated names are kept as separate entries.
pub(crate) fn header_map(headers: &Headers) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for kv in headers.iter() {
        let name = HeaderName::from_bytes(kv.key().as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("header name '{}': {e}", kv.key())))?;
        let value = HeaderValue::from_str(kv.value())
            .map_err(|e| Error::InvalidRequest(format!("header '{}' value: {e}", kv.key())))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Incoming headers. Values that are not visible ASCII are dropped.
pub(crate) fn headers(map: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            out.append(name.as_str(), value);
        }
    }
    out
}

pub(crate) fn error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::Timeout;
    }
    if err.is_builder() {
        return Error::InvalidRequest(err.to_string());
    }
    Error::transport(&err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_map_one_to_one() {
        assert_eq!(method(Method::Get), reqwest::Method::GET);
        assert_eq!(method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(method(Method::Options), reqwest::Method::OPTIONS);
    }

    #[test]
    fn header_map_keeps_repeated_names() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/html").append("accept", "*/*").append("X-Id", "7");

        let map = header_map(&headers).unwrap();
        assert_eq!(map.get_all("accept").iter().count(), 2);
        assert_eq!(map.get("x-id").unwrap(), "7");
    }

    #[test]
    fn invalid_header_is_an_invalid_request() {
        let mut headers = Headers::new();
        headers.append("Bad Name", "x");
        assert!(matches!(header_map(&headers), Err(Error::InvalidRequest(_))));

        let mut headers = Headers::new();
        headers.append("X-Line", "a\nb");
        assert!(matches!(header_map(&headers), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn incoming_headers_skip_opaque_values() {
        let mut map = HeaderMap::new();
        map.insert("server", HeaderValue::from_static("cloudflare"));
        map.insert("x-raw", HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap());

        let headers = headers(&map);
        assert_eq!(headers.get("Server"), Some("cloudflare"));
        assert!(!headers.contains("x-raw"));
    }
}
