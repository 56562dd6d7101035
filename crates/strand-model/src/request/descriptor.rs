use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::{Url, form_urlencoded};

use crate::{
    HandlingDirective, Headers, KeyValue, Method, Request,
    domain::CONTENT_TYPE,
    error::{ModelError, ModelResult},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Request parameters and how they are encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "encoding", content = "value")]
pub enum Parameters {
    /// URL-encoded pairs: appended to the query for GET/HEAD/DELETE, sent as the body otherwise.
    Form(Vec<KeyValue>),
    /// JSON document sent as the request body.
    Json(serde_json::Value),
}

/// Declarative description of an HTTP call.
///
/// A descriptor performs no I/O. It is turned into a [`Request`] by [`RequestDescriptor::prepare`],
/// which is called again for every execution, so one descriptor can back any number of requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    /// Absolute URL. Query items below are appended to any query already present.
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    /// Raw body. Ignored when `parameters` produce a body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            query: Vec::new(),
            headers: Headers::new(),
            parameters: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(KeyValue::new(key, value));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Resolve the descriptor into a concrete [`Request`].
    ///
    /// Steps:
    /// 1. parse the URL and append `query`;
    /// 2. encode `parameters` into the query or body, setting `Content-Type` if absent;
    /// 3. apply the handling `directive` (fills conventional headers if absent).
    pub fn prepare(&self, directive: HandlingDirective) -> ModelResult<Request> {
        let mut url = Url::parse(&self.url).map_err(|e| ModelError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        let mut headers = self.headers.clone();
        let mut body = self.body.clone();

        append_query(&mut url, &self.query);

        match &self.parameters {
            None => {}
            Some(Parameters::Form(items)) if self.method.encodes_parameters_in_url() => {
                append_query(&mut url, items);
            }
            Some(Parameters::Form(items)) => {
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(items.iter().map(|kv| (kv.key(), kv.value())))
                    .finish();
                body = Some(Bytes::from(encoded));
                headers.set_if_absent(CONTENT_TYPE, FORM_CONTENT_TYPE);
            }
            Some(Parameters::Json(value)) => {
                let encoded =
                    serde_json::to_vec(value).map_err(|e| ModelError::Encoding(e.to_string()))?;
                body = Some(Bytes::from(encoded));
                headers.set_if_absent(CONTENT_TYPE, JSON_CONTENT_TYPE);
            }
        }

        directive.apply(&mut headers);

        Ok(Request {
            url,
            method: self.method,
            headers,
            body,
        })
    }
}

fn append_query(url: &mut Url, items: &[KeyValue]) {
    if items.is_empty() {
        return;
    }
    url.query_pairs_mut()
        .extend_pairs(items.iter().map(|kv| (kv.key(), kv.value())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_rejects_relative_url() {
        let err = RequestDescriptor::get("/relative").prepare(HandlingDirective::None).unwrap_err();
        assert!(matches!(err, ModelError::InvalidUrl { .. }));
    }

    #[test]
    fn query_is_appended_and_encoded() {
        let req = RequestDescriptor::get("https://a.test/search?page=1")
            .with_query("q", "one piece")
            .prepare(HandlingDirective::None)
            .unwrap();
        assert_eq!(req.url.as_str(), "https://a.test/search?page=1&q=one+piece");
    }

    #[test]
    fn no_query_leaves_url_untouched() {
        let req = RequestDescriptor::get("https://a.test/path").prepare(HandlingDirective::None).unwrap();
        assert_eq!(req.url.as_str(), "https://a.test/path");
        assert!(req.body.is_none());
    }

    #[test]
    fn form_parameters_go_to_query_for_get() {
        let req = RequestDescriptor::get("https://a.test/")
            .with_parameters(Parameters::Form(vec![KeyValue::new("id", "42")]))
            .prepare(HandlingDirective::None)
            .unwrap();
        assert_eq!(req.url.query(), Some("id=42"));
        assert!(req.body.is_none());
        assert!(!req.headers.contains(CONTENT_TYPE));
    }

    #[test]
    fn form_parameters_go_to_body_for_post() {
        let req = RequestDescriptor::post("https://a.test/login")
            .with_parameters(Parameters::Form(vec![
                KeyValue::new("user", "a b"),
                KeyValue::new("pass", "x&y"),
            ]))
            .prepare(HandlingDirective::None)
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"user=a+b&pass=x%26y"[..]));
        assert_eq!(req.headers.get(CONTENT_TYPE), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn json_parameters_keep_caller_content_type() {
        let req = RequestDescriptor::post("https://a.test/api")
            .with_header("content-type", "application/vnd.api+json")
            .with_parameters(Parameters::Json(json!({"a": 1})))
            .prepare(HandlingDirective::Ajax)
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(req.headers.get(CONTENT_TYPE), Some("application/vnd.api+json"));
        assert_eq!(req.headers.get("x-requested-with"), Some("XMLHttpRequest"));
    }

    #[test]
    fn prepare_is_repeatable() {
        let desc = RequestDescriptor::get("https://a.test/").with_query("a", "1");
        let first = desc.prepare(HandlingDirective::Browsing).unwrap();
        let second = desc.prepare(HandlingDirective::Browsing).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serde_defaults_method_to_get() {
        let desc: RequestDescriptor = serde_json::from_str(r#"{"url":"https://a.test/"}"#).unwrap();
        assert_eq!(desc.method, Method::Get);
        assert!(desc.headers.is_empty());
    }
}
