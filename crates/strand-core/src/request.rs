//! Lazy request builder and its response decoders.
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strand_model::{HandlingDirective, RequestDescriptor, Response};

use crate::error::Error;
use crate::manager::RequestManager;
use crate::promise::Promise;

/// A described request plus how to present it.
///
/// Building performs no I/O. Each decoder returns a fresh lazy promise; every
/// concluded promise sends its own request.
#[derive(Clone)]
pub struct RequestBuilding {
    manager: RequestManager,
    descriptor: Arc<RequestDescriptor>,
    handling: HandlingDirective,
}

impl RequestBuilding {
    pub(crate) fn new(manager: RequestManager, descriptor: RequestDescriptor, handling: HandlingDirective) -> Self {
        Self {
            manager,
            descriptor: Arc::new(descriptor),
            handling,
        }
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn handling(&self) -> HandlingDirective {
        self.handling
    }

    /// Full response after redirects and validation.
    pub fn response(&self) -> Promise<Response> {
        let descriptor = self.descriptor.clone();
        let handling = self.handling;
        let manager = self.manager.clone();
        Promise::firstly(self.manager.queue(), move || descriptor.prepare(handling).map_err(Error::from))
            .then_promise(move |request| Ok::<_, Error>(manager.execute(request)))
    }

    pub fn response_data(&self) -> Promise<Bytes> {
        self.response().then(|response| Ok::<_, Error>(response.body))
    }

    pub fn response_string(&self) -> Promise<String> {
        self.response().then(|response| decode_string(&response.body))
    }

    pub fn response_json(&self) -> Promise<Value> {
        self.response().then(|response| decode_json::<Value>(&response.body))
    }

    /// Body as a JSON object; any other JSON shape is a decode error.
    pub fn response_dictionary(&self) -> Promise<Map<String, Value>> {
        self.response().then(|response| decode_object(&response.body))
    }

    pub fn response_decodable<T>(&self) -> Promise<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.response().then(|response| decode_json::<T>(&response.body))
    }

    /// Succeeds once the response passed validation; the body is discarded.
    pub fn response_void(&self) -> Promise<()> {
        self.response().then(|_| Ok::<_, Error>(()))
    }
}

fn decode_string(body: &Bytes) -> Result<String, Error> {
    String::from_utf8(body.to_vec()).map_err(|e| Error::Decode(format!("body is not valid UTF-8: {e}")))
}

fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}

fn decode_object(body: &Bytes) -> Result<Map<String, Value>, Error> {
    match decode_json::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Decode(format!("expected a JSON object, got {}", kind_of(&other)))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use strand_model::{Parameters, RetryStrategy};
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::manager::ManagerConfig;
    use crate::queue::Queue;
    use crate::transport::testing::MockTransport;

    const WAIT: Duration = Duration::from_secs(2);

    fn manager(transport: Arc<MockTransport>) -> RequestManager {
        let config = ManagerConfig {
            retry: RetryStrategy::never(),
            ..ManagerConfig::default()
        };
        RequestManager::new(transport, Queue::current("requests").unwrap(), config)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn building_sends_nothing_until_concluded() {
        let transport = Arc::new(MockTransport::new().respond(200, "ok"));
        let building = manager(transport.clone()).get("https://example.test/", HandlingDirective::None);

        let pending = building.response_data();
        sleep(Duration::from_millis(30)).await;
        assert_eq!(transport.calls(), 0);

        let body = timeout(WAIT, pending).await.unwrap().unwrap();
        assert_eq!(body, Bytes::from_static(b"ok"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn each_decoder_sends_its_own_request() {
        let transport = Arc::new(MockTransport::new().respond(200, "a").respond(200, "b"));
        let building = manager(transport.clone()).get("https://example.test/", HandlingDirective::None);

        let first = timeout(WAIT, building.response_string()).await.unwrap().unwrap();
        let second = timeout(WAIT, building.response_string()).await.unwrap().unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn string_decoding_requires_utf8() {
        assert_eq!(decode_string(&Bytes::from_static(b"caf\xc3\xa9")).unwrap(), "café");
        let err = decode_string(&Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn json_decoders() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            id: u32,
            name: String,
        }

        let transport = Arc::new(
            MockTransport::new()
                .respond(200, r#"{"id":7,"name":"seven"}"#)
                .respond(200, r#"{"id":7}"#)
                .respond(200, "[1,2]")
                .respond(200, "not json"),
        );
        let building = manager(transport).get("https://example.test/item", HandlingDirective::Ajax);

        let item: Item = timeout(WAIT, building.response_decodable()).await.unwrap().unwrap();
        assert_eq!(item, Item { id: 7, name: "seven".into() });

        let map = timeout(WAIT, building.response_dictionary()).await.unwrap().unwrap();
        assert_eq!(map.get("id"), Some(&Value::from(7)));

        let err = timeout(WAIT, building.response_dictionary()).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.contains("an array")));

        let err = timeout(WAIT, building.response_json()).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn void_decoder_only_reports_success() {
        let transport = Arc::new(MockTransport::new().respond(204, ""));
        let building = manager(transport).request(RequestDescriptor::post("https://example.test/ping"), HandlingDirective::None);
        timeout(WAIT, building.response_void()).await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn handling_and_parameters_shape_the_outgoing_request() {
        let transport = Arc::new(MockTransport::new().respond(200, "{}"));
        let descriptor = RequestDescriptor::post("https://example.test/search")
            .with_parameters(Parameters::Json(serde_json::json!({"q": "rust"})));
        let building = manager(transport.clone()).request(descriptor, HandlingDirective::Ajax);

        timeout(WAIT, building.response_json()).await.unwrap().unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.headers.get("X-Requested-With"), Some("XMLHttpRequest"));
        assert!(sent.headers.get("Content-Type").is_some_and(|ct| ct.starts_with("application/json")));
        assert_eq!(sent.body.as_deref(), Some(br#"{"q":"rust"}"#.as_slice()));
        assert!(sent.headers.contains("User-Agent"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_url_rejects_without_sending() {
        let transport = Arc::new(MockTransport::new());
        let building = manager(transport.clone()).get("not a url", HandlingDirective::None);

        let err = timeout(WAIT, building.response()).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(transport.calls(), 0);
    }
}
