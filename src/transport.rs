//! HTTP transport

use crate::config::ClientConfig;
use crate::payload::SubmissionPayload;
use crate::protocol::{OptionsResponse, ValidationResult};
use crate::{ClientError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// How the components reach the server
#[async_trait]
pub trait FormTransport: Send + Sync {
    /// POST a form-encoded payload, decode the validation result
    async fn post_form(&self, url: &Url, payload: &SubmissionPayload) -> Result<ValidationResult>;

    /// GET an options list
    async fn get_options(&self, url: &Url) -> Result<OptionsResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    csrf_header: Option<String>,
}

impl HttpTransport {
    /// Client with the configured headers and timeout
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json; charset=utf-8"));
        if let Some(cookie) = &config.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ClientError::Config(format!("invalid cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            csrf_header: config.csrf_header.clone(),
        })
    }

    async fn decode<T: DeserializeOwned>(url: &Url, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl FormTransport for HttpTransport {
    async fn post_form(&self, url: &Url, payload: &SubmissionPayload) -> Result<ValidationResult> {
        let mut req = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(payload.encode());

        if let Some(token) = &self.csrf_header {
            req = req.header("X-CSRFToken", token);
        }

        let resp = req.send().await?;
        Self::decode(url, resp).await
    }

    async fn get_options(&self, url: &Url) -> Result<OptionsResponse> {
        let resp = self.client.get(url.clone()).send().await?;
        Self::decode(url, resp).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-process transport

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// A request the mock has seen
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        Post { url: String, body: String },
        Get { url: String },
    }

    pub enum Reply {
        Validation(Result<ValidationResult>),
        Options(Result<OptionsResponse>),
    }

    struct Scripted {
        reply: Reply,
        gate: Option<oneshot::Receiver<()>>,
    }

    /// Replies are handed out in call order
    #[derive(Default)]
    pub struct MockTransport {
        replies: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(&self, reply: Reply) {
            self.replies.lock().push_back(Scripted { reply, gate: None });
        }

        /// Reply held back until the returned sender fires
        pub fn gated_reply(&self, reply: Reply) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().push_back(Scripted { reply, gate: Some(rx) });
            tx
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().clone()
        }

        fn next(&self) -> Scripted {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| panic!("mock transport: no reply scripted"))
        }
    }

    #[async_trait]
    impl FormTransport for MockTransport {
        async fn post_form(
            &self,
            url: &Url,
            payload: &SubmissionPayload,
        ) -> Result<ValidationResult> {
            self.requests.lock().push(Recorded::Post {
                url: url.to_string(),
                body: payload.encode(),
            });
            let scripted = self.next();
            if let Some(gate) = scripted.gate {
                let _ = gate.await;
            }
            match scripted.reply {
                Reply::Validation(r) => r,
                Reply::Options(_) => Err(ClientError::Decode("unexpected options reply".into())),
            }
        }

        async fn get_options(&self, url: &Url) -> Result<OptionsResponse> {
            self.requests.lock().push(Recorded::Get { url: url.to_string() });
            let scripted = self.next();
            if let Some(gate) = scripted.gate {
                let _ = gate.await;
            }
            match scripted.reply {
                Reply::Options(r) => r,
                Reply::Validation(_) => {
                    Err(ClientError::Decode("unexpected validation reply".into()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldGroup, GroupId};
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        let config = ClientConfig {
            cookie: Some("sessionid=abc".into()),
            ..ClientConfig::default()
        };
        HttpTransport::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_post_form_encodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/questions/5/"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("cookie", "sessionid=abc"))
            .and(body_string("csrfmiddlewaretoken=T&question=5&value=yes"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let group = FieldGroup::new(
            GroupId(0),
            vec![Field::hidden("form-0-question", "5"), Field::text("form-0-value", "yes")],
        );
        let payload = SubmissionPayload::from_group(&group, "csrfmiddlewaretoken", "T");
        let url = Url::parse(&format!("{}/questions/5/", server.uri())).unwrap();

        let result = transport().post_form(&url, &payload).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_get_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stats/available_options"))
            .and(query_param("q", "7"))
            .and(header("accept", "application/json; charset=utf-8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": 1, "description": "Yes"}, {"id": 2, "description": "No"}]
            })))
            .mount(&server)
            .await;

        let url =
            Url::parse(&format!("{}/stats/available_options?q=7&ms=1", server.uri())).unwrap();
        let response = transport().get_options(&url).await.unwrap();
        assert_eq!(response.descriptors("description").len(), 2);
    }

    #[tokio::test]
    async fn test_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let url =
            Url::parse(&format!("{}/volunteers/available_authorities/", server.uri())).unwrap();
        let err = transport().get_options(&url).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/stats/available_questions", server.uri())).unwrap();
        let err = transport().get_options(&url).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
