//! HTTP implementations of the oracle capabilities.
//!
//! Both services take a JSON POST with the request schema and answer with
//! the raw response body; validation stays in the clients. Connection
//! failures and non-success statuses are transport errors, so they are
//! retried.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{CalendarRequest, CalendarResolver, ClassificationOracle, ClassificationRequest};
use crate::error::OracleError;

fn transport(message: impl ToString) -> OracleError {
    OracleError::Transport {
        message: message.to_string(),
    }
}

/// A JSON-over-HTTP endpoint.
#[derive(Debug, Clone)]
struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
}

impl JsonEndpoint {
    fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post<B: Serialize + Sync>(&self, body: &B) -> Result<serde_json::Value, OracleError> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        debug!(url = %self.url, status = status.as_u16(), "Oracle responded");
        if !status.is_success() {
            return Err(transport(format!("{} returned {}", self.url, status)));
        }

        // A body that is not JSON at all is a schema problem, not a transport one.
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| OracleError::Schema {
            key: self.url.clone(),
            message: format!("response is not JSON: {}", e),
        })
    }
}

/// Classification oracle reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassificationOracle {
    endpoint: JsonEndpoint,
}

impl HttpClassificationOracle {
    /// Creates a client for `url`. `timeout` bounds the whole request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl ClassificationOracle for HttpClassificationOracle {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<serde_json::Value, OracleError> {
        self.endpoint.post(request).await
    }
}

/// Calendar resolver reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCalendarResolver {
    endpoint: JsonEndpoint,
}

impl HttpCalendarResolver {
    /// Creates a client for `url`. `timeout` bounds the whole request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl CalendarResolver for HttpCalendarResolver {
    async fn holidays_for(
        &self,
        request: &CalendarRequest,
    ) -> Result<serde_json::Value, OracleError> {
        self.endpoint.post(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingPeriod, Location};
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_classify_posts_request_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(body_json(json!({"job_title": "ANALISTA"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"excluded": false, "justification": "Regular staff"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let oracle =
            HttpClassificationOracle::new(format!("{}/classify", server.uri()), timeout()).unwrap();
        let body = oracle
            .classify(&ClassificationRequest {
                job_title: "ANALISTA".to_string(),
                context: None,
            })
            .await
            .unwrap();

        assert_eq!(body["excluded"], false);
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let oracle =
            HttpClassificationOracle::new(format!("{}/classify", server.uri()), timeout()).unwrap();
        let result = oracle
            .classify(&ClassificationRequest {
                job_title: "ANALISTA".to_string(),
                context: None,
            })
            .await;

        match result {
            Err(error @ OracleError::Transport { .. }) => assert!(error.is_transient()),
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("holidays: none"))
            .mount(&server)
            .await;

        let resolver =
            HttpCalendarResolver::new(format!("{}/holidays", server.uri()), timeout()).unwrap();
        let result = resolver
            .holidays_for(&CalendarRequest {
                location: Location {
                    municipality: None,
                    state: "SP".to_string(),
                },
                period: BillingPeriod {
                    start_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
                },
            })
            .await;

        assert!(matches!(result, Err(OracleError::Schema { .. })));
    }

    #[tokio::test]
    async fn test_calendar_posts_location_and_period() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/holidays"))
            .and(body_json(json!({
                "location": {"municipality": "Porto Alegre", "state": "RS"},
                "period": {"start_date": "2025-04-15", "end_date": "2025-05-15"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dates": ["2025-04-21"]})))
            .mount(&server)
            .await;

        let resolver =
            HttpCalendarResolver::new(format!("{}/holidays", server.uri()), timeout()).unwrap();
        let body = resolver
            .holidays_for(&CalendarRequest {
                location: Location {
                    municipality: Some("Porto Alegre".to_string()),
                    state: "RS".to_string(),
                },
                period: BillingPeriod {
                    start_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
                },
            })
            .await
            .unwrap();

        assert_eq!(body["dates"][0], "2025-04-21");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let oracle = HttpClassificationOracle::new("http://127.0.0.1:9/classify", timeout()).unwrap();
        let result = oracle
            .classify(&ClassificationRequest {
                job_title: "ANALISTA".to_string(),
                context: None,
            })
            .await;
        assert!(matches!(result, Err(OracleError::Transport { .. })));
    }
}
