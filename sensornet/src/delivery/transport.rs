use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tdoacore::DetectionPayload;

/// Why a single POST attempt did not land.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("rejected with HTTP status {status}")]
    Rejected { status: u16 },
}

/// One network attempt carrying a payload to `url`.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        url: &str,
        payload: &DetectionPayload,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn post(
        &self,
        url: &str,
        payload: &DetectionPayload,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (**self).post(url, payload)
    }
}

/// JSON-over-HTTP transport with a per-attempt timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| DeliveryError::NetworkUnreachable(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: &DetectionPayload) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|err| DeliveryError::NetworkUnreachable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
