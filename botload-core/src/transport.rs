use std::time::Duration;

use async_trait::async_trait;
use botload_http::{HttpClient, HttpRequest, HttpResponse};

/// Executes one outbound request. Shared by every worker of every run, so implementations
/// must be safe to call concurrently.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, req: HttpRequest) -> botload_http::Result<HttpResponse>;
}

/// [`Transport`] over the pooled hyper client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
    read_timeout: Option<Duration>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>, read_timeout: Option<Duration>) -> Self {
        Self {
            client: HttpClient::new(connect_timeout),
            read_timeout,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(10)), Some(Duration::from_secs(30)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: HttpRequest) -> botload_http::Result<HttpResponse> {
        let timeout = req.timeout.or(self.read_timeout);
        self.client.request(req.with_timeout(timeout)).await
    }
}
