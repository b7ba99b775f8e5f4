use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::redirect::Policy;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::types::{CheckOutcome, CheckRecord};

/// Executes a single probe for a check
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe the check's target; always yields exactly one outcome
    async fn probe(&self, check: &CheckRecord) -> CheckOutcome;
}

/// One-shot delivery of a probe outcome.
///
/// The first `resolve` wins; later calls are ignored and return `false`.
pub struct OutcomeLatch {
    sender: Mutex<Option<oneshot::Sender<CheckOutcome>>>,
}

impl OutcomeLatch {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<CheckOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Arc::new(Self { sender: Mutex::new(Some(sender)) }), receiver)
    }

    pub fn resolve(&self, outcome: CheckOutcome) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Request parameters derived from a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub url: Url,
    pub hostname: String,
    /// Path including the query string
    pub path: String,
}

impl ProbeTarget {
    pub fn from_check(check: &CheckRecord) -> Result<Self, url::ParseError> {
        let url = Url::parse(&check.target())?;
        let hostname = url.host_str().ok_or(url::ParseError::EmptyHost)?.to_string();
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self { url, hostname, path })
    }
}

/// HTTP/HTTPS prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> reqwest::Result<Self> {
        // Redirects are reported as their own status code.
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &CheckRecord) -> CheckOutcome {
        let target = match ProbeTarget::from_check(check) {
            Ok(target) => target,
            Err(e) => return CheckOutcome::transport(format!("invalid target: {e}")),
        };
        let deadline = Duration::from_millis(u64::from(check.timeout_seconds) * 1000);

        debug!(
            check_id = %check.id,
            method = check.method.as_upper(),
            host = %target.hostname,
            path = %target.path,
            "Sending probe"
        );

        let (latch, outcome) = OutcomeLatch::new();

        let request = {
            let latch = Arc::clone(&latch);
            let builder = self.client.request(check.method.into(), target.url).timeout(deadline);
            async move {
                let resolved = match builder.send().await {
                    Ok(response) => CheckOutcome::response(response.status().as_u16()),
                    Err(e) if e.is_timeout() => CheckOutcome::timed_out(),
                    Err(e) => CheckOutcome::transport(e.to_string()),
                };
                latch.resolve(resolved);
            }
        };

        let timer = {
            let latch = Arc::clone(&latch);
            async move {
                tokio::time::sleep(deadline).await;
                latch.resolve(CheckOutcome::timed_out());
            }
        };

        tokio::select! {
            () = request => {}
            () = timer => {}
        }

        outcome.await.unwrap_or_else(|_| CheckOutcome::transport("probe abandoned"))
    }
}
