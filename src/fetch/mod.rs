//! Single logical HTTP GET with bounded retries, exponential backoff and 429 handling.
//!
//! Failures never escape as errors: every attempt's problem is recorded in the [`EventLog`] and
//! the caller gets [`FetchOutcome::Exhausted`] once the attempt budget is spent.

pub mod backoff;

pub use backoff::*;

use log::debug;
use reqwest::{Client, StatusCode};

use crate::common::{EventLog, FailureKind};

const COMPONENT: &str = "fetch";

/// Result of a whole [`Fetcher::fetch`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    Exhausted { attempts: u32 },
}

/// Result of one attempt that got an HTTP response
enum Attempt {
    Body(String),
    RateLimited { retry_after: Option<u64> },
    Status(u16),
}

impl FetchOutcome {
    pub fn into_body(self) -> Option<String> {
        match self {
            FetchOutcome::Success(body) => Some(body),
            _ => None,
        }
    }
}

/// Create the HTTP client shared by every worker of a phase
pub fn create_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
    events: EventLog,
}

impl Fetcher {
    pub fn new(client: Client, policy: FetchPolicy, events: EventLog) -> Self {
        Self {
            client,
            policy,
            events,
        }
    }

    /// One GET with the given timeout. `Err` means a network-level failure.
    async fn attempt(&self, url: &str, timeout_units: u64) -> reqwest::Result<Attempt> {
        let response = self
            .client
            .get(url)
            .timeout(self.policy.units(timeout_units))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            let body = response.text().await?;
            return Ok(Attempt::Body(body));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        Ok(Attempt::Status(status.as_u16()))
    }

    /// Fetch `url`, retrying until a 200 or until `max_attempts` is used up
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.backoff();

        for attempt in 0..max_attempts {
            let attempt_no = attempt + 1;
            let timeout = self.policy.attempt_timeout(attempt);
            debug!("GET {} (attempt {}/{}, timeout {})", url, attempt_no, max_attempts, timeout);

            let wait = match self.attempt(url, timeout).await {
                Ok(Attempt::Body(body)) => return FetchOutcome::Success(body),
                Ok(Attempt::RateLimited { retry_after }) => {
                    let wait = backoff.rate_limited_wait(retry_after);
                    self.events.failure(
                        COMPONENT,
                        "fetch",
                        FailureKind::RateLimited,
                        format!(
                            "{} attempt {}/{}: HTTP 429 (Retry-After {:?}), waiting {}",
                            url, attempt_no, max_attempts, retry_after, wait
                        ),
                    );
                    wait
                }
                Ok(Attempt::Status(status)) => {
                    let wait = backoff.next_wait();
                    self.events.failure(
                        COMPONENT,
                        "fetch",
                        FailureKind::ClientError,
                        format!(
                            "{} attempt {}/{}: HTTP {}, waiting {}",
                            url, attempt_no, max_attempts, status, wait
                        ),
                    );
                    wait
                }
                Err(e) => {
                    let wait = backoff.next_wait();
                    self.events.failure(
                        COMPONENT,
                        "fetch",
                        FailureKind::NetworkTransient,
                        format!(
                            "{} attempt {}/{}: {}, waiting {}",
                            url, attempt_no, max_attempts, e, wait
                        ),
                    );
                    wait
                }
            };

            if attempt_no < max_attempts {
                tokio::time::sleep(self.policy.units(wait)).await;
            }
        }

        self.events.failure(
            COMPONENT,
            "fetch",
            FailureKind::Exhausted,
            format!("{} failed after {} attempts", url, max_attempts),
        );
        FetchOutcome::Exhausted {
            attempts: max_attempts,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockito::Server;
    use std::time::{Duration, Instant};

    /// Millisecond time-units so retries finish quickly
    pub(crate) fn test_policy(max_attempts: u32) -> FetchPolicy {
        FetchPolicy {
            max_attempts,
            base_timeout: 150,
            initial_backoff: 1,
            max_wait: 180,
            unit: Duration::from_millis(1),
        }
    }

    pub(crate) fn test_fetcher(max_attempts: u32, events: &EventLog) -> Fetcher {
        Fetcher::new(create_http_client().unwrap(), test_policy(max_attempts), events.clone())
    }

    /// Two attempts with a long wait between them, so a failing unit stays in flight
    pub(crate) fn slow_retry_fetcher(wait_ms: u64, events: &EventLog) -> Fetcher {
        let policy = FetchPolicy {
            initial_backoff: wait_ms,
            max_wait: wait_ms,
            ..test_policy(2)
        };
        Fetcher::new(create_http_client().unwrap(), policy, events.clone())
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let events = EventLog::new();
        let outcome = test_fetcher(3, &events).fetch(&format!("{}/ok", server.url())).await;

        assert_eq!(outcome, FetchOutcome::Success("hello".to_string()));
        assert!(events.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_exhausts_attempts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let events = EventLog::new();
        let outcome = test_fetcher(3, &events).fetch(&format!("{}/flaky", server.url())).await;

        assert_eq!(outcome, FetchOutcome::Exhausted { attempts: 3 });
        assert_eq!(events.count_kind(FailureKind::ClientError), 3);
        assert_eq!(events.count_kind(FailureKind::Exhausted), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "5")
            .expect(2)
            .create_async()
            .await;

        let events = EventLog::new();
        let start = Instant::now();
        let outcome = test_fetcher(2, &events)
            .fetch(&format!("{}/limited", server.url()))
            .await;

        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(outcome, FetchOutcome::Exhausted { attempts: 2 });
        assert_eq!(events.count_kind(FailureKind::RateLimited), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_network_failure_is_not_fatal() {
        let events = EventLog::new();
        // nothing listens on port 1
        let outcome = test_fetcher(2, &events).fetch("http://127.0.0.1:1/nothing").await;

        assert_eq!(outcome, FetchOutcome::Exhausted { attempts: 2 });
        assert_eq!(events.count_kind(FailureKind::NetworkTransient), 2);
    }

    #[test]
    fn test_into_body() {
        assert_eq!(FetchOutcome::Success("x".into()).into_body(), Some("x".to_string()));
        assert_eq!(FetchOutcome::Exhausted { attempts: 1 }.into_body(), None);
    }
}
