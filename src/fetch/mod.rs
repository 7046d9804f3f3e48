// src/fetch/mod.rs

//! Anti-bot-aware HTTP fetcher.
//!
//! All outbound traffic to the utility site funnels through [`Fetcher`]:
//! a semaphore caps concurrent requests, server errors are retried with
//! exponential backoff, and a bot challenge (403) triggers the external
//! challenge solver before the request is retried with fresh credentials.

mod endpoints;
mod solver;

pub use solver::{CLEARANCE_COOKIE, ChallengeSolver, Solution};

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode, header};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::{AppError, Result};
use crate::models::{Config, FetcherConfig, SolverMode};

/// Process-wide anti-bot credentials.
///
/// Replaced as a pair under one lock so no request ever sees a cookie from
/// one browser session paired with the user-agent of another.
#[derive(Debug, Clone)]
struct Credentials {
    cookie: Option<String>,
    user_agent: String,
}

/// Bounded-concurrency HTTP client for the utility site.
pub struct Fetcher {
    client: Client,
    solver: ChallengeSolver,
    config: FetcherConfig,
    mode: SolverMode,
    semaphore: Semaphore,
    credentials: Mutex<Credentials>,
}

impl Fetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetcher.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            solver: ChallengeSolver::new(&config.solver)?,
            config: config.fetcher.clone(),
            mode: config.solver.mode,
            semaphore: Semaphore::new(config.fetcher.max_concurrent),
            credentials: Mutex::new(Credentials {
                cookie: None,
                user_agent: config.fetcher.user_agent.clone(),
            }),
        })
    }

    /// Issue a request against the site and return its JSON payload.
    ///
    /// In proxy mode the whole request is executed by the challenge solver;
    /// in direct mode it goes through the retry/challenge state machine.
    pub async fn fetch(
        &self,
        path: &str,
        params: &[(&str, String)],
        form: Option<&[(&str, String)]>,
        method: Method,
    ) -> Result<Value> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AppError::source_unavailable(path, 0, "fetcher is shutting down"))?;

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        if self.mode == SolverMode::Proxy {
            return self.solver.proxy(&url, params, form, &method).await;
        }
        self.fetch_direct(&url, params, form, method).await
    }

    async fn fetch_direct(
        &self,
        url: &str,
        params: &[(&str, String)],
        form: Option<&[(&str, String)]>,
        method: Method,
    ) -> Result<Value> {
        let mut attempt: u32 = 0;
        let mut challenge_solved = false;

        loop {
            let credentials = self.credentials_snapshot();
            let mut request = self
                .client
                .request(method.clone(), url)
                .query(params)
                .header(header::USER_AGENT, credentials.user_agent.as_str())
                .header(header::ACCEPT_LANGUAGE, self.config.accept_language.as_str());
            if let Some(cookie) = &credentials.cookie {
                request = request.header(header::COOKIE, format!("{CLEARANCE_COOKIE}={cookie}"));
            }
            if let Some(fields) = form {
                request = request.form(fields);
            }

            let reason = match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::FORBIDDEN {
                        if challenge_solved {
                            return Err(AppError::source_unavailable(
                                url,
                                attempt,
                                "challenge persisted after solving",
                            ));
                        }
                        log::info!("Bot challenge detected on {url}, invoking solver");
                        let solution = self.solver.solve(url).await?;
                        self.store_credentials(solution);
                        challenge_solved = true;
                        continue;
                    }

                    if self.config.retry_statuses.contains(&status.as_u16()) {
                        format!("HTTP {}", status.as_u16())
                    } else {
                        response.error_for_status_ref()?;
                        return Ok(response.json().await?);
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => format!("network error: {e}"),
                Err(e) => return Err(e.into()),
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                log::error!(
                    "{url} failed after {} retries ({reason})",
                    self.config.max_retries
                );
                return Err(AppError::source_unavailable(url, attempt, reason));
            }

            let delay = backoff_delay(Duration::from_millis(self.config.base_delay_ms), attempt);
            log::warn!(
                "Retry {attempt}/{} after {reason}, sleeping {:.1}s",
                self.config.max_retries,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn credentials_snapshot(&self) -> Credentials {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_credentials(&self, solution: Solution) {
        let mut credentials = self
            .credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cookie) = solution.cookie {
            credentials.cookie = Some(cookie);
        }
        if let Some(user_agent) = solution.user_agent {
            credentials.user_agent = user_agent;
        }
    }
}

/// Backoff delay for the given attempt number (1-based): the base delay
/// doubled per prior attempt.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2u32.saturating_pow(doublings))
}
