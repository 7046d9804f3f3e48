// src/fetch/solver.rs

//! Challenge-solver proxy adapter.
//!
//! Talks to a FlareSolverr-compatible service which drives a real browser:
//! either to obtain anti-bot credentials (`solve`) or to execute a whole
//! request through the browser session (`proxy`).

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::SolverConfig;

/// Name of the anti-bot clearance cookie issued after a solved challenge.
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

/// Credentials extracted from a solved challenge.
///
/// Either field may be absent when the solver's browser did not surface it;
/// callers keep their previous value in that case.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
}

/// Client for the challenge-solving proxy.
pub struct ChallengeSolver {
    client: Client,
    url: String,
    session: String,
    max_timeout_ms: u64,
}

impl ChallengeSolver {
    /// Create a solver client from configuration.
    pub fn new(config: &SolverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            session: config.session.clone(),
            max_timeout_ms: config.max_timeout_ms,
        })
    }

    /// Ask the proxy to pass the challenge on `target_url` and return the
    /// resulting clearance cookie and user-agent.
    pub async fn solve(&self, target_url: &str) -> Result<Solution> {
        let payload = json!({
            "cmd": "request.get",
            "url": target_url,
            "maxTimeout": self.max_timeout_ms,
            "returnOnlyCookies": true,
            "disableMedia": true,
        });

        let envelope = self.post(&payload).await?;
        let solution = Self::expect_ok(&envelope)?;

        let mut cookie = None;
        if let Some(cookies) = solution.get("cookies").and_then(Value::as_array) {
            for entry in cookies {
                if entry.get("name").and_then(Value::as_str) == Some(CLEARANCE_COOKIE) {
                    cookie = entry.get("value").and_then(Value::as_str).map(String::from);
                }
            }
        }
        let user_agent = solution
            .get("userAgent")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Solution { cookie, user_agent })
    }

    /// Execute a whole request through the proxy's browser session and
    /// return the target endpoint's JSON payload.
    pub async fn proxy(
        &self,
        target_url: &str,
        params: &[(&str, String)],
        form: Option<&[(&str, String)]>,
        method: &Method,
    ) -> Result<Value> {
        let mut url = url::Url::parse(target_url)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut payload = json!({
            "cmd": format!("request.{}", method.as_str().to_lowercase()),
            "url": url.as_str(),
            "session": self.session.as_str(),
            "maxTimeout": self.max_timeout_ms,
        });
        if *method != Method::GET {
            if let Some(fields) = form {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter().map(|(k, v)| (*k, v.as_str())))
                    .finish();
                payload["postData"] = Value::String(encoded);
            }
        }

        let envelope = self.post(&payload).await?;
        let solution = Self::expect_ok(&envelope)?;

        let body = solution
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::challenge("solution carries no response body"))?;
        extract_json_payload(body)
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Check the proxy envelope and return its `solution` object.
    fn expect_ok(envelope: &Value) -> Result<&Value> {
        let status = envelope.get("status").and_then(Value::as_str);
        if status != Some("ok") {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            return Err(AppError::challenge(format!(
                "status {}: {}",
                status.unwrap_or("missing"),
                message
            )));
        }
        envelope
            .get("solution")
            .ok_or_else(|| AppError::challenge("ok status without solution object"))
    }
}

/// Pull a JSON document out of a proxied response body.
///
/// The browser wraps JSON endpoints in a viewer page, so the body may carry
/// markup around the actual document.
fn extract_json_payload(body: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(body.trim()) {
        return Ok(value);
    }

    let open = body.find(['[', '{']);
    let close = body.rfind([']', '}']);
    if let (Some(open), Some(close)) = (open, close) {
        if open < close {
            if let Ok(value) = serde_json::from_str(&body[open..=close]) {
                return Ok(value);
            }
        }
    }
    Err(AppError::challenge("proxy returned a non-JSON payload"))
}
