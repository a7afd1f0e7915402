//! Reasoning-oracle client: trait, typed error taxonomy, backoff policy, and
//! the fence-stripping JSON call helper.
//!
//! The oracle is an opaque collaborator consuming one text prompt and
//! returning text that should decode to JSON. Its schema is advisory: every
//! consumer type tolerates missing and extra keys, and a parse failure is a
//! recoverable per-call error, not a crash.

pub mod gemini;
pub mod prompt;

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Typed oracle failure, replacing string matching on error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Transient overload signal; retried under the backoff policy.
    RateLimited,
    /// Network-level failure.
    Transport(String),
    /// Non-retryable API error.
    Api { status: u16, message: String },
    /// The service answered with no usable text.
    EmptyResponse,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::RateLimited => write!(f, "oracle rate limited"),
            OracleError::Transport(msg) => write!(f, "oracle transport error: {msg}"),
            OracleError::Api { status, message } => {
                write!(f, "oracle api error (status {status}): {message}")
            }
            OracleError::EmptyResponse => write!(f, "oracle returned an empty response"),
        }
    }
}

impl std::error::Error for OracleError {}

/// How one structured call failed after retries.
#[derive(Debug)]
pub enum CallError {
    /// Response was not valid JSON even after fence stripping and one retry.
    /// Recoverable per call site; the caller decides whether to skip or stop.
    Parse(String),
    /// Underlying oracle failure: retry ceiling exceeded or non-retryable.
    /// Fatal for the calling stage.
    Oracle(OracleError),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Parse(msg) => write!(f, "oracle response was not valid JSON: {msg}"),
            CallError::Oracle(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for CallError {}

/// Abstraction over reasoning backends. Tests use scripted oracles that
/// return predetermined responses without touching the network.
pub trait Oracle {
    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: true,
        }
    }

    /// Delay before the retry following `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        if self.jitter {
            let extra = rand::rng().random_range(0..=self.base_delay.as_millis() as u64 / 2);
            exp + Duration::from_millis(extra)
        } else {
            exp
        }
    }
}

/// Send a prompt, retrying rate-limit signals under the policy.
pub fn complete_with_backoff<O: Oracle>(
    oracle: &O,
    policy: &BackoffPolicy,
    prompt: &str,
) -> Result<String, OracleError> {
    let mut attempt = 0u32;
    loop {
        match oracle.complete(prompt) {
            Ok(text) => return Ok(text),
            Err(OracleError::RateLimited) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Send a prompt and decode the JSON response into `T`.
///
/// Strips known code-fence wrappers first; on a decode failure the prompt is
/// re-sent once before the failure is surfaced.
pub fn call_json<O: Oracle, T: DeserializeOwned>(
    oracle: &O,
    policy: &BackoffPolicy,
    prompt: &str,
) -> Result<T, CallError> {
    let text = complete_with_backoff(oracle, policy, prompt).map_err(CallError::Oracle)?;
    match decode_json(&text) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            warn!(err = %first_err, "oracle response failed to parse, retrying once");
            let text = complete_with_backoff(oracle, policy, prompt).map_err(CallError::Oracle)?;
            decode_json(&text).map_err(|err| {
                CallError::Parse(format!("{err} (first attempt: {first_err})"))
            })
        }
    }
}

fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let stripped = strip_code_fences(text);
    debug!(bytes = stripped.len(), "decoding oracle response");
    serde_json::from_str(stripped)
}

/// Remove a surrounding ```json / ``` fence pair, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Extract code from a markdown block, or return the trimmed text unchanged
/// when no fence is present. Used for corrected source and generated tests,
/// which the oracle sometimes wraps even when told not to.
pub fn extract_code_block(text: &str) -> String {
    for opener in ["```python", "```"] {
        if let Some(start) = text.find(opener) {
            let after = &text[start + opener.len()..];
            if let Some(end) = after.find("```") {
                return after[..end].trim().to_string();
            }
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct Scripted {
        responses: RefCell<VecDeque<Result<String, OracleError>>>,
        calls: RefCell<u32>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, OracleError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl Oracle for Scripted {
        fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            *self.calls.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(OracleError::EmptyResponse))
        }
    }

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn extracts_python_block_or_passes_through() {
        assert_eq!(
            extract_code_block("here:\n```python\nx = 1\n```\ndone"),
            "x = 1"
        );
        assert_eq!(extract_code_block("x = 1\n"), "x = 1");
    }

    #[test]
    fn call_json_parses_fenced_response() {
        let oracle = Scripted::new(vec![Ok("```json\n{\"summary\": \"ok\"}\n```".to_string())]);
        let value: serde_json::Value = call_json(&oracle, &fast_policy(), "p").expect("call");
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn call_json_retries_parse_failure_once() {
        let oracle = Scripted::new(vec![
            Ok("not json".to_string()),
            Ok("{\"summary\": \"second\"}".to_string()),
        ]);
        let value: serde_json::Value = call_json(&oracle, &fast_policy(), "p").expect("call");
        assert_eq!(value["summary"], "second");
        assert_eq!(*oracle.calls.borrow(), 2);
    }

    #[test]
    fn call_json_gives_up_after_second_parse_failure() {
        let oracle = Scripted::new(vec![
            Ok("not json".to_string()),
            Ok("still not json".to_string()),
        ]);
        let err = call_json::<_, serde_json::Value>(&oracle, &fast_policy(), "p").unwrap_err();
        assert!(matches!(err, CallError::Parse(_)));
    }

    #[test]
    fn backoff_retries_rate_limits_up_to_ceiling() {
        let oracle = Scripted::new(vec![
            Err(OracleError::RateLimited),
            Err(OracleError::RateLimited),
            Ok("{}".to_string()),
        ]);
        let value: serde_json::Value = call_json(&oracle, &fast_policy(), "p").expect("call");
        assert!(value.is_object());
        assert_eq!(*oracle.calls.borrow(), 3);
    }

    #[test]
    fn exceeding_the_ceiling_is_an_oracle_failure() {
        let oracle = Scripted::new(vec![
            Err(OracleError::RateLimited),
            Err(OracleError::RateLimited),
            Err(OracleError::RateLimited),
        ]);
        let err = call_json::<_, serde_json::Value>(&oracle, &fast_policy(), "p").unwrap_err();
        assert!(matches!(err, CallError::Oracle(OracleError::RateLimited)));
        assert_eq!(*oracle.calls.borrow(), 3);
    }

    #[test]
    fn non_retryable_error_fails_immediately() {
        let oracle = Scripted::new(vec![Err(OracleError::Api {
            status: 400,
            message: "bad request".to_string(),
        })]);
        let err = call_json::<_, serde_json::Value>(&oracle, &fast_policy(), "p").unwrap_err();
        assert!(matches!(err, CallError::Oracle(OracleError::Api { .. })));
        assert_eq!(*oracle.calls.borrow(), 1);
    }

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = BackoffPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
