// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Before-backup hook invocation: an HTTP call with exponential-backoff
//! retries, mirroring `original_source/daemon.py`'s `_hook` (itself built
//! on Python's `retrying` decorator: multiplier 1s, cap 10s).

use snapd_core::{HookSpec, HttpMethod};
use std::time::Duration;
use tracing::warn;

async fn attempt(hook: &HookSpec, client: &reqwest::Client) -> Result<(), snapd_core::HookError> {
    let method = match hook.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    };

    let response = client
        .request(method, &hook.url)
        .timeout(hook.timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                snapd_core::HookError::Timeout
            } else {
                snapd_core::HookError::Transport(e.to_string())
            }
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(snapd_core::HookError::Status { status: status.as_u16(), body })
}

/// Runs `hook`, retrying on failure up to `hook.retries` total attempts
/// with a backoff that doubles from 1s and caps at 10s between attempts.
pub async fn run_hook(hook: &HookSpec, client: &reqwest::Client) -> Result<(), snapd_core::HookError> {
    let attempts = hook.retries.max(1);
    let mut last_err = None;

    for attempt_number in 1..=attempts {
        match attempt(hook, client).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(component = "hook", action = "run_hook", attempt = attempt_number, attempts, error = %err, "hook attempt failed");
                last_err = Some(err);
                if attempt_number < attempts {
                    let backoff_ms = 1000u64.saturating_mul(1u64 << (attempt_number - 1).min(10)).min(10_000);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| snapd_core::HookError::Transport("hook never attempted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapd_core::HookOnFailure;

    fn hook(url: &str, retries: u32) -> HookSpec {
        HookSpec {
            url: url.to_string(),
            method: HttpMethod::Post,
            timeout: Duration::from_millis(200),
            retries,
            onfailure: HookOnFailure::Stop,
        }
    }

    #[tokio::test]
    async fn unreachable_host_fails_after_exhausting_retries() {
        let client = reqwest::Client::new();
        let spec = hook("http://127.0.0.1:1/unreachable", 2);
        let err = run_hook(&spec, &client).await.unwrap_err();
        assert!(matches!(err, snapd_core::HookError::Transport(_)));
    }
}
