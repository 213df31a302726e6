use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::models::{BundlerError, Result};

/// Poll configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(500),
        }
    }
}

pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Poll `probe` until it yields a value.
///
/// The probe always runs at least once, so a zero timeout still gets one
/// attempt. Fails with [`BundlerError::Timeout`] naming `label` once the
/// deadline has passed without a value.
pub async fn wait_for<F, Fut, T>(
    label: &str,
    config: &PollConfig,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = probe().await {
            if attempt > 1 {
                debug!("{} became available after {} attempts", label, attempt);
            }
            return Ok(value);
        }

        if Instant::now() >= deadline {
            return Err(BundlerError::Timeout(label.to_string()));
        }

        sleep(config.interval).await;
    }
}

/// Fail with a precondition error when `cond` does not hold.
pub fn ensure(
    cond: bool,
    message: impl Into<String>,
    code: Option<i64>,
    data: Option<serde_json::Value>,
) -> Result<()> {
    if cond {
        return Ok(());
    }

    Err(BundlerError::Precondition {
        message: message.into(),
        code,
        data,
    })
}
