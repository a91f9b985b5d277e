//! Nouvelle tentative avec backoff exponentiel
//!
//! Utilisé autour du téléchargement du flux et de la première connexion à la base.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff exponentiel borné
#[derive(Debug, Clone)]
pub struct Backoff {
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            max,
            multiplier,
            current: initial,
        }
    }

    /// Délai avant la prochaine tentative
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(
            self.max,
            Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier),
        );
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(10), 2.0)
    }
}

/// Exécute `op` jusqu'à `attempts` fois (au moins une)
pub async fn retry<T, E, F, Fut>(
    operation: &str,
    attempts: u32,
    mut backoff: Backoff,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = backoff.next_delay();
                warn!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
