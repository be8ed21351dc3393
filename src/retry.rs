//! retry — ограниченный повтор сетевых операций.
//!
//! Политика намеренно простая: фиксированное число попыток, немедленный
//! повтор без backoff/jitter. Исчерпание попыток — фатально для всего
//! запуска: обёртка возвращает Err, вызывающие прокидывают его `?` до main.
//! Частичного успеха ("retries exhausted, continuing") не существует.

use anyhow::{Context, Result};
use log::warn;

use crate::consts::DEFAULT_MAX_ATTEMPTS;

/// Параметры повтора. max_attempts — ВСЕГО попыток (первая считается как try 1).
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }
}

/// Выполнить op, повторяя при Err вплоть до policy.max_attempts попыток.
/// what — короткое описание операции для логов и текста ошибки.
pub fn with_retry<T>(
    policy: RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                warn!("{}: attempt {}/{} failed: {:#}", what, attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("{} failed after {} attempt(s)", what, attempts))
            }
        }
    }
}
