//! Centralized configuration for tierup.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - The core never reads ambient process state: a BackupConfig is built
//!   explicitly (or via from_env() in the CLI layer) and passed in.
//! - Retry count and part size are named parameters so tests can override them.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::consts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PART_SIZE_MIB, MIB};

/// What to do when a tier is rebuilt on a date it already ran on
/// (tracked by the chain record's date, so the check survives the
/// post-upload purge of dated artifacts). Overwrite is the default;
/// Reject turns the rerun into a conflict error before anything is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameDayPolicy {
    Overwrite,
    Reject,
}

/// Top-level configuration consumed by the core.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    /// Target bucket identifier (required, non-empty).
    /// Env: TU_BUCKET
    pub bucket: String,

    /// Multipart part size in MiB; also the single-shot/multipart threshold
    /// (a file of exactly this size stays single-shot).
    /// Env: TU_PART_SIZE_MIB (default 100)
    pub part_size_mib: u64,

    /// Total tries per network operation (first attempt counts as try 1).
    /// Env: TU_MAX_ATTEMPTS (default 3)
    pub max_attempts: usize,

    /// Same-day rerun policy.
    /// Env: TU_SAME_DAY = "overwrite" | "reject" (default overwrite)
    pub same_day: SameDayPolicy,

    /// Directory holding chain .snar records and dated artifacts.
    pub state_dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            part_size_mib: DEFAULT_PART_SIZE_MIB,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            same_day: SameDayPolicy::Overwrite,
            state_dir: PathBuf::from("."),
        }
    }
}

impl BackupConfig {
    /// Load configuration from environment variables (CLI-layer convenience;
    /// the core itself only ever sees the resulting value).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TU_BUCKET") {
            cfg.bucket = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("TU_PART_SIZE_MIB") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.part_size_mib = n;
            }
        }
        if let Ok(v) = std::env::var("TU_MAX_ATTEMPTS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.max_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("TU_SAME_DAY") {
            match v.trim().to_ascii_lowercase().as_str() {
                "reject" => cfg.same_day = SameDayPolicy::Reject,
                "overwrite" => cfg.same_day = SameDayPolicy::Overwrite,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("TU_STATE_DIR") {
            if !v.trim().is_empty() {
                cfg.state_dir = PathBuf::from(v.trim());
            }
        }

        cfg
    }

    /// Precondition check: required fields present and sane.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(anyhow!("bucket is required (set TU_BUCKET or --bucket)"));
        }
        if self.part_size_mib == 0 {
            return Err(anyhow!("part size must be non-zero"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max attempts must be at least 1"));
        }
        Ok(())
    }

    /// Part size / dispatch threshold in bytes.
    #[inline]
    pub fn part_size_bytes(&self) -> u64 {
        self.part_size_mib * MIB
    }
}
