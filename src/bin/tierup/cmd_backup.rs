use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use tierup::{
    run_backup, BackupConfig, FsObjectStore, Interval, SameDayPolicy, TarGzArchiver,
};

#[allow(clippy::too_many_arguments)]
pub fn exec(
    dir: PathBuf,
    interval: String,
    bucket: Option<String>,
    part_size_mib: Option<u64>,
    state_dir: Option<PathBuf>,
    remote_root: Option<PathBuf>,
    reject_same_day: bool,
    json: bool,
) -> Result<()> {
    let interval: Interval = interval.parse()?;

    // env-дефолты, флаги поверх
    let mut cfg = BackupConfig::from_env();
    if let Some(b) = bucket {
        cfg.bucket = b;
    }
    if let Some(n) = part_size_mib {
        cfg.part_size_mib = n;
    }
    if let Some(p) = state_dir {
        cfg.state_dir = p;
    }
    if reject_same_day {
        cfg.same_day = SameDayPolicy::Reject;
    }
    cfg.validate()?;

    let remote_root = remote_root
        .or_else(|| std::env::var("TU_REMOTE_ROOT").ok().map(PathBuf::from))
        .ok_or_else(|| anyhow!("remote root is required (set TU_REMOTE_ROOT or --remote-root)"))?;
    let store = FsObjectStore::open(&remote_root, &cfg.bucket)
        .with_context(|| format!("open object store at {}", remote_root.display()))?;

    let report = run_backup(&cfg, &store, &TarGzArchiver, &dir, interval)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "backed up {} ({}): {} object(s) uploaded to bucket {:?}",
            report.directory,
            report.intervals.join(", "),
            report.uploaded,
            cfg.bucket
        );
    }
    Ok(())
}
