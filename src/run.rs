//! run — оркестрация одного запуска.
//!
//! caller → cascade(R) → последовательные билды (каждый читает/пишет
//! state store) → все артефакты запуска → диспетчер загрузок → на успехе
//! локальные датированные файлы удаляются (цепочечные .snar остаются).
//! Fail-fast: первая же ошибка билда или загрузки прерывает весь запуск.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::Local;
use log::{info, warn};
use serde::Serialize;

use crate::archive::Archiver;
use crate::builder::{ArchiveBuilder, Artifact};
use crate::config::BackupConfig;
use crate::consts::RUN_DATE_FMT;
use crate::interval::Interval;
use crate::plan::cascade;
use crate::remote::ObjectStore;
use crate::retry::RetryPolicy;
use crate::state::StateStore;
use crate::upload::Uploader;

/// Итог запуска (для лога и --json).
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub date: String,
    pub directory: String,
    pub intervals: Vec<String>,
    pub uploaded: usize,
}

/// Запуск с сегодняшней датой.
pub fn run_backup(
    cfg: &BackupConfig,
    store: &dyn ObjectStore,
    archiver: &dyn Archiver,
    dir: &Path,
    requested: Interval,
) -> Result<RunReport> {
    let date = Local::now().format(RUN_DATE_FMT).to_string();
    run_backup_dated(cfg, store, archiver, dir, requested, &date)
}

/// Запуск с явной датой (тесты и повторные прогоны).
pub fn run_backup_dated(
    cfg: &BackupConfig,
    store: &dyn ObjectStore,
    archiver: &dyn Archiver,
    dir: &Path,
    requested: Interval,
    date: &str,
) -> Result<RunReport> {
    // предусловия: ничего не начинаем при невалидной конфигурации/источнике
    cfg.validate()?;
    if !dir.is_dir() {
        return Err(anyhow!(
            "source directory {} does not exist or is not a directory",
            dir.display()
        ));
    }

    let sequence = cascade(requested);
    info!(
        "run: {} of {} -> building {:?}",
        requested,
        dir.display(),
        sequence.iter().map(|i| i.name()).collect::<Vec<_>>()
    );

    let state = StateStore::new(&cfg.state_dir);
    let builder = ArchiveBuilder::new(&state, archiver, cfg.same_day);

    let mut artifacts: Vec<Artifact> = Vec::with_capacity(sequence.len());
    for interval in &sequence {
        artifacts.push(builder.build(dir, *interval, date)?);
    }

    let policy = RetryPolicy::new(cfg.max_attempts);
    let uploader = Uploader::new(store, cfg.part_size_bytes(), policy);
    let mut uploaded = 0usize;
    for artifact in &artifacts {
        for file in artifact.files() {
            uploader.dispatch(file)?;
            uploaded += 1;
        }
    }

    // все загрузки подтверждены — датированные локальные файлы больше не нужны
    for artifact in &artifacts {
        for file in artifact.files() {
            if let Err(e) = fs::remove_file(file) {
                warn!("run: failed to purge {}: {}", file.display(), e);
            }
        }
    }

    info!(
        "run: done, {} interval(s) built, {} object(s) uploaded",
        sequence.len(),
        uploaded
    );
    Ok(RunReport {
        date: date.to_string(),
        directory: dir.display().to_string(),
        intervals: sequence.iter().map(|i| i.name().to_string()).collect(),
        uploaded,
    })
}
