//! builder — сборка одного архива яруса поверх состояния предшественника.
//!
//! Порядок строгий: посев → архив → и только после успешного архива
//! персист цепочечной записи + датированной копии состояния. Падение
//! архиватора не оставляет частичного состояния для целевого яруса.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use crate::archive::Archiver;
use crate::config::SameDayPolicy;
use crate::consts::{ARCHIVE_EXT, SNAR_EXT};
use crate::interval::Interval;
use crate::state::{dir_name, StateStore};

/// Пара датированных файлов одного яруса (архив + снимок состояния).
/// Иммутабельны после записи; удаляются окружением после подтверждённой загрузки.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub interval: Interval,
    pub archive_path: PathBuf,
    pub state_path: PathBuf,
}

impl Artifact {
    /// Оба файла артефакта в порядке загрузки.
    pub fn files(&self) -> [&Path; 2] {
        [&self.archive_path, &self.state_path]
    }
}

pub struct ArchiveBuilder<'a> {
    state: &'a StateStore,
    archiver: &'a dyn Archiver,
    same_day: SameDayPolicy,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(
        state: &'a StateStore,
        archiver: &'a dyn Archiver,
        same_day: SameDayPolicy,
    ) -> Self {
        Self {
            state,
            archiver,
            same_day,
        }
    }

    /// Собрать архив яруса target для каталога dir, датированный date.
    ///
    /// Посев — копией текущей записи предшественника (None для base; сама
    /// запись предшественника не изменяется). После успеха состояние
    /// становится новой цепочечной записью (dir, target).
    pub fn build(&self, dir: &Path, target: Interval, date: &str) -> Result<Artifact> {
        let name = dir_name(dir)?;
        let archive_path = self
            .state
            .root()
            .join(format!("{}_{}_{}.{}", target, name, date, ARCHIVE_EXT));
        let state_path = self
            .state
            .root()
            .join(format!("{}_{}_{}.{}", target, name, date, SNAR_EXT));

        // датированный артефакт мог быть уже удалён после успешной загрузки,
        // поэтому признак "этот ярус сегодня пробегал" — дата цепочечной записи
        let already_ran = archive_path.exists()
            || self
                .state
                .load(dir, target)?
                .map(|st| st.date == date)
                .unwrap_or(false);
        if already_ran {
            match self.same_day {
                SameDayPolicy::Overwrite => {
                    info!(
                        "build: {} of {} already ran on {}, overwriting (same-day rerun)",
                        target, name, date
                    );
                }
                SameDayPolicy::Reject => {
                    return Err(anyhow!(
                        "{} backup of {} already exists for date {} (same-day rerun rejected)",
                        target,
                        name,
                        date
                    ));
                }
            }
        }

        let seed = self.state.seed(dir, target)?;
        match (&seed, target.predecessor()) {
            (Some(s), Some(pred)) => debug!(
                "build: {} seeded from {} state ({} entries)",
                target,
                pred,
                s.entries.len()
            ),
            (None, Some(pred)) => debug!("build: {} has no {} state yet, full archive", target, pred),
            _ => debug!("build: {} is base, full archive", target),
        }

        fs::create_dir_all(self.state.root())
            .with_context(|| format!("create output dir {}", self.state.root().display()))?;

        let mut new_state = self
            .archiver
            .create(dir, seed.as_ref(), target.level(), &archive_path)
            .with_context(|| format!("build {} archive of {}", target, dir.display()))?;
        new_state.date = date.to_string();

        // архив готов — теперь (и только теперь) персистим состояние
        self.state.save(dir, target, &new_state)?;
        fs::write(&state_path, new_state.to_bytes()?)
            .with_context(|| format!("write dated snar {}", state_path.display()))?;

        info!(
            "build: {} -> {} + {}",
            target,
            archive_path.display(),
            state_path.display()
        );
        Ok(Artifact {
            interval: target,
            archive_path,
            state_path,
        })
    }
}
