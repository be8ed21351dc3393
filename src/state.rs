//! state — хранилище snar-состояний по паре (directory, interval).
//!
//! Раскладка: <state_dir>/{interval}_{dirname}.snar — цепочечная запись,
//! перезаписывается при каждом успешном билде своего яруса. Перезапись
//! атомарна (tmp + rename); прежняя позиция в цепочке при этом теряется —
//! принятое поведение, запуски строго последовательны.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::consts::SNAR_EXT;
use crate::interval::Interval;
use crate::snar::SnarState;

/// Имя каталога-источника без пути ("photos" для /data/photos).
pub fn dir_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("cannot derive a name from directory {}", dir.display()))
}

/// Персистентное хранилище состояний цепочки.
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Путь цепочечной записи для (dir, interval).
    pub fn record_path(&self, dir: &Path, interval: Interval) -> Result<PathBuf> {
        let name = dir_name(dir)?;
        Ok(self.root.join(format!("{}_{}.{}", interval, name, SNAR_EXT)))
    }

    /// Загрузить состояние яруса; None, если записи ещё нет.
    pub fn load(&self, dir: &Path, interval: Interval) -> Result<Option<SnarState>> {
        let path = self.record_path(dir, interval)?;
        if !path.exists() {
            return Ok(None);
        }
        let buf = fs::read(&path).with_context(|| format!("read snar {}", path.display()))?;
        let st = SnarState::from_bytes(&buf)
            .with_context(|| format!("parse snar {}", path.display()))?;
        Ok(Some(st))
    }

    /// Записать состояние яруса, заменив прежнюю запись (tmp + rename).
    pub fn save(&self, dir: &Path, interval: Interval, state: &SnarState) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create state dir {}", self.root.display()))?;
        let path = self.record_path(dir, interval)?;
        let tmp = path.with_extension("snar.tmp");
        fs::write(&tmp, state.to_bytes()?)
            .with_context(|| format!("write snar tmp {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename snar into place {}", path.display()))?;
        debug!(
            "state: saved {} ({} entries, level {})",
            path.display(),
            state.entries.len(),
            state.level
        );
        Ok(())
    }

    /// Состояние-посев для target: копия текущей записи предшественника.
    /// Сама запись предшественника остаётся нетронутой. None для base
    /// или если у предшественника ещё нет записи.
    pub fn seed(&self, dir: &Path, target: Interval) -> Result<Option<SnarState>> {
        match target.predecessor() {
            None => Ok(None),
            Some(pred) => self.load(dir, pred),
        }
    }
}
