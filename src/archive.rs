//! archive — архивирующий примитив (incremental tar.gz).
//!
//! Шов внешнего примитива — трейт Archiver: из каталога, прежнего
//! snar-состояния и level получаем сжатый архив + обновлённое состояние.
//! Дефолтная реализация TarGzArchiver:
//! - детерминированный обход каталога (sorted, depth-first);
//! - файл попадает в архив, если его нет в prior или разошлись mtime/size;
//! - tar::Builder поверх flate2::GzEncoder, права сохраняются заголовками tar;
//! - возвращаемое состояние описывает ВСЕ текущие файлы (не только изменённые)
//!   и проштамповано переданным level.
//!
//! Состояние не персистится здесь — этим владеет builder (и только после
//! успешного архива).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};

use crate::snar::{FileMeta, SnarState};

/// Внешний архивирующий примитив (см. README: restore идёт его же
/// extraction-режимом, строго в порядке base → daily).
pub trait Archiver {
    /// Записать инкрементальный архив каталога dir в out и вернуть
    /// обновлённое состояние. prior=None — полный архив.
    fn create(
        &self,
        dir: &Path,
        prior: Option<&SnarState>,
        level: u8,
        out: &Path,
    ) -> Result<SnarState>;
}

/// tar.gz-архиватор с incremental-отбором по snar-состоянию.
#[derive(Clone, Copy, Debug, Default)]
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn create(
        &self,
        dir: &Path,
        prior: Option<&SnarState>,
        level: u8,
        out: &Path,
    ) -> Result<SnarState> {
        if !dir.is_dir() {
            return Err(anyhow!(
                "source directory {} does not exist or is not a directory",
                dir.display()
            ));
        }

        let file = File::create(out).with_context(|| format!("create archive {}", out.display()))?;
        let enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut tar = tar::Builder::new(enc);
        tar.follow_symlinks(false);

        let mut state = SnarState::new(level);
        let mut emitted: u64 = 0;
        let mut scanned: u64 = 0;

        walk(dir, dir, &mut |rel, abs, meta| {
            scanned += 1;
            if meta.file_type().is_symlink() {
                // симлинки не отслеживаем по состоянию — пишем каждый раз
                tar.append_path_with_name(abs, rel)
                    .with_context(|| format!("append symlink {}", abs.display()))?;
                emitted += 1;
                return Ok(());
            }

            let mtime_secs = meta
                .modified()
                .with_context(|| format!("mtime of {}", abs.display()))?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let fm = FileMeta {
                mtime_secs,
                size: meta.len(),
                mode: meta.permissions().mode(),
            };

            let include = match prior {
                None => true,
                Some(p) => p.changed(rel, &fm),
            };
            if include {
                tar.append_path_with_name(abs, rel)
                    .with_context(|| format!("append {}", abs.display()))?;
                emitted += 1;
            }
            state.entries.insert(rel.to_path_buf(), fm);
            Ok(())
        })?;

        let enc = tar.into_inner().context("finish tar stream")?;
        let mut w = enc
            .finish()
            .with_context(|| format!("finish gzip stream {}", out.display()))?;
        w.flush()
            .with_context(|| format!("flush archive {}", out.display()))?;

        info!(
            "archive: {} -> {} (level {}, {} of {} file(s) emitted)",
            dir.display(),
            out.display(),
            level,
            emitted,
            scanned
        );
        Ok(state)
    }
}

/// Отсортированный рекурсивный обход: на каждый обычный файл/симлинк вызываем
/// f(rel, abs, metadata). Прочие типы (fifo, socket, ...) пропускаем с warn.
fn walk(
    root: &Path,
    dir: &Path,
    f: &mut impl FnMut(&Path, &Path, &fs::Metadata) -> Result<()>,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("list dir {}", dir.display()))?;
    entries.sort();

    for abs in entries {
        let meta = fs::symlink_metadata(&abs)
            .with_context(|| format!("stat {}", abs.display()))?;
        let rel = abs
            .strip_prefix(root)
            .map_err(|_| anyhow!("path {} escapes root {}", abs.display(), root.display()))?
            .to_path_buf();

        if meta.is_dir() {
            walk(root, &abs, f)?;
        } else if meta.is_file() || meta.file_type().is_symlink() {
            f(&rel, &abs, &meta)?;
        } else {
            warn!("archive: skip non-regular file {}", abs.display());
            debug!("archive: file type {:?}", meta.file_type());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("tierup-archive-{prefix}-{pid}-{t}-{id}"))
    }

    fn archive_names(path: &Path) -> Result<Vec<String>> {
        let f = File::open(path)?;
        let dec = flate2::read::GzDecoder::new(f);
        let mut ar = tar::Archive::new(dec);
        let mut names = Vec::new();
        for entry in ar.entries()? {
            let e = entry?;
            names.push(e.path()?.to_string_lossy().into_owned());
        }
        Ok(names)
    }

    #[test]
    fn full_then_incremental() -> Result<()> {
        let root = unique_root("inc");
        let src = root.join("photos");
        fs::create_dir_all(src.join("sub"))?;
        fs::write(src.join("a.txt"), b"aaa")?;
        fs::write(src.join("sub/b.txt"), b"bbb")?;

        let arch = TarGzArchiver;

        // полный архив: оба файла
        let full = root.join("full.tar.gz");
        let st0 = arch.create(&src, None, 0, &full)?;
        assert_eq!(st0.level, 0);
        assert_eq!(st0.entries.len(), 2);
        let mut names = archive_names(&full)?;
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "sub/b.txt".to_string()]);

        // без изменений: пустой инкремент, состояние по-прежнему полное
        let inc1 = root.join("inc1.tar.gz");
        let st1 = arch.create(&src, Some(&st0), 1, &inc1)?;
        assert_eq!(st1.level, 1);
        assert_eq!(st1.entries.len(), 2);
        assert!(archive_names(&inc1)?.is_empty());

        // тронули один файл (размер изменился) — только он в инкременте
        fs::write(src.join("a.txt"), b"aaaa")?;
        let inc2 = root.join("inc2.tar.gz");
        let st2 = arch.create(&src, Some(&st0), 1, &inc2)?;
        assert_eq!(archive_names(&inc2)?, vec!["a.txt".to_string()]);
        assert_eq!(st2.entries.len(), 2);

        fs::remove_dir_all(&root).ok();
        Ok(())
    }

    #[test]
    fn archive_content_roundtrip() -> Result<()> {
        let root = unique_root("content");
        let src = root.join("data");
        fs::create_dir_all(&src)?;
        fs::write(src.join("x.bin"), vec![0xAB; 1000])?;

        let out = root.join("x.tar.gz");
        TarGzArchiver.create(&src, None, 0, &out)?;

        let f = File::open(&out)?;
        let dec = flate2::read::GzDecoder::new(f);
        let mut ar = tar::Archive::new(dec);
        let mut entries = ar.entries()?;
        let mut e = entries.next().expect("one entry")?;
        let mut buf = Vec::new();
        e.read_to_end(&mut buf)?;
        assert_eq!(buf, vec![0xAB; 1000]);

        fs::remove_dir_all(&root).ok();
        Ok(())
    }

    #[test]
    fn vanished_dir_is_fatal() {
        let root = unique_root("gone");
        let out = root.join("out.tar.gz");
        fs::create_dir_all(&root).unwrap();
        let err = TarGzArchiver
            .create(&root.join("missing"), None, 0, &out)
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        fs::remove_dir_all(&root).ok();
    }
}
