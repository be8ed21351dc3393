//! multipart — протокол загрузки большого объекта по частям.
//!
//! Машина состояний (терминальна на complete либо ошибке):
//! initiate → split → upload parts → list → complete → cleanup.
//! Каждая сетевая операция обёрнута в retry; исчерпание попыток на любом
//! шаге фатально для всего запуска. Части режутся чисто по байтовым
//! смещениям (последняя может быть короче) в локальные чанк-файлы
//! {file}.partNNNNN, которые убираются на успешном пути. Заброшенная
//! сессия на сторе при аварии не чистится — известное ограничение.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::consts::PART_FILE_SUFFIX;
use crate::remote::{CompletedPart, Digest, ObjectStore, UploadId};
use crate::retry::{with_retry, RetryPolicy};

/// Залить файл под ключом key по частям размера part_size байт.
pub fn upload_multipart(
    store: &dyn ObjectStore,
    policy: RetryPolicy,
    file: &Path,
    key: &str,
    part_size: u64,
) -> Result<()> {
    if part_size == 0 {
        return Err(anyhow!("part size must be non-zero"));
    }

    // 1. initiate: сессия + дайджест всего файла как метаданные целостности
    let whole = Digest::of_file(file)?;
    let upload = with_retry(policy, &format!("create multipart upload for {:?}", key), || {
        store.create_multipart_upload(key, &whole)
    })?;
    info!("multipart: session {} for {:?}", upload.id, key);

    // 2. split: чанк-файлы по байтовым смещениям
    let chunks = split_into_chunks(file, part_size)?;
    debug!("multipart: {} chunk(s) of <= {} bytes", chunks.len(), part_size);

    // 3. части по возрастанию номеров, с 1
    for (idx, chunk) in chunks.iter().enumerate() {
        let part_number = (idx + 1) as u32;
        let digest = Digest::of_file(chunk)?;
        with_retry(
            policy,
            &format!("upload part {} of {:?}", part_number, key),
            || store.upload_part(&upload, part_number, chunk, &digest),
        )?;
    }

    // 4. перечислить и отфильтровать: серверные поля завершению не нужны
    let manifest = enumerate_parts(store, policy, &upload)?;
    if manifest.len() != chunks.len() {
        return Err(anyhow!(
            "store lists {} part(s) for session {}, expected {}",
            manifest.len(),
            upload.id,
            chunks.len()
        ));
    }

    // 5. complete
    with_retry(policy, &format!("complete multipart upload of {:?}", key), || {
        store.complete_multipart_upload(&upload, &manifest)
    })?;
    info!("multipart: completed {:?} ({} part(s))", key, manifest.len());

    // 6. cleanup локальных чанков — best-effort на успешном пути
    for chunk in &chunks {
        if let Err(e) = fs::remove_file(chunk) {
            warn!("multipart: failed to remove chunk {}: {}", chunk.display(), e);
        }
    }
    Ok(())
}

/// Порезать файл на чанк-файлы {file}.partNNNNN. Возвращает пути в порядке
/// нарезки; номера частей соответствуют этому порядку.
pub fn split_into_chunks(file: &Path, part_size: u64) -> Result<Vec<PathBuf>> {
    let mut r = BufReader::new(
        File::open(file).with_context(|| format!("open for split {}", file.display()))?,
    );
    let mut chunks = Vec::new();
    let mut n: u32 = 0;
    let mut buf = vec![0u8; 1024 * 1024];

    loop {
        n += 1;
        let chunk_path = chunk_path(file, n);
        let mut remaining = part_size;
        let mut written: u64 = 0;
        let mut out = BufWriter::new(
            File::create(&chunk_path)
                .with_context(|| format!("create chunk {}", chunk_path.display()))?,
        );

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let got = r.read(&mut buf[..want])?;
            if got == 0 {
                break;
            }
            out.write_all(&buf[..got])?;
            written += got as u64;
            remaining -= got as u64;
        }
        out.flush()?;
        drop(out);

        if written == 0 {
            // источник кончился ровно на границе предыдущего чанка
            fs::remove_file(&chunk_path).ok();
            break;
        }
        chunks.push(chunk_path);
        if written < part_size {
            break; // последний, короткий
        }
    }

    if chunks.is_empty() {
        return Err(anyhow!("cannot multipart-upload empty file {}", file.display()));
    }
    Ok(chunks)
}

fn chunk_path(file: &Path, part_number: u32) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.with_file_name(format!("{}.{}{:05}", name, PART_FILE_SUFFIX, part_number))
}

/// list_parts под retry + фильтрация до (part_number, etag), сортировка
/// по возрастанию номера.
fn enumerate_parts(
    store: &dyn ObjectStore,
    policy: RetryPolicy,
    upload: &UploadId,
) -> Result<Vec<CompletedPart>> {
    let listed = with_retry(policy, &format!("list parts of session {}", upload.id), || {
        store.list_parts(upload)
    })?;
    let mut manifest: Vec<CompletedPart> = listed.iter().map(CompletedPart::from).collect();
    manifest.sort_by_key(|p| p.part_number);
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
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
        std::env::temp_dir().join(format!("tierup-mp-{prefix}-{pid}-{t}-{id}"))
    }

    #[test]
    fn split_sizes_and_order() -> Result<()> {
        let root = unique_root("split");
        fs::create_dir_all(&root)?;
        let f = root.join("data.bin");
        // 2.5 части по 4 байта
        fs::write(&f, b"0123456789")?;

        let chunks = split_into_chunks(&f, 4)?;
        assert_eq!(chunks.len(), 3);
        assert_eq!(fs::read(&chunks[0])?, b"0123");
        assert_eq!(fs::read(&chunks[1])?, b"4567");
        assert_eq!(fs::read(&chunks[2])?, b"89");
        assert!(chunks[0].to_string_lossy().ends_with("data.bin.part00001"));

        fs::remove_dir_all(&root).ok();
        Ok(())
    }

    #[test]
    fn split_exact_boundary_has_no_empty_tail() -> Result<()> {
        let root = unique_root("exact");
        fs::create_dir_all(&root)?;
        let f = root.join("data.bin");
        fs::write(&f, b"01234567")?;

        let chunks = split_into_chunks(&f, 4)?;
        assert_eq!(chunks.len(), 2);
        assert_eq!(fs::read(&chunks[1])?, b"4567");
        // хвостового пустого part00003 не существует
        assert!(!chunk_path(&f, 3).exists());

        fs::remove_dir_all(&root).ok();
        Ok(())
    }

    #[test]
    fn empty_file_rejected() -> Result<()> {
        let root = unique_root("empty");
        fs::create_dir_all(&root)?;
        let f = root.join("zero.bin");
        fs::write(&f, b"")?;
        assert!(split_into_chunks(&f, 4).is_err());
        fs::remove_dir_all(&root).ok();
        Ok(())
    }
}
