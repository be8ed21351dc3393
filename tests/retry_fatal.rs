// tests/retry_fatal.rs
//
// Покрываем контракт retry-обёртки на шве объектного хранилища:
// 1) падения на попытках 1 и 2 + успех на 3 — общий успех, ровно 3 вызова;
// 2) падение на всех 3 попытках — ошибка всего запуска (не "продолжаем");
// 3) исчерпание на части multipart валит весь job, сессия остаётся на сторе.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};

use tierup::{
    CompletedPart, Digest, FsObjectStore, ObjectStore, PartInfo, RetryPolicy, UploadId, Uploader,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tierup-retry-{prefix}-{pid}-{t}-{id}"))
}

/// Обёртка над FsObjectStore, роняющая первые fail_puts вызовов put_object
/// и первые fail_parts вызовов upload_part.
struct FlakyStore {
    inner: FsObjectStore,
    fail_puts: Cell<usize>,
    fail_parts: Cell<usize>,
    put_calls: Cell<usize>,
    part_calls: Cell<usize>,
}

impl FlakyStore {
    fn new(inner: FsObjectStore) -> Self {
        Self {
            inner,
            fail_puts: Cell::new(0),
            fail_parts: Cell::new(0),
            put_calls: Cell::new(0),
            part_calls: Cell::new(0),
        }
    }
}

impl ObjectStore for FlakyStore {
    fn put_object(&self, key: &str, file: &Path, digest: &Digest) -> Result<()> {
        self.put_calls.set(self.put_calls.get() + 1);
        if self.fail_puts.get() > 0 {
            self.fail_puts.set(self.fail_puts.get() - 1);
            return Err(anyhow!("injected network failure"));
        }
        self.inner.put_object(key, file, digest)
    }

    fn create_multipart_upload(&self, key: &str, digest: &Digest) -> Result<UploadId> {
        self.inner.create_multipart_upload(key, digest)
    }

    fn upload_part(
        &self,
        upload: &UploadId,
        part_number: u32,
        file: &Path,
        digest: &Digest,
    ) -> Result<()> {
        self.part_calls.set(self.part_calls.get() + 1);
        if self.fail_parts.get() > 0 {
            self.fail_parts.set(self.fail_parts.get() - 1);
            return Err(anyhow!("injected part failure"));
        }
        self.inner.upload_part(upload, part_number, file, digest)
    }

    fn list_parts(&self, upload: &UploadId) -> Result<Vec<PartInfo>> {
        self.inner.list_parts(upload)
    }

    fn complete_multipart_upload(&self, upload: &UploadId, parts: &[CompletedPart]) -> Result<()> {
        self.inner.complete_multipart_upload(upload, parts)
    }
}

#[test]
fn two_failures_then_success() -> Result<()> {
    let root = unique_root("2then1");
    fs::create_dir_all(&root)?;
    let store = FlakyStore::new(FsObjectStore::open(&root, "b")?);
    store.fail_puts.set(2);

    let f = root.join("a.bin");
    fs::write(&f, b"payload")?;

    let uploader = Uploader::new(&store, 1024, RetryPolicy::new(3));
    uploader.dispatch(&f)?;
    assert_eq!(store.put_calls.get(), 3);
    assert_eq!(fs::read(store.inner.object_path("a.bin"))?, b"payload");

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn three_failures_terminate() -> Result<()> {
    let root = unique_root("allfail");
    fs::create_dir_all(&root)?;
    let store = FlakyStore::new(FsObjectStore::open(&root, "b")?);
    store.fail_puts.set(usize::MAX / 2); // всегда падает

    let f = root.join("a.bin");
    fs::write(&f, b"payload")?;

    let uploader = Uploader::new(&store, 1024, RetryPolicy::new(3));
    let err = uploader.dispatch(&f).unwrap_err();
    assert_eq!(store.put_calls.get(), 3);
    assert!(format!("{err:#}").contains("after 3 attempt(s)"));
    assert!(!store.inner.object_path("a.bin").exists());

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn part_exhaustion_aborts_job_and_leaves_session() -> Result<()> {
    let root = unique_root("partfail");
    fs::create_dir_all(&root)?;
    let store = FlakyStore::new(FsObjectStore::open(&root, "b")?);
    store.fail_parts.set(usize::MAX / 2);

    let f = root.join("big.bin");
    fs::write(&f, vec![9u8; 3000])?;

    // порог 1024 → multipart; первая же часть исчерпает 3 попытки
    let uploader = Uploader::new(&store, 1024, RetryPolicy::new(3));
    let err = uploader.dispatch(&f).unwrap_err();
    assert!(format!("{err:#}").contains("upload part 1"));
    assert_eq!(store.part_calls.get(), 3);

    // объект не собран, заброшенная сессия осталась на сторе
    assert!(!store.inner.object_path("big.bin").exists());
    let sessions: Vec<_> = fs::read_dir(root.join("b"))?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".mpu-"))
        .collect();
    assert_eq!(sessions.len(), 1, "abandoned session expected: {sessions:?}");

    fs::remove_dir_all(&root).ok();
    Ok(())
}
