//! Файловая реализация объектного хранилища.
//!
//! Раскладка: <root>/<bucket>/<key> — готовые объекты;
//! <root>/<bucket>/.mpu-<id>/ — staging открытой multipart-сессии:
//! part-00001, part-00002, ... + session.json (манифест сессии).
//!
//! Семантика повторяет реальный стор там, где это важно протоколу:
//! - upload_part сверяет клиентский дайджест с содержимым части;
//! - complete принимает только непрерывные возрастающие номера с 1
//!   и совпадающие etag, иначе ошибка;
//! - заброшенная сессия остаётся на диске (известное ограничение).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::consts::{MPU_DIR_PREFIX, MPU_MANIFEST_FILE};
use crate::remote::{CompletedPart, Digest, ObjectStore, PartInfo, UploadId};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Манифест сессии в session.json.
#[derive(Debug, Serialize, Deserialize)]
struct SessionManifest {
    key: String,
    digest_b64: String,
    created_at: i64,
    parts: Vec<SessionPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionPart {
    part_number: u32,
    etag: String,
    size: u64,
    uploaded_at: i64,
}

pub struct FsObjectStore {
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    /// Открыть (создав при необходимости) bucket под root.
    pub fn open(root: &Path, bucket: &str) -> Result<Self> {
        let bucket_dir = root.join(bucket);
        fs::create_dir_all(&bucket_dir)
            .with_context(|| format!("create bucket dir {}", bucket_dir.display()))?;
        Ok(Self { bucket_dir })
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir.join(key)
    }

    fn session_dir(&self, upload: &UploadId) -> PathBuf {
        self.bucket_dir.join(format!("{}{}", MPU_DIR_PREFIX, upload.id))
    }

    fn load_manifest(&self, upload: &UploadId) -> Result<SessionManifest> {
        let path = self.session_dir(upload).join(MPU_MANIFEST_FILE);
        let buf = fs::read(&path)
            .with_context(|| format!("no such multipart session {}", upload.id))?;
        let m: SessionManifest =
            serde_json::from_slice(&buf).with_context(|| format!("parse {}", path.display()))?;
        if m.key != upload.key {
            return Err(anyhow!(
                "session {} belongs to key {:?}, not {:?}",
                upload.id,
                m.key,
                upload.key
            ));
        }
        Ok(m)
    }

    fn save_manifest(&self, upload: &UploadId, m: &SessionManifest) -> Result<()> {
        let path = self.session_dir(upload).join(MPU_MANIFEST_FILE);
        let mut f = fs::File::create(&path)
            .with_context(|| format!("write session manifest {}", path.display()))?;
        f.write_all(&serde_json::to_vec_pretty(m)?)?;
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn put_object(&self, key: &str, file: &Path, digest: &Digest) -> Result<()> {
        let actual = Digest::of_file(file)?;
        if actual != *digest {
            return Err(anyhow!("digest mismatch for put of {:?}", key));
        }
        let dst = self.object_path(key);
        fs::copy(file, &dst)
            .with_context(|| format!("store object {}", dst.display()))?;
        debug!("fs-store: put {:?} ({} bytes)", key, fs::metadata(&dst)?.len());
        Ok(())
    }

    fn create_multipart_upload(&self, key: &str, digest: &Digest) -> Result<UploadId> {
        let pid = std::process::id();
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let n = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let upload = UploadId {
            key: key.to_string(),
            id: format!("{pid}-{t}-{n}"),
        };

        let dir = self.session_dir(&upload);
        fs::create_dir_all(&dir)
            .with_context(|| format!("create session dir {}", dir.display()))?;
        self.save_manifest(
            &upload,
            &SessionManifest {
                key: key.to_string(),
                digest_b64: digest.to_base64(),
                created_at: Utc::now().timestamp(),
                parts: Vec::new(),
            },
        )?;
        debug!("fs-store: multipart session {} for {:?}", upload.id, key);
        Ok(upload)
    }

    fn upload_part(
        &self,
        upload: &UploadId,
        part_number: u32,
        file: &Path,
        digest: &Digest,
    ) -> Result<()> {
        if part_number == 0 {
            return Err(anyhow!("part numbers start at 1"));
        }
        let actual = Digest::of_file(file)?;
        if actual != *digest {
            return Err(anyhow!(
                "digest mismatch for part {} of session {}",
                part_number,
                upload.id
            ));
        }

        let mut m = self.load_manifest(upload)?;
        let dst = self.session_dir(upload).join(format!("part-{:05}", part_number));
        fs::copy(file, &dst)
            .with_context(|| format!("store part {}", dst.display()))?;

        // повторная заливка того же номера заменяет запись
        m.parts.retain(|p| p.part_number != part_number);
        m.parts.push(SessionPart {
            part_number,
            etag: actual.to_hex(),
            size: fs::metadata(&dst)?.len(),
            uploaded_at: Utc::now().timestamp(),
        });
        m.parts.sort_by_key(|p| p.part_number);
        self.save_manifest(upload, &m)?;
        Ok(())
    }

    fn list_parts(&self, upload: &UploadId) -> Result<Vec<PartInfo>> {
        let m = self.load_manifest(upload)?;
        Ok(m.parts
            .iter()
            .map(|p| PartInfo {
                part_number: p.part_number,
                etag: p.etag.clone(),
                size: p.size,
                uploaded_at: p.uploaded_at,
            })
            .collect())
    }

    fn complete_multipart_upload(&self, upload: &UploadId, parts: &[CompletedPart]) -> Result<()> {
        let m = self.load_manifest(upload)?;
        if parts.is_empty() {
            return Err(anyhow!("empty part manifest for session {}", upload.id));
        }

        // стор отвергает пропуски и нарушение порядка
        for (i, p) in parts.iter().enumerate() {
            let want = (i + 1) as u32;
            if p.part_number != want {
                return Err(anyhow!(
                    "part manifest not contiguous: expected part {}, got {}",
                    want,
                    p.part_number
                ));
            }
            let recorded = m
                .parts
                .iter()
                .find(|sp| sp.part_number == p.part_number)
                .ok_or_else(|| anyhow!("manifest names unknown part {}", p.part_number))?;
            if recorded.etag != p.etag {
                return Err(anyhow!(
                    "etag mismatch for part {}: manifest {:?}, recorded {:?}",
                    p.part_number,
                    p.etag,
                    recorded.etag
                ));
            }
        }

        // сведение: конкатенация частей в целевой объект
        let dir = self.session_dir(upload);
        let dst = self.object_path(&upload.key);
        let mut out = fs::File::create(&dst)
            .with_context(|| format!("create object {}", dst.display()))?;
        for p in parts {
            let src = dir.join(format!("part-{:05}", p.part_number));
            let bytes = fs::read(&src)
                .with_context(|| format!("read part {}", src.display()))?;
            out.write_all(&bytes)?;
        }
        out.sync_all()?;

        fs::remove_dir_all(&dir)
            .with_context(|| format!("remove session dir {}", dir.display()))?;
        debug!(
            "fs-store: completed {:?} from {} part(s)",
            upload.key,
            parts.len()
        );
        Ok(())
    }
}
