//! remote — шов объектного хранилища.
//!
//! Ровно пять операций, которые потребляет загрузчик: put_object,
//! create_multipart_upload, upload_part, list_parts, complete_multipart_upload.
//! Все возвращают Result, наблюдаемый retry-обёрткой. Дайджесты — SHA-256:
//! base64 — как метаданные стора, hex — как entity tag.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use sha2::{Digest as _, Sha256};

pub mod fs;
pub use fs::FsObjectStore;

/// SHA-256 содержимого (файла целиком либо одной части).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Потоковый дайджест файла.
    pub fn of_file(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open for digest {}", path.display()))?;
        let mut r = BufReader::new(f);
        let mut h = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = r.read(&mut buf)?;
            if n == 0 {
                break;
            }
            h.update(&buf[..n]);
        }
        Ok(Self(h.finalize().into()))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut h = Sha256::new();
        h.update(bytes);
        Self(h.finalize().into())
    }

    /// base64 (STANDARD) — для метаданных сессии/объекта.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// hex — для entity tag.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}

/// Идентификатор открытой multipart-сессии, выданный стором.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadId {
    pub key: String,
    pub id: String,
}

/// Запись части, как её отдаёт стор: с серверными полями (size, uploaded_at),
/// которые завершению не нужны.
#[derive(Clone, Debug)]
pub struct PartInfo {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
    pub uploaded_at: i64,
}

/// Отфильтрованная запись для манифеста завершения: только номер и etag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl From<&PartInfo> for CompletedPart {
    fn from(p: &PartInfo) -> Self {
        Self {
            part_number: p.part_number,
            etag: p.etag.clone(),
        }
    }
}

/// Пять операций объектного хранилища.
pub trait ObjectStore {
    /// Загрузить файл целиком под ключом key.
    fn put_object(&self, key: &str, file: &Path, digest: &Digest) -> Result<()>;

    /// Открыть multipart-сессию; digest всего файла прикладывается
    /// метаданными для проверки целостности стором.
    fn create_multipart_upload(&self, key: &str, digest: &Digest) -> Result<UploadId>;

    /// Загрузить одну часть (номера с 1, по возрастанию).
    fn upload_part(
        &self,
        upload: &UploadId,
        part_number: u32,
        file: &Path,
        digest: &Digest,
    ) -> Result<()>;

    /// Перечислить части, записанные стором против сессии.
    fn list_parts(&self, upload: &UploadId) -> Result<Vec<PartInfo>>;

    /// Свести сессию в единый объект по манифесту частей.
    fn complete_multipart_upload(&self, upload: &UploadId, parts: &[CompletedPart]) -> Result<()>;
}
