//! upload — диспетчер загрузок.
//!
//! Чистая классификация по размеру: строго больше порога — multipart,
//! иначе single-shot (файл ровно в порог остаётся single-shot). Порог
//! равен размеру части и задаётся конфигурацией. Retry живёт не здесь,
//! а в single_put/multipart.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use crate::multipart::upload_multipart;
use crate::remote::{Digest, ObjectStore};
use crate::retry::{with_retry, RetryPolicy};

/// Куда ушёл файл — для логов и отчёта.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadRoute {
    SingleShot,
    Multipart,
}

pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    part_size_bytes: u64,
    policy: RetryPolicy,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore, part_size_bytes: u64, policy: RetryPolicy) -> Self {
        Self {
            store,
            part_size_bytes,
            policy,
        }
    }

    /// Классифицировать по размеру (без чтения содержимого).
    pub fn route_for_size(&self, size: u64) -> UploadRoute {
        if size > self.part_size_bytes {
            UploadRoute::Multipart
        } else {
            UploadRoute::SingleShot
        }
    }

    /// Загрузить файл под ключом, равным имени файла.
    pub fn dispatch(&self, file: &Path) -> Result<UploadRoute> {
        let size = fs::metadata(file)
            .with_context(|| format!("stat upload candidate {}", file.display()))?
            .len();
        let key = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("cannot derive object key from {}", file.display()))?;

        let route = self.route_for_size(size);
        debug!(
            "upload: {:?} is {} byte(s), threshold {} -> {:?}",
            key, size, self.part_size_bytes, route
        );
        match route {
            UploadRoute::SingleShot => self.single_put(file, key)?,
            UploadRoute::Multipart => {
                upload_multipart(self.store, self.policy, file, key, self.part_size_bytes)?
            }
        }
        info!("upload: {:?} done via {:?}", key, route);
        Ok(route)
    }

    /// Одна retry-обёрнутая заливка файла целиком.
    fn single_put(&self, file: &Path, key: &str) -> Result<()> {
        let digest = Digest::of_file(file)?;
        with_retry(self.policy, &format!("put {:?}", key), || {
            self.store.put_object(key, file, &digest)
        })
    }
}
