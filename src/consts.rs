//! Общие константы форматов и дефолты (snar, артефакты, retry, multipart).

// -------- Snar (snapshot state) --------
pub const SNAR_MAGIC: &[u8; 8] = b"TUSNAR01";
pub const SNAR_VER_1: u32 = 1;
// Header переменной длины: [magic8][ver u32][level u8][pad3][date_len u32][date][count u64].
pub const SNAR_EXT: &str = "snar";

// -------- Artifacts --------
pub const ARCHIVE_EXT: &str = "tar.gz";
// Формат даты в имени артефакта: {interval}_{dirname}_{date}.tar.gz
pub const RUN_DATE_FMT: &str = "%Y-%m-%d";

// -------- Upload --------
/// Размер части multipart-загрузки в MiB; тот же порог решает
/// single-shot vs multipart (ровно на пороге — single-shot).
pub const DEFAULT_PART_SIZE_MIB: u64 = 100;
pub const MIB: u64 = 1024 * 1024;
// Суффикс локальных чанк-файлов: {file}.part00001, {file}.part00002, ...
pub const PART_FILE_SUFFIX: &str = "part";

// -------- Retry --------
/// Всего попыток на сетевую операцию (первая попытка считается как try 1).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

// -------- Multipart staging (FsObjectStore) --------
pub const MPU_DIR_PREFIX: &str = ".mpu-";
pub const MPU_MANIFEST_FILE: &str = "session.json";
