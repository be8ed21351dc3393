// Базовые модули
pub mod consts;
pub mod config;
pub mod interval;
pub mod plan;

// Формат состояния и его хранилище
pub mod snar;
pub mod state;

// Архивация
pub mod archive;
pub mod builder;

// Загрузка в объектное хранилище
pub mod remote; // src/remote/{mod,fs}.rs
pub mod retry;
pub mod upload;
pub mod multipart;

// Оркестрация запуска
pub mod run;

// Удобные реэкспорты
pub use archive::{Archiver, TarGzArchiver};
pub use builder::{ArchiveBuilder, Artifact};
pub use config::{BackupConfig, SameDayPolicy};
pub use interval::Interval;
pub use plan::cascade;
pub use remote::{CompletedPart, Digest, FsObjectStore, ObjectStore, PartInfo, UploadId};
pub use retry::{with_retry, RetryPolicy};
pub use run::{run_backup, run_backup_dated, RunReport};
pub use snar::{FileMeta, SnarState};
pub use state::StateStore;
pub use upload::{UploadRoute, Uploader};
