use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Тонкий CLI для tierup: валидирует (interval, directory) и передаёт
/// конфигурацию в ядро. Всё остальное делает библиотека.
#[derive(Parser, Debug)]
#[command(name = "tierup", version, about = "Tiered incremental backups with object-store upload")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run one backup: the requested interval plus every shorter one, then upload
    ///
    /// Примеры:
    ///   tierup backup --dir /data/photos --interval daily --bucket backups
    ///   TU_BUCKET=backups tierup backup --dir /data/photos --interval base
    Backup {
        /// Source directory to archive
        #[arg(long)]
        dir: PathBuf,
        /// base | yearly | monthly | weekly | daily
        #[arg(long)]
        interval: String,
        /// Bucket identifier (falls back to TU_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
        /// Multipart part size / dispatch threshold in MiB (falls back to TU_PART_SIZE_MIB)
        #[arg(long)]
        part_size_mib: Option<u64>,
        /// Directory for chain .snar records and dated artifacts (default: TU_STATE_DIR or ".")
        #[arg(long)]
        state_dir: Option<PathBuf>,
        /// Root directory of the filesystem object store (falls back to TU_REMOTE_ROOT)
        #[arg(long)]
        remote_root: Option<PathBuf>,
        /// Fail instead of overwriting a same-day artifact
        #[arg(long, default_value_t = false)]
        reject_same_day: bool,
        /// JSON report on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the build order the cascade planner would use
    Plan {
        /// base | yearly | monthly | weekly | daily
        #[arg(long)]
        interval: String,
    },
}
