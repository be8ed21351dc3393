use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_backup;
mod cmd_plan;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    // Пример: RUST_LOG=debug tierup backup ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        // Логируем ошибку и выходим с кодом 1.
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Backup {
            dir,
            interval,
            bucket,
            part_size_mib,
            state_dir,
            remote_root,
            reject_same_day,
            json,
        } => cmd_backup::exec(
            dir,
            interval,
            bucket,
            part_size_mib,
            state_dir,
            remote_root,
            reject_same_day,
            json,
        ),

        cli::Cmd::Plan { interval } => cmd_plan::exec(interval),
    }
}
