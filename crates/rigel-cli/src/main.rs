use anyhow::{bail, Context, Result};
use clap::Parser;
use rigel_core::{load_signatures, scan_and_write, DatabaseSource, ExtensionFilter, ScanOptions, MAX_FILE_SIZE};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod logging;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "rigel", version, about = "Scan a directory tree for known malicious code signatures")]
struct Cli {
    /// 特征库 XML 文件（也可以是 http(s) 链接）
    #[arg(long, value_name = "FILE", default_value = "malware_db.xml")]
    database: String,

    /// 递归扫描的目录
    #[arg(long, value_name = "DIRECTORY", default_value = ".")]
    rootdir: PathBuf,

    /// 并发检查的文件数（小于 1 按 1 处理；"auto"=CPU 核心数）
    #[arg(short = 'n', default_value = "1", allow_hyphen_values = true)]
    workers: String,

    /// 逗号分隔的扩展名白名单（默认：所有文本文件）
    #[arg(long, value_name = "EXTENSIONS")]
    filter: Option<String>,

    /// 跳过 soft 级别特征
    #[arg(long)]
    skip_soft: bool,

    /// 最大扫描文件大小（字节）
    #[arg(long, value_name = "BYTES", default_value_t = MAX_FILE_SIZE)]
    max_file_size: u64,
}

fn main() -> ExitCode {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let opts = ScanOptions {
        database: DatabaseSource::parse(&cli.database),
        root: cli.rootdir,
        workers: parse_workers(&cli.workers)?,
        extensions: cli.filter.as_deref().map(ExtensionFilter::parse).unwrap_or_default(),
        skip_soft: cli.skip_soft,
        max_file_size: cli.max_file_size,
    };

    let signatures = load_signatures(&opts.database, opts.skip_soft).context("database error")?;
    info!(
        database = %opts.database,
        signatures = signatures.len(),
        root = %opts.root.display(),
        workers = opts.worker_count(),
        "starting scan"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stats = scan_and_write(&opts, Arc::new(signatures), &mut out).context("scan failed")?;
    out.flush().ok();

    info!(
        files_queued = stats.files_queued,
        files_scanned = stats.files_scanned,
        files_skipped = stats.files_skipped,
        files_failed = stats.files_failed,
        matches = stats.matches,
        "scan finished"
    );
    Ok(())
}

/// 解析 `-n`："auto" 表示 CPU 核数；整数小于 1 时按 1 处理
fn parse_workers(s: &str) -> Result<usize> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    match s.trim().parse::<i64>() {
        Ok(n) => Ok(usize::try_from(n.max(1)).unwrap_or(usize::MAX)),
        Err(_) => bail!("invalid value {s:?} for -n: expected an integer or \"auto\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_clamped() {
        assert_eq!(parse_workers("4").unwrap(), 4);
        assert_eq!(parse_workers("0").unwrap(), 1);
        assert_eq!(parse_workers("-3").unwrap(), 1);
        assert!(parse_workers("auto").unwrap() >= 1);
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn filter_flag_is_single_use() {
        let err = Cli::try_parse_from(["rigel", "--filter", "php", "--filter", "js"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["rigel"]).unwrap();
        assert_eq!(cli.database, "malware_db.xml");
        assert_eq!(cli.rootdir, PathBuf::from("."));
        assert_eq!(cli.workers, "1");
        assert!(cli.filter.is_none());
        assert!(!cli.skip_soft);
        assert_eq!(cli.max_file_size, MAX_FILE_SIZE);
    }
}
