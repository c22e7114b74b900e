//! 扫描主流程与并行调度
//!
//! - 生产者线程遍历目录，经有界通道投递路径
//! - 固定大小的 Rayon 线程池中运行 N 个工作者，逐个取路径检查
//! - 命中结果经通道回到调用线程，由 Reporter 串行写出，避免行内交错
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::check::{FileChecker, FileOutcome};
use crate::normalize::Normalizer;
use crate::options::{ScanOptions, ScanStats};
use crate::report::{MatchResult, Reporter};
use crate::signatures::SignatureSet;
use crate::walk::spawn_walker;

/// 命中队列容量
const MATCH_QUEUE_CAPACITY: usize = 64;

/// 工作者共享的计数器
#[derive(Debug, Default)]
struct Counters {
    scanned: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// 扫描 `opts.root` 并把命中行写入 `out`
///
/// 只有线程创建失败或输出写入失败会返回错误；单个文件的问题只告警。
pub fn scan_and_write(opts: &ScanOptions, signatures: Arc<SignatureSet>, out: &mut dyn Write) -> Result<ScanStats> {
    let normalizer = Normalizer::new().context("compile normalizers")?;
    let checker = Arc::new(FileChecker::new(signatures, normalizer, opts));
    let workers = opts.worker_count();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("rigel-worker-{i}"))
        .build()
        .context("build worker pool")?;

    let (path_rx, walker) = spawn_walker(opts.root.clone(), opts.extensions.clone()).context("spawn walker")?;
    let (match_tx, match_rx) = bounded::<MatchResult>(MATCH_QUEUE_CAPACITY);
    let counters = Arc::new(Counters::default());

    // Writer 留在当前线程；工作者在后台线程内的 Rayon 池中执行
    let scan_thread = {
        let counters = Arc::clone(&counters);
        std::thread::Builder::new()
            .name("rigel-scan".into())
            .spawn(move || {
                pool.scope(|s| {
                    for id in 0..workers {
                        let paths = path_rx.clone();
                        let matches = match_tx.clone();
                        let checker = Arc::clone(&checker);
                        let counters = Arc::clone(&counters);
                        s.spawn(move |_| run_worker(id, &paths, &matches, &checker, &counters));
                    }
                });
                // 结束后 Sender 全部被丢弃，Receiver 将收到关闭信号
            })
            .context("spawn scan thread")?
    };

    let mut reporter = Reporter::new(out);
    let mut write_result = Ok(());
    for m in match_rx.iter() {
        if let Err(err) = reporter.report(&m) {
            write_result = Err(err);
            break;
        }
    }
    let matches = reporter.written();
    // 输出失败时提前关闭命中队列，工作者发送失败后自行退出
    drop(match_rx);

    scan_thread.join().map_err(|_| anyhow!("scan thread panicked"))?;
    let files_queued = walker.join().map_err(|_| anyhow!("walker thread panicked"))?;
    write_result.context("write match output")?;

    Ok(ScanStats {
        files_queued,
        files_scanned: counters.scanned.load(Ordering::Relaxed),
        files_skipped: counters.skipped.load(Ordering::Relaxed),
        files_failed: counters.failed.load(Ordering::Relaxed),
        matches,
    })
}

/// 单个工作者：取路径直到队列关闭且取空
fn run_worker(
    id: usize,
    paths: &Receiver<PathBuf>,
    matches: &Sender<MatchResult>,
    checker: &FileChecker,
    counters: &Counters,
) {
    debug!(worker = id, "worker started");
    for path in paths.iter() {
        match checker.check(path) {
            Ok(FileOutcome::Matched(m)) => {
                counters.scanned.fetch_add(1, Ordering::Relaxed);
                if matches.send(m).is_err() {
                    debug!(worker = id, "match queue closed, worker exiting");
                    return;
                }
            }
            Ok(FileOutcome::Clean) => {
                counters.scanned.fetch_add(1, Ordering::Relaxed);
            }
            Ok(FileOutcome::NotText(_)) => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("{err}");
            }
        }
    }
    debug!(worker = id, "worker finished");
}
