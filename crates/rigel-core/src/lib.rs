//! 恶意代码特征扫描核心库
//!
//! 设计要点：
//! - 特征库（XML）在启动时一次性编译为字节级正则，任一条失败即整体拒绝。
//! - 文件内容先做去混淆归一化（拼接串、块注释、十六进制/八进制转义），再按特征顺序匹配，首个命中即止。
//! - 单生产者 + N 个工作者：目录遍历经有界通道投递路径，命中结果回到调用线程串行输出。
//! - 单个文件的错误只告警并跳过；只有特征库加载失败是致命的。

mod check;
mod database;
mod error;
mod normalize;
mod options;
mod report;
mod scan;
mod signatures;
mod sniff;
mod walk;

pub use check::{FileChecker, FileOutcome};
pub use database::{load_signatures, parse_database, read_database, DatabaseSource};
pub use error::{DatabaseError, FileError};
pub use normalize::Normalizer;
pub use options::{ExtensionFilter, ScanOptions, ScanStats, MAX_FILE_SIZE};
pub use report::{MatchResult, Reporter};
pub use scan::scan_and_write;
pub use signatures::{RawSignature, Severity, Signature, SignatureSet};
pub use sniff::{is_scannable, sniff_content_type, SNIFF_LEN};
pub use walk::{spawn_walker, PATH_QUEUE_CAPACITY};
