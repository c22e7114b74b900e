//! 扫描选项与统计信息（模块）
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::database::DatabaseSource;

/// 单文件大小上限（字节）。超过则告警并跳过，绝不整读进内存。
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024; // 2 MiB

/// 扩展名白名单
/// - 每项均以 `.` 开头存储（`php` 与 `.php` 等价）
/// - 为空表示不按扩展名过滤，改用内容嗅探判断是否为文本
/// - 构造后不可修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    exts: BTreeSet<String>,
}

impl ExtensionFilter {
    /// 解析逗号分隔的扩展名列表，例如 `"php, .inc,,js"`
    pub fn parse(list: &str) -> Self {
        let exts = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| if s.starts_with('.') { s.to_string() } else { format!(".{s}") })
            .collect();
        Self { exts }
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exts.len()
    }

    /// 路径是否通过过滤；空过滤器放行一切
    pub fn allows(&self, path: &Path) -> bool {
        if self.exts.is_empty() {
            return true;
        }
        match dotted_extension(path) {
            Some(ext) => self.exts.contains(ext),
            None => false,
        }
    }
}

/// 取最后一个路径分量中从最后一个 `.` 开始的后缀（含点）。
/// 与 `Path::extension` 不同：`.htaccess` 的扩展名是 `.htaccess`。
pub(crate) fn dotted_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|idx| &name[idx..])
}

/// 扫描选项（一次构造，之后只读地传给生产者与工作线程）
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 特征库位置：本地文件或 http(s) 链接
    pub database: DatabaseSource,
    /// 递归扫描的根目录
    pub root: PathBuf,
    /// 并发工作线程数；使用时钳制为至少 1
    pub workers: usize,
    /// 扩展名白名单
    pub extensions: ExtensionFilter,
    /// 只保留 critical 级别特征
    pub skip_soft: bool,
    /// 最大文件大小（字节）；超过则跳过
    pub max_file_size: u64,
}

impl ScanOptions {
    /// 实际使用的工作线程数
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            database: DatabaseSource::File(PathBuf::from("malware_db.xml")),
            root: PathBuf::from("."),
            workers: 1,
            extensions: ExtensionFilter::default(),
            skip_soft: false,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    /// 生产者投递的路径数
    pub files_queued: usize,
    /// 完成特征匹配的文件数
    pub files_scanned: usize,
    /// 内容嗅探判定为非文本而放弃的文件数
    pub files_skipped: usize,
    /// 打开/读取失败或超限而跳过的文件数
    pub files_failed: usize,
    /// 输出的命中行数
    pub matches: usize,
}
