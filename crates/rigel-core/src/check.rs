//! 单文件检查：打开 → （可选）嗅探 → 大小检查 → 整读 → 归一化 → 匹配
use std::fs::File;
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::FileError;
use crate::normalize::Normalizer;
use crate::options::ScanOptions;
use crate::report::MatchResult;
use crate::signatures::SignatureSet;
use crate::sniff::{is_scannable, sniff_content_type, SNIFF_LEN};

/// 按 stat 结果预分配读缓冲的上限，超出部分随读随长
const PREALLOC_LIMIT: u64 = 64 << 20;

/// 单文件检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// 命中第一条特征
    Matched(MatchResult),
    /// 已扫描，无命中
    Clean,
    /// 内容嗅探判定为非文本，未扫描
    NotText(&'static str),
}

/// 文件检查器：持有只读的特征集与归一化流水线，所有工作线程共享
#[derive(Debug)]
pub struct FileChecker {
    signatures: Arc<SignatureSet>,
    normalizer: Normalizer,
    sniff: bool,
    max_file_size: u64,
}

impl FileChecker {
    pub fn new(signatures: Arc<SignatureSet>, normalizer: Normalizer, opts: &ScanOptions) -> Self {
        Self {
            signatures,
            normalizer,
            // 未配置扩展名白名单时才嗅探内容类型
            sniff: opts.extensions.is_empty(),
            max_file_size: opts.max_file_size,
        }
    }

    pub fn check(&self, path: PathBuf) -> Result<FileOutcome, FileError> {
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(source) => return Err(FileError::Open { path, source }),
        };

        if self.sniff {
            let mut head = Vec::with_capacity(SNIFF_LEN);
            // 读取失败时不做判定，继续后续流程
            if (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).is_ok() {
                let content_type = sniff_content_type(&head);
                if !is_scannable(content_type) {
                    debug!(path = %path.display(), content_type, "skipping non-text file");
                    return Ok(FileOutcome::NotText(content_type));
                }
            }
            if let Err(source) = file.rewind() {
                return Err(FileError::Rewind { path, source });
            }
        }

        let size = match file.metadata() {
            Ok(md) => md.len(),
            Err(source) => return Err(FileError::Stat { path, source }),
        };
        if size > self.max_file_size {
            return Err(FileError::TooLarge { path, limit: self.max_file_size });
        }

        // 多读一个字节：若文件在 stat 之后变大，仍按超限处理而不是整读
        let mut content = Vec::with_capacity(size.min(PREALLOC_LIMIT) as usize);
        if let Err(source) = (&mut file).take(self.max_file_size.saturating_add(1)).read_to_end(&mut content) {
            return Err(FileError::Read { path, source });
        }
        if content.len() as u64 > self.max_file_size {
            return Err(FileError::TooLarge { path, limit: self.max_file_size });
        }

        let normalized = self.normalizer.normalize(&content);
        Ok(match self.signatures.first_match(&normalized) {
            Some(sig) => FileOutcome::Matched(MatchResult::new(sig, path)),
            None => FileOutcome::Clean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ExtensionFilter, MAX_FILE_SIZE};
    use crate::signatures::RawSignature;
    use std::fs;

    fn checker(filter: &str, patterns: &[(i64, &str)]) -> FileChecker {
        let raw = patterns.iter().map(|(id, p)| RawSignature {
            id: *id,
            title: format!("sig-{id}"),
            severity: "c".into(),
            pattern: p.to_string(),
        });
        let set = Arc::new(SignatureSet::compile(raw).unwrap());
        let opts = ScanOptions { extensions: ExtensionFilter::parse(filter), ..Default::default() };
        FileChecker::new(set, Normalizer::new().unwrap(), &opts)
    }

    #[test]
    fn matches_after_normalization() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.php");
        fs::write(&path, br"<?php $f = 'ev'.'al'; \x65\x76\x61\x6c($_GET[1]);").unwrap();
        let c = checker("", &[(10, r"nothing"), (11, r"eval\(\$_GET"), (12, r"\$_GET")]);
        match c.check(path.clone()).unwrap() {
            FileOutcome::Matched(m) => {
                assert_eq!(m.signature_id, 11);
                assert_eq!(m.path, path);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn clean_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.php");
        fs::write(&path, "<?php echo 1;").unwrap();
        assert_eq!(checker("php", &[(1, "eval")]).check(path).unwrap(), FileOutcome::Clean);
    }

    #[test]
    fn binary_head_skipped_only_without_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("img.jpg");
        let mut data = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00".to_vec();
        data.extend_from_slice(b"eval(");
        fs::write(&path, &data).unwrap();

        let outcome = checker("", &[(1, "eval")]).check(path.clone()).unwrap();
        assert_eq!(outcome, FileOutcome::NotText("image/jpeg"));

        // 配置白名单后不再嗅探
        let outcome = checker("jpg", &[(1, "eval")]).check(path).unwrap();
        assert!(matches!(outcome, FileOutcome::Matched(_)));
    }

    #[test]
    fn text_head_is_scanned_from_start() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("README");
        fs::write(&path, "eval at the very start").unwrap();
        let outcome = checker("", &[(1, "^eval")]).check(path).unwrap();
        assert!(matches!(outcome, FileOutcome::Matched(_)));
    }

    #[test]
    fn oversized_file_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.php");
        let mut data = b"eval(".to_vec();
        data.resize(MAX_FILE_SIZE as usize + 1, b'a');
        fs::write(&path, &data).unwrap();
        let err = checker("php", &[(1, "eval")]).check(path).unwrap_err();
        assert!(matches!(err, FileError::TooLarge { .. }));
        assert!(err.to_string().starts_with("file size more than 2M"), "{err}");
    }

    #[test]
    fn exactly_at_limit_is_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("edge.php");
        let mut data = b"eval(".to_vec();
        data.resize(MAX_FILE_SIZE as usize, b'a');
        fs::write(&path, &data).unwrap();
        let outcome = checker("php", &[(1, "eval")]).check(path).unwrap();
        assert!(matches!(outcome, FileOutcome::Matched(_)));
    }

    #[test]
    fn unbounded_size_limit_reads_normally() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("any.php");
        fs::write(&path, "<?php eval($_GET[0]);").unwrap();
        let set = Arc::new(
            SignatureSet::compile(vec![RawSignature {
                id: 1,
                title: "t".into(),
                severity: "c".into(),
                pattern: "eval".into(),
            }])
            .unwrap(),
        );
        let opts = ScanOptions { max_file_size: u64::MAX, ..Default::default() };
        let c = FileChecker::new(set, Normalizer::new().unwrap(), &opts);
        assert!(matches!(c.check(path).unwrap(), FileOutcome::Matched(_)));
    }

    #[test]
    fn missing_file_is_open_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = checker("", &[(1, "x")]).check(tmp.path().join("gone.php")).unwrap_err();
        assert!(matches!(err, FileError::Open { .. }));
    }
}
