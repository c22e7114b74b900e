//! 特征编译与特征集合
//!
//! 特征库中的每条记录在加载时编译为字节级正则（`regex::bytes`），
//! 之后不可变，由所有工作线程只读共享。
use regex::bytes::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::DatabaseError;

/// 特征级别：文档中 `"c"` 为 critical，`"s"` 为 soft。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Soft,
}

impl Severity {
    /// 解析特征库中的级别代码；未知代码返回 `None`，由调用方决定如何处理
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Severity::Critical),
            "s" => Some(Severity::Soft),
            _ => None,
        }
    }
}

/// 特征库中的原始记录（尚未编译）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature {
    pub id: i64,
    pub title: String,
    pub severity: String,
    pub pattern: String,
}

/// 已编译的特征
#[derive(Debug, Clone)]
pub struct Signature {
    pub id: i64,
    pub title: String,
    pub severity: Severity,
    matcher: Regex,
}

impl Signature {
    /// 编译单条原始记录
    pub fn compile(raw: RawSignature) -> Result<Self, DatabaseError> {
        let matcher = compile_pattern(&raw.pattern).map_err(|source| DatabaseError::Compile {
            id: raw.id,
            pattern: raw.pattern.clone(),
            source,
        })?;
        // 未知级别按 soft 处理，但作为数据质量问题提示出来
        let severity = Severity::from_code(&raw.severity).unwrap_or_else(|| {
            warn!("unknown severity {:?} for signature {}, treating as soft", raw.severity, raw.id);
            Severity::Soft
        });
        Ok(Self { id: raw.id, title: raw.title, severity, matcher })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn is_match(&self, content: &[u8]) -> bool {
        self.matcher.is_match(content)
    }
}

/// 文件内容不保证是 UTF-8，默认按字节语义编译：`.`、`\s`、`[^..]` 都逐字节匹配。
/// 只有需要 Unicode 语义才能编译的模式（如 `\pL`）退回 Unicode 模式。
fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).unicode(false).build().or_else(|_| Regex::new(pattern))
}

/// 有序特征集合（顺序即文档顺序）
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    /// 编译全部原始记录。
    /// 任一条编译失败即整体失败，不存在“部分加载”的特征集；空输入同样视为错误。
    pub fn compile<I>(raw: I) -> Result<Self, DatabaseError>
    where
        I: IntoIterator<Item = RawSignature>,
    {
        let signatures = raw
            .into_iter()
            .map(Signature::compile)
            .collect::<Result<Vec<_>, _>>()?;
        if signatures.is_empty() {
            return Err(DatabaseError::Empty);
        }
        Ok(Self { signatures })
    }

    /// 只保留 critical 级别（保持原有相对顺序）；结果可以为空
    pub fn critical_only(self) -> Self {
        let signatures = self
            .signatures
            .into_iter()
            .filter(|s| s.severity == Severity::Critical)
            .collect();
        Self { signatures }
    }

    /// 按集合顺序逐条测试，返回第一条命中的特征
    pub fn first_match(&self, content: &[u8]) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.is_match(content))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
