//! 特征库加载（XML，本地文件或 http(s) 链接）
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::DatabaseError;
use crate::signatures::{RawSignature, SignatureSet};

/// 特征库位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    File(PathBuf),
    Url(String),
}

impl DatabaseSource {
    /// 以 `http://` 或 `https://` 开头视为远程链接，否则为本地路径
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DatabaseSource::Url(location.to_string())
        } else {
            DatabaseSource::File(PathBuf::from(location))
        }
    }
}

impl std::fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseSource::File(path) => write!(f, "{}", path.display()),
            DatabaseSource::Url(url) => f.write_str(url),
        }
    }
}

const SIGNATURE_TAG: &[u8] = b"signature";

/// 从任意 BufRead 解析特征库文档
///
/// 根元素名不限，只收集根元素下一层的 `<signature id=".." title=".." sever="..">pattern</signature>`；
/// 正文（文本与 CDATA）原样拼接，首尾空白属于正则的一部分，不做裁剪。
pub fn parse_database<R: BufRead>(reader: R) -> Result<Vec<RawSignature>, DatabaseError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<RawSignature> = None;
    let mut entries = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.local_name().as_ref() == SIGNATURE_TAG {
                    current = Some(signature_header(&e)?);
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == SIGNATURE_TAG {
                    entries.push(signature_header(&e)?);
                }
            }
            Event::Text(t) if depth == 2 => {
                if let Some(sig) = current.as_mut() {
                    sig.pattern.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) if depth == 2 => {
                if let Some(sig) = current.as_mut() {
                    sig.pattern.push_str(&reader.decoder().decode(&c)?);
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    entries.extend(current.take());
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

/// 读取 `<signature>` 的属性；`severity` 作为 `sever` 的别名
fn signature_header(start: &BytesStart<'_>) -> Result<RawSignature, DatabaseError> {
    let mut sig = RawSignature { id: 0, title: String::new(), severity: String::new(), pattern: String::new() };
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?;
        match attr.key.local_name().as_ref() {
            b"id" => sig.id = parse_id(&value)?,
            b"title" => sig.title = value.into_owned(),
            b"sever" | b"severity" => sig.severity = value.into_owned(),
            _ => {}
        }
    }
    Ok(sig)
}

/// 空 id 视为 0
fn parse_id(value: &str) -> Result<i64, DatabaseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse().map_err(|source| DatabaseError::InvalidId { value: value.to_string(), source })
}

/// 读取（或下载）特征库并解析为原始记录
pub fn read_database(source: &DatabaseSource) -> Result<Vec<RawSignature>, DatabaseError> {
    match source {
        DatabaseSource::File(path) => {
            let file = File::open(path).map_err(|source| DatabaseError::Read { path: path.clone(), source })?;
            parse_database(BufReader::new(file))
        }
        DatabaseSource::Url(url) => {
            let fetch_err = |source: reqwest::Error| DatabaseError::Fetch { url: url.clone(), source };
            let resp = reqwest::blocking::get(url)
                .and_then(|r| r.error_for_status())
                .map_err(fetch_err)?;
            let body = resp.bytes().map_err(fetch_err)?;
            parse_database(&body[..])
        }
    }
}

/// 加载特征库：读取 → 解析 → 编译 → （可选）只保留 critical
pub fn load_signatures(source: &DatabaseSource, skip_soft: bool) -> Result<SignatureSet, DatabaseError> {
    let raw = read_database(source)?;
    let set = SignatureSet::compile(raw)?;
    debug!(source = %source, signatures = set.len(), "signature database compiled");
    if skip_soft {
        return Ok(set.critical_only());
    }
    Ok(set)
}
