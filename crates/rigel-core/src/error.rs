//! 错误类型
//!
//! - `DatabaseError`：特征库加载失败，一律致命，扫描不会开始
//! - `FileError`：单文件失败，仅告警并跳过该文件
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cannot read database file ({}): {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot fetch database file ({url}): {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed database document: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("malformed database document: invalid signature id {value:?}: {source}")]
    InvalidId {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("no signatures loaded, check file format")]
    Empty,

    #[error("failed to compile signature {id} regexp {pattern:?}: {source}")]
    Compile {
        id: i64,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("{source}: {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{source}: {}", .path.display())]
    Rewind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{source}: {}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file size more than {}M: {}", .limit >> 20, .path.display())]
    TooLarge { path: PathBuf, limit: u64 },

    #[error("{source}: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
