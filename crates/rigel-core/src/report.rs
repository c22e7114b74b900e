//! 命中记录与输出
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::signatures::Signature;

/// 单个文件的命中结果（每个文件至多一条）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub signature_id: i64,
    pub signature_title: String,
    pub path: PathBuf,
}

impl MatchResult {
    pub fn new(signature: &Signature, path: PathBuf) -> Self {
        Self { signature_id: signature.id, signature_title: signature.title.clone(), path }
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// 命中输出端
/// 只在单一线程上使用（工作线程经由通道把结果交给它），因此整行写出不会交错。
pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    written: usize,
}

impl<'a> Reporter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out, written: 0 }
    }

    /// 写出一行命中记录并立即冲刷；路径按原始字节输出
    pub fn report(&mut self, m: &MatchResult) -> io::Result<()> {
        write!(self.out, "Matched: {} (signature id = {}): ", m.signature_title, m.signature_id)?;
        self.out.write_all(&path_bytes(&m.path))?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_match_line() {
        let m = MatchResult {
            signature_id: 1,
            signature_title: "WebShell".into(),
            path: PathBuf::from("shell.php"),
        };
        let mut out = Vec::new();
        let mut reporter = Reporter::new(&mut out);
        reporter.report(&m).unwrap();
        reporter.report(&m).unwrap();
        assert_eq!(reporter.written(), 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Matched: WebShell (signature id = 1): shell.php\nMatched: WebShell (signature id = 1): shell.php\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_written_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let m = MatchResult {
            signature_id: 2,
            signature_title: "Dropper".into(),
            path: PathBuf::from(OsStr::from_bytes(b"up/sh\xe9ll.php")),
        };
        let mut out = Vec::new();
        Reporter::new(&mut out).report(&m).unwrap();
        assert_eq!(out, b"Matched: Dropper (signature id = 2): up/sh\xe9ll.php\n".to_vec());
    }
}
