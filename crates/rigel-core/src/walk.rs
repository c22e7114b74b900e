//! 目录遍历（生产者）
//!
//! 在独立线程中按文件名字典序递归遍历根目录，把通过扩展名过滤的路径
//! 投递到有界通道。通道满时生产者阻塞，形成天然背压。
use std::io;
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::options::ExtensionFilter;

/// 路径队列容量
pub const PATH_QUEUE_CAPACITY: usize = 10;

/// 启动生产者线程
/// - 返回路径接收端与线程句柄；句柄的返回值为投递的路径数
/// - 遍历结束（无论中途是否出错）后发送端被丢弃，接收端随之关闭
pub fn spawn_walker(root: PathBuf, filter: ExtensionFilter) -> io::Result<(Receiver<PathBuf>, JoinHandle<usize>)> {
    let (tx, rx) = bounded::<PathBuf>(PATH_QUEUE_CAPACITY);
    let handle = thread::Builder::new()
        .name("rigel-walk".into())
        .spawn(move || walk_into(&root, &filter, &tx))?;
    Ok((rx, handle))
}

/// 同步遍历并投递路径；返回投递数量
pub(crate) fn walk_into(root: &Path, filter: &ExtensionFilter, tx: &Sender<PathBuf>) -> usize {
    let mut queued = 0usize;
    let base = clean(root);
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                // 单个条目出错不影响其余条目
                warn!("walk error: {err}");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let path = display_path(root, &base, entry.into_path());
        if !filter.allows(&path) {
            continue;
        }
        if tx.send(path).is_err() {
            // 所有消费者都已退出
            debug!("path queue closed, stopping walk");
            break;
        }
        queued += 1;
    }
    queued
}

/// 输出路径 = 规整后的根目录 + 相对路径：
/// 根为 `.` 时输出 `shell.php`，根为 `./site` 时输出 `site/shell.php`
fn display_path(root: &Path, base: &Path, path: PathBuf) -> PathBuf {
    let joined = match path.strip_prefix(root) {
        Ok(rel) => base.join(rel),
        Err(_) => return path,
    };
    if joined.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        joined
    }
}

/// 纯词法规整：去掉 `.`，`..` 抵消前一个普通分量；不访问文件系统
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir if matches!(out.components().next_back(), Some(Component::Normal(_))) => {
                out.pop();
            }
            Component::ParentDir if out.has_root() => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn collect(root: &Path, filter: &ExtensionFilter) -> Vec<PathBuf> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let n = walk_into(root, filter, &tx);
        drop(tx);
        let paths: Vec<PathBuf> = rx.iter().collect();
        assert_eq!(n, paths.len());
        paths
    }

    #[test]
    fn emits_files_in_lexical_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("b/inner")).unwrap();
        fs::write(tmp.path().join("c.php"), "").unwrap();
        fs::write(tmp.path().join("a.php"), "").unwrap();
        fs::write(tmp.path().join("b/inner/x.php"), "").unwrap();
        fs::write(tmp.path().join("b/notes.txt"), "").unwrap();

        let paths = collect(tmp.path(), &ExtensionFilter::default());
        let rel: Vec<PathBuf> = paths.iter().map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf()).collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.php"),
                PathBuf::from("b/inner/x.php"),
                PathBuf::from("b/notes.txt"),
                PathBuf::from("c.php"),
            ]
        );
    }

    #[test]
    fn applies_extension_filter() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.php"), "").unwrap();
        fs::write(tmp.path().join("b.js"), "").unwrap();
        fs::write(tmp.path().join("c.txt"), "").unwrap();

        let paths = collect(tmp.path(), &ExtensionFilter::parse("php,.js"));
        let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["a.php", "b.js"]);
    }

    #[test]
    fn missing_root_only_warns() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = collect(&tmp.path().join("does-not-exist"), &ExtensionFilter::default());
        assert!(paths.is_empty());
    }

    #[test]
    fn producer_closes_queue_when_done() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..(PATH_QUEUE_CAPACITY * 3) {
            fs::write(tmp.path().join(format!("f{i:02}.txt")), "x").unwrap();
        }
        let (rx, handle) = spawn_walker(tmp.path().to_path_buf(), ExtensionFilter::default()).unwrap();
        let received = rx.iter().count();
        assert_eq!(received, PATH_QUEUE_CAPACITY * 3);
        assert_eq!(handle.join().unwrap(), received);
    }

    fn shown(root: &str, path: &str) -> PathBuf {
        let root = Path::new(root);
        display_path(root, &clean(root), PathBuf::from(path))
    }

    #[test]
    fn dot_root_is_stripped() {
        assert_eq!(shown(".", "./shell.php"), PathBuf::from("shell.php"));
        assert_eq!(shown(".", "."), PathBuf::from("."));
        assert_eq!(shown("site", "site/a.php"), PathBuf::from("site/a.php"));
    }

    #[test]
    fn root_is_cleaned_lexically() {
        assert_eq!(shown("./site", "./site/shell.php"), PathBuf::from("site/shell.php"));
        assert_eq!(shown("./site/", "./site/inner/a.php"), PathBuf::from("site/inner/a.php"));
        assert_eq!(shown("site/../www", "site/../www/a.php"), PathBuf::from("www/a.php"));
        assert_eq!(shown("../up", "../up/a.php"), PathBuf::from("../up/a.php"));
        assert_eq!(shown("/srv/./www", "/srv/./www/a.php"), PathBuf::from("/srv/www/a.php"));
    }

    #[test]
    fn walk_reports_cleaned_paths() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("site")).unwrap();
        fs::write(tmp.path().join("site/shell.php"), "").unwrap();
        let root = tmp.path().join(".").join("site").join(".");
        let paths = collect(&root, &ExtensionFilter::default());
        assert_eq!(paths, vec![tmp.path().join("site/shell.php")]);
    }
}
