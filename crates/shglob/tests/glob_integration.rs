//! End-to-end globbing against a real filesystem.
//!
//! Each test builds a small tree in a tempdir and globs it through
//! `RealFs` with absolute patterns.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use shglob::{expand_braces, glob_files, GlobOptions, NoMatchPolicy, RealFs, ShellEval};
use tempfile::TempDir;

fn touch(root: &Path, rel: &str, bytes: usize) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(&vec![b'x'; bytes]).unwrap();
}

fn glob(root: &Path, pattern: &str) -> Vec<String> {
    glob_with(root, pattern, &GlobOptions::default())
}

fn glob_with(root: &Path, pattern: &str, opts: &GlobOptions) -> Vec<String> {
    let word = format!("{}/{}", root.display(), pattern);
    let prefix = format!("{}/", root.display());
    glob_files(&word, &RealFs, None, opts)
        .unwrap()
        .into_iter()
        .map(|m| m.strip_prefix(&prefix).unwrap_or(&m).to_string())
        .collect()
}

#[test]
fn scenario_plain_suffix_glob() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a.txt", 1);
    touch(tmp.path(), "b.txt", 1);
    fs::create_dir(tmp.path().join("sub")).unwrap();

    // Default name sort is alphabetical.
    assert_eq!(glob(tmp.path(), "*.txt"), vec!["a.txt", "b.txt"]);
}

#[test]
fn scenario_type_qualifiers() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "regular", 1);
    fs::create_dir(tmp.path().join("folder")).unwrap();

    assert_eq!(glob(tmp.path(), "*(.)"), vec!["regular"]);
    assert_eq!(glob(tmp.path(), "*(/)"), vec!["folder"]);
}

#[test]
fn scenario_brace_then_glob() {
    let tmp = TempDir::new().unwrap();
    for name in ["file1.txt", "file2.txt", "file3.txt"] {
        touch(tmp.path(), name, 1);
    }

    let words = expand_braces("file{1..3}.txt");
    assert_eq!(words, vec!["file1.txt", "file2.txt", "file3.txt"]);

    // Each brace-expanded word is a valid (literal) glob.
    for word in words {
        assert_eq!(glob(tmp.path(), &word), vec![word]);
    }
}

#[test]
fn scenario_recursive_descent() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "top.c", 1);
    touch(tmp.path(), "d1/mid.c", 1);
    touch(tmp.path(), "d1/mid.h", 1);
    touch(tmp.path(), "d1/d2/d3/deep.c", 1);
    touch(tmp.path(), "d1/d2/d3/deep.h", 1);

    let found = glob(tmp.path(), "**/*.c");
    assert_eq!(found, vec!["d1/d2/d3/deep.c", "d1/mid.c", "top.c"]);
}

#[test]
fn size_qualifiers_on_real_files() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "big", 5000);
    touch(tmp.path(), "small", 10);

    assert_eq!(glob(tmp.path(), "*(L+1000)"), vec!["big"]);
    assert_eq!(glob(tmp.path(), "*(L-1000)"), vec!["small"]);
    assert_eq!(glob(tmp.path(), "*(Lk-2)"), vec!["small"]);
}

#[test]
fn executable_qualifier() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "script", 1);
    touch(tmp.path(), "data", 1);
    let script = tmp.path().join("script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(glob(tmp.path(), "*(*)"), vec!["script"]);
    assert_eq!(glob(tmp.path(), "*(^*)"), vec!["data"]);
}

#[test]
fn symlink_qualifiers() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "real", 1);
    std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("link")).unwrap();

    assert_eq!(glob(tmp.path(), "*(@)"), vec!["link"]);
    // '-' retargets the regular-file test at the symlink target.
    let mut with_link = glob(tmp.path(), "*(-.)");
    with_link.sort();
    assert_eq!(with_link, vec!["link", "real"]);
}

#[test]
fn mtime_qualifier_on_fresh_files() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "fresh", 1);

    // Created just now: strictly less than one day old.
    assert_eq!(glob(tmp.path(), "*(m-1)"), vec!["fresh"]);
    assert!(glob(tmp.path(), "*(m+1)").is_empty());
}

#[test]
fn mark_dirs_and_list_types() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "plain", 1);
    fs::create_dir(tmp.path().join("d")).unwrap();

    assert_eq!(glob(tmp.path(), "*(M)"), vec!["d/", "plain"]);
    assert_eq!(glob(tmp.path(), "*(T)"), vec!["d/", "plain"]);
}

#[test]
fn script_qualifier_with_shell_eval() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "keep.log", 100);
    touch(tmp.path(), "empty.log", 0);

    let word = format!("{}/*.log(e:test -s \"$REPLY\":)", tmp.path().display());
    let eval = ShellEval::default();
    let found = glob_files(&word, &RealFs, Some(&eval), &GlobOptions::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("keep.log"));
}

#[test]
fn sort_by_size_descending() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "mid", 500);
    touch(tmp.path(), "big", 900);
    touch(tmp.path(), "tiny", 3);

    assert_eq!(glob(tmp.path(), "*(OL)"), vec!["big", "mid", "tiny"]);
}

#[test]
fn numeric_sort_qualifier() {
    let tmp = TempDir::new().unwrap();
    for name in ["file1", "file10", "file9"] {
        touch(tmp.path(), name, 1);
    }

    assert_eq!(glob(tmp.path(), "*"), vec!["file1", "file10", "file9"]);
    assert_eq!(glob(tmp.path(), "*(n)"), vec!["file1", "file9", "file10"]);
}

#[test]
fn index_range_on_sorted_matches() {
    let tmp = TempDir::new().unwrap();
    for name in ["a", "b", "c", "d", "e"] {
        touch(tmp.path(), name, 1);
    }

    assert_eq!(glob(tmp.path(), "*([1,3])"), vec!["b", "c"]);
    assert_eq!(glob(tmp.path(), "*([-2,])"), vec!["d", "e"]);
}

#[test]
fn no_match_strict_policy_errors() {
    let tmp = TempDir::new().unwrap();
    let mut opts = GlobOptions::default();
    opts.no_match = NoMatchPolicy::Error;

    let word = format!("{}/*.nope", tmp.path().display());
    let err = {
        let mut words = vec![word];
        shglob::expand_glob(&mut words, 0, &RealFs, None, &opts).unwrap_err()
    };
    assert!(err.to_string().contains("no matches found"));
}

#[test]
fn rescanning_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "one.rs", 1);
    touch(tmp.path(), "two.rs", 1);
    touch(tmp.path(), "sub/three.rs", 1);

    let first = glob(tmp.path(), "**/*.rs");
    let second = glob(tmp.path(), "**/*.rs");
    assert_eq!(first, second);
}
