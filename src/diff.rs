//! Changed-code input
//!
//! A diff source supplies, per changed file, the added/modified line ranges
//! and criticality tags. `parse_unified_diff` builds that from `git diff`
//! output; hosts with their own diff feed construct `ChangedFile` directly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Path segments that tag a file as critical
pub const CRITICAL_SEGMENTS: [&str; 5] = ["auth", "payment", "security", "crypto", "billing"];

/// Inclusive range of 1-based line numbers in the new file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn single(line: u32) -> Self {
        Self::new(line, line)
    }

    pub fn contains(&self, line: u32) -> bool {
        (self.start..=self.end).contains(&line)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One file touched by the change under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub line_ranges: Vec<LineRange>,
    #[serde(default)]
    pub criticality_tags: Vec<String>,
}

impl ChangedFile {
    /// Build a changed file, inferring criticality tags from the path
    pub fn new(path: impl Into<String>, line_ranges: Vec<LineRange>) -> Self {
        let path = path.into();
        let criticality_tags = infer_criticality_tags(&path);
        Self {
            path,
            line_ranges: merge_ranges(line_ranges),
            criticality_tags,
        }
    }

    /// Distinct changed line numbers, ascending
    pub fn changed_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.line_ranges.iter().flat_map(|r| r.start..=r.end)
    }

    pub fn line_count(&self) -> usize {
        self.line_ranges.iter().map(LineRange::len).sum()
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.line_ranges.iter().any(|r| r.contains(line))
    }

    pub fn is_tagged_critical(&self) -> bool {
        !self.criticality_tags.is_empty()
    }
}

/// Sort and merge overlapping or adjacent ranges
pub fn merge_ranges(mut ranges: Vec<LineRange>) -> Vec<LineRange> {
    ranges.sort();
    let mut merged: Vec<LineRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Group ascending line numbers into contiguous ranges
pub fn group_lines(lines: impl IntoIterator<Item = u32>) -> Vec<LineRange> {
    merge_ranges(lines.into_iter().map(LineRange::single).collect())
}

fn infer_criticality_tags(path: &str) -> Vec<String> {
    let lower = path.to_lowercase();
    CRITICAL_SEGMENTS
        .iter()
        .filter(|seg| {
            lower
                .split(['/', '\\', '.', '_', '-'])
                .any(|part| part == **seg)
        })
        .map(|seg| seg.to_string())
        .collect()
}

/// Parse `git diff` / unified diff output into added-line ranges per file
///
/// Deleted files are dropped; only lines present in the new file count.
pub fn parse_unified_diff(diff: &str) -> Vec<ChangedFile> {
    static HUNK: OnceLock<Regex> = OnceLock::new();
    let hunk_re = HUNK.get_or_init(|| {
        Regex::new(r"^@@ -\d+(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk regex is valid")
    });

    let mut files = Vec::new();
    let mut current: Option<(String, Vec<u32>)> = None;
    let mut new_line: u32 = 0;
    // Body lines still owed by the current hunk, old side and new side
    let mut old_left: u32 = 0;
    let mut new_left: u32 = 0;

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            old_left = 0;
            new_left = 0;
            continue;
        }
        if let Some(caps) = hunk_re.captures(line) {
            let count = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .unwrap_or(1)
            };
            old_left = count(1);
            new_line = caps[2].parse().unwrap_or(1);
            new_left = count(3);
            continue;
        }
        if old_left > 0 || new_left > 0 {
            match line.chars().next() {
                Some('+') => {
                    if let Some((_, lines)) = current.as_mut() {
                        lines.push(new_line);
                    }
                    new_line += 1;
                    new_left = new_left.saturating_sub(1);
                }
                Some('-') => old_left = old_left.saturating_sub(1),
                Some('\\') => {}
                _ => {
                    new_line += 1;
                    old_left = old_left.saturating_sub(1);
                    new_left = new_left.saturating_sub(1);
                }
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            flush(&mut current, &mut files);
            let target = rest.split('\t').next().unwrap_or("").trim();
            if target != "/dev/null" {
                let path = target.strip_prefix("b/").unwrap_or(target);
                current = Some((path.to_string(), Vec::new()));
            }
        }
    }
    flush(&mut current, &mut files);

    files
}

fn flush(current: &mut Option<(String, Vec<u32>)>, files: &mut Vec<ChangedFile>) {
    if let Some((path, lines)) = current.take() {
        if !lines.is_empty() {
            files.push(ChangedFile::new(path, group_lines(lines)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DIFF: &str = "\
diff --git a/src/auth/login.rs b/src/auth/login.rs
index 1111111..2222222 100644
--- a/src/auth/login.rs
+++ b/src/auth/login.rs
@@ -10,3 +10,5 @@ fn login() {
 let a = 1;
-let b = 2;
+let b = 3;
+let c = 4;
 let d = 5;
+let e = 6;
@@ -40,2 +42,3 @@ fn logout() {
 keep();
+added();
 keep();
diff --git a/old.py b/old.py
deleted file mode 100644
--- a/old.py
+++ /dev/null
@@ -1,2 +0,0 @@
-x = 1
-y = 2
diff --git a/lib/util.py b/lib/util.py
new file mode 100644
--- /dev/null
+++ b/lib/util.py
@@ -0,0 +1,3 @@
+def f():
+    return 1
+
";

    #[test]
    fn test_parse_unified_diff() {
        let files = parse_unified_diff(DIFF);
        assert_eq!(files.len(), 2);

        let login = &files[0];
        assert_eq!(login.path, "src/auth/login.rs");
        assert_eq!(
            login.line_ranges,
            vec![LineRange::new(11, 12), LineRange::single(14), LineRange::single(43)]
        );
        assert_eq!(login.criticality_tags, vec!["auth".to_string()]);
        assert_eq!(login.line_count(), 4);

        let util = &files[1];
        assert_eq!(util.path, "lib/util.py");
        assert_eq!(util.line_ranges, vec![LineRange::new(1, 3)]);
        assert!(!util.is_tagged_critical());
    }

    #[test]
    fn test_merge_and_group() {
        assert_eq!(
            merge_ranges(vec![LineRange::new(5, 7), LineRange::new(1, 2), LineRange::new(3, 3)]),
            vec![LineRange::new(1, 3), LineRange::new(5, 7)]
        );
        assert_eq!(
            group_lines([1, 2, 3, 7, 9, 10]),
            vec![LineRange::new(1, 3), LineRange::single(7), LineRange::new(9, 10)]
        );
    }

    #[test]
    fn test_criticality_tags() {
        let f = ChangedFile::new("services/payment_gateway/charge.go", vec![LineRange::single(1)]);
        assert_eq!(f.criticality_tags, vec!["payment".to_string()]);
        let f = ChangedFile::new("src/authority.rs", vec![LineRange::single(1)]);
        assert!(f.criticality_tags.is_empty());
    }

    #[test]
    fn test_added_line_resembling_header_stays_in_hunk() {
        let diff = "\
diff --git a/src/count.c b/src/count.c
--- a/src/count.c
+++ b/src/count.c
@@ -1,2 +1,4 @@
 int x = 0;
+++ counter;
+-- counter;
 return x;
";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/count.c");
        assert_eq!(files[0].line_ranges, vec![LineRange::new(2, 3)]);
    }
}
