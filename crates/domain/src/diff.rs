//! Line diff between the last applied snapshot and a candidate render
//!
//! The diff is a pure function of its inputs: identical inputs always give the
//! same, order-stable list of changes.

use std::fmt;

use crate::snapshot::Snapshot;

/// One changed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    /// A line only present in the candidate.
    Added {
        /// 1-based line number in the candidate.
        line: usize,
        /// Line text.
        text: String,
    },
    /// A line only present in the previous output.
    Removed {
        /// 1-based line number in the previous output.
        line: usize,
        /// Line text.
        text: String,
    },
    /// A line replaced in place.
    Changed {
        /// 1-based line number in the previous output.
        old_line: usize,
        /// 1-based line number in the candidate.
        new_line: usize,
        /// Previous text.
        old: String,
        /// New text.
        new: String,
    },
}

/// Structured diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDiff {
    changes: Vec<LineChange>,
}

impl TextDiff {
    /// All changes in document order.
    #[must_use]
    pub fn changes(&self) -> &[LineChange] {
        &self.changes
    }

    /// True when both sides have the same lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    fn count(&self, pred: impl Fn(&LineChange) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }

    /// `+added -removed ~changed`, or `no changes`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }
        let added = self.count(|c| matches!(c, LineChange::Added { .. }));
        let removed = self.count(|c| matches!(c, LineChange::Removed { .. }));
        let changed = self.count(|c| matches!(c, LineChange::Changed { .. }));
        format!("+{added} -{removed} ~{changed}")
    }
}

impl fmt::Display for TextDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            match change {
                LineChange::Added { line, text } => writeln!(f, "+{line:>5} | {text}")?,
                LineChange::Removed { line, text } => writeln!(f, "-{line:>5} | {text}")?,
                LineChange::Changed {
                    old_line,
                    new_line,
                    old,
                    new,
                } => {
                    writeln!(f, "-{old_line:>5} | {old}")?;
                    writeln!(f, "+{new_line:>5} | {new}")?;
                }
            }
        }
        Ok(())
    }
}

/// Diffs a candidate against the previous snapshot (empty when absent).
#[must_use]
pub fn diff(previous: Option<&Snapshot>, candidate: &str) -> TextDiff {
    let old = previous.map(Snapshot::text).unwrap_or_default();
    diff_text(&old, candidate)
}

/// Largest LCS table the diff builds; bigger middles are reported as a
/// straight replacement.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Diffs two texts line by line.
///
/// Lines keep their terminators, so a change of line ending or of the final
/// newline is a change.
#[must_use]
pub fn diff_text(old: &str, new: &str) -> TextDiff {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
    let suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old_lines[prefix..old_lines.len() - suffix];
    let b = &new_lines[prefix..new_lines.len() - suffix];

    let mut changes = Vec::new();
    let mut deleted = Vec::new();
    let mut inserted = Vec::new();
    for op in edit_script(a, b) {
        match op {
            Op::Equal => flush(&mut changes, &mut deleted, &mut inserted, a, b, prefix),
            Op::Delete(i) => deleted.push(i),
            Op::Insert(j) => inserted.push(j),
        }
    }
    flush(&mut changes, &mut deleted, &mut inserted, a, b, prefix);

    TextDiff { changes }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Equal,
    Delete(usize),
    Insert(usize),
}

/// Pairs a run of deletions with the insertions that follow it.
fn flush(
    changes: &mut Vec<LineChange>,
    deleted: &mut Vec<usize>,
    inserted: &mut Vec<usize>,
    a: &[&str],
    b: &[&str],
    offset: usize,
) {
    let paired = deleted.len().min(inserted.len());
    for (&i, &j) in deleted.iter().zip(inserted.iter()) {
        changes.push(LineChange::Changed {
            old_line: offset + i + 1,
            new_line: offset + j + 1,
            old: visible(a[i]),
            new: visible(b[j]),
        });
    }
    for &i in &deleted[paired..] {
        changes.push(LineChange::Removed {
            line: offset + i + 1,
            text: visible(a[i]),
        });
    }
    for &j in &inserted[paired..] {
        changes.push(LineChange::Added {
            line: offset + j + 1,
            text: visible(b[j]),
        });
    }
    deleted.clear();
    inserted.clear();
}

/// Printable form of a line without its `\n`. A `\r` shows as `\\r`; a last
/// line with no newline is marked.
fn visible(line: &str) -> String {
    match line.strip_suffix('\n') {
        Some(body) => match body.strip_suffix('\r') {
            Some(body) => format!("{body}\\r"),
            None => body.to_string(),
        },
        None => format!("{line} (no newline at end)"),
    }
}

/// Longest-common-subsequence edit script, deletions before insertions.
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Op> {
    let (n, m) = (a.len(), b.len());
    if (n + 1).saturating_mul(m + 1) > MAX_LCS_CELLS {
        return (0..n).map(Op::Delete).chain((0..m).map(Op::Insert)).collect();
    }
    let width = m + 1;
    let mut lcs = vec![0usize; (n + 1) * width];

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Equal);
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(Op::Delete(i));
            i += 1;
        } else {
            ops.push(Op::Insert(j));
            j += 1;
        }
    }
    ops.extend((i..n).map(Op::Delete));
    ops.extend((j..m).map(Op::Insert));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateId;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_inputs_have_no_changes() {
        let text = "a: 1\nb: 2\n";
        let result = diff_text(text, text);
        assert!(result.is_empty());
        assert_eq!(result.summary(), "no changes");
    }

    #[test]
    fn test_changed_line() {
        let result = diff_text("host: old\nport: 5432\n", "host: new\nport: 5432\n");
        assert_eq!(
            result.changes(),
            &[LineChange::Changed {
                old_line: 1,
                new_line: 1,
                old: "host: old".to_string(),
                new: "host: new".to_string(),
            }]
        );
    }

    #[test]
    fn test_added_and_removed_lines() {
        let result = diff_text("a\nb\nc\n", "a\nc\nd\n");
        assert_eq!(
            result.changes(),
            &[
                LineChange::Removed {
                    line: 2,
                    text: "b".to_string()
                },
                LineChange::Added {
                    line: 3,
                    text: "d".to_string()
                },
            ]
        );
        assert_eq!(result.summary(), "+1 -1 ~0");
    }

    #[test]
    fn test_absent_previous_means_everything_added() {
        let result = diff(None, "x\ny\n");
        assert_eq!(result.len(), 2);
        assert!(
            result
                .changes()
                .iter()
                .all(|c| matches!(c, LineChange::Added { .. }))
        );
    }

    #[test]
    fn test_diff_against_snapshot_is_reproducible() {
        let snapshot = Snapshot::new(TemplateId::new("out.yaml"), "a\nb\n", Utc::now());
        let first = diff(Some(&snapshot), "a\nB\nc\n");
        let second = diff(Some(&snapshot), "a\nB\nc\n");
        assert_eq!(first, second);
        assert_eq!(first.summary(), "+1 -0 ~1");
    }

    #[test]
    fn test_line_ending_change_is_a_change() {
        let result = diff_text("a: 1\r\nb: 2\r\n", "a: 1\nb: 2\n");
        assert_eq!(result.summary(), "+0 -0 ~2");
        assert_eq!(
            result.changes()[0],
            LineChange::Changed {
                old_line: 1,
                new_line: 1,
                old: "a: 1\\r".to_string(),
                new: "a: 1".to_string(),
            }
        );
    }

    #[test]
    fn test_removed_trailing_newline_is_a_change() {
        let result = diff_text("a: 1\n", "a: 1");
        assert_eq!(
            result.changes(),
            &[LineChange::Changed {
                old_line: 1,
                new_line: 1,
                old: "a: 1".to_string(),
                new: "a: 1 (no newline at end)".to_string(),
            }]
        );
    }

    #[test]
    fn test_large_unrelated_inputs_fall_back_to_replacement() {
        let old: String = (0..3000).map(|i| format!("old {i}\n")).collect();
        let new: String = (0..3000).map(|i| format!("new {i}\n")).collect();
        let result = diff_text(&old, &new);
        assert_eq!(result.summary(), "+0 -0 ~3000");
        assert_eq!(
            result.changes()[2999],
            LineChange::Changed {
                old_line: 3000,
                new_line: 3000,
                old: "old 2999".to_string(),
                new: "new 2999".to_string(),
            }
        );
    }

    #[test]
    fn test_display_marks_lines() {
        let rendered = diff_text("one\n", "two\n").to_string();
        assert_eq!(rendered, "-    1 | one\n+    1 | two\n");
    }
}
