//! Line-oriented unified diff.
//!
//! Myers' shortest edit script over lines, grouped into hunks with a fixed
//! amount of context. Output lines carry no terminators.

use std::ops::Range;

/// Kind of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// A run of lines: `a[old]` becomes `b[new]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Opcode {
    tag: Tag,
    old: Range<usize>,
    new: Range<usize>,
}

impl Opcode {
    fn new(tag: Tag, old: Range<usize>, new: Range<usize>) -> Self {
        Self { tag, old, new }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Remove,
    Add,
}

/// Shortest edit script from `a` to `b`, one entry per line touched.
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max + 1;
    let at = |k: isize| (k + offset) as usize;

    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[at(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Keep);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Add);
            } else {
                edits.push(Edit::Remove);
            }
        }
        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    edits
}

/// Collapse an edit script into opcodes. Adjacent removals and additions
/// form a single replace.
fn opcodes(a: &[&str], b: &[&str]) -> Vec<Opcode> {
    let mut codes: Vec<Opcode> = Vec::new();
    let (mut i, mut j) = (0, 0);

    for edit in edit_script(a, b) {
        let (tag, di, dj) = match edit {
            Edit::Keep => (Tag::Equal, 1, 1),
            Edit::Remove => (Tag::Delete, 1, 0),
            Edit::Add => (Tag::Insert, 0, 1),
        };

        match codes.last_mut() {
            Some(last) if last.tag == tag || (tag != Tag::Equal && last.tag != Tag::Equal) => {
                last.old.end += di;
                last.new.end += dj;
                if last.tag != tag {
                    last.tag = Tag::Replace;
                }
            }
            _ => codes.push(Opcode::new(tag, i..i + di, j..j + dj)),
        }
        i += di;
        j += dj;
    }
    codes
}

/// Split opcodes into hunks with `context` lines of surrounding equality.
fn grouped(mut codes: Vec<Opcode>, context: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        codes.push(Opcode::new(Tag::Equal, 0..1, 0..1));
    }
    if let Some(first) = codes.first_mut().filter(|c| c.tag == Tag::Equal) {
        first.old.start = first.old.start.max(first.old.end.saturating_sub(context));
        first.new.start = first.new.start.max(first.new.end.saturating_sub(context));
    }
    if let Some(last) = codes.last_mut().filter(|c| c.tag == Tag::Equal) {
        last.old.end = last.old.end.min(last.old.start + context);
        last.new.end = last.new.end.min(last.new.start + context);
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == Tag::Equal && code.old.len() > 2 * context {
            group.push(Opcode::new(
                Tag::Equal,
                code.old.start..code.old.end.min(code.old.start + context),
                code.new.start..code.new.end.min(code.new.start + context),
            ));
            groups.push(std::mem::take(&mut group));
            code.old.start = code.old.start.max(code.old.end.saturating_sub(context));
            code.new.start = code.new.start.max(code.new.end.saturating_sub(context));
        }
        group.push(code);
    }
    if !(group.is_empty() || (group.len() == 1 && group[0].tag == Tag::Equal)) {
        groups.push(group);
    }
    groups
}

/// Hunk header range: `start,len`, with the length omitted when it is one.
fn format_range(range: &Range<usize>) -> String {
    let mut start = range.start + 1;
    let len = range.len();
    match len {
        1 => start.to_string(),
        _ => {
            if len == 0 {
                start -= 1;
            }
            format!("{start},{len}")
        }
    }
}

/// Unified diff of `old` against `new`.
///
/// Returns no lines at all when the inputs are equal. Otherwise the first
/// two lines are the `---`/`+++` headers followed by `@@` hunks.
pub fn unified_diff(
    old: &str,
    new: &str,
    old_label: &str,
    new_label: &str,
    context: usize,
) -> Vec<String> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    let mut out = Vec::new();
    for group in grouped(opcodes(&a, &b), context) {
        if out.is_empty() {
            out.push(format!("--- {old_label}"));
            out.push(format!("+++ {new_label}"));
        }
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        out.push(format!(
            "@@ -{} +{} @@",
            format_range(&(first.old.start..last.old.end)),
            format_range(&(first.new.start..last.new.end)),
        ));

        for code in &group {
            if code.tag == Tag::Equal {
                out.extend(a[code.old.clone()].iter().map(|line| format!(" {line}")));
                continue;
            }
            if matches!(code.tag, Tag::Replace | Tag::Delete) {
                out.extend(a[code.old.clone()].iter().map(|line| format!("-{line}")));
            }
            if matches!(code.tag, Tag::Replace | Tag::Insert) {
                out.extend(b[code.new.clone()].iter().map(|line| format!("+{line}")));
            }
        }
    }
    out
}
