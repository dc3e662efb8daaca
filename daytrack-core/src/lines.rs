/// Line-level edits for single-list documents (weekly plan).
///
/// These documents have no roles, so edits address lines by their `[#id]`
/// tag directly instead of going through a parsed board. Every other line is
/// left byte-for-byte untouched.

use std::sync::LazyLock;

use regex::Regex;

use crate::identity::id_tag;
use crate::parser::{format_task_line, is_heading};
use crate::types::Task;

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[([ xX])\]").unwrap());

fn split_body(content: &str) -> (Vec<&str>, bool) {
    match content.strip_suffix('\n') {
        Some(body) => (body.split('\n').collect(), true),
        None => (content.split('\n').collect(), false),
    }
}

fn join_body(lines: &[impl AsRef<str>], trailing_newline: bool) -> String {
    let mut out = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

/// Index of the first checkbox line carrying the tag for `id`.
fn find_task_line(lines: &[&str], id: &str) -> Option<usize> {
    let tag = id_tag(id);
    lines
        .iter()
        .position(|line| line.contains(&tag) && CHECKBOX_RE.is_match(line))
}

/// Whether some checkbox line carries the tag for `id`.
pub fn contains_task(content: &str, id: &str) -> bool {
    let (lines, _) = split_body(content);
    find_task_line(&lines, id).is_some()
}

/// Flip the checkbox of the task tagged `id`. None when no line carries it.
pub fn toggle_by_id(content: &str, id: &str) -> Option<String> {
    let (lines, trailing_newline) = split_body(content);
    let index = find_task_line(&lines, id)?;

    let line = lines[index];
    let checked = line.as_bytes().get(3).is_some_and(|b| *b != b' ');
    let toggled = format!("- [{}]{}", if checked { ' ' } else { 'x' }, &line[5..]);

    let mut out: Vec<&str> = lines.clone();
    out[index] = &toggled;
    Some(join_body(&out, trailing_newline))
}

/// Replace everything after the `[#id]` tag with `text`.
pub fn replace_text_by_id(content: &str, id: &str, text: &str) -> Option<String> {
    let (lines, trailing_newline) = split_body(content);
    let index = find_task_line(&lines, id)?;

    let tag = id_tag(id);
    let line = lines[index];
    let tag_end = line.find(&tag)? + tag.len();
    let replaced = format!("{} {}", &line[..tag_end], text);

    let mut out: Vec<&str> = lines.clone();
    out[index] = &replaced;
    Some(join_body(&out, trailing_newline))
}

/// Drop every line carrying the tag for `id`. None when nothing matched.
pub fn remove_by_id(content: &str, id: &str) -> Option<String> {
    let (lines, trailing_newline) = split_body(content);
    let tag = id_tag(id);
    let kept: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| !line.contains(&tag))
        .collect();
    if kept.len() == lines.len() {
        return None;
    }
    Some(join_body(&kept, trailing_newline))
}

/// Append an unchecked task at the end of the list under `header`, ahead of
/// trailing blank lines and the next heading. A document without the header
/// gets one prepended.
pub fn append_task(content: &str, header: &str, task: &Task) -> String {
    let line = format_task_line(task, false);
    let (mut lines, trailing_newline) = split_body(content);

    let Some(header_index) = lines.iter().position(|l| l.starts_with(header)) else {
        return format!("{}\n\n{}\n\n{}", header, line, content);
    };

    let section_end = lines[header_index + 1..]
        .iter()
        .position(|l| is_heading(l))
        .map_or(lines.len(), |offset| header_index + 1 + offset);

    let mut insert_at = section_end;
    while insert_at > header_index + 1 && lines[insert_at - 1].trim().is_empty() {
        insert_at -= 1;
    }

    lines.insert(insert_at, &line);
    join_body(&lines, trailing_newline)
}

/// A brand-new list document holding one task.
pub fn list_template(header: &str, notice: &str, task: &Task) -> String {
    format!("{}\n\n{}\n\n{}\n", header, notice, format_task_line(task, false))
}
