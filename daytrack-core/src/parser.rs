/// Markdown grammar for day-tracker and plan documents.
///
/// Handles two document shapes:
///   # 2024-06-10 Task Tracker          # 📅 Weekly Plan
///   ## 📋 Backlog                      *(This file is ...)*
///   - [ ] [#id] 🚩 Task text           - [ ] [#id] Task text
///   ## 🚀 In Progress
///   ## ✅ Done
///   ## 💤 Sleep Background Tasks
///
/// A document is scanned into typed line records. Regeneration replays the
/// records, swapping each section's task block for the current list and
/// copying every other line verbatim.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::identity;
use crate::types::{Role, Task, TaskBoard, FLAG_GLYPH};

pub const BACKLOG_HEADER: &str = "## 📋 Backlog";
pub const IN_PROGRESS_HEADER: &str = "## 🚀 In Progress";
pub const DONE_HEADER: &str = "## ✅ Done";
pub const SLEEP_BACKGROUND_HEADER: &str = "## 💤 Sleep Background Tasks";

pub const WEEKLY_PLAN_HEADER: &str = "# 📅 Weekly Plan";
pub const TOMORROW_PLAN_HEADER: &str = "# 📋 Tomorrow's Plan";
pub const SLEEP_TASKS_HEADER: &str = "# 💤 Sleep Tasks";

pub const WEEKLY_PLAN_NOTICE: &str = "*(This file is automatically generated by Weekly Check)*";

/// Auto-generation notices, in both locales the night/weekly checks write.
const NOTICE_MARKERS: [&str; 2] = ["*(This file", "*(此文件"];

static TASK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[([ xX])\](?: (.*))?$").unwrap());

/// Which header markers delimit which lists.
#[derive(Debug, Clone)]
pub struct Schema<'h> {
    headers: Vec<&'h str>,
    parse_flags: bool,
    single_block: bool,
}

impl Schema<'static> {
    /// Three-section Kanban grammar. Slot order follows `Role::ALL`.
    pub fn day_tracker() -> Self {
        Self {
            headers: vec![BACKLOG_HEADER, IN_PROGRESS_HEADER, DONE_HEADER],
            parse_flags: true,
            single_block: false,
        }
    }
}

impl<'h> Schema<'h> {
    /// One flat list under `header`, closed for good by the next heading.
    pub fn single_list(header: &'h str) -> Self {
        Self {
            headers: vec![header],
            parse_flags: false,
            single_block: true,
        }
    }

    pub fn slots(&self) -> usize {
        self.headers.len()
    }

    fn slot_for(&self, line: &str) -> Option<usize> {
        self.headers.iter().position(|h| line.starts_with(h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// First occurrence of a section header; receives the regenerated block.
    Header(usize),
    /// Task line belonging to a section; superseded on regeneration.
    Task(usize),
    /// Blank line owned by a task block; superseded on regeneration.
    Spacer,
    /// Everything else, copied through verbatim.
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord<'a> {
    pub line: &'a str,
    pub kind: LineKind,
}

/// Typed view of one document: its line records plus one task list per slot.
#[derive(Debug, Clone)]
pub struct ScannedDocument<'a> {
    pub records: Vec<LineRecord<'a>>,
    pub lists: Vec<Vec<Task>>,
    /// The text ended with a line terminator (not a record of its own).
    pub trailing_newline: bool,
    /// Some task line had no id tag and was given a fresh id.
    pub repaired: bool,
}

/// Blank lines seen since the header (or the last task) of an open block.
#[derive(Default)]
struct Block {
    has_task: bool,
    pending: Vec<usize>,
}

/// Normalize CRLF/CR line endings to LF.
pub fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if content.contains('\r') {
        Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(content)
    }
}

/// ATX heading: 1-6 `#` followed by whitespace or end of line.
pub fn is_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes) && matches!(line.as_bytes().get(hashes), None | Some(b' ' | b'\t'))
}

pub fn is_generation_notice(line: &str) -> bool {
    NOTICE_MARKERS.iter().any(|m| line.contains(m))
}

/// Split a leading flag glyph off task text. The glyph counts only when it
/// stands alone or is followed by whitespace.
pub fn split_flag(text: &str) -> (&str, bool) {
    let text = text.trim();
    match text.strip_prefix(FLAG_GLYPH.trim_end()) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            (rest.trim_start(), true)
        }
        _ => (text, false),
    }
}

/// Parse one checkbox line into a task. Returns None for anything that is
/// not a task line. A line without an id tag gets a fresh time-derived id.
pub fn parse_task_line(line: &str, parse_flags: bool) -> Option<Task> {
    read_task_line(line, parse_flags).map(|(task, _)| task)
}

/// Like `parse_task_line`, also reporting whether the id was synthesised.
fn read_task_line(line: &str, parse_flags: bool) -> Option<(Task, bool)> {
    if is_generation_notice(line) {
        return None;
    }
    let caps = TASK_LINE_RE.captures(line)?;
    let done = &caps[1] != " ";
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let (id, text, repaired) = match identity::split_id_tag(rest) {
        Some((id, text)) => (id, text, false),
        None => {
            let id = identity::generate_id();
            log::debug!(
                "[daytrack.parser.repair] Task line without id tag, assigned {}: {:?}",
                id,
                line
            );
            (id, rest, true)
        }
    };

    let (text, flagged) = if parse_flags {
        split_flag(text)
    } else {
        (text.trim(), false)
    };

    let task = Task {
        id,
        text: text.to_string(),
        done,
        flagged,
    };
    Some((task, repaired))
}

/// Serialize a task as `- [x] [#id] 🚩 text`.
pub fn format_task_line(task: &Task, with_flag: bool) -> String {
    let checkbox = if task.done { "[x]" } else { "[ ]" };
    let flag = if with_flag && task.flagged { FLAG_GLYPH } else { "" };
    format!("- {} [#{}] {}{}", checkbox, task.id, flag, task.text)
}

/// Classify every line of `content` (already LF-normalized).
///
/// Parsing is total: lines that match nothing are opaque.
pub fn scan<'a>(content: &'a str, schema: &Schema<'_>) -> ScannedDocument<'a> {
    let mut records: Vec<LineRecord<'a>> = Vec::new();
    let mut lists: Vec<Vec<Task>> = vec![Vec::new(); schema.slots()];
    let mut seen = vec![false; schema.slots()];
    let mut current: Option<usize> = None;
    let mut block: Option<Block> = None;
    let mut repaired = false;

    let (body, trailing_newline) = match content.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (content, false),
    };

    for line in body.split('\n') {
        if is_heading(line) {
            settle_block(&mut records, block.take());
            let kind = match schema.slot_for(line) {
                Some(slot) if !seen[slot] => {
                    seen[slot] = true;
                    current = Some(slot);
                    block = Some(Block::default());
                    LineKind::Header(slot)
                }
                // Repeated header: its tasks still count, but only the
                // first occurrence gets the regenerated block.
                Some(slot) if !schema.single_block => {
                    current = Some(slot);
                    LineKind::Opaque
                }
                _ => {
                    current = None;
                    LineKind::Opaque
                }
            };
            records.push(LineRecord { line, kind });
            continue;
        }

        let Some(slot) = current else {
            records.push(LineRecord {
                line,
                kind: LineKind::Opaque,
            });
            continue;
        };

        if line.trim().is_empty() {
            let kind = match block.as_mut() {
                Some(open) => {
                    open.pending.push(records.len());
                    LineKind::Spacer
                }
                None => LineKind::Opaque,
            };
            records.push(LineRecord { line, kind });
            continue;
        }

        if let Some((task, synthesised)) = read_task_line(line, schema.parse_flags) {
            repaired |= synthesised;
            if let Some(open) = block.as_mut() {
                open.has_task = true;
                open.pending.clear();
            }
            lists[slot].push(task);
            records.push(LineRecord {
                line,
                kind: LineKind::Task(slot),
            });
            continue;
        }

        settle_block(&mut records, block.take());
        records.push(LineRecord {
            line,
            kind: LineKind::Opaque,
        });
    }
    settle_block(&mut records, block.take());

    ScannedDocument {
        records,
        lists,
        trailing_newline,
        repaired,
    }
}

/// Close a task block. Blank lines after the last task stay in the document;
/// an empty block gives up exactly one blank line to the regenerated header.
fn settle_block(records: &mut [LineRecord<'_>], block: Option<Block>) {
    let Some(block) = block else {
        return;
    };
    let keep = if block.has_task {
        &block.pending[..]
    } else {
        block.pending.get(1..).unwrap_or(&[])
    };
    for &index in keep {
        records[index].kind = LineKind::Opaque;
    }
}

/// Parse the lists of every schema slot.
pub fn parse(content: &str, schema: &Schema<'_>) -> Vec<Vec<Task>> {
    let content = normalize_line_endings(content);
    scan(&content, schema).lists
}

/// Regenerate `original` with `lists[slot]` as the task block of each slot.
pub fn generate(original: &str, schema: &Schema<'_>, lists: &[&[Task]]) -> String {
    let original = normalize_line_endings(original);
    let doc = scan(&original, schema);

    let mut lines: Vec<Cow<'_, str>> = Vec::with_capacity(doc.records.len());
    for record in &doc.records {
        match record.kind {
            LineKind::Header(slot) => {
                lines.push(Cow::Borrowed(record.line));
                lines.push(Cow::Borrowed(""));
                for task in lists.get(slot).copied().unwrap_or(&[]) {
                    lines.push(Cow::Owned(format_task_line(task, schema.parse_flags)));
                }
            }
            LineKind::Task(_) | LineKind::Spacer => {}
            LineKind::Opaque => lines.push(Cow::Borrowed(record.line)),
        }
    }
    let mut out = lines.join("\n");
    if doc.trailing_newline {
        out.push('\n');
    }
    out
}

/// Parse a day-tracker document into its board.
pub fn parse_board(content: &str) -> TaskBoard {
    parse_board_repaired(content).0
}

/// Parse a day-tracker document, also reporting whether any task id had to
/// be synthesised (the document needs a rewrite to keep those ids).
pub fn parse_board_repaired(content: &str) -> (TaskBoard, bool) {
    let content = normalize_line_endings(content);
    let doc = scan(&content, &Schema::day_tracker());
    let mut lists = doc.lists.into_iter();
    let board = TaskBoard {
        backlog: lists.next().unwrap_or_default(),
        in_progress: lists.next().unwrap_or_default(),
        done: lists.next().unwrap_or_default(),
    };
    (board, doc.repaired)
}

/// Regenerate a day-tracker document from its original text and a board.
pub fn generate_board(original: &str, board: &TaskBoard) -> String {
    let lists: Vec<&[Task]> = Role::ALL
        .iter()
        .map(|role| board.list(*role).as_slice())
        .collect();
    generate(original, &Schema::day_tracker(), &lists)
}

/// Parse the flat list under `header`.
pub fn parse_list(content: &str, header: &str) -> Vec<Task> {
    parse(content, &Schema::single_list(header))
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// Regenerate a single-list document.
pub fn generate_list(original: &str, header: &str, tasks: &[Task]) -> String {
    generate(original, &Schema::single_list(header), &[tasks])
}

/// Fresh day-tracker document with four empty sections.
pub fn day_template(date: &str) -> String {
    format!(
        "# {} Task Tracker\n\n{}\n\n{}\n\n{}\n\n{}\n",
        date, BACKLOG_HEADER, IN_PROGRESS_HEADER, DONE_HEADER, SLEEP_BACKGROUND_HEADER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DAY: &str = "\
# 2024-06-10 Task Tracker

Notes written by hand.

## 📋 Backlog

- [ ] [#101] Write spec
- [ ] [#102] 🚩 Call bank
## 🚀 In Progress

- [ ] [#103] Review PR
## ✅ Done

- [x] [#104] Laundry

Retro: went fine.
Second paragraph.

## 💤 Sleep Background Tasks
- [ ] [#900] Crawl feeds
";

    #[test]
    fn test_template_layout() {
        assert_eq!(
            day_template("2024-06-10"),
            "# 2024-06-10 Task Tracker\n\n## 📋 Backlog\n\n## 🚀 In Progress\n\n## ✅ Done\n\n## 💤 Sleep Background Tasks\n"
        );
    }

    #[test]
    fn test_parse_sections() {
        let board = parse_board(SAMPLE_DAY);
        assert_eq!(board.backlog.len(), 2);
        assert_eq!(board.backlog[0].id, "101");
        assert_eq!(board.backlog[0].text, "Write spec");
        assert!(!board.backlog[0].flagged);
        assert_eq!(board.backlog[1].text, "Call bank");
        assert!(board.backlog[1].flagged);
        assert_eq!(board.in_progress.len(), 1);
        assert_eq!(board.done.len(), 1);
        assert!(board.done[0].done);
        // Sleep section is not a board section.
        assert!(!board.done.iter().any(|t| t.id == "900"));
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let board = parse_board(SAMPLE_DAY);
        assert_eq!(generate_board(SAMPLE_DAY, &board), SAMPLE_DAY);
    }

    #[test]
    fn test_generate_then_roundtrip_is_stable() {
        let template = day_template("2024-06-10");
        let mut board = TaskBoard::default();
        board.backlog.push(Task::new("1", "a"));
        board.backlog.push(Task::new("2", "b"));
        board.done.push(Task {
            done: true,
            ..Task::new("3", "c")
        });
        let once = generate_board(&template, &board);
        let twice = generate_board(&once, &parse_board(&once));
        assert_eq!(once, twice);
        assert_eq!(parse_board(&once), board);
    }

    #[test]
    fn test_generated_block_layout() {
        let mut board = TaskBoard::default();
        board.backlog.push(Task::new("7", "write spec"));
        let out = generate_board(&day_template("2024-06-10"), &board);
        assert_eq!(
            out,
            "# 2024-06-10 Task Tracker\n\n## 📋 Backlog\n\n- [ ] [#7] write spec\n## 🚀 In Progress\n\n## ✅ Done\n\n## 💤 Sleep Background Tasks\n"
        );
    }

    #[test]
    fn test_empty_board_regenerates_template() {
        let template = day_template("2024-06-10");
        assert_eq!(generate_board(&template, &TaskBoard::default()), template);
    }

    #[test]
    fn test_trailing_prose_after_done_survives() {
        let mut board = parse_board(SAMPLE_DAY);
        board.backlog.push(Task::new("105", "New one"));
        let out = generate_board(SAMPLE_DAY, &board);
        assert!(out.contains("\n- [x] [#104] Laundry\n\nRetro: went fine.\nSecond paragraph.\n\n## 💤"));
        assert!(out.contains("Notes written by hand."));
        assert!(out.contains("## 💤 Sleep Background Tasks\n- [ ] [#900] Crawl feeds\n"));
        assert!(out.contains("- [ ] [#102] 🚩 Call bank\n- [ ] [#105] New one\n## 🚀"));
    }

    #[test]
    fn test_missing_id_is_repaired() {
        let (board, repaired) = parse_board_repaired("## 📋 Backlog\n- [ ] untagged task\n");
        assert!(repaired);
        assert_eq!(board.backlog.len(), 1);
        assert_eq!(board.backlog[0].text, "untagged task");
        assert!(identity::is_valid_id(&board.backlog[0].id));

        let (_, repaired) = parse_board_repaired(SAMPLE_DAY);
        assert!(!repaired);
        // Untagged lines outside the board sections do not count.
        let (_, repaired) = parse_board_repaired("## 💤 Sleep Background Tasks\n- [ ] x\n");
        assert!(!repaired);
    }

    #[test]
    fn test_flag_with_empty_text_roundtrips() {
        let mut board = TaskBoard::default();
        board.backlog.push(Task {
            flagged: true,
            ..Task::new("1", "")
        });
        let out = generate_board(&day_template("2024-06-10"), &board);
        assert!(out.contains("- [ ] [#1] 🚩 \n"));
        assert_eq!(parse_board(&out), board);
    }

    #[test]
    fn test_split_flag() {
        assert_eq!(split_flag("🚩 urgent"), ("urgent", true));
        assert_eq!(split_flag("🚩"), ("", true));
        assert_eq!(split_flag(" 🚩\tx "), ("x", true));
        assert_eq!(split_flag("🚩urgent"), ("🚩urgent", false));
        assert_eq!(split_flag("plain"), ("plain", false));
    }

    #[test]
    fn test_tasks_before_any_header_are_opaque() {
        let content = "- [ ] [#1] stray\n## 📋 Backlog\n- [ ] [#2] real\n";
        let board = parse_board(content);
        assert_eq!(board.backlog.len(), 1);
        assert_eq!(board.backlog[0].id, "2");
        let out = generate_board(content, &board);
        assert!(out.starts_with("- [ ] [#1] stray\n"));
    }

    #[test]
    fn test_malformed_lines_are_opaque() {
        let content = "## 📋 Backlog\n- [?] odd\n-[ ] [#1] nospace\n- [ ] [#2] ok\n";
        let board = parse_board(content);
        assert_eq!(board.backlog.len(), 1);
        assert_eq!(board.backlog[0].id, "2");
        let out = generate_board(content, &board);
        assert!(out.contains("- [?] odd"));
        assert!(out.contains("-[ ] [#1] nospace"));
    }

    #[test]
    fn test_notice_line_is_not_a_task() {
        let content = "## 📋 Backlog\n- [ ] *(This file is automatically generated)*\n- [ ] [#1] real\n";
        let board = parse_board(content);
        assert_eq!(board.backlog.len(), 1);
        assert_eq!(board.backlog[0].id, "1");
    }

    #[test]
    fn test_unknown_heading_closes_section() {
        let content = "## 📋 Backlog\n- [ ] [#1] a\n## Notes\n- [ ] [#2] not a task\n";
        let board = parse_board(content);
        assert_eq!(board.backlog.len(), 1);
        let out = generate_board(content, &TaskBoard::default());
        assert_eq!(out, "## 📋 Backlog\n\n## Notes\n- [ ] [#2] not a task\n");
    }

    #[test]
    fn test_repeated_header_gets_no_block() {
        let content = "## 📋 Backlog\n- [ ] [#1] a\n## 📋 Backlog\n- [ ] [#2] b\n";
        let board = parse_board(content);
        assert_eq!(board.backlog.len(), 2);
        let out = generate_board(content, &board);
        assert_eq!(out, "## 📋 Backlog\n\n- [ ] [#1] a\n- [ ] [#2] b\n## 📋 Backlog\n");
    }

    #[test]
    fn test_crlf_input_is_normalized() {
        let content = "## 📋 Backlog\r\n- [ ] [#1] a\r\n";
        let board = parse_board(content);
        assert_eq!(board.backlog[0].text, "a");
        assert_eq!(generate_board(content, &board), "## 📋 Backlog\n\n- [ ] [#1] a\n");
    }

    #[test]
    fn test_uppercase_checkbox_counts_as_done() {
        let board = parse_board("## ✅ Done\n- [X] [#1] shout\n");
        assert!(board.done[0].done);
    }

    #[test]
    fn test_flag_only_parsed_for_day_tracker() {
        let list = parse_list("# 📅 Weekly Plan\n- [ ] [#1] 🚩 keep glyph\n", WEEKLY_PLAN_HEADER);
        assert_eq!(list[0].text, "🚩 keep glyph");
        assert!(!list[0].flagged);
    }

    #[test]
    fn test_single_list_stops_at_next_heading() {
        let content = "\
# 📋 Tomorrow's Plan

*(此文件由夜间检查自动生成)*

- [ ] [#1] first
- [x] [#2] second
## Notes
- [ ] [#3] outside
# 📋 Tomorrow's Plan
- [ ] [#4] not resumed
";
        let list = parse_list(content, TOMORROW_PLAN_HEADER);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "1");
        assert!(list[1].done);
    }

    #[test]
    fn test_generate_list_roundtrip() {
        let mut tasks = parse_list("# 📅 Weekly Plan\n", WEEKLY_PLAN_HEADER);
        tasks.push(Task::new("1", "plan week"));
        let once = generate_list("# 📅 Weekly Plan\n", WEEKLY_PLAN_HEADER, &tasks);
        assert_eq!(once, "# 📅 Weekly Plan\n\n- [ ] [#1] plan week\n");
        let again = generate_list(&once, WEEKLY_PLAN_HEADER, &parse_list(&once, WEEKLY_PLAN_HEADER));
        assert_eq!(once, again);
    }

    #[test]
    fn test_is_heading() {
        assert!(is_heading("# Title"));
        assert!(is_heading("## 📋 Backlog"));
        assert!(is_heading("###"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("####### seven"));
        assert!(!is_heading("- [ ] # not"));
    }

    #[test]
    fn test_scan_marks_spacers() {
        let doc = scan("## 📋 Backlog\n\n- [ ] [#1] a\n\n- [ ] [#2] b\n\nprose", &Schema::day_tracker());
        let kinds: Vec<LineKind> = doc.records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Header(0),
                LineKind::Spacer,
                LineKind::Task(0),
                LineKind::Spacer,
                LineKind::Task(0),
                LineKind::Opaque,
                LineKind::Opaque,
            ]
        );
    }
}
