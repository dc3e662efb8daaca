/// Task operations on an in-memory board.
///
/// Lookups scan Backlog, In Progress, Done in that order and the first match
/// wins. Ids are expected to be unique per document but this is not
/// enforced. The `done` checkbox follows the role a task is added or moved
/// into; flags are left alone by every move.

use crate::parser::split_flag;
use crate::storage::StorageError;
use crate::types::{Role, Task, TaskBoard};

/// Fold a caller-supplied text into one trimmed line.
pub fn normalize_text(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl TaskBoard {
    /// Role and index of the first task with `id`.
    pub fn find(&self, id: &str) -> Option<(Role, usize)> {
        Role::ALL.iter().find_map(|role| {
            self.list(*role)
                .iter()
                .position(|t| t.id == id)
                .map(|index| (*role, index))
        })
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.find(id).map(|(role, index)| &self.list(role)[index])
    }

    /// Append a new task to `role`. Never fails. A leading flag glyph in
    /// `text` flags the task instead of staying in its text.
    pub fn add(&mut self, role: Role, id: impl Into<String>, text: &str) -> Task {
        let normalized = normalize_text(text);
        let (text, flagged) = split_flag(&normalized);
        let task = Task {
            id: id.into(),
            text: text.to_string(),
            done: role == Role::Done,
            flagged,
        };
        self.list_mut(role).push(task.clone());
        task
    }

    /// Move a task to `target`, optionally at `index` (clamped to the list
    /// length after removal). Without an index the task is appended. Moving
    /// within the same role reorders.
    pub fn move_task(
        &mut self,
        id: &str,
        target: Role,
        index: Option<usize>,
    ) -> Result<(), StorageError> {
        let (source, source_index) = self
            .find(id)
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))?;

        let mut task = self.list_mut(source).remove(source_index);
        task.done = target == Role::Done;

        let list = self.list_mut(target);
        let at = index.map_or(list.len(), |i| i.min(list.len()));
        list.insert(at, task);
        Ok(())
    }

    /// Update text and/or flag in place. An explicit `flagged` wins over a
    /// flag glyph leading the new text.
    pub fn edit(
        &mut self,
        id: &str,
        text: Option<&str>,
        flagged: Option<bool>,
    ) -> Result<(), StorageError> {
        let (role, index) = self
            .find(id)
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))?;
        let task = &mut self.list_mut(role)[index];
        if let Some(text) = text {
            let normalized = normalize_text(text);
            let (text, glyph) = split_flag(&normalized);
            task.text = text.to_string();
            task.flagged |= glyph;
        }
        if let Some(flagged) = flagged {
            task.flagged = flagged;
        }
        Ok(())
    }

    /// Delete the first task with `id`.
    pub fn remove(&mut self, id: &str) -> Result<Task, StorageError> {
        let (role, index) = self
            .find(id)
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))?;
        Ok(self.list_mut(role).remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_board() -> TaskBoard {
        let mut board = TaskBoard::default();
        board.add(Role::Backlog, "a", "A");
        board.add(Role::Backlog, "b", "B");
        board.add(Role::Backlog, "c", "C");
        board.add(Role::InProgress, "d", "D");
        board.add(Role::Done, "e", "E");
        board
    }

    fn ids(list: &[Task]) -> Vec<&str> {
        list.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_add_appends_unchecked() {
        let mut board = TaskBoard::default();
        let task = board.add(Role::Backlog, "1", "write spec");
        assert_eq!(board.backlog, vec![task.clone()]);
        assert!(!task.done);
        assert!(!task.flagged);
    }

    #[test]
    fn test_add_to_done_is_checked() {
        let mut board = TaskBoard::default();
        assert!(board.add(Role::Done, "1", "shipped").done);
    }

    #[test]
    fn test_add_folds_newlines() {
        let mut board = TaskBoard::default();
        let task = board.add(Role::Backlog, "1", "  line one\nline two \r\n");
        assert_eq!(task.text, "line one line two");
    }

    #[test]
    fn test_leading_flag_glyph_becomes_flag() {
        let mut board = TaskBoard::default();
        let task = board.add(Role::Backlog, "1", "🚩 urgent");
        assert_eq!(task.text, "urgent");
        assert!(task.flagged);

        board.add(Role::Backlog, "2", "calm");
        board.edit("2", Some("🚩 now urgent"), None).unwrap();
        let task = board.get("2").unwrap();
        assert_eq!(task.text, "now urgent");
        assert!(task.flagged);

        board.edit("2", Some("🚩 still text"), Some(false)).unwrap();
        assert!(!board.get("2").unwrap().flagged);
    }

    #[test]
    fn test_flagged_board_survives_generation() {
        use crate::parser::{day_template, generate_board, parse_board};

        let mut board = TaskBoard::default();
        board.add(Role::Backlog, "1", "");
        board.edit("1", None, Some(true)).unwrap();
        board.add(Role::InProgress, "2", "🚩 urgent");
        board.add(Role::Done, "3", "🚩🚩 glued");

        let out = generate_board(&day_template("2024-06-10"), &board);
        assert_eq!(parse_board(&out), board);
    }

    #[test]
    fn test_move_to_done_and_back() {
        let mut board = TaskBoard::default();
        board.add(Role::Backlog, "1", "write spec");
        board.move_task("1", Role::Done, None).unwrap();
        assert!(board.backlog.is_empty());
        assert_eq!(board.done.len(), 1);
        assert_eq!(board.done[0].id, "1");
        assert_eq!(board.done[0].text, "write spec");
        assert!(board.done[0].done);

        board.move_task("1", Role::InProgress, None).unwrap();
        assert!(!board.in_progress[0].done);
    }

    #[test]
    fn test_reorder_within_role() {
        let mut board = sample_board();
        board.move_task("c", Role::Backlog, Some(0)).unwrap();
        assert_eq!(ids(&board.backlog), vec!["c", "a", "b"]);
        assert_eq!(board.len(), 5);

        board.move_task("c", Role::Backlog, Some(2)).unwrap();
        assert_eq!(ids(&board.backlog), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_index_is_clamped() {
        let mut board = sample_board();
        board.move_task("a", Role::InProgress, Some(99)).unwrap();
        assert_eq!(ids(&board.in_progress), vec!["d", "a"]);

        board.move_task("b", Role::Backlog, Some(usize::MAX)).unwrap();
        assert_eq!(ids(&board.backlog), vec!["c", "b"]);
    }

    #[test]
    fn test_move_at_index_into_other_role() {
        let mut board = sample_board();
        board.move_task("e", Role::Backlog, Some(1)).unwrap();
        assert_eq!(ids(&board.backlog), vec!["a", "e", "b", "c"]);
        assert!(!board.backlog[1].done);
        assert!(board.done.is_empty());
    }

    #[test]
    fn test_move_missing_task() {
        let mut board = sample_board();
        let err = board.move_task("zz", Role::Done, None).unwrap_err();
        assert!(matches!(err, StorageError::TaskNotFound(ref id) if id == "zz"));
        assert_eq!(board, sample_board());
    }

    #[test]
    fn test_edit_keeps_id_and_position() {
        let mut board = sample_board();
        board.edit("b", Some("B2"), Some(true)).unwrap();
        assert_eq!(board.find("b"), Some((Role::Backlog, 1)));
        let task = board.get("b").unwrap();
        assert_eq!(task.text, "B2");
        assert!(task.flagged);

        board.edit("b", None, Some(false)).unwrap();
        assert_eq!(board.get("b").unwrap().text, "B2");
        assert!(!board.get("b").unwrap().flagged);
    }

    #[test]
    fn test_flag_survives_moves() {
        let mut board = sample_board();
        board.edit("a", None, Some(true)).unwrap();
        board.move_task("a", Role::Done, None).unwrap();
        board.move_task("a", Role::InProgress, Some(0)).unwrap();
        let task = board.get("a").unwrap();
        assert!(task.flagged);
        assert_eq!(task.id, "a");
    }

    #[test]
    fn test_remove() {
        let mut board = sample_board();
        let removed = board.remove("d").unwrap();
        assert_eq!(removed.text, "D");
        assert!(board.in_progress.is_empty());
        assert!(matches!(board.remove("d"), Err(StorageError::TaskNotFound(_))));
    }

    #[test]
    fn test_first_match_wins_on_duplicate_ids() {
        let mut board = TaskBoard::default();
        board.add(Role::InProgress, "dup", "second");
        board.add(Role::Backlog, "dup", "first");
        assert_eq!(board.find("dup"), Some((Role::Backlog, 0)));
        board.remove("dup").unwrap();
        assert_eq!(board.find("dup"), Some((Role::InProgress, 0)));
    }

    #[test]
    fn test_ids_stay_exclusive_after_many_operations() {
        let mut board = sample_board();
        let script: [(&str, Role, Option<usize>); 6] = [
            ("a", Role::Done, None),
            ("e", Role::InProgress, Some(0)),
            ("b", Role::Backlog, Some(5)),
            ("a", Role::Backlog, Some(1)),
            ("d", Role::Done, Some(0)),
            ("c", Role::Done, Some(1)),
        ];
        for (id, role, index) in script {
            board.move_task(id, role, index).unwrap();
            let mut seen = HashSet::new();
            for role in Role::ALL {
                for task in board.list(role) {
                    assert!(seen.insert(task.id.clone()), "duplicate {}", task.id);
                }
            }
            assert_eq!(seen.len(), 5);
        }
    }
}
