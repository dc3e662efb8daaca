/// Read-only access to the night-check and archive areas of the workspace.
///
/// Night-check and weekly documents are single lists. Archived days are
/// folders named after their date holding a frozen day-tracker plus the
/// overnight and plan lists of that night.
use std::fs;
use std::io;
use std::path::Path;

use crate::config::TrackerPaths;
use crate::parser::{self, SLEEP_TASKS_HEADER, TOMORROW_PLAN_HEADER};
use crate::resolver::looks_like_date;
use crate::storage::StorageError;
use crate::types::{AchievedTask, ArchivedDay, Task};

/// Read a file, mapping "does not exist" to `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Tasks of the single list under `header`. A missing file is an empty list.
pub fn read_list(path: &Path, header: &str) -> Result<Vec<Task>, StorageError> {
    Ok(read_optional(path)?
        .map(|content| parser::parse_list(&content, header))
        .unwrap_or_default())
}

/// Tonight's plan for tomorrow (`night_check/plan.md`).
pub fn read_night_plan(paths: &TrackerPaths) -> Result<Vec<Task>, StorageError> {
    read_list(&paths.night_plan_file(), TOMORROW_PLAN_HEADER)
}

/// Tasks queued for the overnight bot (`night_check/bot_overnight.md`).
pub fn read_overnight(paths: &TrackerPaths) -> Result<Vec<Task>, StorageError> {
    read_list(&paths.overnight_file(), SLEEP_TASKS_HEADER)
}

/// Names of archived day folders, most recent first.
pub fn list_archived_dates(archived_dir: &Path) -> Result<Vec<String>, StorageError> {
    let entries = match fs::read_dir(archived_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dates = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if looks_like_date(&name) {
            dates.push(name);
        } else {
            log::debug!(
                "[daytrack.bridge.archive] Skipping non-date folder {:?}",
                entry.path()
            );
        }
    }
    dates.sort_unstable_by(|a, b| b.cmp(a));
    Ok(dates)
}

/// Load one archived day. The day-tracker file must exist; the lists are optional.
pub fn read_archived_day(paths: &TrackerPaths, date: &str) -> Result<ArchivedDay, StorageError> {
    let track_path = paths.archived_day_track(date);
    let content = read_optional(&track_path)?
        .ok_or_else(|| StorageError::DocumentNotFound(track_path.display().to_string()))?;

    Ok(ArchivedDay {
        date: date.to_string(),
        tasks: parser::parse_board(&content),
        bot_tasks: read_list(&paths.archived_overnight(date), SLEEP_TASKS_HEADER)?,
        plan: read_list(&paths.archived_plan(date), TOMORROW_PLAN_HEADER)?,
    })
}

/// Done tasks of every archived day, most recent day first.
/// Days whose folder lacks a day-tracker are skipped.
pub fn collect_achieved(paths: &TrackerPaths) -> Result<Vec<AchievedTask>, StorageError> {
    let mut achieved = Vec::new();
    for date in list_archived_dates(&paths.archived_dir)? {
        let Some(content) = read_optional(&paths.archived_day_track(&date))? else {
            continue;
        };
        let board = parser::parse_board(&content);
        achieved.extend(board.done.into_iter().map(|task| AchievedTask {
            date: date.clone(),
            task,
        }));
    }
    Ok(achieved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use tempfile::TempDir;

    const ARCHIVED_TRACK: &str = "\
# 2024-06-08 Task Tracker

## 📋 Backlog

- [ ] [#1] Leftover
## 🚀 In Progress

## ✅ Done

- [x] [#2] Shipped
- [x] [#3] Filed taxes
## 💤 Sleep Background Tasks
";

    fn workspace() -> (TempDir, TrackerPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = TrackerConfig::with_base_dir(tmp.path()).paths();
        (tmp, paths)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_list_missing_file_is_empty() {
        let (_tmp, paths) = workspace();
        assert!(read_night_plan(&paths).unwrap().is_empty());
        assert!(read_overnight(&paths).unwrap().is_empty());
    }

    #[test]
    fn test_read_night_plan() {
        let (_tmp, paths) = workspace();
        write(
            &paths.night_plan_file(),
            "# 📋 Tomorrow's Plan\n\n*(This file is generated)*\n\n- [ ] [#7] Dentist\n- [ ] [#8] Gym\n",
        );
        let plan = read_night_plan(&paths).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].id, "7");
        assert_eq!(plan[1].text, "Gym");
    }

    #[test]
    fn test_list_archived_dates_sorted_descending() {
        let (_tmp, paths) = workspace();
        for date in ["2024-06-01", "2024-06-09", "2024-05-30"] {
            fs::create_dir_all(paths.archived_day_dir(date)).unwrap();
        }
        fs::create_dir_all(paths.archived_dir.join("scratch")).unwrap();
        write(&paths.archived_dir.join("2024-06-10"), "a file, not a folder");

        assert_eq!(
            list_archived_dates(&paths.archived_dir).unwrap(),
            vec!["2024-06-09", "2024-06-01", "2024-05-30"]
        );
    }

    #[test]
    fn test_list_archived_dates_missing_root() {
        let (_tmp, paths) = workspace();
        assert!(list_archived_dates(&paths.archived_dir).unwrap().is_empty());
    }

    #[test]
    fn test_read_archived_day() {
        let (_tmp, paths) = workspace();
        write(&paths.archived_day_track("2024-06-08"), ARCHIVED_TRACK);
        write(
            &paths.archived_overnight("2024-06-08"),
            "# 💤 Sleep Tasks\n\n- [x] [#50] Index photos\n",
        );

        let day = read_archived_day(&paths, "2024-06-08").unwrap();
        assert_eq!(day.date, "2024-06-08");
        assert_eq!(day.tasks.backlog.len(), 1);
        assert_eq!(day.tasks.done.len(), 2);
        assert_eq!(day.bot_tasks.len(), 1);
        assert!(day.bot_tasks[0].done);
        assert!(day.plan.is_empty());
    }

    #[test]
    fn test_read_archived_day_missing() {
        let (_tmp, paths) = workspace();
        fs::create_dir_all(paths.archived_day_dir("2024-06-08")).unwrap();
        let err = read_archived_day(&paths, "2024-06-08").unwrap_err();
        assert!(matches!(err, StorageError::DocumentNotFound(_)));
    }

    #[test]
    fn test_collect_achieved() {
        let (_tmp, paths) = workspace();
        write(&paths.archived_day_track("2024-06-08"), ARCHIVED_TRACK);
        write(
            &paths.archived_day_track("2024-06-09"),
            "# 2024-06-09 Task Tracker\n\n## ✅ Done\n\n- [x] [#9] Newest\n",
        );
        fs::create_dir_all(paths.archived_day_dir("2024-06-07")).unwrap();

        let achieved = collect_achieved(&paths).unwrap();
        let summary: Vec<(&str, &str)> = achieved
            .iter()
            .map(|a| (a.date.as_str(), a.task.id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("2024-06-09", "9"), ("2024-06-08", "2"), ("2024-06-08", "3")]
        );
    }
}
