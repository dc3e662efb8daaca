/// Local filesystem storage backend.
///
/// Every call re-reads the document it touches; nothing is cached between
/// calls. Mutations are a read-modify-write under a per-document mutex:
/// - parse the document into a board (or list)
/// - apply the change in memory
/// - regenerate and write atomically (write to .tmp, fsync, rename)
///
/// Each write registers a content fingerprint first so a file watcher can
/// tell our own writes from external edits.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::board::normalize_text;
use crate::bridge;
use crate::config::TrackerPaths;
use crate::identity::{TaskIdSource, TimestampIds};
use crate::lines;
use crate::parser::{self, TOMORROW_PLAN_HEADER, WEEKLY_PLAN_HEADER, WEEKLY_PLAN_NOTICE};
use crate::resolver::{format_date, parse_date, Clock, DateContext, Strategy, SystemClock};
use crate::types::*;
use crate::watcher::self_write::SelfWriteTracker;
use super::{StorageError, TaskStorage};

const PLAN_PREVIEW_MESSAGE: &str = "Tomorrow's plan (from last night's plan.md)";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Same ids in the same roles and order.
fn same_layout(a: &TaskBoard, b: &TaskBoard) -> bool {
    Role::ALL.iter().all(|role| {
        a.list(*role)
            .iter()
            .map(|t| &t.id)
            .eq(b.list(*role).iter().map(|t| &t.id))
    })
}

/// Markdown task storage rooted at a workspace directory.
pub struct LocalStorage {
    paths: TrackerPaths,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn TaskIdSource>,
    /// Per-file write mutex to prevent concurrent modification
    write_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    /// SHA-256 fingerprint tracker for self-write detection
    self_write_tracker: Mutex<SelfWriteTracker>,
}

impl LocalStorage {
    pub fn new(paths: TrackerPaths) -> Self {
        Self {
            paths,
            clock: Arc::new(SystemClock),
            ids: Arc::new(TimestampIds),
            write_locks: Mutex::new(HashMap::new()),
            self_write_tracker: Mutex::new(SelfWriteTracker::new()),
        }
    }

    /// Replace the source of "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the source of ids for new tasks.
    pub fn with_ids(mut self, ids: Arc<dyn TaskIdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn paths(&self) -> &TrackerPaths {
        &self.paths
    }

    /// Check if a file change at `path` is a self-write by comparing content fingerprint.
    /// If matched, the fingerprint is consumed and true is returned (suppress event).
    /// If no match, returns false (external change, propagate event).
    pub fn check_self_write(&self, path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(content) => lock(&self.self_write_tracker).check_and_consume(path, &content),
            Err(_) => false,
        }
    }

    /// Run periodic cleanup of expired fingerprints.
    pub fn cleanup_expired_fingerprints(&self) {
        lock(&self.self_write_tracker).cleanup_expired();
    }

    /// Resolve the scope's date against the clock. A missing date is today.
    fn date_context(&self, scope: &Scope) -> Result<DateContext, StorageError> {
        let today = self.clock.today();
        let queried = match scope.date.as_deref() {
            Some(date) => parse_date(date)?,
            None => today,
        };
        Ok(DateContext::new(queried, today))
    }

    /// The day-tracker file a daily mutation may touch. Only today qualifies.
    fn mutable_day_file(&self, scope: &Scope) -> Result<(PathBuf, String), StorageError> {
        let ctx = self.date_context(scope)?;
        let date = format_date(ctx.queried);
        if !ctx.is_mutable() {
            return Err(StorageError::InvalidOperation(format!(
                "Only today's tasks can be modified (requested {})",
                date
            )));
        }
        Ok((self.paths.day_track_file(ctx.queried), date))
    }

    /// Read today's document, creating it from the template when missing.
    /// Caller must hold the document's write lock.
    fn init_day_file(&self, path: &Path, date: &str) -> Result<String, StorageError> {
        if let Some(content) = bridge::read_optional(path)?.filter(|c| !c.trim().is_empty()) {
            return Ok(content);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = parser::day_template(date);
        self.write_document(path, &content)?;
        log::info!("[daytrack.storage.init] Created day tracker {}", path.display());
        Ok(content)
    }

    /// Read-modify-write on today's board.
    fn modify_day<R>(
        &self,
        scope: &Scope,
        op: impl FnOnce(&mut TaskBoard) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let (path, date) = self.mutable_day_file(scope)?;
        let write_lock = self.get_write_lock(&path);
        let _guard = lock(&write_lock);

        let content = self.init_day_file(&path, &date)?;
        let mut board = parser::parse_board(&content);
        let result = op(&mut board)?;

        let updated = parser::generate_board(&content, &board);
        if !same_layout(&board, &parser::parse_board(&updated)) {
            log::warn!(
                "[daytrack.storage.write] {} lacks a section header, refusing to drop tasks",
                path.display()
            );
            return Err(StorageError::InvalidOperation(format!(
                "{} is missing a task section header",
                path.display()
            )));
        }
        if updated != content {
            self.write_document(&path, &updated)?;
        }
        Ok(result)
    }

    /// Read-modify-write on the weekly plan. `op` receives the current text
    /// (None when the file does not exist) and returns the new text.
    fn modify_weekly(
        &self,
        op: impl FnOnce(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let path = self.paths.weekly_plan_file.clone();
        let write_lock = self.get_write_lock(&path);
        let _guard = lock(&write_lock);

        let content = bridge::read_optional(&path)?;
        let unchanged = content.clone();
        let updated = op(content)?;
        if unchanged.as_deref() == Some(updated.as_str()) {
            return Ok(());
        }
        if updated.trim().is_empty() {
            // Nothing left to plan; an absent file reads as an empty list.
            return match fs::remove_file(&path) {
                Ok(()) => {
                    log::info!("[daytrack.storage.weekly] Removed emptied {}", path.display());
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        self.write_document(&path, &updated)
    }

    fn weekly_task_missing(task_id: &str) -> StorageError {
        StorageError::TaskNotFound(task_id.to_string())
    }

    fn read_only_view(view: View) -> StorageError {
        StorageError::InvalidOperation(format!("The {:?} view is read-only", view))
    }

    /// Execute one resolution strategy. None means "try the next one".
    fn load_strategy(
        &self,
        strategy: Strategy,
        ctx: &DateContext,
    ) -> Result<Option<BoardSnapshot>, StorageError> {
        let date = format_date(ctx.queried);
        match strategy {
            Strategy::DayTrackOrCreate => {
                let path = self.paths.day_track_file(ctx.queried);
                let write_lock = self.get_write_lock(&path);
                let _guard = lock(&write_lock);

                let content = self.init_day_file(&path, &date)?;
                let (board, repaired) = parser::parse_board_repaired(&content);
                // Persist synthesised ids so later mutations can address them.
                if repaired {
                    log::info!(
                        "[daytrack.storage.repair] Wrote missing task ids into {}",
                        path.display()
                    );
                    self.write_document(&path, &parser::generate_board(&content, &board))?;
                }

                let mut snapshot = Self::snapshot(View::Daily, &date, BoardSource::DayTrack, board);
                snapshot.read_only = false;
                snapshot.bot_tasks = bridge::read_overnight(&self.paths)?;
                snapshot.tomorrow_tasks = bridge::read_night_plan(&self.paths)?;
                Ok(Some(snapshot))
            }
            Strategy::DayTrack => {
                let path = self.paths.day_track_file(ctx.queried);
                Ok(bridge::read_optional(&path)?.map(|content| {
                    Self::snapshot(
                        View::Daily,
                        &date,
                        BoardSource::DayTrack,
                        parser::parse_board(&content),
                    )
                }))
            }
            Strategy::Archived => {
                let path = self.paths.archived_day_track(&date);
                if !path.is_file() {
                    return Ok(None);
                }
                let day = bridge::read_archived_day(&self.paths, &date)?;
                let mut snapshot =
                    Self::snapshot(View::Daily, &date, BoardSource::Archived, day.tasks);
                snapshot.bot_tasks = day.bot_tasks;
                snapshot.tomorrow_tasks = day.plan;
                Ok(Some(snapshot))
            }
            Strategy::NightPlan => {
                let path = self.paths.night_plan_file();
                Ok(bridge::read_optional(&path)?.map(|content| {
                    let plan = parser::parse_list(&content, TOMORROW_PLAN_HEADER);
                    let mut snapshot = Self::snapshot(
                        View::Daily,
                        &date,
                        BoardSource::PlanPreview,
                        TaskBoard::from_backlog(plan),
                    );
                    snapshot.message = Some(PLAN_PREVIEW_MESSAGE.to_string());
                    snapshot
                }))
            }
        }
    }

    fn snapshot(view: View, date: &str, source: BoardSource, tasks: TaskBoard) -> BoardSnapshot {
        BoardSnapshot {
            source,
            tasks,
            ..BoardSnapshot::empty(view, Some(date.to_string()), None)
        }
    }

    fn get_daily(&self, scope: &Scope) -> Result<BoardSnapshot, StorageError> {
        let ctx = self.date_context(scope)?;
        let plan = ctx.plan();
        for strategy in &plan.strategies {
            if let Some(snapshot) = self.load_strategy(*strategy, &ctx)? {
                log::debug!(
                    "[daytrack.storage.resolve] {} resolved via {:?}",
                    format_date(ctx.queried),
                    strategy
                );
                return Ok(snapshot);
            }
        }
        Ok(BoardSnapshot::empty(
            View::Daily,
            Some(format_date(ctx.queried)),
            plan.empty_message,
        ))
    }

    fn get_weekly(&self) -> Result<BoardSnapshot, StorageError> {
        let path = &self.paths.weekly_plan_file;
        let Some(content) = bridge::read_optional(path)? else {
            return Ok(BoardSnapshot::empty(View::Weekly, None, None));
        };
        Ok(BoardSnapshot {
            source: BoardSource::WeeklyPlan,
            tasks: TaskBoard::from_backlog(parser::parse_list(&content, WEEKLY_PLAN_HEADER)),
            read_only: false,
            ..BoardSnapshot::empty(View::Weekly, None, None)
        })
    }

    fn get_achieved(&self) -> Result<BoardSnapshot, StorageError> {
        let achieved = bridge::collect_achieved(&self.paths)?;
        Ok(BoardSnapshot {
            source: BoardSource::Archived,
            achieved,
            ..BoardSnapshot::empty(View::Achieved, None, None)
        })
    }

    /// Register the fingerprint, then write atomically.
    fn write_document(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        {
            let mut tracker = lock(&self.self_write_tracker);
            tracker.cleanup_expired();
            tracker.register(path, content);
        }
        Self::atomic_write(path, content)?;
        Ok(())
    }

    /// Get or create a write lock for a document path.
    fn get_write_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.write_locks);
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Atomic write: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        // Never replace a non-empty document with nothing
        if content.trim().is_empty() {
            if let Ok(existing) = fs::read_to_string(path) {
                if !existing.trim().is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Refusing to overwrite non-empty file with empty content",
                    ));
                }
            }
        }

        let tmp_path = path.with_extension("daytrack.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

impl TaskStorage for LocalStorage {
    fn get_board(&self, scope: &Scope) -> Result<BoardSnapshot, StorageError> {
        match scope.view {
            View::Daily => self.get_daily(scope),
            View::Weekly => self.get_weekly(),
            View::Achieved => self.get_achieved(),
        }
    }

    fn add_task(&self, text: &str, role: Role, scope: &Scope) -> Result<Task, StorageError> {
        match scope.view {
            View::Daily => {
                let id = self.ids.next_id();
                let task = self.modify_day(scope, |board| Ok(board.add(role, id, text)))?;
                log::info!(
                    "[daytrack.storage.add] Added task {} to {}",
                    task.id,
                    role
                );
                Ok(task)
            }
            View::Weekly => {
                let task = Task::new(self.ids.next_id(), normalize_text(text));
                self.modify_weekly(|content| {
                    Ok(match content {
                        Some(existing) if !existing.trim().is_empty() => {
                            lines::append_task(&existing, WEEKLY_PLAN_HEADER, &task)
                        }
                        _ => lines::list_template(WEEKLY_PLAN_HEADER, WEEKLY_PLAN_NOTICE, &task),
                    })
                })?;
                log::info!("[daytrack.storage.add] Added task {} to weekly plan", task.id);
                Ok(task)
            }
            View::Achieved => Err(Self::read_only_view(scope.view)),
        }
    }

    fn update_task(
        &self,
        task_id: &str,
        update: &TaskUpdate,
        scope: &Scope,
    ) -> Result<(), StorageError> {
        match scope.view {
            View::Daily => {
                self.modify_day(scope, |board| {
                    let (current, _) = board
                        .find(task_id)
                        .ok_or_else(|| StorageError::TaskNotFound(task_id.to_string()))?;
                    board.edit(task_id, update.text.as_deref(), update.flagged)?;

                    if update.moves() {
                        let target = update.role.unwrap_or(current);
                        if target != current || update.index.is_some() {
                            board.move_task(task_id, target, update.index)?;
                        }
                    }
                    Ok(())
                })?;
                log::info!("[daytrack.storage.update] Updated task {}", task_id);
                Ok(())
            }
            View::Weekly => {
                self.modify_weekly(|content| {
                    let mut content = content
                        .filter(|c| lines::contains_task(c, task_id))
                        .ok_or_else(|| Self::weekly_task_missing(task_id))?;
                    if update.role.is_some() {
                        content = lines::toggle_by_id(&content, task_id)
                            .ok_or_else(|| Self::weekly_task_missing(task_id))?;
                    }
                    if let Some(text) = update.text.as_deref() {
                        content = lines::replace_text_by_id(&content, task_id, &normalize_text(text))
                            .ok_or_else(|| Self::weekly_task_missing(task_id))?;
                    }
                    Ok(content)
                })?;
                log::info!("[daytrack.storage.update] Updated weekly task {}", task_id);
                Ok(())
            }
            View::Achieved => Err(Self::read_only_view(scope.view)),
        }
    }

    fn delete_task(&self, task_id: &str, scope: &Scope) -> Result<(), StorageError> {
        match scope.view {
            View::Daily => {
                let removed = self.modify_day(scope, |board| board.remove(task_id))?;
                log::info!(
                    "[daytrack.storage.delete] Deleted task {} ({})",
                    removed.id,
                    removed.text
                );
                Ok(())
            }
            View::Weekly => {
                self.modify_weekly(|content| {
                    content
                        .and_then(|c| lines::remove_by_id(&c, task_id))
                        .ok_or_else(|| Self::weekly_task_missing(task_id))
                })?;
                log::info!("[daytrack.storage.delete] Deleted weekly task {}", task_id);
                Ok(())
            }
            View::Achieved => Err(Self::read_only_view(scope.view)),
        }
    }

    fn list_archived_dates(&self) -> Result<Vec<String>, StorageError> {
        bridge::list_archived_dates(&self.paths.archived_dir)
    }

    fn get_archived_day(&self, date: &str) -> Result<ArchivedDay, StorageError> {
        let date = format_date(parse_date(date)?);
        bridge::read_archived_day(&self.paths, &date)
    }
}
