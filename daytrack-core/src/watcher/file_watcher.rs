/// Workspace watcher using notify-debouncer-full.
///
/// Watches the day-track, night-check and weekly directories and emits a
/// DocumentChangeEvent for every tracked document that changed outside this
/// process. Writes made through the shared LocalStorage are recognized by
/// fingerprint and dropped.
/// 500ms debounce window for editors that save in several steps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use tokio::sync::broadcast;

use super::types::{ChangeKind, DocumentChangeEvent, DocumentKind};
use crate::config::TrackerPaths;
use crate::resolver::looks_like_date;
use crate::storage::local::LocalStorage;

const DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

pub struct WorkspaceWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, RecommendedCache>,
    event_tx: broadcast::Sender<DocumentChangeEvent>,
}

impl WorkspaceWatcher {
    /// Start watching the workspace `storage` writes to.
    /// Missing directories are created so they can be watched.
    pub fn new(
        storage: Arc<LocalStorage>,
    ) -> Result<(Self, broadcast::Receiver<DocumentChangeEvent>), notify::Error> {
        let (event_tx, event_rx) = broadcast::channel(256);

        let watched = watched_dirs(storage.paths());
        for dir in &watched {
            fs::create_dir_all(dir).map_err(notify::Error::io)?;
        }
        // Events arrive with resolved paths; classify against the same form.
        let canonical = canonical_paths(storage.paths());

        let tx_clone = event_tx.clone();
        let mut debouncer = new_debouncer(
            DEBOUNCE_DURATION,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        handle_debounced_event(&event, &canonical, &storage, &tx_clone);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        log::error!("[daytrack.watcher.error] Watch error: {}", e);
                    }
                }
            },
        )?;

        for dir in &watched {
            debouncer.watch(dir, RecursiveMode::NonRecursive)?;
            log::info!("[daytrack.watcher.dir] Watching {}", dir.display());
        }

        Ok((
            Self {
                _debouncer: debouncer,
                event_tx,
            },
            event_rx,
        ))
    }

    /// Another receiver for the same event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChangeEvent> {
        self.event_tx.subscribe()
    }
}

fn watched_dirs(paths: &TrackerPaths) -> Vec<PathBuf> {
    let mut dirs = vec![paths.day_track_dir.clone(), paths.night_check_dir.clone()];
    if let Some(weekly_dir) = paths.weekly_plan_file.parent() {
        if !dirs.iter().any(|d| d == weekly_dir) {
            dirs.push(weekly_dir.to_path_buf());
        }
    }
    dirs
}

fn canonicalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn canonical_paths(paths: &TrackerPaths) -> TrackerPaths {
    let weekly_plan_file = match (paths.weekly_plan_file.parent(), paths.weekly_plan_file.file_name()) {
        (Some(dir), Some(name)) => canonicalize(dir).join(name),
        _ => paths.weekly_plan_file.clone(),
    };
    TrackerPaths {
        day_track_dir: canonicalize(&paths.day_track_dir),
        archived_dir: canonicalize(&paths.archived_dir),
        night_check_dir: canonicalize(&paths.night_check_dir),
        weekly_plan_file,
    }
}

/// Which tracked document `path` is, if any.
pub fn classify_path(paths: &TrackerPaths, path: &Path) -> Option<DocumentKind> {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return None;
    }
    if path == paths.weekly_plan_file {
        return Some(DocumentKind::WeeklyPlan);
    }
    if path == paths.night_plan_file() {
        return Some(DocumentKind::NightPlan);
    }
    if path == paths.overnight_file() {
        return Some(DocumentKind::Overnight);
    }
    if path.parent() == Some(paths.day_track_dir.as_path()) {
        let stem = path.file_stem()?.to_str()?;
        if looks_like_date(stem) {
            return Some(DocumentKind::DayTrack {
                date: stem.to_string(),
            });
        }
    }
    None
}

/// Where storage writes the document of `kind`.
pub fn document_path(paths: &TrackerPaths, kind: &DocumentKind) -> PathBuf {
    match kind {
        DocumentKind::DayTrack { date } => paths.day_track_dir.join(format!("{}.md", date)),
        DocumentKind::NightPlan => paths.night_plan_file(),
        DocumentKind::Overnight => paths.overnight_file(),
        DocumentKind::WeeklyPlan => paths.weekly_plan_file.clone(),
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
    }
}

fn handle_debounced_event(
    event: &DebouncedEvent,
    canonical: &TrackerPaths,
    storage: &LocalStorage,
    tx: &broadcast::Sender<DocumentChangeEvent>,
) {
    let Some(change) = change_kind(&event.kind) else {
        return;
    };

    for path in &event.paths {
        let Some(document) = classify_path(canonical, &canonicalize(path)) else {
            continue;
        };
        let path = document_path(storage.paths(), &document);

        if change != ChangeKind::Removed && storage.check_self_write(&path) {
            log::debug!(
                "[daytrack.watcher.self_write] Suppressed own write to {}",
                path.display()
            );
            continue;
        }

        let change_event = DocumentChangeEvent {
            document,
            change,
            path,
        };
        if let Err(e) = tx.send(change_event) {
            log::warn!("[daytrack.watcher.send] No receivers: {}", e);
        }
    }
}
