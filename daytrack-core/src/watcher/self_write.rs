/// Recognizes file events caused by our own writes.
///
/// Storage registers the fingerprint of every document it is about to write.
/// When the watcher later reports that path, the current file content is
/// fingerprinted and matched against what is pending: a hit is consumed and
/// the event dropped, a miss means someone else touched the file.
/// Entries older than the TTL are only garbage; matching never looks at age.
/// Each path keeps at most `MAX_PENDING_PER_PATH` entries, oldest dropped first.
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::types::ContentFingerprint;

const FINGERPRINT_TTL: Duration = Duration::from_secs(10);
const MAX_PENDING_PER_PATH: usize = 16;

#[derive(Debug, Default)]
pub struct SelfWriteTracker {
    /// Oldest write first; several writes may land before the watcher fires.
    pending: HashMap<PathBuf, VecDeque<(ContentFingerprint, Instant)>>,
}

impl SelfWriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: &Path, content: &str) {
        let queue = self.pending.entry(path.to_path_buf()).or_default();
        queue.push_back((ContentFingerprint::from_content(content), Instant::now()));
        while queue.len() > MAX_PENDING_PER_PATH {
            queue.pop_front();
        }
    }

    /// True (and the entry is consumed) when `content` is one of our writes.
    pub fn check_and_consume(&mut self, path: &Path, content: &str) -> bool {
        let fingerprint = ContentFingerprint::from_content(content);
        let Some(queue) = self.pending.get_mut(path) else {
            return false;
        };
        let Some(pos) = queue.iter().position(|(fp, _)| *fp == fingerprint) else {
            return false;
        };
        queue.remove(pos);
        if queue.is_empty() {
            self.pending.remove(path);
        }
        true
    }

    pub fn cleanup_expired(&mut self) {
        self.cleanup_older_than(Instant::now(), FINGERPRINT_TTL);
    }

    fn cleanup_older_than(&mut self, now: Instant, ttl: Duration) {
        self.pending.retain(|path, queue| {
            let before = queue.len();
            queue.retain(|(_, at)| now.saturating_duration_since(*at) < ttl);
            if queue.len() < before {
                log::debug!(
                    "[daytrack.watcher.self_write] Expired {} fingerprint(s) for {}",
                    before - queue.len(),
                    path.display()
                );
            }
            !queue.is_empty()
        });
    }

    pub fn pending_count(&self, path: &Path) -> usize {
        self.pending.get(path).map_or(0, VecDeque::len)
    }
}
