/// Task identity helpers.
///
/// Every task line carries an `[#id]` tag right after its checkbox. Ids are
/// opaque tokens limited to `[A-Za-z0-9_-]+`. New ids come from a
/// `TaskIdSource`; the default source hands out monotonic millisecond stamps
/// so ids written by older versions of the tracker keep the same shape.
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

static ID_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[#([A-Za-z0-9_-]+)\](?: |$)").unwrap());

static ID_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Split a leading `[#id]` tag off `rest`. Returns (id, remainder).
pub fn split_id_tag(rest: &str) -> Option<(String, &str)> {
    let caps = ID_TAG_RE.captures(rest)?;
    let end = caps.get(0).map_or(0, |m| m.end());
    Some((caps[1].to_string(), &rest[end..]))
}

/// The literal tag written into documents for `id`.
pub fn id_tag(id: &str) -> String {
    format!("[#{}]", id)
}

/// Whether `id` can be written as a tag and read back unchanged.
pub fn is_valid_id(id: &str) -> bool {
    ID_TOKEN_RE.is_match(id)
}

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Generate a time-derived id (milliseconds since the epoch).
/// Strictly increasing within the process, so two calls in the same
/// millisecond never collide.
pub fn generate_id() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ID.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(actual) => prev = actual,
        }
    }
}

/// Source of fresh task ids for newly created tasks.
pub trait TaskIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default id source backed by `generate_id`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampIds;

impl TaskIdSource for TimestampIds {
    fn next_id(&self) -> String {
        generate_id()
    }
}

/// Deterministic ids `<prefix>1`, `<prefix>2`, ...
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    next: AtomicU64,
}

impl SequenceIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl TaskIdSource for SequenceIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}
