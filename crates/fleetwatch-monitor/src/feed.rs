use chrono::{Local, Utc};
use fleetwatch_core::{LogDraft, LogEntry, LogLevel, DEFAULT_MAX_LOGS};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;
use std::ops::Range;
use std::str::FromStr;

pub const CLEARED_MESSAGE: &str = "Activity log cleared";
/// Extra rows rendered past the viewport for partially visible items.
pub const WINDOW_BUFFER_ITEMS: usize = 2;

/// Log type filter; serialized flat as `"all"` or a level name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelFilter {
    #[default]
    All,
    Only(LogLevel),
}

impl LevelFilter {
    pub fn matches(self, level: LogLevel) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Only(wanted) => wanted == level,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LevelFilter::All => "all",
            LevelFilter::Only(level) => level.as_str(),
        }
    }

    pub fn next(self) -> Self {
        match self {
            LevelFilter::All => LevelFilter::Only(LogLevel::Success),
            LevelFilter::Only(LogLevel::Success) => LevelFilter::Only(LogLevel::Warning),
            LevelFilter::Only(LogLevel::Warning) => LevelFilter::Only(LogLevel::Error),
            LevelFilter::Only(LogLevel::Error) => LevelFilter::Only(LogLevel::Info),
            LevelFilter::Only(LogLevel::Info) => LevelFilter::All,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.trim().eq_ignore_ascii_case("all") {
            return Ok(LevelFilter::All);
        }
        input.parse().map(LevelFilter::Only)
    }
}

impl Serialize for LevelFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for LevelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogFilter {
    #[serde(default, rename = "type")]
    pub level: LevelFilter,
    #[serde(default)]
    pub search: String,
}

impl LogFilter {
    pub fn level(level: LogLevel) -> Self {
        Self {
            level: LevelFilter::Only(level),
            search: String::new(),
        }
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self {
            level: LevelFilter::All,
            search: text.into(),
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.level.matches(entry.level) {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        entry.message.to_lowercase().contains(&needle)
            || entry
                .agent
                .as_deref()
                .map(|agent| agent.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Scroll geometry reported by the render boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_offset: u64,
    pub viewport_count: usize,
    pub item_extent: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            viewport_count: 20,
            item_extent: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct LogWindow {
    pub range: Range<usize>,
    pub total: usize,
    pub entries: Vec<LogEntry>,
}

/// Bounded newest-first activity log.
#[derive(Debug, Clone)]
pub struct LogFeed {
    entries: VecDeque<LogEntry>,
    max_logs: usize,
    filter: LogFilter,
    next_seq: u64,
}

impl Default for LogFeed {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGS)
    }
}

impl LogFeed {
    pub fn new(max_logs: usize) -> Self {
        let max_logs = max_logs.max(1);
        Self {
            entries: VecDeque::with_capacity(max_logs),
            max_logs,
            filter: LogFilter::default(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retained entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn append(&mut self, draft: LogDraft) -> LogEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = LogEntry {
            id: format!("{}-{seq}", Utc::now().timestamp_millis()),
            timestamp: draft
                .timestamp
                .unwrap_or_else(|| Local::now().format("%H:%M:%S").to_string()),
            message: draft.message,
            level: draft.level,
            agent: draft.agent,
            details: draft.details,
        };
        self.entries.push_front(entry.clone());
        self.entries.truncate(self.max_logs);
        entry
    }

    pub fn query(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .collect()
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: LogFilter) {
        self.filter = filter;
    }

    /// Entries matching the active filter, newest first.
    pub fn filtered(&self) -> Vec<&LogEntry> {
        self.query(&self.filter)
    }

    pub fn windowed_read(&self, viewport: Viewport) -> LogWindow {
        let filtered = self.filtered();
        let range = window_range(filtered.len(), viewport);
        LogWindow {
            entries: filtered[range.clone()].iter().map(|entry| (*entry).clone()).collect(),
            total: filtered.len(),
            range,
        }
    }

    pub fn find(&self, id: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn clear(&mut self) -> LogEntry {
        self.entries.clear();
        self.append(LogDraft::new(LogLevel::Info, CLEARED_MESSAGE))
    }
}

/// Index range of filtered entries to materialize for a scroll position:
/// `[offset / extent, offset / extent + viewport + 2)` clamped to `len`.
pub fn window_range(len: usize, viewport: Viewport) -> Range<usize> {
    let extent = viewport.item_extent.max(1);
    let start = usize::try_from(viewport.scroll_offset / extent).unwrap_or(usize::MAX);
    let end = start
        .saturating_add(viewport.viewport_count)
        .saturating_add(WINDOW_BUFFER_ITEMS);
    start.min(len)..end.min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(level: LogLevel, message: &str) -> LogDraft {
        LogDraft::new(level, message)
    }

    #[test]
    fn append_is_newest_first_and_capped() {
        let mut feed = LogFeed::new(3);
        for idx in 0..3 {
            feed.append(draft(LogLevel::Info, &format!("m{idx}")));
        }
        assert_eq!(feed.len(), 3);

        feed.append(draft(LogLevel::Info, "m3"));
        let messages: Vec<_> = feed.entries().map(|entry| entry.message.as_str()).collect();
        assert_eq!(messages, vec!["m3", "m2", "m1"]);
    }

    #[test]
    fn ids_are_unique_within_a_run() {
        let mut feed = LogFeed::new(50);
        for _ in 0..50 {
            feed.append(draft(LogLevel::Info, "tick"));
        }
        let mut ids: Vec<_> = feed.entries().map(|entry| entry.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn supplied_timestamp_is_kept() {
        let mut feed = LogFeed::default();
        let mut with_time = draft(LogLevel::Success, "deployed");
        with_time.timestamp = Some("07:30:00".to_string());
        assert_eq!(feed.append(with_time).timestamp, "07:30:00");
    }

    #[test]
    fn query_by_type_preserves_order() {
        let mut feed = LogFeed::default();
        feed.append(draft(LogLevel::Error, "e1"));
        feed.append(draft(LogLevel::Info, "i1"));
        feed.append(draft(LogLevel::Error, "e2"));
        feed.append(draft(LogLevel::Warning, "w1"));

        let errors: Vec<_> = feed
            .query(&LogFilter::level(LogLevel::Error))
            .into_iter()
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(errors, vec!["e2", "e1"]);
        assert_eq!(feed.query(&LogFilter::default()).len(), 4);
    }

    #[test]
    fn search_is_case_insensitive_over_message_and_agent() {
        let mut feed = LogFeed::default();
        feed.append(draft(LogLevel::Info, "Deploy started").with_agent("Robin"));
        feed.append(draft(LogLevel::Info, "unrelated"));
        feed.append(draft(LogLevel::Warning, "robin's build is slow"));

        assert_eq!(feed.query(&LogFilter::search("ROBIN")).len(), 2);
        assert_eq!(feed.query(&LogFilter::search("deploy")).len(), 1);

        let combined = LogFilter {
            level: LevelFilter::Only(LogLevel::Warning),
            search: "robin".to_string(),
        };
        assert_eq!(feed.query(&combined).len(), 1);
    }

    #[test]
    fn window_range_adds_buffer_and_clamps() {
        let viewport = Viewport {
            scroll_offset: 120,
            viewport_count: 5,
            item_extent: 60,
        };
        assert_eq!(window_range(100, viewport), 2..9);
        assert_eq!(window_range(6, viewport), 2..6);
        assert_eq!(window_range(1, viewport), 1..1);
        let zero_extent = Viewport {
            item_extent: 0,
            ..viewport
        };
        assert_eq!(window_range(1_000, zero_extent), 120..127);
    }

    #[test]
    fn windowed_read_uses_active_filter() {
        let mut feed = LogFeed::default();
        for idx in 0..10 {
            let level = if idx % 2 == 0 { LogLevel::Error } else { LogLevel::Info };
            feed.append(draft(level, &format!("m{idx}")));
        }
        feed.set_filter(LogFilter::level(LogLevel::Error));
        let window = feed.windowed_read(Viewport {
            scroll_offset: 1,
            viewport_count: 1,
            item_extent: 1,
        });
        assert_eq!(window.total, 5);
        assert_eq!(window.range, 1..4);
        let messages: Vec<_> = window.entries.iter().map(|entry| entry.message.as_str()).collect();
        assert_eq!(messages, vec!["m6", "m4", "m2"]);
    }

    #[test]
    fn clear_leaves_single_info_entry() {
        let mut feed = LogFeed::default();
        feed.append(draft(LogLevel::Error, "boom"));
        feed.append(draft(LogLevel::Success, "ok"));
        let cleared = feed.clear();
        assert_eq!(feed.len(), 1);
        assert_eq!(cleared.level, LogLevel::Info);
        assert_eq!(cleared.message, CLEARED_MESSAGE);
        assert_eq!(feed.find(&cleared.id), Some(&cleared));
    }

    #[test]
    fn level_filter_cycles_through_all_types() {
        let mut filter = LevelFilter::All;
        let mut labels = Vec::new();
        for _ in 0..5 {
            filter = filter.next();
            labels.push(filter.label());
        }
        assert_eq!(labels, vec!["success", "warning", "error", "info", "all"]);
    }

    #[test]
    fn filter_serializes_as_flat_type_and_search() {
        let filter = LogFilter {
            level: LevelFilter::Only(LogLevel::Error),
            search: "robin".to_string(),
        };
        let value = serde_json::to_value(&filter).expect("encode");
        assert_eq!(value, serde_json::json!({"type": "error", "search": "robin"}));

        let parsed: LogFilter =
            serde_json::from_str(r#"{"type":"all","search":""}"#).expect("decode");
        assert_eq!(parsed, LogFilter::default());
        assert!(serde_json::from_str::<LogFilter>(r#"{"type":"loud"}"#).is_err());
    }
}
