//! File-based conversation archive.
//!
//! Each save writes `conversations/chat_<stem>.json` and
//! `transcripts/transcript_<stem>.md`, where the stem is the touch time in
//! epoch seconds followed by a slug of the title. A conversation that still
//! has the creation time of its previous record replaces it; one whose
//! creation marker moved (after an erase) leaves the old record in place.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wigli_core::conversation::Conversation;
use wigli_core::error::StoreError;
use wigli_core::store::ConversationStore;
use wigli_core::text::slugify;
use wigli_core::time::epoch_secs;

use crate::selector::Selector;

const CHAT_PREFIX: &str = "chat_";
const CHAT_SUFFIX: &str = ".json";
const TRANSCRIPT_PREFIX: &str = "transcript_";
const TRANSCRIPT_SUFFIX: &str = ".md";

/// A stored conversation, identified by its file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub stem: String,
    /// Touch time encoded in the stem, epoch seconds
    pub touched: f64,
    pub path: PathBuf,
}

/// The data directory and its conversation, transcript and log folders.
#[derive(Debug, Clone)]
pub struct ChatArchive {
    data_dir: PathBuf,
    conversations_dir: PathBuf,
    transcripts_dir: PathBuf,
    logs_dir: PathBuf,
    scripts_dir: PathBuf,
}

fn io_err(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn corrupted(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupted {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// File stem for a conversation at its current touch time.
pub fn make_stem(conversation: &Conversation) -> String {
    let slug = conversation
        .title
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    format!("{:.6}_{slug}", epoch_secs(conversation.touched_at))
}

impl ChatArchive {
    /// Open (creating if needed) the archive under `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        let archive = Self {
            conversations_dir: data_dir.join("conversations"),
            transcripts_dir: data_dir.join("transcripts"),
            logs_dir: data_dir.join("logs"),
            scripts_dir: data_dir.join("scripts"),
            data_dir,
        };
        for dir in [
            &archive.data_dir,
            &archive.conversations_dir,
            &archive.transcripts_dir,
            &archive.logs_dir,
            &archive.scripts_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        debug!(path = %archive.data_dir.display(), "Chat archive opened");
        Ok(archive)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Where generated scripts are written before they run.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Event log for an invocation that started at `started`.
    pub fn log_path(&self, started: DateTime<Utc>) -> PathBuf {
        self.logs_dir
            .join(format!("log_{:.6}.log", epoch_secs(started)))
    }

    pub fn chat_path(&self, stem: &str) -> PathBuf {
        self.conversations_dir
            .join(format!("{CHAT_PREFIX}{stem}{CHAT_SUFFIX}"))
    }

    pub fn transcript_path(&self, stem: &str) -> PathBuf {
        self.transcripts_dir
            .join(format!("{TRANSCRIPT_PREFIX}{stem}{TRANSCRIPT_SUFFIX}"))
    }

    /// Every stored conversation, oldest first.
    pub fn list(&self) -> Result<Vec<ArchiveEntry>, StoreError> {
        let dir = std::fs::read_dir(&self.conversations_dir)
            .map_err(|e| io_err(&self.conversations_dir, e))?;

        let mut entries: Vec<ArchiveEntry> = dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stem = name
                    .strip_prefix(CHAT_PREFIX)?
                    .strip_suffix(CHAT_SUFFIX)?
                    .to_string();
                let touched = stem.split('_').next()?.parse::<f64>().ok()?;
                Some(ArchiveEntry {
                    stem,
                    touched,
                    path: entry.path(),
                })
            })
            .collect();

        entries.sort_by(|a, b| a.touched.total_cmp(&b.touched).then_with(|| a.stem.cmp(&b.stem)));
        Ok(entries)
    }

    /// Read one stored conversation.
    pub fn load(&self, entry: &ArchiveEntry) -> Result<Conversation, StoreError> {
        Self::read(&entry.path)
    }

    fn read(path: &Path) -> Result<Conversation, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&content).map_err(|e| corrupted(path, e))
    }

    /// Try each selector in order and load the first match.
    pub fn find(
        &self,
        selectors: &[Selector],
        now: DateTime<Utc>,
    ) -> Result<Option<Conversation>, StoreError> {
        let entries = self.list()?;
        if entries.is_empty() {
            return Ok(None);
        }

        for selector in selectors {
            if let Some(entry) = Self::select(&entries, selector, now) {
                debug!(stem = %entry.stem, ?selector, "Selected stored conversation");
                return self.load(entry).map(Some);
            }
        }
        Ok(None)
    }

    fn select<'a>(
        entries: &'a [ArchiveEntry],
        selector: &Selector,
        now: DateTime<Utc>,
    ) -> Option<&'a ArchiveEntry> {
        match selector {
            Selector::Latest => entries.last(),
            Selector::Index(index) => {
                let index = (*index).clamp(1, entries.len());
                entries.get(entries.len() - index)
            }
            Selector::Timestamp(_) | Selector::Title(_) => {
                entries.iter().rev().find(|e| selector.matches_stem(&e.stem))
            }
            Selector::Idle { window_secs } => {
                let newest = entries.last()?;
                let idle = epoch_secs(now) - newest.touched.floor();
                (idle < *window_secs as f64).then_some(newest)
            }
        }
    }

    /// One line per non-empty conversation, `"n: title"`, newest = 1,
    /// listed oldest first.
    pub fn history(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.list()?;
        let total = entries.len();
        let mut lines = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            match self.load(entry) {
                Ok(convo) if !convo.is_empty() => {
                    let title = convo.title.as_deref().unwrap_or("No Title");
                    lines.push(format!("{}: {title}", total - i));
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable conversation: {e}"),
            }
        }
        Ok(lines)
    }

    /// Write the transcript, falling back to UTF-16 once. Failures are
    /// logged and dropped.
    fn write_transcript(path: &Path, markdown: &str) {
        debug!(path = %path.display(), "Saving transcript");
        let Err(first) = std::fs::write(path, markdown) else {
            return;
        };
        warn!(path = %path.display(), "Transcript write failed ({first}), retrying as UTF-16");

        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(markdown.encode_utf16().flat_map(u16::to_le_bytes));
        if let Err(second) = std::fs::write(path, bytes) {
            warn!("Failed to write transcript {}: {second}", path.display());
        }
    }

    fn remove(path: &Path) {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), "Could not remove old record: {e}");
            }
        }
    }
}

impl ConversationStore for ChatArchive {
    fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError> {
        if conversation.is_empty() {
            return Ok(());
        }

        let replaced = conversation.filename.clone().filter(|old| {
            match Self::read(&self.chat_path(old)) {
                Ok(previous) => previous.created_at == conversation.created_at,
                Err(e) => {
                    debug!("Previous record not comparable: {e}");
                    false
                }
            }
        });

        conversation.touch();
        let stem = make_stem(conversation);
        conversation.filename = Some(stem.clone());

        let chat_path = self.chat_path(&stem);
        let json = serde_json::to_string_pretty(conversation).map_err(|e| corrupted(&chat_path, e))?;
        debug!(path = %chat_path.display(), "Saving chat JSON");
        std::fs::write(&chat_path, json).map_err(|e| io_err(&chat_path, e))?;

        let markdown = conversation.format_transcript_markdown(None);
        Self::write_transcript(&self.transcript_path(&stem), &markdown);

        if let Some(old) = replaced.filter(|old| *old != stem) {
            Self::remove(&self.chat_path(&old));
            Self::remove(&self.transcript_path(&old));
        }
        debug!(stem = %stem, messages = conversation.len(), "Archived conversation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wigli_core::message::Role;

    fn archive() -> (tempfile::TempDir, ChatArchive) {
        let dir = tempfile::tempdir().unwrap();
        let archive = ChatArchive::open(dir.path()).unwrap();
        (dir, archive)
    }

    fn titled(title: &str, texts: &[&str]) -> Conversation {
        let mut convo = Conversation::new();
        convo.title = Some(title.into());
        for text in texts {
            convo.append(*text, Role::User);
        }
        convo
    }

    #[test]
    fn open_creates_layout() {
        let (dir, archive) = archive();
        assert!(dir.path().join("conversations").is_dir());
        assert!(dir.path().join("transcripts").is_dir());
        assert!(dir.path().join("logs").is_dir());
        assert!(archive.scripts_dir().is_dir());
        let log = archive.log_path(Utc::now());
        assert!(log.file_name().unwrap().to_string_lossy().starts_with("log_"));
    }

    #[test]
    fn empty_conversation_is_not_saved() {
        let (_dir, archive) = archive();
        let mut convo = Conversation::new();
        archive.save(&mut convo).unwrap();
        assert!(archive.list().unwrap().is_empty());
        assert!(convo.filename.is_none());
    }

    #[test]
    fn save_writes_json_and_transcript() {
        let (_dir, archive) = archive();
        let mut convo = titled("Cat Facts!", &["Tell me about cats"]);
        archive.save(&mut convo).unwrap();

        let stem = convo.filename.clone().unwrap();
        assert!(stem.ends_with("_Cat_Facts"));
        let transcript = std::fs::read_to_string(archive.transcript_path(&stem)).unwrap();
        assert!(transcript.contains("#### [User]"));
        assert!(transcript.contains("> Tell me about cats"));

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 1);
        let loaded = archive.load(&entries[0]).unwrap();
        assert_eq!(loaded.messages, convo.messages);
        assert_eq!(loaded.created_at, convo.created_at);
    }

    #[test]
    fn resave_replaces_previous_record() {
        let (_dir, archive) = archive();
        let mut convo = titled("Chat", &["one"]);
        archive.save(&mut convo).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        convo.append("two", Role::User);
        archive.save(&mut convo).unwrap();

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(archive.load(&entries[0]).unwrap().len(), 2);
    }

    #[test]
    fn erase_keeps_previous_record() {
        let (_dir, archive) = archive();
        let mut convo = titled("Chat", &["one", "two"]);
        archive.save(&mut convo).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        convo.erase(1);
        archive.save(&mut convo).unwrap();

        let entries = archive.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(archive.load(&entries[0]).unwrap().len(), 2);
        assert_eq!(archive.load(&entries[1]).unwrap().len(), 1);
    }

    #[test]
    fn selectors() {
        let (_dir, archive) = archive();
        for (title, text) in [("Old Dogs", "woof"), ("Middle Birds", "tweet"), ("New Cats", "meow")] {
            let mut convo = titled(title, &[text]);
            archive.save(&mut convo).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let now = Utc::now();
        let first = |sel: Selector| {
            archive
                .find(&[sel], now)
                .unwrap()
                .map(|c| c.title.unwrap())
        };

        assert_eq!(first(Selector::Latest).as_deref(), Some("New Cats"));
        assert_eq!(first(Selector::Index(1)).as_deref(), Some("New Cats"));
        assert_eq!(first(Selector::Index(3)).as_deref(), Some("Old Dogs"));
        assert_eq!(first(Selector::Index(99)).as_deref(), Some("Old Dogs"));
        assert_eq!(first(Selector::Index(0)).as_deref(), Some("New Cats"));
        assert_eq!(first(Selector::Title("middle birds".into())).as_deref(), Some("Middle Birds"));
        assert_eq!(first(Selector::Title("fish".into())), None);

        let stem = archive.list().unwrap()[0].stem.clone();
        let ts = stem.split('_').next().unwrap().to_string();
        assert_eq!(first(Selector::Timestamp(ts)).as_deref(), Some("Old Dogs"));
    }

    #[test]
    fn idle_window() {
        let (_dir, archive) = archive();
        let mut convo = titled("Recent", &["hi"]);
        archive.save(&mut convo).unwrap();

        let idle = [Selector::Idle { window_secs: 300 }];
        assert!(archive.find(&idle, Utc::now()).unwrap().is_some());
        let later = Utc::now() + Duration::seconds(301);
        assert!(archive.find(&idle, later).unwrap().is_none());
    }

    #[test]
    fn selectors_fall_through_in_order() {
        let (_dir, archive) = archive();
        let mut convo = titled("Only", &["hi"]);
        archive.save(&mut convo).unwrap();
        let found = archive
            .find(
                &[Selector::Title("missing".into()), Selector::Idle { window_secs: 300 }],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(found.unwrap().title.as_deref(), Some("Only"));
    }

    #[test]
    fn history_lists_newest_as_one() {
        let (_dir, archive) = archive();
        for title in ["First", "Second"] {
            let mut convo = titled(title, &["x"]);
            archive.save(&mut convo).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(archive.history().unwrap(), vec!["2: First", "1: Second"]);
    }

    #[test]
    fn corrupted_record_is_reported() {
        let (_dir, archive) = archive();
        std::fs::write(archive.chat_path("1700000000.000000_Bad"), "{not json").unwrap();
        let entries = archive.list().unwrap();
        assert!(matches!(
            archive.load(&entries[0]),
            Err(StoreError::Corrupted { .. })
        ));
        assert!(archive.history().unwrap().is_empty());
    }
}
