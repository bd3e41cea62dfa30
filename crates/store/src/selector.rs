//! Ways to pick a stored conversation.

/// One lookup rule. Rules are tried in order; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The most recently touched conversation
    Latest,
    /// The newest conversation whose file stem contains this text
    Timestamp(String),
    /// Reverse-chronological position, 1 = newest (clamped to the archive)
    Index(usize),
    /// The newest conversation whose title contains this text, ignoring
    /// case, spaces and underscores
    Title(String),
    /// The newest conversation if it was touched within this many seconds
    Idle { window_secs: u64 },
}

impl Selector {
    /// Does `stem` satisfy a text-matching selector?
    pub(crate) fn matches_stem(&self, stem: &str) -> bool {
        match self {
            Selector::Timestamp(ts) => stem.contains(ts.as_str()),
            Selector::Title(title) => {
                let needle = title.replace([' ', '_'], "").to_lowercase();
                stem.replace('_', "").to_lowercase().contains(&needle)
            }
            _ => false,
        }
    }
}
