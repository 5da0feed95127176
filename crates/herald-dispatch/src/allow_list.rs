//! Sender allow list for restricted rules.

/// User IDs permitted to trigger allow-list-enforced rules. An empty list
/// admits every sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    user_ids: Vec<String>,
}

impl AllowList {
    /// Parses a comma-separated user-ID list. Blank entries are dropped, so
    /// a trailing comma or an unset variable yields the open list.
    pub fn from_csv(raw: &str) -> Self {
        let user_ids = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
        Self { user_ids }
    }

    pub fn permits(&self, user_id: &str) -> bool {
        self.user_ids.is_empty() || self.user_ids.iter().any(|known| known == user_id)
    }

    pub fn is_open(&self) -> bool {
        self.user_ids.is_empty()
    }
}
