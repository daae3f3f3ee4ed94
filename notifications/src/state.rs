use crate::message::Notification;

/// Maximum number of notifications kept for the panel.
pub const RECENT_CAPACITY: usize = 8;

/// Which delivery channel, if any, is currently live for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Streaming,
    Polling,
    /// Terminal for the session: the server said the feature is unavailable.
    Disabled,
}

impl Mode {
    pub fn is_active(&self) -> bool {
        matches!(self, Mode::Streaming | Mode::Polling)
    }
}

/// Counts and items the presentation layer renders.
///
/// All mutation goes through the transition methods below, which keep the
/// item list capped and most-recent-first. `unread_count` is unsigned, server
/// values are clamped into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryState {
    user_id: Option<String>,
    unread_count: u64,
    recent_items: Vec<Notification>,
}

/// Read-only view of the manager published to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: Mode,
    pub unread_count: u64,
    pub recent_items: Vec<Notification>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            unread_count: 0,
            recent_items: Vec::new(),
        }
    }
}

impl DeliveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn set_user_id(&mut self, user_id: String) {
        self.user_id = Some(user_id);
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn recent_items(&self) -> &[Notification] {
        &self.recent_items
    }

    /// Applies one pushed notification: counts it if unread and prepends it.
    pub fn apply_stream_event(&mut self, notification: Notification) {
        if !notification.read {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        self.recent_items.insert(0, notification);
        self.recent_items.truncate(RECENT_CAPACITY);
    }

    /// Overwrites the count with a polled value. Polling carries no items.
    pub fn apply_polled_count(&mut self, fetched: i64) {
        self.unread_count = u64::try_from(fetched).unwrap_or(0);
    }

    /// Applies an acknowledged mark-read.
    ///
    /// An item already known to be read does not decrement the count again.
    pub fn apply_mark_read(&mut self, notification_id: &str) {
        match self
            .recent_items
            .iter_mut()
            .find(|item| item.id == notification_id)
        {
            Some(item) if item.read => {}
            Some(item) => {
                item.read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
            }
            None => {
                self.unread_count = self.unread_count.saturating_sub(1);
            }
        }
    }

    /// Replaces the item list with a freshly fetched page.
    pub fn replace_items(&mut self, items: Vec<Notification>) {
        self.recent_items = items;
        self.recent_items.truncate(RECENT_CAPACITY);
    }

    /// Zeroes the badge and empties the list. The user id is kept.
    pub fn clear(&mut self) {
        self.unread_count = 0;
        self.recent_items.clear();
    }

    pub fn snapshot(&self, mode: Mode) -> Snapshot {
        Snapshot {
            mode,
            unread_count: self.unread_count,
            recent_items: self.recent_items.clone(),
        }
    }
}
