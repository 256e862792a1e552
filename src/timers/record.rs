use crate::element::window::BoundedWindow;
use crate::element::windowed_value::PaneInfo;
use crate::time::domain::Timestamp;

/// A timer as it travels between the runner and the transform: user key,
/// dynamic tag, window set, fire/hold timestamps, pane, and whether the
/// record is a clearing tombstone.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRecord<K> {
    pub user_key: K,
    pub dynamic_tag: String,
    pub windows: Vec<BoundedWindow>,
    pub fire_timestamp: Timestamp,
    pub hold_timestamp: Timestamp,
    pub pane: PaneInfo,
    pub cleared: bool,
}

impl<K> TimerRecord<K> {
    pub fn set(
        user_key: K,
        dynamic_tag: impl Into<String>,
        windows: Vec<BoundedWindow>,
        fire_timestamp: Timestamp,
        hold_timestamp: Timestamp,
        pane: PaneInfo,
    ) -> Self {
        TimerRecord {
            user_key,
            dynamic_tag: dynamic_tag.into(),
            windows,
            fire_timestamp,
            hold_timestamp,
            pane,
            cleared: false,
        }
    }

    /// Tombstone that tells the runner a previously delivered timer no
    /// longer fires. Timestamps are not meaningful on cleared records.
    pub fn cleared(user_key: K, dynamic_tag: impl Into<String>, windows: Vec<BoundedWindow>) -> Self {
        TimerRecord {
            user_key,
            dynamic_tag: dynamic_tag.into(),
            windows,
            fire_timestamp: Timestamp::MIN,
            hold_timestamp: Timestamp::MIN,
            pane: PaneInfo::NO_FIRING,
            cleared: true,
        }
    }
}
