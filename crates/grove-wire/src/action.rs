use crate::codec::{Wire, WireReader};
use crate::error::{WireError, WireResult};

/// Protocol operations, one per request type.
///
/// Discriminants are assigned by this stable table and travel on the wire;
/// they are independent of declaration order and must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    KeyAdd = 0,
    KeyList = 1,
    KeyPred = 2,
    ValueWrite = 3,
    ValueRead = 4,
    TagUpdate = 5,
    TagRemove = 6,
    TagRead = 7,
    TagList = 8,
    SyncPullKeys = 9,
    SyncPullTags = 10,
    SyncPushKeys = 11,
    SyncPushTags = 12,
    SyncWatch = 13,
}

impl Action {
    /// The wire discriminant.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up an action by its wire discriminant.
    pub fn from_u8(byte: u8) -> WireResult<Self> {
        Ok(match byte {
            0 => Self::KeyAdd,
            1 => Self::KeyList,
            2 => Self::KeyPred,
            3 => Self::ValueWrite,
            4 => Self::ValueRead,
            5 => Self::TagUpdate,
            6 => Self::TagRemove,
            7 => Self::TagRead,
            8 => Self::TagList,
            9 => Self::SyncPullKeys,
            10 => Self::SyncPullTags,
            11 => Self::SyncPushKeys,
            12 => Self::SyncPushTags,
            13 => Self::SyncWatch,
            other => return Err(WireError::UnknownTag(other)),
        })
    }

    /// Human-readable operation label, used in logs.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::KeyAdd => "key-add",
            Self::KeyList => "key-list",
            Self::KeyPred => "key-pred",
            Self::ValueWrite => "value-write",
            Self::ValueRead => "value-read",
            Self::TagUpdate => "tag-update",
            Self::TagRemove => "tag-remove",
            Self::TagRead => "tag-read",
            Self::TagList => "tag-list",
            Self::SyncPullKeys => "sync-pull-keys",
            Self::SyncPullTags => "sync-pull-tags",
            Self::SyncPushKeys => "sync-push-keys",
            Self::SyncPushTags => "sync-push-tags",
            Self::SyncWatch => "sync-watch",
        }
    }

    /// All actions in discriminant order.
    pub const ALL: [Action; 14] = [
        Self::KeyAdd,
        Self::KeyList,
        Self::KeyPred,
        Self::ValueWrite,
        Self::ValueRead,
        Self::TagUpdate,
        Self::TagRemove,
        Self::TagRead,
        Self::TagList,
        Self::SyncPullKeys,
        Self::SyncPullTags,
        Self::SyncPushKeys,
        Self::SyncPushTags,
        Self::SyncWatch,
    ];
}

impl Wire for Action {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.as_u8());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        Action::from_u8(r.read_byte()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(Action::KeyAdd.as_u8(), 0);
        assert_eq!(Action::ValueWrite.as_u8(), 3);
        assert_eq!(Action::TagList.as_u8(), 8);
        assert_eq!(Action::SyncPullKeys.as_u8(), 9);
        assert_eq!(Action::SyncPushKeys.as_u8(), 11);
        assert_eq!(Action::SyncWatch.as_u8(), 13);
    }

    #[test]
    fn discriminants_roundtrip_and_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for action in Action::ALL {
            assert_eq!(Action::from_u8(action.as_u8()).unwrap(), action);
            assert!(seen.insert(action.as_u8()));
        }
        assert_eq!(seen.len(), 14);
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let err = Action::from_u8(14).unwrap_err();
        assert!(matches!(err, WireError::UnknownTag(14)));
    }

    #[test]
    fn push_keys_label_matches_the_operation() {
        assert_eq!(Action::SyncPushKeys.wire_name(), "sync-push-keys");
        assert_eq!(Action::SyncPullKeys.wire_name(), "sync-pull-keys");
    }

    #[test]
    fn labels_are_unique() {
        let mut names = std::collections::HashSet::new();
        for action in Action::ALL {
            assert!(names.insert(action.wire_name()));
        }
    }
}
