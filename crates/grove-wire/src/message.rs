use std::collections::BTreeSet;

use grove_types::{Graph, Key, TagBundle, TagName, Value};

use crate::action::Action;
use crate::codec::{Wire, WireReader};
use crate::error::{WireError, WireResult};

/// A decoded request: the action plus its typed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    KeyAdd { key: Key, preds: BTreeSet<Key> },
    KeyList,
    KeyPred { key: Key },
    ValueWrite { value: Value },
    ValueRead { key: Key },
    TagUpdate { tag: TagName, keys: BTreeSet<Key> },
    TagRemove { tag: TagName },
    TagRead { tag: TagName },
    TagList,
    SyncPullKeys { roots: BTreeSet<Key>, have: BTreeSet<TagName> },
    SyncPullTags,
    SyncPushKeys { graph: Graph, tags: TagBundle },
    SyncPushTags { tags: TagBundle },
    SyncWatch { tags: BTreeSet<TagName> },
}

impl Request {
    /// The action this request dispatches on.
    pub fn action(&self) -> Action {
        match self {
            Self::KeyAdd { .. } => Action::KeyAdd,
            Self::KeyList => Action::KeyList,
            Self::KeyPred { .. } => Action::KeyPred,
            Self::ValueWrite { .. } => Action::ValueWrite,
            Self::ValueRead { .. } => Action::ValueRead,
            Self::TagUpdate { .. } => Action::TagUpdate,
            Self::TagRemove { .. } => Action::TagRemove,
            Self::TagRead { .. } => Action::TagRead,
            Self::TagList => Action::TagList,
            Self::SyncPullKeys { .. } => Action::SyncPullKeys,
            Self::SyncPullTags => Action::SyncPullTags,
            Self::SyncPushKeys { .. } => Action::SyncPushKeys,
            Self::SyncPushTags { .. } => Action::SyncPushTags,
            Self::SyncWatch { .. } => Action::SyncWatch,
        }
    }
}

impl Wire for Request {
    fn encoded_len(&self) -> usize {
        1 + match self {
            Self::KeyAdd { key, preds } => key.encoded_len() + preds.encoded_len(),
            Self::KeyList | Self::TagList | Self::SyncPullTags => 0,
            Self::KeyPred { key } | Self::ValueRead { key } => key.encoded_len(),
            Self::ValueWrite { value } => value.encoded_len(),
            Self::TagUpdate { tag, keys } => tag.encoded_len() + keys.encoded_len(),
            Self::TagRemove { tag } | Self::TagRead { tag } => tag.encoded_len(),
            Self::SyncPullKeys { roots, have } => roots.encoded_len() + have.encoded_len(),
            Self::SyncPushKeys { graph, tags } => graph.encoded_len() + tags.encoded_len(),
            Self::SyncPushTags { tags } => tags.encoded_len(),
            Self::SyncWatch { tags } => tags.encoded_len(),
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        self.action().encode(buf);
        match self {
            Self::KeyAdd { key, preds } => {
                key.encode(buf);
                preds.encode(buf);
            }
            Self::KeyList | Self::TagList | Self::SyncPullTags => {}
            Self::KeyPred { key } | Self::ValueRead { key } => key.encode(buf),
            Self::ValueWrite { value } => value.encode(buf),
            Self::TagUpdate { tag, keys } => {
                tag.encode(buf);
                keys.encode(buf);
            }
            Self::TagRemove { tag } | Self::TagRead { tag } => tag.encode(buf),
            Self::SyncPullKeys { roots, have } => {
                roots.encode(buf);
                have.encode(buf);
            }
            Self::SyncPushKeys { graph, tags } => {
                graph.encode(buf);
                tags.encode(buf);
            }
            Self::SyncPushTags { tags } => tags.encode(buf),
            Self::SyncWatch { tags } => tags.encode(buf),
        }
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let action = Action::decode(r)?;
        Ok(match action {
            Action::KeyAdd => Self::KeyAdd {
                key: Key::decode(r)?,
                preds: BTreeSet::decode(r)?,
            },
            Action::KeyList => Self::KeyList,
            Action::KeyPred => Self::KeyPred { key: Key::decode(r)? },
            Action::ValueWrite => Self::ValueWrite {
                value: Value::decode(r)?,
            },
            Action::ValueRead => Self::ValueRead { key: Key::decode(r)? },
            Action::TagUpdate => Self::TagUpdate {
                tag: TagName::decode(r)?,
                keys: BTreeSet::decode(r)?,
            },
            Action::TagRemove => Self::TagRemove {
                tag: TagName::decode(r)?,
            },
            Action::TagRead => Self::TagRead {
                tag: TagName::decode(r)?,
            },
            Action::TagList => Self::TagList,
            Action::SyncPullKeys => Self::SyncPullKeys {
                roots: BTreeSet::decode(r)?,
                have: BTreeSet::decode(r)?,
            },
            Action::SyncPullTags => Self::SyncPullTags,
            Action::SyncPushKeys => Self::SyncPushKeys {
                graph: Graph::decode(r)?,
                tags: Vec::decode(r)?,
            },
            Action::SyncPushTags => Self::SyncPushTags {
                tags: Vec::decode(r)?,
            },
            Action::SyncWatch => Self::SyncWatch {
                tags: BTreeSet::decode(r)?,
            },
        })
    }
}

/// One frame of a watch stream: which subscribed tags changed, plus the
/// subgraph newly reachable relative to the previous frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub tags: BTreeSet<TagName>,
    pub graph: Graph,
}

impl Wire for WatchEvent {
    fn encoded_len(&self) -> usize {
        self.tags.encoded_len() + self.graph.encoded_len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        self.tags.encode(buf);
        self.graph.encode(buf);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        Ok(Self {
            tags: BTreeSet::decode(r)?,
            graph: Graph::decode(r)?,
        })
    }
}

/// Failure class carried by a structured failure response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FailureCode {
    DanglingReference = 1,
    CycleDetected = 2,
    InconsistentPredecessors = 3,
    MissingPredecessor = 4,
    NotClosed = 5,
    Internal = 255,
}

impl FailureCode {
    fn from_u8(byte: u8) -> WireResult<Self> {
        Ok(match byte {
            1 => Self::DanglingReference,
            2 => Self::CycleDetected,
            3 => Self::InconsistentPredecessors,
            4 => Self::MissingPredecessor,
            5 => Self::NotClosed,
            255 => Self::Internal,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

impl Wire for FailureCode {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        FailureCode::from_u8(r.read_byte()?)
    }
}

/// Structured failure response for operations with a defined failure path.
///
/// Success for such operations is the zero-length unit frame; a rejected
/// operation responds with this non-empty payload instead, so the two are
/// distinguished by frame length alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFailure {
    pub code: FailureCode,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Interpret a unit-or-failure response payload.
    pub fn check_unit(payload: &[u8]) -> WireResult<Result<(), RemoteFailure>> {
        if payload.is_empty() {
            return Ok(Ok(()));
        }
        Ok(Err(RemoteFailure::from_bytes(payload)?))
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Wire for RemoteFailure {
    fn encoded_len(&self) -> usize {
        self.code.encoded_len() + self.message.encoded_len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        self.code.encode(buf);
        self.message.encode(buf);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        Ok(Self {
            code: FailureCode::decode(r)?,
            message: String::decode(r)?,
        })
    }
}
