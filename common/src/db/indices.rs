use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of a board item. `BoardDb` hands them out in increasing order and never
/// reuses one, so sorting by id sorts by insertion.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    pub const FIRST: ItemId = ItemId(1);

    pub fn next(self) -> ItemId {
        ItemId(self.0.saturating_add(1))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Net number as written in board files. Number 0 means "no net".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetId(pub u32);

impl NetId {
    pub const NONE: NetId = NetId(0);

    /// Net number for the `index`-th net of a board, counting from zero.
    pub fn from_index(index: usize) -> Option<NetId> {
        u32::try_from(index).ok()?.checked_add(1).map(NetId)
    }

    pub fn is_assigned(self) -> bool {
        self != NetId::NONE
    }
}

impl fmt::Debug for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net {}", self.0)
    }
}
