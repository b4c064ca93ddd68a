pub mod direct;

use crate::board::{ItemSet, RoutingBoard};
use crate::control::AutorouteControl;
use pcb_common::db::indices::{ItemId, NetId};
use pcb_common::util::time_limit::{StopSignal, TimeLimit};
use thiserror::Error;

/// Outcome of one connection search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutorouteResult {
    Routed,
    AlreadyConnected,
    NotRouted,
    TimedOut,
}

impl AutorouteResult {
    pub fn is_success(self) -> bool {
        matches!(self, AutorouteResult::Routed | AutorouteResult::AlreadyConnected)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("item {0:?} is not on the board")]
    UnknownItem(ItemId),
    #[error("{0}")]
    Internal(String),
}

/// Settings an attempt is initialised with, before any search runs.
#[derive(Clone, Debug)]
pub struct AttemptParams {
    pub net: NetId,
    pub clearance_class: usize,
    pub stop: StopSignal,
    pub time_limit: TimeLimit,
    /// Keep search state between connections of the same attempt.
    pub retain_database: bool,
}

/// Factory for connection searches. One engine is shared by every worker.
pub trait PathSearch<B: RoutingBoard>: Sync {
    type Attempt: ConnectionSearch<B>;

    fn init_attempt(&self, board: &B, params: AttemptParams) -> Self::Attempt;
}

/// A single search, possibly ripping up foreign routes it has to cross.
pub trait ConnectionSearch<B: RoutingBoard> {
    /// Connects `start` to `dest` on `board`. Removed items are added to `ripped`.
    fn autoroute_connection(
        &mut self,
        board: &mut B,
        start: &ItemSet,
        dest: &ItemSet,
        control: &AutorouteControl,
        ripped: &mut ItemSet,
    ) -> Result<AutorouteResult, SearchError>;
}
