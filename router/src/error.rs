use crate::engine::{AutorouteResult, SearchError};
use pcb_common::db::indices::{ItemId, NetId};
use thiserror::Error;

/// Why a single route attempt did not connect its item.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("no route found for {item:?} on {net:?} ({result:?})")]
    NotFound {
        item: ItemId,
        net: NetId,
        result: AutorouteResult,
    },
    #[error("path search failed for {item:?} on {net:?}: {source}")]
    Search {
        item: ItemId,
        net: NetId,
        #[source]
        source: SearchError,
    },
    #[error("internal fault while routing {item:?} on {net:?}: {message}")]
    Internal {
        item: ItemId,
        net: NetId,
        message: String,
    },
}

impl AttemptError {
    /// True for an ordinary search failure, false for engine or internal faults.
    pub fn is_search_failure(&self) -> bool {
        matches!(self, AttemptError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum PassError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
