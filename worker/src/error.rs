//! Planner error type

use thiserror::Error;

/// Failures of a scheduling operation for one vendor
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("no clients are assigned to this vendor")]
    NoClientsAssigned,

    #[error("the requested date range contains no business days")]
    EmptyDateRange,

    #[error("visit {0} is not pending")]
    RouteNotPending(uuid::Uuid),

    #[error("visit {0} not found")]
    EntryNotFound(uuid::Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl PlannerError {
    /// Stable code sent back in error responses
    pub const fn code(&self) -> &'static str {
        match self {
            PlannerError::NoClientsAssigned => "NO_CLIENTS_ASSIGNED",
            PlannerError::EmptyDateRange => "EMPTY_DATE_RANGE",
            PlannerError::RouteNotPending(_) => "ROUTE_NOT_PENDING",
            PlannerError::EntryNotFound(_) => "NOT_FOUND",
            PlannerError::InvalidRequest(_) => "INVALID_REQUEST",
            PlannerError::Collaborator(_) => "INTERNAL_ERROR",
        }
    }
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;
