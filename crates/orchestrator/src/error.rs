//! Error types for orchestrator operations.

use billing::BillingError;
use brain_core::BrainError;
use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur while handling a chat turn.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Message was rejected before processing.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Reply generation failed.
    #[error("brain error: {0}")]
    Brain(#[from] BrainError),

    /// Entitlement check failed.
    #[error("billing error: {0}")]
    Billing(#[from] BillingError),

    /// Storage failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
