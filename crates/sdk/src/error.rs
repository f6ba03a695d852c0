use std::time::Duration;

use solana_pubkey::Pubkey;
use thiserror::Error;

/// Fixed-point arithmetic and parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid fixed-point literal: {0}")]
    InvalidLiteral(String),
}

/// Failure decoding a raw account blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Blob is too short, carries an unexpected tag or references a node out
    /// of bounds.
    #[error("malformed {layout} layout: {reason}")]
    MalformedLayout { layout: &'static str, reason: String },

    /// None of the known oracle account shapes matched.
    #[error("unrecognized oracle format")]
    UnrecognizedOracleFormat,

    #[error("invalid order type {0}")]
    InvalidOrderType(u8),

    #[error(transparent)]
    Num(#[from] NumError),
}

impl DecodeError {
    pub(crate) fn malformed(layout: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedLayout { layout, reason: reason.into() }
    }
}

/// Error reported by a network collaborator fetching raw accounts.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of a synchronization cycle.
///
/// Any failure leaves the previously published snapshot untouched.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("{} of {total} accounts not found: {}", missing.len(), format_missing(missing))]
    PartialBatchFailure { missing: Vec<Pubkey>, total: usize },

    #[error("failed to decode {key}: {source}")]
    Decode { key: String, source: DecodeError },

    /// Record has not been fetched yet.
    #[error("{0} has not been fetched")]
    NotFetched(String),
}

impl SyncError {
    /// Whether the cycle failed on the network side (including timeouts and
    /// missing accounts) rather than while decoding.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            SyncError::FetchFailure(_) | SyncError::Timeout(_) | SyncError::PartialBatchFailure { .. }
        )
    }
}

fn format_missing(missing: &[Pubkey]) -> String {
    missing.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}
