// VPN Kill Switch - Errors
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Error types for firewall engine operations.

use thiserror::Error;
use uuid::Uuid;

/// Broad failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyInitialized,
    NotInitialized,
    ObjectStoreRejected,
    TransactionAborted,
    Timeout,
    Io,
}

/// Error type for all engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller input was malformed. Detected before any store call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("firewall is already initialized")]
    AlreadyInitialized,

    #[error("firewall is not initialized")]
    NotInitialized,

    /// The object store refused an add or delete.
    #[error("object store rejected {operation} of {object}: {reason}")]
    Rejected {
        operation: &'static str,
        object: Uuid,
        reason: String,
    },

    /// A mutation or commit was attempted without an open transaction.
    #[error("no transaction is open on this session")]
    NoTransaction,

    #[error("a transaction is already open on this session")]
    TransactionInProgress,

    /// The batch could not be committed. The store is unchanged.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// The engine lock could not be acquired within the configured bound.
    #[error("timed out after {0} ms waiting for the filter engine")]
    Timeout(u128),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn rejected(operation: &'static str, object: Uuid, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            object,
            reason: reason.into(),
        }
    }

    /// Map the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Rejected { .. } | Self::NoTransaction | Self::TransactionInProgress => {
                ErrorKind::ObjectStoreRejected
            }
            Self::TransactionAborted(_) => ErrorKind::TransactionAborted,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
