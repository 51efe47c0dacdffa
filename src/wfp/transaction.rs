// VPN Kill Switch - Transactions
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! All-or-nothing batches of engine mutations.

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use super::FilterEngine;
use crate::error::{Error, Result};

/// An open transaction on an engine session.
///
/// Dropping the guard without calling [`Transaction::commit`] aborts.
pub struct Transaction<'a, E: FilterEngine + ?Sized> {
    engine: &'a mut E,
    finished: bool,
}

impl<'a, E: FilterEngine + ?Sized> Transaction<'a, E> {
    pub fn begin(engine: &'a mut E) -> Result<Self> {
        engine.begin_transaction()?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.engine.commit_transaction().map_err(|e| match e {
            Error::TransactionAborted(_) | Error::Timeout(_) | Error::Io(_) => e,
            other => Error::TransactionAborted(other.to_string()),
        })
    }

    pub fn abort(mut self) -> Result<()> {
        self.finished = true;
        self.engine.abort_transaction()
    }

    /// Run `f` inside a fresh transaction.
    ///
    /// Commits if `f` succeeds. Any error from `f` aborts the transaction and
    /// is returned unchanged.
    pub fn execute<T, F>(engine: &'a mut E, f: F) -> Result<T>
    where
        F: FnOnce(&mut E) -> Result<T>,
    {
        let mut transaction = Transaction::begin(engine)?;

        match f(&mut *transaction) {
            Ok(value) => {
                transaction.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "aborting transaction");
                if let Err(abort_err) = transaction.abort() {
                    warn!(error = %abort_err, "failed to abort transaction");
                }
                Err(e)
            }
        }
    }
}

impl<E: FilterEngine + ?Sized> Deref for Transaction<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E: FilterEngine + ?Sized> DerefMut for Transaction<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}

impl<E: FilterEngine + ?Sized> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.engine.abort_transaction() {
                warn!(error = %e, "failed to abort abandoned transaction");
            }
        }
    }
}
