//! Reserve/commit/refund protocol over the HD-credit ledger.
//!
//! The ledger mutates the account *at reserve time* via the store's
//! atomic conditional updates, so two concurrent requests for the same
//! user can never both observe "capacity available" and both proceed.
//! `commit` is a no-op confirmation; `refund` reverses exactly the
//! mutation performed at reserve time, on the same source.
//!
//! Known gap: reservation and refund are two separate store operations
//! with no transactional link. A crash between a successful reservation
//! and its refund loses the credit permanently; the reservation is
//! logged so operators can reconcile by hand.

use std::sync::Arc;

use crate::credit::{CreditSource, Reservation};
use crate::store::{CreditStore, StoreError};
use crate::types::DbId;

/// Errors from the reservation protocol.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Both the monthly allocation and the top-up bank are exhausted.
    #[error("Insufficient HD credits for user {user_id}")]
    Insufficient { user_id: DbId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The reserve/commit/refund protocol, generic over any atomic store.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self { store }
    }

    /// Read-only view of the store, for balance reporting.
    pub fn store(&self) -> &Arc<dyn CreditStore> {
        &self.store
    }

    /// Reserve one HD credit for `user_id`.
    ///
    /// Tries the monthly allocation first, then the top-up bank. Each
    /// attempt is a single conditional update in the store; whichever
    /// succeeds determines the [`CreditSource`] recorded on the handle.
    pub async fn reserve(&self, user_id: DbId) -> Result<Reservation, LedgerError> {
        if self.store.try_debit_monthly(user_id).await? {
            tracing::info!(user_id, source = "monthly", "Reserved 1 HD credit");
            return Ok(Reservation {
                user_id,
                source: CreditSource::Monthly,
            });
        }

        if self.store.try_debit_top_up(user_id).await? {
            tracing::info!(user_id, source = "top_up", "Reserved 1 HD credit");
            return Ok(Reservation {
                user_id,
                source: CreditSource::TopUp,
            });
        }

        Err(LedgerError::Insufficient { user_id })
    }

    /// Confirm a reservation after a successful generation.
    ///
    /// The account was already debited at reserve time; this only logs,
    /// and exists so every reserve has a matching commit or refund in
    /// the call graph.
    pub fn commit(&self, reservation: &Reservation) {
        tracing::debug!(
            user_id = reservation.user_id,
            source = ?reservation.source,
            "Committed HD credit reservation",
        );
    }

    /// Reverse a reservation after a failed generation.
    ///
    /// Refund failures are logged, not retried; see the module docs for
    /// the durability gap this leaves.
    pub async fn refund(&self, reservation: Reservation) {
        let result = match reservation.source {
            CreditSource::Monthly => self.store.credit_monthly(reservation.user_id).await,
            CreditSource::TopUp => self.store.credit_top_up(reservation.user_id).await,
        };

        match result {
            Ok(()) => tracing::info!(
                user_id = reservation.user_id,
                source = ?reservation.source,
                "Refunded 1 HD credit",
            ),
            Err(e) => tracing::error!(
                user_id = reservation.user_id,
                source = ?reservation.source,
                error = %e,
                "Failed to refund HD credit",
            ),
        }
    }
}
