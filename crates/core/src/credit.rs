//! HD-credit account state and reservation handles.

use serde::Serialize;

use crate::types::DbId;

/// Per-user HD-credit balances.
///
/// `monthly_used` counts against `monthly_alloc` and is reset externally
/// at billing-cycle rollover. `top_up_credits` never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditAccount {
    pub user_id: DbId,
    pub monthly_alloc: i64,
    pub monthly_used: i64,
    pub top_up_credits: i64,
}

impl CreditAccount {
    /// Headroom left in the monthly allocation.
    pub fn monthly_remaining(&self) -> i64 {
        (self.monthly_alloc - self.monthly_used).max(0)
    }

    /// Total spendable credits: monthly headroom plus the top-up bank.
    pub fn remaining(&self) -> i64 {
        self.monthly_remaining() + self.top_up_credits
    }
}

/// Which balance a reservation was drawn from.
///
/// A refund must reverse the mutation on the *same* source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditSource {
    Monthly,
    TopUp,
}

/// Handle returned by a successful reservation.
///
/// The ledger already mutated the account when this was issued; the
/// handle records which source to reverse on refund.
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    pub user_id: DbId,
    pub source: CreditSource,
}
