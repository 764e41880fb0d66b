//! Stock validation over a locked cart snapshot.

use common::{Money, UserId};

use crate::error::CheckoutError;
use crate::snapshot::{CartSnapshot, SnapshotLine};

/// A snapshot whose every line fits in the available stock.
///
/// Only [`validate`] builds one, so the committer can never be handed an
/// unchecked cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCart {
    snapshot: CartSnapshot,
    total: Money,
}

impl ValidatedCart {
    pub fn user_id(&self) -> UserId {
        self.snapshot.user_id()
    }

    pub fn lines(&self) -> &[SnapshotLine] {
        self.snapshot.lines()
    }

    /// Sum of unit price × quantity over all lines.
    pub fn total(&self) -> Money {
        self.total
    }
}

/// Checks every line of the snapshot against its available stock.
///
/// Fails on the first line that asks for more than is available; no
/// subset of the cart is ever accepted.
pub fn validate(snapshot: CartSnapshot) -> Result<ValidatedCart, CheckoutError> {
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    if let Some(line) = snapshot
        .lines()
        .iter()
        .find(|line| line.quantity > line.available_stock)
    {
        return Err(CheckoutError::InsufficientStock {
            product_id: line.product_id,
            requested: line.quantity,
            available: line.available_stock,
        });
    }

    let total = snapshot
        .lines()
        .iter()
        .map(SnapshotLine::line_total)
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))
        .ok_or(CheckoutError::TotalOverflow)?;
    Ok(ValidatedCart { snapshot, total })
}
