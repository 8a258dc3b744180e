// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Payment collaborator interface.
//!
//! The ledger never moves money itself. Settling a bill hands a
//! [`PaymentRequest`] to a [`PaymentGateway`], which performs the external
//! transaction and answers with an opaque transaction id. Only that id is
//! recorded on the bill.

use crate::base::{BillId, PayerId};
use rust_decimal::Decimal;
use thiserror::Error;

/// A request to collect a bill's total from a payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub bill_id: BillId,
    pub payer: PayerId,
    /// Amount due, rounded to two decimal places.
    pub amount: Decimal,
    pub description: String,
}

impl PaymentRequest {
    pub fn new(bill_id: BillId, payer: PayerId, amount: Decimal) -> Self {
        let mut amount = amount.round_dp(2);
        amount.rescale(2);
        let description = format!("Coffee bill {bill_id}");
        Self {
            bill_id,
            payer,
            amount,
            description,
        }
    }
}

/// Failures reported by a payment collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Collaborator refused the transaction
    #[error("payment rejected: {0}")]
    Rejected(String),

    /// Collaborator could not be reached or answered unexpectedly
    #[error("payment collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Performs the external transaction for a bill.
pub trait PaymentGateway {
    /// Executes the transaction and returns its id.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the transaction was not carried out.
    fn settle(&self, request: &PaymentRequest) -> Result<String, PaymentError>;
}

impl<G: PaymentGateway + ?Sized> PaymentGateway for &G {
    fn settle(&self, request: &PaymentRequest) -> Result<String, PaymentError> {
        (**self).settle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn request_rounds_amount_to_cents() {
        let request = PaymentRequest::new(BillId::new("Test", 1), PayerId(7), dec!(0.6));
        assert_eq!(request.amount.to_string(), "0.60");
        assert_eq!(request.description, "Coffee bill Test_0001");

        let request = PaymentRequest::new(BillId::new("Test", 1), PayerId(7), dec!(1.005));
        assert_eq!(request.amount.to_string(), "1.00");
    }

    #[test]
    fn payment_error_display() {
        assert_eq!(
            PaymentError::Rejected("limit".into()).to_string(),
            "payment rejected: limit"
        );
    }
}
