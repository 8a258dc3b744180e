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

//! Per-user ledger of bills.
//!
//! A [`UserLedger`] loads every bill of one user when it is opened and keeps
//! exactly one of them open. Paying the open bill closes it and opens the
//! next one in the same call.
//!
//! # Concurrency
//!
//! There is no locking. Two ledgers for the same user (in one process or
//! several) overwrite each other's bill files and the last writer wins.
//! Callers must serialize access per user.

use crate::base::{BillId, ItemId, PayerId};
use crate::bill::Bill;
use crate::catalog::{Catalog, Coffee};
use crate::error::LedgerError;
use crate::payment::{PaymentGateway, PaymentRequest};
use crate::store::{BillStore, validate_username};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// All bills of one user, ordered by sequence number.
///
/// # Invariants
///
/// - Exactly one bill is open (unpaid); it is the current bill.
/// - A new bill is only allocated once every existing bill is paid.
#[derive(Debug)]
pub struct UserLedger {
    owner: String,
    store: BillStore,
    bills: Vec<Bill>,
    /// Index of the open bill in `bills`.
    current: usize,
}

impl UserLedger {
    /// Loads all bills of `username`, allocating the first one if there are
    /// none.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidUsername`] if the name cannot map onto files.
    /// - [`LedgerError::AmbiguousOpenBills`] if storage holds several unpaid bills.
    /// - Any error of [`Bill::open`] for the stored bills.
    pub fn open(store: &BillStore, catalog: &Catalog, username: &str) -> Result<Self, LedgerError> {
        validate_username(username)?;

        let mut bills = Vec::new();
        for sequence in store.sequences(username)? {
            let path = store.bill_path(username, sequence);
            bills.push(Bill::open(path, username, sequence, catalog)?);
        }

        let open: Vec<BillId> = bills
            .iter()
            .filter(|bill| !bill.is_paid())
            .map(|bill| bill.id().clone())
            .collect();
        if open.len() > 1 {
            return Err(LedgerError::AmbiguousOpenBills {
                user: username.to_owned(),
                open,
            });
        }

        let current = bills.iter().position(|bill| !bill.is_paid()).unwrap_or(0);
        let mut ledger = Self {
            owner: username.to_owned(),
            store: store.clone(),
            bills,
            current,
        };
        if open.is_empty() {
            // First visit, or the previous run paid a bill but never got to
            // allocate its successor.
            ledger.open_new_bill()?;
        }
        debug!(user = username, bills = ledger.bills.len(), "opened ledger");
        Ok(ledger)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// All bills in sequence order.
    pub fn bills(&self) -> impl Iterator<Item = &Bill> {
        self.bills.iter()
    }

    /// Paid bills in sequence order.
    pub fn bills_paid(&self) -> impl Iterator<Item = &Bill> {
        self.bills.iter().filter(|bill| bill.is_paid())
    }

    /// Sum over all paid bills.
    pub fn paid_total(&self) -> Decimal {
        self.bills_paid().map(Bill::sum).sum()
    }

    /// Looks up a bill by id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::BillNotFound`] if the bill does not belong to this ledger.
    pub fn bill(&self, id: &BillId) -> Result<&Bill, LedgerError> {
        self.bills
            .iter()
            .find(|bill| bill.id() == id)
            .ok_or_else(|| LedgerError::BillNotFound(id.clone()))
    }

    pub fn bill_mut(&mut self, id: &BillId) -> Result<&mut Bill, LedgerError> {
        self.bills
            .iter_mut()
            .find(|bill| bill.id() == id)
            .ok_or_else(|| LedgerError::BillNotFound(id.clone()))
    }

    /// The open bill.
    pub fn current_bill(&self) -> &Bill {
        &self.bills[self.current]
    }

    pub fn current_bill_mut(&mut self) -> &mut Bill {
        &mut self.bills[self.current]
    }

    /// Adds a purchase to the current bill.
    pub fn add(&mut self, coffee: &Coffee) -> Result<ItemId, LedgerError> {
        self.current_bill_mut().add(coffee)
    }

    /// Pays the current bill and opens the next one.
    ///
    /// # Errors
    ///
    /// - Any error of [`Bill::pay`].
    /// - [`LedgerError::OpenBillExists`] if an unpaid bill remains after paying.
    pub fn pay_bill(&mut self, transaction_id: &str) -> Result<&Bill, LedgerError> {
        self.current_bill_mut().pay(transaction_id)?;
        self.open_new_bill()?;
        Ok(self.current_bill())
    }

    /// Settles `bill` through the payment collaborator and records the
    /// returned transaction id.
    ///
    /// Only the current bill can be settled. If the gateway fails, the bill
    /// stays open.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BillNotFound`] for an unknown bill.
    /// - [`LedgerError::NotCurrentBill`] for any bill but the current one.
    /// - [`LedgerError::Payment`] if the gateway fails.
    pub fn settle<G: PaymentGateway + ?Sized>(
        &mut self,
        bill: &BillId,
        payer: PayerId,
        gateway: &G,
    ) -> Result<String, LedgerError> {
        let current = self.current_bill();
        if current.id() != bill {
            self.bill(bill)?;
            return Err(LedgerError::NotCurrentBill {
                bill: bill.clone(),
                current: current.id().clone(),
            });
        }

        let request = PaymentRequest::new(current.id().clone(), payer, current.sum());
        let transaction_id = gateway.settle(&request)?;
        info!(
            user = %self.owner,
            bill = %request.bill_id,
            amount = %request.amount,
            transaction = %transaction_id,
            "payment settled"
        );
        self.pay_bill(&transaction_id)?;
        Ok(transaction_id)
    }

    /// Allocates the bill with the smallest free sequence number.
    fn open_new_bill(&mut self) -> Result<(), LedgerError> {
        if let Some(open) = self.bills.iter().find(|bill| !bill.is_paid()) {
            return Err(LedgerError::OpenBillExists {
                user: self.owner.clone(),
                open: open.id().clone(),
            });
        }

        let sequence = self.store.next_free_sequence(&self.owner)?;
        let path = self.store.bill_path(&self.owner, sequence);
        let bill = Bill::create(path, &self.owner, sequence)?;
        info!(user = %self.owner, bill = %bill.id(), "opened new bill");

        let position = self
            .bills
            .partition_point(|existing| existing.sequence() < sequence);
        self.bills.insert(position, bill);
        self.current = position;
        Ok(())
    }
}
