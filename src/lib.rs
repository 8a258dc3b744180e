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

//! # Coffee Ledger
//!
//! This library tracks what each person drinks and settles the accumulated
//! cost through an external payment collaborator.
//!
//! ## Core Components
//!
//! - [`Catalog`]: Fixed mapping from product name to price
//! - [`BillItem`]: One purchase with its own price snapshot and a soft-delete flag
//! - [`Bill`]: A billing period, open until paid, persisted to its own file
//! - [`UserLedger`]: All bills of a user, keeping exactly one of them open
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```no_run
//! use coffee_ledger::{BillStore, Catalog, UserLedger};
//! use rust_decimal_macros::dec;
//!
//! let catalog = Catalog::standard();
//! let store = BillStore::open("data/coffee").unwrap();
//! let mut ledger = UserLedger::open(&store, &catalog, "Test").unwrap();
//!
//! let espresso = catalog.lookup("Espresso").unwrap();
//! ledger.add(espresso).unwrap();
//! ledger.add(espresso).unwrap();
//! assert_eq!(ledger.current_bill().sum(), dec!(0.60));
//!
//! ledger.current_bill_mut().delete_at(0).unwrap();
//! assert_eq!(ledger.current_bill().sum(), dec!(0.30));
//!
//! ledger.pay_bill("T1").unwrap();
//! assert_eq!(ledger.bills_paid().count(), 1);
//! ```
//!
//! ## Storage
//!
//! Every mutation rewrites the affected bill file synchronously. Nothing is
//! cached between ledger instances and nothing is locked; callers must keep
//! to one ledger per user at a time.

mod base;
pub mod bill;
pub mod catalog;
mod directory;
pub mod error;
pub mod item;
mod ledger;
pub mod payment;
pub mod report;
mod store;

pub use base::{BillId, ItemId, PayerId};
pub use bill::{Bill, BillStatus};
pub use catalog::{Catalog, Coffee};
pub use directory::{Directory, Member};
pub use error::{ErrorKind, LedgerError};
pub use item::{BillItem, PriceDrift};
pub use ledger::UserLedger;
pub use payment::{PaymentError, PaymentGateway, PaymentRequest};
pub use report::{BillSummary, ItemLine};
pub use store::BillStore;
