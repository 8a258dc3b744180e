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

//! Error types for ledger operations.

use crate::base::{BillId, ItemId};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown product, user, bill or item.
    NotFound,
    /// Operation not allowed in the current bill/ledger state.
    IllegalState,
    /// Persisted data is inconsistent or malformed.
    Integrity,
    /// Caller supplied an unusable argument.
    InvalidInput,
    /// File system failure.
    Storage,
    /// The payment collaborator rejected or failed the transaction.
    Payment,
}

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Product name is not in the catalog
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// User is not listed in the directory
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// No bill with this id belongs to the ledger
    #[error("bill not found: {0}")]
    BillNotFound(BillId),

    /// Item handle does not address an item of the bill
    #[error("bill {bill} has no item {item}")]
    ItemNotFound { bill: BillId, item: ItemId },

    /// Display index is outside the bill's current view
    #[error("bill {bill} has no item at position {index} (view holds {len})")]
    ViewIndexOutOfRange { bill: BillId, index: usize, len: usize },

    /// Bill is paid and can no longer change
    #[error("bill {0} is already paid")]
    BillPaid(BillId),

    /// A new bill was requested while another one is still open
    #[error("cannot open a new bill for {user}: bill {open} is still unpaid")]
    OpenBillExists { user: String, open: BillId },

    /// Only the current bill can be settled
    #[error("bill {bill} is not the current bill ({current})")]
    NotCurrentBill { bill: BillId, current: BillId },

    /// User has no account at the payment collaborator
    #[error("user {0} has no payment account")]
    NoPayerAccount(String),

    /// Bill file belongs to someone else
    #[error("bill file {} belongs to {found:?}, expected {expected:?}", .path.display())]
    OwnerMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// More than one unpaid bill on disk
    #[error("ledger of {user} has inconsistent open bills: {open:?}")]
    AmbiguousOpenBills { user: String, open: Vec<BillId> },

    /// Bill file could not be parsed
    #[error("malformed bill file {}: {reason}", .path.display())]
    MalformedBill { path: PathBuf, reason: String },

    /// Catalog or directory source could not be used
    #[error("invalid {what}: {reason}")]
    InvalidConfig { what: &'static str, reason: String },

    /// Username cannot be mapped onto bill files
    #[error("invalid username {0:?}")]
    InvalidUsername(String),

    /// Transaction id that cannot be stored and read back unchanged
    #[error("invalid transaction id {0:?}")]
    InvalidTransactionId(String),

    /// Storage root directory does not exist
    #[error("bill storage root {} does not exist", .0.display())]
    StorageRootMissing(PathBuf),

    /// Underlying file system failure
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Payment collaborator failure
    #[error(transparent)]
    Payment(#[from] crate::payment::PaymentError),
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LedgerError::MalformedBill {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownProduct(_)
            | Self::UnknownUser(_)
            | Self::BillNotFound(_)
            | Self::ItemNotFound { .. }
            | Self::ViewIndexOutOfRange { .. } => ErrorKind::NotFound,
            Self::BillPaid(_)
            | Self::OpenBillExists { .. }
            | Self::NotCurrentBill { .. }
            | Self::NoPayerAccount(_) => ErrorKind::IllegalState,
            Self::OwnerMismatch { .. }
            | Self::AmbiguousOpenBills { .. }
            | Self::MalformedBill { .. } => ErrorKind::Integrity,
            Self::InvalidConfig { .. }
            | Self::InvalidUsername(_)
            | Self::InvalidTransactionId(_) => ErrorKind::InvalidInput,
            Self::StorageRootMissing(_) | Self::Io { .. } => ErrorKind::Storage,
            Self::Payment(_) => ErrorKind::Payment,
        }
    }
}
