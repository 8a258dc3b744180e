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

//! Core identifier types for bills, bill items and payers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a bill, derived from its owner and sequence number.
///
/// Rendered as `<owner>_<NNNN>` (sequence zero-padded to four digits), which
/// is also the stem of the bill's backing file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BillId(String);

impl BillId {
    pub fn new(owner: &str, sequence: u32) -> Self {
        BillId(format!("{owner}_{sequence:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BillId {
    fn from(value: &str) -> Self {
        BillId(value.to_owned())
    }
}

/// Stable handle of an item within its bill.
///
/// Wraps the item's position in storage (insertion) order. Items are never
/// removed from a bill, so a handle stays valid for the bill's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier of a user at the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PayerId(pub u64);

impl fmt::Display for PayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_id_pads_sequence_to_four_digits() {
        assert_eq!(BillId::new("Test", 1).as_str(), "Test_0001");
        assert_eq!(BillId::new("Test", 42).to_string(), "Test_0042");
        assert_eq!(BillId::new("Test", 12345).as_str(), "Test_12345");
    }

    #[test]
    fn bill_ids_order_by_sequence_when_padded() {
        assert!(BillId::new("Test", 2) < BillId::new("Test", 10));
    }
}
