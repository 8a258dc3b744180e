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

//! Serializable report rows for bills and their items.

use crate::base::ItemId;
use crate::bill::Bill;
use crate::item::{BillItem, DATE_FORMAT};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Amounts in reports carry cents.
pub const DECIMAL_PRECISION: u32 = 2;

/// One line per bill: `bill, user, items, sum, status, transaction, paid_at`.
#[derive(Debug, Clone, Copy)]
pub struct BillSummary<'a>(pub &'a Bill);

impl Serialize for BillSummary<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bill = self.0;
        let mut state = serializer.serialize_struct("BillSummary", 7)?;
        state.serialize_field("bill", bill.id())?;
        state.serialize_field("user", bill.owner())?;
        state.serialize_field("items", &bill.items().len())?;
        state.serialize_field("sum", &bill.sum().round_dp(DECIMAL_PRECISION))?;
        state.serialize_field("status", &bill.status().to_string())?;
        state.serialize_field("transaction", bill.transaction_id())?;
        state.serialize_field(
            "paid_at",
            &bill
                .transaction_time()
                .map(|t| t.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        )?;
        state.end()
    }
}

/// One line per item in display order: `position, item, time, product, price, deleted`.
#[derive(Debug, Clone, Copy)]
pub struct ItemLine<'a> {
    pub position: usize,
    pub id: ItemId,
    pub item: &'a BillItem,
}

impl<'a> ItemLine<'a> {
    /// Lines for the bill's current view, newest first.
    pub fn for_bill(bill: &'a Bill) -> Vec<Self> {
        bill.view()
            .into_iter()
            .enumerate()
            .map(|(position, (id, item))| Self { position, id, item })
            .collect()
    }
}

impl Serialize for ItemLine<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ItemLine", 6)?;
        state.serialize_field("position", &self.position)?;
        state.serialize_field("item", &self.id)?;
        state.serialize_field(
            "time",
            &self.item.timestamp().format(DATE_FORMAT).to_string(),
        )?;
        state.serialize_field("product", self.item.coffee().name())?;
        state.serialize_field(
            "price",
            &self.item.coffee().price().round_dp(DECIMAL_PRECISION),
        )?;
        state.serialize_field("deleted", &self.item.deleted())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Coffee};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn open_bill(dir: &tempfile::TempDir) -> Bill {
        Bill::open(dir.path().join("Test_0001.ini"), "Test", 1, &Catalog::standard()).unwrap()
    }

    #[test]
    fn summary_sums_cent_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = open_bill(&dir);
        bill.add(&Coffee::new("Special", dec!(0.333))).unwrap();
        bill.add(&Coffee::new("Special", dec!(0.333))).unwrap();

        let json = serde_json::to_string(&BillSummary(&bill)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["bill"], "Test_0001");
        assert_eq!(parsed["user"], "Test");
        assert_eq!(parsed["items"], 2);
        assert_eq!(parsed["sum"].as_str().unwrap(), "0.66");
        assert_eq!(parsed["status"], "open");
        assert_eq!(parsed["transaction"], "");
        assert_eq!(parsed["paid_at"], "");
    }

    #[test]
    fn summary_of_paid_bill() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = open_bill(&dir);
        bill.pay("T1").unwrap();

        let json = serde_json::to_string(&BillSummary(&bill)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["status"], "paid");
        assert_eq!(parsed["transaction"], "T1");
        assert_eq!(parsed["paid_at"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn item_lines_follow_view_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = open_bill(&dir);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let catalog = Catalog::standard();
        bill.add_at(catalog.lookup("Espresso").unwrap(), day.and_hms_opt(9, 0, 0).unwrap())
            .unwrap();
        bill.add_at(catalog.lookup("Nespresso").unwrap(), day.and_hms_opt(10, 0, 0).unwrap())
            .unwrap();

        let lines = ItemLine::for_bill(&bill);
        let json = serde_json::to_value(&lines).unwrap();
        assert_eq!(json[0]["position"], 0);
        assert_eq!(json[0]["item"], 1);
        assert_eq!(json[0]["product"], "Nespresso");
        assert_eq!(json[0]["price"].as_str().unwrap(), "0.50");
        assert_eq!(json[1]["time"], "2024-03-01_09-00-00");
        assert_eq!(json[1]["deleted"], false);
    }
}
