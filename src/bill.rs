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

//! Bills and their backing files.
//!
//! A bill follows a two-state machine:
//!
//! ```text
//!   Open ──pay──► Paid
//! ```
//!
//! Every mutation rewrites the whole backing file before returning. The file
//! is an INI-style header followed by CSV item rows:
//!
//! ```text
//! [Bill]
//! User = Test
//! TransactionID = 8812
//! TransactionTime = 2024-03-01_18-00-00
//!
//! [Items]
//! "2024-03-01_09-05-07","Espresso","0.30","0"
//! ```

use crate::base::{BillId, ItemId};
use crate::catalog::{Catalog, Coffee};
use crate::error::LedgerError;
use crate::item::{BillItem, DATE_FORMAT, PriceDrift, format_price};
use chrono::{Local, NaiveDateTime};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const HEAD_SECTION: &str = "Bill";
const ITEMS_DELIMITER: &str = "[Items]";

/// Lifecycle state of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Open,
    Paid,
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillStatus::Open => f.write_str("open"),
            BillStatus::Paid => f.write_str("paid"),
        }
    }
}

/// One billing period of a user.
///
/// # Invariants
///
/// - A non-empty transaction id means paid; a paid bill never changes again.
/// - [`Bill::sum`] only counts items that are not deleted.
#[derive(Debug)]
pub struct Bill {
    id: BillId,
    sequence: u32,
    owner: String,
    path: PathBuf,
    /// Storage (insertion) order.
    items: Vec<BillItem>,
    transaction_id: String,
    transaction_time: Option<NaiveDateTime>,
    drifts: Vec<PriceDrift>,
}

impl Bill {
    /// Loads the bill stored at `path`, creating an empty open bill there if
    /// the file does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OwnerMismatch`] if the file names another owner.
    /// - [`LedgerError::MalformedBill`] if the file cannot be parsed.
    /// - [`LedgerError::UnknownProduct`] if an item names a product missing from `catalog`.
    /// - [`LedgerError::Io`] on file system failures.
    pub fn open(
        path: impl Into<PathBuf>,
        owner: &str,
        sequence: u32,
        catalog: &Catalog,
    ) -> Result<Self, LedgerError> {
        let path = path.into();
        if !path.is_file() {
            return Self::create(path, owner, sequence);
        }

        let mut bill = Self::empty(path, owner, sequence);
        let raw = fs::read_to_string(&bill.path).map_err(|e| LedgerError::io(&bill.path, e))?;
        bill.parse(&raw, catalog)?;
        debug!(
            bill = %bill.id,
            items = bill.items.len(),
            paid = bill.is_paid(),
            "loaded bill"
        );
        Ok(bill)
    }

    /// Writes a new, empty open bill to `path`.
    pub(crate) fn create(path: PathBuf, owner: &str, sequence: u32) -> Result<Self, LedgerError> {
        let bill = Self::empty(path, owner, sequence);
        bill.save()?;
        debug!(bill = %bill.id, path = %bill.path.display(), "created bill file");
        Ok(bill)
    }

    fn empty(path: PathBuf, owner: &str, sequence: u32) -> Self {
        Self {
            id: BillId::new(owner, sequence),
            sequence,
            owner: owner.to_owned(),
            path,
            items: Vec::new(),
            transaction_id: String::new(),
            transaction_time: None,
            drifts: Vec::new(),
        }
    }

    pub fn id(&self) -> &BillId {
        &self.id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transaction id of the payment, empty while the bill is open.
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn transaction_time(&self) -> Option<NaiveDateTime> {
        self.transaction_time
    }

    pub fn is_paid(&self) -> bool {
        !self.transaction_id.is_empty()
    }

    pub fn status(&self) -> BillStatus {
        if self.is_paid() {
            BillStatus::Paid
        } else {
            BillStatus::Open
        }
    }

    /// Items in storage order; position `i` is addressed by `ItemId(i)`.
    pub fn items(&self) -> &[BillItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&BillItem> {
        self.items.get(id.0)
    }

    /// Items newest first, as presented to users.
    ///
    /// Items sharing a timestamp keep their storage order. Derived anew on
    /// every call.
    pub fn view(&self) -> Vec<(ItemId, &BillItem)> {
        let mut view: Vec<_> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemId(i), item))
            .collect();
        view.sort_by(|a, b| b.1.timestamp().cmp(&a.1.timestamp()));
        view
    }

    /// Total of all items that are not deleted.
    pub fn sum(&self) -> Decimal {
        self.items
            .iter()
            .filter(|item| !item.deleted())
            .map(|item| item.coffee().price())
            .sum()
    }

    /// Price mismatches found while loading this bill.
    pub fn price_drifts(&self) -> &[PriceDrift] {
        &self.drifts
    }

    /// Records a purchase now.
    ///
    /// # Errors
    ///
    /// [`LedgerError::BillPaid`] if the bill is paid; [`LedgerError::Io`] if
    /// the bill cannot be written (the item is not kept).
    pub fn add(&mut self, coffee: &Coffee) -> Result<ItemId, LedgerError> {
        self.add_at(coffee, Local::now().naive_local())
    }

    /// Records a purchase made at `timestamp`.
    pub fn add_at(
        &mut self,
        coffee: &Coffee,
        timestamp: NaiveDateTime,
    ) -> Result<ItemId, LedgerError> {
        self.ensure_open()?;
        let id = ItemId(self.items.len());
        self.items.push(BillItem::new(timestamp, coffee.clone()));
        if let Err(e) = self.save() {
            self.items.pop();
            return Err(e);
        }
        debug!(bill = %self.id, item = %id, product = coffee.name(), "added item");
        Ok(id)
    }

    /// Marks an item as deleted; it stays on the bill but no longer counts.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BillPaid`] if the bill is paid.
    /// - [`LedgerError::ItemNotFound`] if `item` is not on this bill.
    pub fn delete(&mut self, item: ItemId) -> Result<(), LedgerError> {
        self.set_deleted(item, true)
    }

    /// Undoes [`Bill::delete`].
    pub fn restore(&mut self, item: ItemId) -> Result<(), LedgerError> {
        self.set_deleted(item, false)
    }

    /// Deletes the item at `index` of [`Bill::view`] and returns its handle.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BillPaid`] if the bill is paid.
    /// - [`LedgerError::ViewIndexOutOfRange`] if `index` is past the view.
    pub fn delete_at(&mut self, index: usize) -> Result<ItemId, LedgerError> {
        self.ensure_open()?;
        let item = self.resolve(index)?;
        self.set_deleted(item, true)?;
        Ok(item)
    }

    /// Restores the item at `index` of [`Bill::view`] and returns its handle.
    pub fn restore_at(&mut self, index: usize) -> Result<ItemId, LedgerError> {
        self.ensure_open()?;
        let item = self.resolve(index)?;
        self.set_deleted(item, false)?;
        Ok(item)
    }

    /// Closes the bill with the id of the transaction that settled it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BillPaid`] if the bill was paid before.
    /// - [`LedgerError::InvalidTransactionId`] if `transaction_id` is blank,
    ///   has surrounding whitespace or contains control characters.
    pub fn pay(&mut self, transaction_id: &str) -> Result<(), LedgerError> {
        self.ensure_open()?;
        validate_transaction_id(transaction_id)?;

        self.transaction_id = transaction_id.to_owned();
        self.transaction_time = Some(Local::now().naive_local());
        if let Err(e) = self.save() {
            self.transaction_id.clear();
            self.transaction_time = None;
            return Err(e);
        }
        info!(bill = %self.id, transaction = transaction_id, sum = %self.sum(), "bill paid");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_paid() {
            return Err(LedgerError::BillPaid(self.id.clone()));
        }
        Ok(())
    }

    fn resolve(&self, index: usize) -> Result<ItemId, LedgerError> {
        let view = self.view();
        view.get(index)
            .map(|(id, _)| *id)
            .ok_or_else(|| LedgerError::ViewIndexOutOfRange {
                bill: self.id.clone(),
                index,
                len: view.len(),
            })
    }

    fn set_deleted(&mut self, item: ItemId, deleted: bool) -> Result<(), LedgerError> {
        self.ensure_open()?;
        let entry = self
            .items
            .get_mut(item.0)
            .ok_or_else(|| LedgerError::ItemNotFound {
                bill: self.id.clone(),
                item,
            })?;
        let previous = entry.deleted();
        entry.set_deleted(deleted);

        if let Err(e) = self.save() {
            if let Some(entry) = self.items.get_mut(item.0) {
                entry.set_deleted(previous);
            }
            return Err(e);
        }
        debug!(bill = %self.id, %item, deleted, "updated item");
        Ok(())
    }

    // === Persistence ===

    fn parse(&mut self, raw: &str, catalog: &Catalog) -> Result<(), LedgerError> {
        let (head, body) = raw.split_once(ITEMS_DELIMITER).ok_or_else(|| {
            LedgerError::malformed(&self.path, format!("missing {ITEMS_DELIMITER} section"))
        })?;

        let fields = parse_head(head, &self.path)?;
        let found = fields.get("user").cloned().unwrap_or_default();
        if found != self.owner {
            return Err(LedgerError::OwnerMismatch {
                path: self.path.clone(),
                expected: self.owner.clone(),
                found,
            });
        }

        self.transaction_id = fields.get("transactionid").cloned().unwrap_or_default();
        self.transaction_time = match fields.get("transactiontime").map(String::as_str) {
            None | Some("") => None,
            Some(raw_time) => Some(
                NaiveDateTime::parse_from_str(raw_time, DATE_FORMAT).map_err(|_| {
                    LedgerError::malformed(&self.path, format!("bad transaction time {raw_time:?}"))
                })?,
            ),
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());
        for result in rdr.records() {
            let row = result.map_err(|e| LedgerError::malformed(&self.path, e.to_string()))?;
            if row.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let (item, drift) = BillItem::from_row(&row, catalog, &self.path)?;
            self.items.push(item);
            self.drifts.extend(drift);
        }
        Ok(())
    }

    fn render(&self) -> Result<Vec<u8>, LedgerError> {
        let mut head = format!(
            "[{HEAD_SECTION}]\nUser = {}\nTransactionID = {}\n",
            self.owner, self.transaction_id
        );
        if let Some(time) = self.transaction_time {
            head.push_str(&format!("TransactionTime = {}\n", time.format(DATE_FORMAT)));
        }
        head.push('\n');
        head.push_str(ITEMS_DELIMITER);
        head.push('\n');

        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(head.into_bytes());
        for item in &self.items {
            wtr.write_record(item.to_row())
                .map_err(|e| LedgerError::io(&self.path, e.into()))?;
        }
        wtr.into_inner()
            .map_err(|e| LedgerError::io(&self.path, e.into_error()))
    }

    /// Rewrites the backing file through a temporary file in the same
    /// directory, so readers never observe a partially written bill.
    fn save(&self) -> Result<(), LedgerError> {
        let contents = self.render()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LedgerError::io(dir, e))?;
        tmp.write_all(&contents)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| LedgerError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e.error))?;
        debug!(bill = %self.id, path = %self.path.display(), "saved bill");
        Ok(())
    }
}

impl fmt::Display for Bill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bill {}, {}, {} ({})",
            self.id,
            self.owner,
            format_price(self.sum()),
            self.status()
        )
    }
}

/// A stored id must survive the header round trip; blank means unpaid.
fn validate_transaction_id(id: &str) -> Result<(), LedgerError> {
    if id.trim().is_empty() || id != id.trim() || id.chars().any(char::is_control) {
        return Err(LedgerError::InvalidTransactionId(id.to_owned()));
    }
    Ok(())
}

/// Reads `key = value` pairs of the `[Bill]` section, keys lowercased.
fn parse_head(head: &str, path: &Path) -> Result<HashMap<String, String>, LedgerError> {
    let mut fields = HashMap::new();
    let mut in_section = false;
    let mut seen_section = false;

    for line in head.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim() == HEAD_SECTION;
            seen_section |= in_section;
            continue;
        }
        if !in_section {
            continue;
        }
        let (key, value) = line
            .split_once(|c: char| c == '=' || c == ':')
            .ok_or_else(|| LedgerError::malformed(path, format!("bad header line {line:?}")))?;
        fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    if !seen_section {
        return Err(LedgerError::malformed(
            path,
            format!("missing [{HEAD_SECTION}] section"),
        ));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn fresh(dir: &tempfile::TempDir) -> Bill {
        Bill::open(dir.path().join("Test_0001.ini"), "Test", 1, &Catalog::standard()).unwrap()
    }

    #[test]
    fn view_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        let catalog = Catalog::standard();
        let espresso = catalog.lookup("Espresso").unwrap();
        let nespresso = catalog.lookup("Nespresso").unwrap();

        bill.add_at(espresso, at(9, 0, 0)).unwrap();
        bill.add_at(nespresso, at(11, 0, 0)).unwrap();
        bill.add_at(espresso, at(10, 0, 0)).unwrap();

        let ids: Vec<_> = bill.view().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![ItemId(1), ItemId(2), ItemId(0)]);
    }

    #[test]
    fn view_keeps_storage_order_for_equal_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        let espresso = Catalog::standard().lookup("Espresso").unwrap().clone();

        bill.add_at(&espresso, at(9, 0, 0)).unwrap();
        bill.add_at(&espresso, at(9, 0, 0)).unwrap();

        let ids: Vec<_> = bill.view().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![ItemId(0), ItemId(1)]);
    }

    #[test]
    fn delete_at_resolves_through_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        let catalog = Catalog::standard();

        bill.add_at(catalog.lookup("Espresso").unwrap(), at(9, 0, 0)).unwrap();
        bill.add_at(catalog.lookup("Nespresso").unwrap(), at(10, 0, 0)).unwrap();

        // newest (the Nespresso, stored second) sits at view position 0
        let deleted = bill.delete_at(0).unwrap();
        assert_eq!(deleted, ItemId(1));
        assert!(bill.items()[1].deleted());
        assert_eq!(bill.sum(), dec!(0.30));
    }

    #[test]
    fn render_writes_header_and_quoted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        bill.add_at(Catalog::standard().lookup("Espresso").unwrap(), at(9, 5, 7))
            .unwrap();

        let raw = fs::read_to_string(bill.path()).unwrap();
        assert_eq!(
            raw,
            "[Bill]\nUser = Test\nTransactionID = \n\n[Items]\n\"2024-03-01_09-05-07\",\"Espresso\",\"0.30\",\"0\"\n"
        );
    }

    #[test]
    fn parse_legacy_lowercase_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test_0001.ini");
        fs::write(
            &path,
            "[Bill]\nuser = Test\ntransactionid = 4711\ntransactiontime = 2024-03-02_08-00-00\n\n\
             [Items]\n\"2024-03-01_09-05-07\",\"Espresso\",\"0.3\"\n\n2024-03-01_09-06-00,Nespresso,0.5,1\n",
        )
        .unwrap();

        let bill = Bill::open(&path, "Test", 1, &Catalog::standard()).unwrap();
        assert!(bill.is_paid());
        assert_eq!(bill.transaction_id(), "4711");
        assert_eq!(
            bill.transaction_time(),
            Some(
                NaiveDate::from_ymd_opt(2024, 3, 2)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(bill.items().len(), 2);
        assert!(!bill.items()[0].deleted());
        assert!(bill.items()[1].deleted());
        assert_eq!(bill.sum(), dec!(0.3));
        assert!(bill.price_drifts().is_empty());
    }

    #[test]
    fn parse_rejects_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::standard();

        let path = dir.path().join("Test_0001.ini");
        fs::write(&path, "[Bill]\nUser = Test\nTransactionID = \n").unwrap();
        let err = Bill::open(&path, "Test", 1, &catalog).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);

        let path = dir.path().join("Test_0002.ini");
        fs::write(&path, "User = Test\n[Items]\n").unwrap();
        let err = Bill::open(&path, "Test", 2, &catalog).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn pay_rejects_unstorable_transaction_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        for id in ["", "  ", "a\nb", "a\rb", " T1", "T1\t"] {
            let err = bill.pay(id).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{id:?}");
            assert!(!bill.is_paid());
        }

        let reloaded = Bill::open(bill.path(), "Test", 1, &Catalog::standard()).unwrap();
        assert!(!reloaded.is_paid());
        assert_eq!(reloaded.transaction_id(), "");
    }

    #[test]
    fn transaction_id_with_inner_space_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        bill.pay("PP 8812:ok").unwrap();

        let reloaded = Bill::open(bill.path(), "Test", 1, &Catalog::standard()).unwrap();
        assert_eq!(reloaded.transaction_id(), "PP 8812:ok");
    }

    #[test]
    fn display_shows_sum_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut bill = fresh(&dir);
        bill.add(Catalog::standard().lookup("Nespresso").unwrap()).unwrap();
        assert_eq!(bill.to_string(), "Bill Test_0001, Test, 0.50 (open)");
    }
}
