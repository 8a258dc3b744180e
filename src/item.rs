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

//! Bill items and their row encoding.
//!
//! A row is `timestamp, product, price, deleted`. Rows written before soft
//! delete existed carry only the first three fields and decode as active.

use crate::catalog::{Catalog, Coffee};
use crate::error::LedgerError;
use chrono::{NaiveDateTime, Timelike};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Timestamp layout used in bill files.
pub const DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One purchase on a bill.
///
/// Holds its own copy of the product so later catalog changes never alter a
/// recorded price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillItem {
    timestamp: NaiveDateTime,
    coffee: Coffee,
    deleted: bool,
}

/// Stored price differs from the current catalog price.
///
/// Non-fatal: the item keeps the stored price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDrift {
    pub product: String,
    pub stored: Decimal,
    pub current: Decimal,
}

impl BillItem {
    /// Creates an active item at file resolution: whole seconds, whole cents.
    pub fn new(timestamp: NaiveDateTime, coffee: Coffee) -> Self {
        let coffee = if coffee.price().round_dp(2) == coffee.price() {
            coffee
        } else {
            Coffee::new(coffee.name(), coffee.price().round_dp(2))
        };
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            coffee,
            deleted: false,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn coffee(&self) -> &Coffee {
        &self.coffee
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Encodes the item as `[timestamp, name, price, deleted]`.
    pub fn to_row(&self) -> [String; 4] {
        [
            self.timestamp.format(DATE_FORMAT).to_string(),
            self.coffee.name().to_owned(),
            format_price(self.coffee.price()),
            if self.deleted { "1" } else { "0" }.to_owned(),
        ]
    }

    /// Decodes a row from a bill file.
    ///
    /// Accepts the current four-field layout and the legacy three-field one.
    /// The product must exist in `catalog`; a stored price that differs from
    /// the catalog wins and is reported as a [`PriceDrift`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::MalformedBill`] for a wrong field count or unparsable field.
    /// - [`LedgerError::UnknownProduct`] if the product is not in the catalog.
    pub fn from_row(
        row: &StringRecord,
        catalog: &Catalog,
        path: &Path,
    ) -> Result<(Self, Option<PriceDrift>), LedgerError> {
        let (date_str, name, price_str, deleted) = match row.len() {
            3 => (&row[0], &row[1], &row[2], false),
            4 => {
                let flag = row[3].trim().parse::<i64>().map_err(|_| {
                    LedgerError::malformed(path, format!("bad deleted flag {:?}", &row[3]))
                })?;
                (&row[0], &row[1], &row[2], flag != 0)
            }
            n => {
                return Err(LedgerError::malformed(
                    path,
                    format!("item row has {n} fields, expected 3 or 4"),
                ));
            }
        };

        let timestamp = NaiveDateTime::parse_from_str(date_str.trim(), DATE_FORMAT)
            .map_err(|_| LedgerError::malformed(path, format!("bad timestamp {date_str:?}")))?;
        let price = Decimal::from_str(price_str.trim())
            .map_err(|_| LedgerError::malformed(path, format!("bad price {price_str:?}")))?;

        let listed = catalog.lookup(name)?;
        let mut drift = None;
        let coffee = if price == listed.price() {
            listed.clone()
        } else {
            warn!(
                product = name,
                stored = %price,
                current = %listed.price(),
                path = %path.display(),
                "stored price differs from catalog, keeping stored price"
            );
            drift = Some(PriceDrift {
                product: name.to_owned(),
                stored: price,
                current: listed.price(),
            });
            Coffee::new(name, price)
        };

        Ok((
            Self {
                timestamp,
                coffee,
                deleted,
            },
            drift,
        ))
    }
}

/// Formats a price with exactly two decimal places.
pub(crate) fn format_price(price: Decimal) -> String {
    let mut price = price.round_dp(2);
    price.rescale(2);
    price.to_string()
}
