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

//! Product catalog.
//!
//! The catalog is an immutable value built once at startup and passed to
//! everything that needs price lookups.
//!
//! # Example
//!
//! ```
//! use coffee_ledger::Catalog;
//! use rust_decimal_macros::dec;
//!
//! let catalog = Catalog::standard();
//! assert_eq!(catalog.lookup("Espresso").unwrap().price(), dec!(0.30));
//! ```

use crate::error::LedgerError;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A purchasable product and its price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coffee {
    name: String,
    price: Decimal,
}

impl Coffee {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}

impl fmt::Display for Coffee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.price.round_dp(2))
    }
}

/// Fixed mapping from product name to [`Coffee`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    products: BTreeMap<String, Coffee>,
}

/// Raw catalog row: `name, price`.
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    name: String,
    price: Decimal,
}

impl Catalog {
    /// Builds a catalog from a list of products.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidConfig`] for empty names, negative prices,
    /// prices finer than cents or duplicate names.
    pub fn new(products: impl IntoIterator<Item = Coffee>) -> Result<Self, LedgerError> {
        let mut map = BTreeMap::new();
        for coffee in products {
            if coffee.name.trim().is_empty() {
                return Err(invalid("product name must not be empty"));
            }
            if coffee.price < Decimal::ZERO {
                return Err(invalid(format!("{} has a negative price", coffee.name)));
            }
            if coffee.price.round_dp(2) != coffee.price {
                return Err(invalid(format!(
                    "{} costs {}, prices are kept in whole cents",
                    coffee.name, coffee.price
                )));
            }
            if map.contains_key(&coffee.name) {
                return Err(invalid(format!("duplicate product {}", coffee.name)));
            }
            map.insert(coffee.name.clone(), coffee);
        }
        Ok(Self { products: map })
    }

    /// The house menu.
    pub fn standard() -> Self {
        let products = [
            Coffee::new("Espresso", dec!(0.30)),
            Coffee::new("Nespresso", dec!(0.50)),
        ];
        Self {
            products: products
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }

    /// Reads a catalog from CSV with a `name,price` header.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidConfig`] if a row cannot be parsed or the
    /// products are invalid.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LedgerError> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let mut products = Vec::new();
        for result in rdr.deserialize::<CatalogRecord>() {
            let record = result.map_err(|e| invalid(e.to_string()))?;
            products.push(Coffee::new(record.name, record.price));
        }
        Self::new(products)
    }

    pub fn from_path(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::io(path, e))?;
        Self::from_reader(file)
    }

    /// Looks up a product by name.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownProduct`] if the name is not in the catalog.
    pub fn lookup(&self, name: &str) -> Result<&Coffee, LedgerError> {
        self.products
            .get(name)
            .ok_or_else(|| LedgerError::UnknownProduct(name.to_owned()))
    }

    /// Products ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Coffee> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn invalid(reason: impl Into<String>) -> LedgerError {
    LedgerError::InvalidConfig {
        what: "catalog",
        reason: reason.into(),
    }
}
