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

//! Directory of users allowed to keep a coffee ledger.

use crate::base::PayerId;
use crate::catalog::Catalog;
use crate::error::LedgerError;
use crate::ledger::UserLedger;
use crate::store::{BillStore, validate_username};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A known user and their account at the payment collaborator, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    name: String,
    payer: Option<PayerId>,
}

impl Member {
    pub fn new(name: impl Into<String>, payer: Option<PayerId>) -> Self {
        Self {
            name: name.into(),
            payer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payment account of this member.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NoPayerAccount`] if none is configured.
    pub fn payer(&self) -> Result<PayerId, LedgerError> {
        self.payer
            .ok_or_else(|| LedgerError::NoPayerAccount(self.name.clone()))
    }
}

/// Raw directory row: `username, payer_id`.
///
/// An empty or `-1` `payer_id` means the user has no payment account.
#[derive(Debug, Deserialize)]
struct MemberRecord {
    username: String,
    #[serde(default, deserialize_with = "deserialize_payer")]
    payer_id: Option<PayerId>,
}

fn deserialize_payer<'de, D>(deserializer: D) -> Result<Option<PayerId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    match raw.trim() {
        "" | "-1" => Ok(None),
        id => id
            .parse()
            .map(|id| Some(PayerId(id)))
            .map_err(|_| {
                <D::Error as serde::de::Error>::custom(format!("invalid payer_id {id:?}"))
            }),
    }
}

/// Known users, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    members: Vec<Member>,
}

impl Directory {
    /// Builds a directory from members.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidConfig`] for unusable or duplicate names.
    pub fn new(members: impl IntoIterator<Item = Member>) -> Result<Self, LedgerError> {
        let mut directory = Self::default();
        for member in members {
            validate_username(&member.name).map_err(|e| invalid(e.to_string()))?;
            if directory.members.iter().any(|m| m.name == member.name) {
                return Err(invalid(format!("duplicate user {}", member.name)));
            }
            directory.members.push(member);
        }
        Ok(directory)
    }

    /// Reads a directory from CSV with a `username,payer_id` header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LedgerError> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let mut members = Vec::new();
        for result in rdr.deserialize::<MemberRecord>() {
            let record = result.map_err(|e| invalid(e.to_string()))?;
            members.push(Member::new(record.username, record.payer_id));
        }
        Self::new(members)
    }

    pub fn from_path(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::io(path, e))?;
        Self::from_reader(file)
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(Member::name)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Looks up a member by name.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownUser`] if the name is not listed.
    pub fn member(&self, name: &str) -> Result<&Member, LedgerError> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| LedgerError::UnknownUser(name.to_owned()))
    }

    /// Opens the ledger of a listed user.
    pub fn open_ledger(
        &self,
        name: &str,
        store: &BillStore,
        catalog: &Catalog,
    ) -> Result<UserLedger, LedgerError> {
        let member = self.member(name)?;
        UserLedger::open(store, catalog, member.name())
    }
}

fn invalid(reason: impl Into<String>) -> LedgerError {
    LedgerError::InvalidConfig {
        what: "user directory",
        reason: reason.into(),
    }
}
