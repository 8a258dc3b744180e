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

//! Storage root holding one file per bill, named `<user>_<NNNN>.ini`.

use crate::error::LedgerError;
use std::fs;
use std::path::{Path, PathBuf};

const BILL_EXTENSION: &str = "ini";

/// Directory of bill files.
#[derive(Debug, Clone)]
pub struct BillStore {
    root: PathBuf,
}

impl BillStore {
    /// Opens an existing storage root.
    ///
    /// # Errors
    ///
    /// [`LedgerError::StorageRootMissing`] if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LedgerError::StorageRootMissing(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of bill `sequence` of `user`.
    pub fn bill_path(&self, user: &str, sequence: u32) -> PathBuf {
        self.root
            .join(format!("{user}_{sequence:04}.{BILL_EXTENSION}"))
    }

    /// Sequence numbers of all bills stored for `user`, ascending.
    pub fn sequences(&self, user: &str) -> Result<Vec<u32>, LedgerError> {
        validate_username(user)?;
        let entries = fs::read_dir(&self.root).map_err(|e| LedgerError::io(&self.root, e))?;

        let mut sequences = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LedgerError::io(&self.root, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(sequence) = parse_bill_file_name(name, user) {
                sequences.push(sequence);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    /// Smallest positive sequence number without a file for `user`.
    ///
    /// Gaps left by removed files are reused.
    pub fn next_free_sequence(&self, user: &str) -> Result<u32, LedgerError> {
        validate_username(user)?;
        let mut sequence = 1;
        while self.bill_path(user, sequence).exists() {
            sequence += 1;
        }
        Ok(sequence)
    }
}

/// Extracts the sequence from `<user>_<digits>.ini`; at least four digits.
fn parse_bill_file_name(name: &str, user: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(user)?
        .strip_prefix('_')?
        .strip_suffix(BILL_EXTENSION)?
        .strip_suffix('.')?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|&n| n > 0)
}

/// Rejects names that cannot become part of a file name or would not read
/// back unchanged from the `User` header line.
pub(crate) fn validate_username(user: &str) -> Result<(), LedgerError> {
    let bad = user.trim().is_empty()
        || user != user.trim()
        || user.starts_with('.')
        || user
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '[' | ']' | '=' | ':') || c.is_control());
    if bad {
        return Err(LedgerError::InvalidUsername(user.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_root_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = BillStore::open(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn bill_path_pattern() {
        let store = BillStore {
            root: PathBuf::from("data"),
        };
        assert_eq!(store.bill_path("Test", 7), PathBuf::from("data/Test_0007.ini"));
    }

    #[test]
    fn file_name_parsing() {
        assert_eq!(parse_bill_file_name("Test_0001.ini", "Test"), Some(1));
        assert_eq!(parse_bill_file_name("Test_12345.ini", "Test"), Some(12345));
        assert_eq!(parse_bill_file_name("Test_001.ini", "Test"), None);
        assert_eq!(parse_bill_file_name("Test_0000.ini", "Test"), None);
        assert_eq!(parse_bill_file_name("Test_extra_0001.ini", "Test"), None);
        assert_eq!(parse_bill_file_name("Test_0001.ini.tmp", "Test"), None);
        assert_eq!(parse_bill_file_name("Tester_0001.ini", "Test"), None);
    }

    #[test]
    fn sequences_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Test_0003.ini", "Test_0001.ini", "Peter_0002.ini", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let store = BillStore::open(dir.path()).unwrap();
        assert_eq!(store.sequences("Test").unwrap(), vec![1, 3]);
        assert_eq!(store.sequences("Peter").unwrap(), vec![2]);
        assert!(store.sequences("Nobody").unwrap().is_empty());
    }

    #[test]
    fn next_free_sequence_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = BillStore::open(dir.path()).unwrap();
        assert_eq!(store.next_free_sequence("Test").unwrap(), 1);

        fs::write(store.bill_path("Test", 1), "").unwrap();
        fs::write(store.bill_path("Test", 3), "").unwrap();
        assert_eq!(store.next_free_sequence("Test").unwrap(), 2);

        fs::write(store.bill_path("Test", 2), "").unwrap();
        assert_eq!(store.next_free_sequence("Test").unwrap(), 4);
    }

    #[test]
    fn usernames_are_validated() {
        for bad in [
            "", "  ", "../etc", "a/b", "a\\b", ".hidden", "Test ", " Test", "a\tb", "[Bill]",
            "a=b", "a:b",
        ] {
            let err = validate_username(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");
        }
        assert!(validate_username("Test").is_ok());
        assert!(validate_username("Anna-Lena").is_ok());
        assert!(validate_username("Anna Lena").is_ok());
    }
}
