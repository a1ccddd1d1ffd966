/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each ledger variable is stored in the user-provided key-value
//! store.
//!
//! # List of State Variables
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Entries|[`EntryID`](crate::types::basic::EntryID) -> [`Decree`](crate::types::basic::Decree)|The decree decided for each ledger slot. A slot that holds the filler decree may later be overwritten with a real decree; no other entry is ever overwritten or removed.|
//! |Highest Entry ID|[`EntryID`](crate::types::basic::EntryID)|The largest entry id that holds a decree. Absent while the ledger is empty.|
//! |Progress|[`ProgressRecord`](crate::types::progress::ProgressRecord)|The node's ballot bookkeeping: last ballot tried, highest promise, and previous vote.|
//!
//! # Persistence of state variables
//!
//! Every variable is stored as a **Borsh-serialized value**.
//!
//! Single values (highest entry id, progress) are stored at the one-byte constant key sharing the
//! variable's name.
//!
//! Entries are stored at keys formed by concatenating [`ENTRIES`] with the little-endian bytes of the
//! entry id:
//!
//! ```
//! # use synod_rs::{ledger::variables::{concat, ENTRIES}, types::basic::EntryID};
//! let key = concat(&ENTRIES, &EntryID::new(7).to_le_bytes());
//! assert_eq!(key, vec![0, 7, 0, 0, 0, 0, 0, 0, 0]);
//! ```

// State variables
pub const ENTRIES: [u8; 1] = [0];
pub const HIGHEST_ENTRY_ID: [u8; 1] = [1];
pub const PROGRESS: [u8; 1] = [2];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
