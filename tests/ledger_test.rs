use synod_rs::{
    ledger::{
        pluggables::{KVStore, WriteBatch},
        store::{AppendOutcome, LedgerError, LedgerStore, WriteOutcome},
        variables::HIGHEST_ENTRY_ID,
    },
    types::{
        ballot::BallotNumber,
        basic::{Decree, EntryID, NodeID},
        entries::{EncodedEntries, EncodedEntryIDs, EntryIDList, EntryList, LedgerEntry},
        progress::{PrevVote, ProgressRecord},
    },
};

mod common;

use crate::common::mem_db::{MemDB, MemWriteBatch};

fn initialized_ledger() -> (MemDB, LedgerStore<MemDB>) {
    let kv_store = MemDB::new();
    let mut ledger = LedgerStore::new(kv_store.clone());
    ledger.initialize().unwrap();
    (kv_store, ledger)
}

fn id(int: u64) -> EntryID {
    EntryID::new(int)
}

#[test]
fn immutability_test() {
    let (_, mut ledger) = initialized_ledger();
    let decree = Decree::from("Olive oil is to be sold at a fixed price");

    assert_eq!(
        ledger.append(id(1), decree.clone()).unwrap(),
        AppendOutcome::Inserted
    );

    // A real decree is never overwritten or deleted.
    assert!(matches!(
        ledger.append(id(1), Decree::from("Olive oil is free")),
        Err(LedgerError::ImmutabilityViolation { entry_id }) if entry_id == id(1)
    ));
    assert!(matches!(
        ledger.append(id(1), Decree::filler()),
        Err(LedgerError::ImmutabilityViolation { .. })
    ));
    assert!(matches!(
        ledger.delete(id(1)),
        Err(LedgerError::ImmutabilityViolation { .. })
    ));
    assert_eq!(ledger.get(id(1)).unwrap(), Some(decree));

    // Entry 0 does not exist.
    assert!(matches!(
        ledger.append(id(0), Decree::from("Nothing")),
        Err(LedgerError::InvalidEntryID)
    ));
    assert_eq!(ledger.get(id(0)).unwrap(), None);
}

#[test]
fn filler_replacement_test() {
    let (_, mut ledger) = initialized_ledger();
    let decree = Decree::from("Cheese may be eaten on the ides");

    ledger.append(id(2), Decree::filler()).unwrap();
    assert_eq!(
        ledger.append(id(2), decree.clone()).unwrap(),
        AppendOutcome::ReplacedFiller
    );
    assert_eq!(ledger.get(id(2)).unwrap(), Some(decree.clone()));

    // Once replaced, the entry is as immutable as any other.
    assert!(ledger.append(id(2), Decree::filler()).is_err());
}

#[test]
fn write_if_outcome_unknown_test() {
    let (_, mut ledger) = initialized_ledger();
    let decree = Decree::from("Wine is to be watered");

    assert_eq!(
        ledger.write_if_outcome_unknown(id(1), decree.clone()).unwrap(),
        WriteOutcome::Written(AppendOutcome::Inserted)
    );
    assert_eq!(
        ledger
            .write_if_outcome_unknown(id(1), Decree::from("Wine is not to be watered"))
            .unwrap(),
        WriteOutcome::AlreadyKnown {
            existing: decree.clone()
        }
    );
    assert_eq!(ledger.get(id(1)).unwrap(), Some(decree));

    ledger.append(id(2), Decree::filler()).unwrap();
    assert_eq!(
        ledger
            .write_if_outcome_unknown(id(2), Decree::from("Figs"))
            .unwrap(),
        WriteOutcome::Written(AppendOutcome::ReplacedFiller)
    );
}

#[test]
fn holes_test() {
    let (_, mut ledger) = initialized_ledger();
    assert_eq!(ledger.last_entry_id().unwrap(), None);
    assert_eq!(ledger.last_contiguous_entry_id().unwrap(), id(0));
    assert!(ledger.missing_entry_ids().unwrap().is_empty());

    for entry_id in [1, 3, 5] {
        ledger
            .append(id(entry_id), Decree::from(format!("Decree {}", entry_id)))
            .unwrap();
    }

    assert_eq!(ledger.last_entry_id().unwrap(), Some(id(5)));
    assert_eq!(ledger.last_contiguous_entry_id().unwrap(), id(1));
    assert_eq!(ledger.missing_entry_ids().unwrap(), vec![id(2), id(4)]);
    assert_eq!(
        ledger
            .list_all()
            .unwrap()
            .into_iter()
            .map(|entry| entry.entry_id)
            .collect::<Vec<EntryID>>(),
        vec![id(1), id(3), id(5)]
    );

    // Filler entries fill holes.
    ledger.append(id(2), Decree::filler()).unwrap();
    ledger.append(id(4), Decree::filler()).unwrap();
    assert!(ledger.missing_entry_ids().unwrap().is_empty());
    assert_eq!(ledger.last_contiguous_entry_id().unwrap(), id(5));
}

#[test]
fn catch_up_queries_test() {
    let (_, mut ledger) = initialized_ledger();
    ledger.append(id(1), Decree::from("One")).unwrap();
    ledger.append(id(2), Decree::filler()).unwrap();
    ledger.append(id(3), Decree::from("Three")).unwrap();
    ledger.append(id(4), Decree::from("Four")).unwrap();

    // Only real decrees are reported beyond the hint.
    let after = ledger.entries_after(id(1)).unwrap();
    assert_eq!(
        after,
        vec![
            LedgerEntry::new(id(3), Decree::from("Three")),
            LedgerEntry::new(id(4), Decree::from("Four")),
        ]
    );
    assert!(ledger.entries_after(id(4)).unwrap().is_empty());

    let owned: EntryIDList = [id(1), id(4)].into_iter().collect();
    let not_owned = ledger.entries_not_in(&owned, id(3)).unwrap();
    assert_eq!(
        not_owned
            .iter()
            .map(|entry| entry.entry_id)
            .collect::<Vec<EntryID>>(),
        vec![id(2), id(3)]
    );
}

#[test]
fn progress_test() {
    let (kv_store, mut ledger) = initialized_ledger();
    assert_eq!(ledger.load_progress().unwrap(), ProgressRecord::initial());

    let me = NodeID::new(1);
    let ballot = BallotNumber::new(4, me);
    let record = ProgressRecord {
        last_tried: ballot,
        next_bal: ballot,
        prev_vote: Some(PrevVote {
            ballot,
            entry_id: id(7),
            decree: Decree::from("Seven"),
        }),
    };
    ledger.save_progress(&record).unwrap();

    // The record survives a restart, and re-initializing leaves it alone.
    let mut restarted = LedgerStore::new(kv_store);
    restarted.initialize().unwrap();
    assert_eq!(restarted.load_progress().unwrap(), record);

    // A record whose previous vote is above its promise is refused.
    let inconsistent = ProgressRecord {
        next_bal: BallotNumber::new(3, me),
        ..record.clone()
    };
    assert!(matches!(
        restarted.save_progress(&inconsistent),
        Err(LedgerError::InconsistentProgress { .. })
    ));
    assert_eq!(restarted.load_progress().unwrap(), record);

    // update_progress only persists when the closure says so.
    let declined = restarted
        .update_progress(|progress| {
            progress.last_tried = BallotNumber::new(100, me);
            false
        })
        .unwrap();
    assert_eq!(declined, None);
    assert_eq!(restarted.load_progress().unwrap(), record);

    let bumped = restarted
        .update_progress(|progress| {
            progress.last_tried = BallotNumber::new(5, me);
            true
        })
        .unwrap()
        .unwrap();
    assert_eq!(bumped.last_tried, BallotNumber::new(5, me));
    assert_eq!(restarted.load_progress().unwrap(), bumped);
}

#[test]
fn entry_list_encoding_test() {
    let entries = EntryList::new(vec![
        LedgerEntry::new(id(2), Decree::from("a|b:c")),
        LedgerEntry::new(id(9), Decree::new(vec![0, 255, 124, 58])),
    ]);

    let encoded = entries.encode();
    // Decrees are base64url-encoded, so the delimiters only ever separate entries and fields.
    assert_eq!(encoded.as_str().matches('|').count(), 1);
    assert_eq!(encoded.as_str().matches(':').count(), 2);
    assert!(encoded.as_str().starts_with("2:"));
    assert_eq!(encoded.decode().unwrap(), entries);

    assert_eq!(EncodedEntries::new(String::new()).decode().unwrap(), EntryList::default());
    assert!(EncodedEntries::new("3".to_string()).decode().is_err());
    assert!(EncodedEntries::new("x:YQ".to_string()).decode().is_err());
    assert!(EncodedEntries::new("3:not base64!".to_string()).decode().is_err());
}

#[test]
fn entry_id_list_encoding_test() {
    let owned: EntryIDList = [id(5), id(1), id(3)].into_iter().collect();
    let encoded = owned.encode();
    assert_eq!(encoded.as_str(), "1|3|5");
    assert_eq!(encoded.decode().unwrap(), owned);

    assert!(EncodedEntryIDs::new(String::new()).decode().unwrap().is_empty());
    assert!(EncodedEntryIDs::new("1|two".to_string()).decode().is_err());
}

#[test]
fn corrupt_highest_entry_id_test() {
    let (mut kv_store, mut ledger) = initialized_ledger();
    ledger.append(id(1), Decree::from("First")).unwrap();
    ledger.append(id(2), Decree::from("Second")).unwrap();

    let mut wb = MemWriteBatch::new();
    wb.set(&HIGHEST_ENTRY_ID, &[0xff]);
    kv_store.write(wb);

    // An unreadable ledger is an error, never an empty ledger.
    assert!(matches!(ledger.last_entry_id(), Err(LedgerError::KVGetError(_))));
    assert!(matches!(ledger.list_all(), Err(LedgerError::KVGetError(_))));
    assert!(matches!(
        ledger.last_contiguous_entry_id(),
        Err(LedgerError::KVGetError(_))
    ));
    assert!(matches!(
        ledger.missing_entry_ids(),
        Err(LedgerError::KVGetError(_))
    ));
    assert!(matches!(
        ledger.entries_after(id(0)),
        Err(LedgerError::KVGetError(_))
    ));
    let owned: EntryIDList = [id(1)].into_iter().collect();
    assert!(matches!(
        ledger.entries_not_in(&owned, id(2)),
        Err(LedgerError::KVGetError(_))
    ));
}
