use crate::config::WriteMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ids wrap at this value so later records contend with earlier ones on the same key.
pub const ID_SPACE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "myid")]
    pub id: u32,
    #[serde(rename = "myval")]
    pub value: u64,
    pub timestamp: DateTime<Utc>,
}

/// Fields set by an upsert. The id is only ever the match key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(rename = "myval")]
    pub value: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFilter {
    #[serde(rename = "myid")]
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteIntent {
    Insert(Record),
    Upsert { filter: KeyFilter, update: RecordUpdate },
    Replace { filter: KeyFilter, document: Record },
}

pub fn record_id(index: u64) -> u32 {
    (index % ID_SPACE) as u32
}

pub fn synthesize(index: u64, now: DateTime<Utc>) -> Record {
    Record {
        id: record_id(index),
        value: index,
        timestamp: now,
    }
}

pub fn synthesize_update(index: u64, now: DateTime<Utc>) -> (KeyFilter, RecordUpdate) {
    (
        KeyFilter { id: record_id(index) },
        RecordUpdate {
            value: index,
            timestamp: now,
        },
    )
}

/// Builds the write for record `index` under `mode`, stamped with `now`.
pub fn intent(mode: WriteMode, index: u64, now: DateTime<Utc>) -> WriteIntent {
    match mode {
        WriteMode::Insert => WriteIntent::Insert(synthesize(index, now)),
        WriteMode::Upsert => {
            let (filter, update) = synthesize_update(index, now);
            WriteIntent::Upsert { filter, update }
        }
        WriteMode::Replace => {
            let document = synthesize(index, now);
            WriteIntent::Replace {
                filter: KeyFilter { id: document.id },
                document,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_wraps_every_thousand() {
        assert_eq!(record_id(0), 0);
        assert_eq!(record_id(999), 999);
        assert_eq!(record_id(1000), 0);
        assert_eq!(record_id(1999), 999);
        for i in [0, 1, 17, 500, 998, 12_345] {
            assert_eq!(record_id(i), record_id(i + 1000));
        }
    }

    #[test]
    fn synthesized_record_keeps_raw_index_as_value() {
        let now = Utc::now();
        let rec = synthesize(2718, now);
        assert_eq!(rec.id, 718);
        assert_eq!(rec.value, 2718);
        assert_eq!(rec.timestamp, now);
    }

    #[test]
    fn upsert_intent_keys_on_id_only() {
        let now = Utc::now();
        let WriteIntent::Upsert { filter, update } = intent(WriteMode::Upsert, 1042, now) else {
            panic!("expected upsert");
        };
        assert_eq!(filter, KeyFilter { id: 42 });
        assert_eq!(update.value, 1042);

        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("myid").is_none());
        assert_eq!(json["myval"], 1042);
    }

    #[test]
    fn replace_intent_carries_full_document() {
        let now = Utc::now();
        let intent = intent(WriteMode::Replace, 3001, now);
        match intent {
            WriteIntent::Replace { filter, document } => {
                assert_eq!(filter, KeyFilter { id: 1 });
                assert_eq!(document, synthesize(3001, now));
            }
            other => panic!("expected replace, got {other:?}"),
        }
    }
}
