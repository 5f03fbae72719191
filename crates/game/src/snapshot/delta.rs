use thiserror::Error;

use super::item::{Snapshot, SnapshotBuilder, item_key};
use super::objects::static_item_size;

pub const DELTA_HEADER_WORDS: usize = 3;
pub const EMPTY_DELTA: [i32; DELTA_HEADER_WORDS] = [0, 0, 0];

const MAX_ITEM_TYPE: i32 = 0xffff;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    #[error("Delta truncated at word {0}")]
    Truncated(usize),
    #[error("Invalid item count {0}")]
    InvalidCount(i32),
    #[error("Invalid item type {0}")]
    InvalidType(i32),
    #[error("Invalid item size {0}")]
    InvalidSize(i32),
}

struct Reader<'a> {
    words: &'a [i32],
    position: usize,
}

impl<'a> Reader<'a> {
    fn next(&mut self) -> Result<i32, DeltaError> {
        let word = *self
            .words
            .get(self.position)
            .ok_or(DeltaError::Truncated(self.position))?;
        self.position += 1;
        Ok(word)
    }

    fn take(&mut self, count: usize) -> Result<&'a [i32], DeltaError> {
        let end = self.position + count;
        if end > self.words.len() {
            return Err(DeltaError::Truncated(self.words.len()));
        }
        let slice = &self.words[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn count(&mut self) -> Result<usize, DeltaError> {
        let value = self.next()?;
        usize::try_from(value).map_err(|_| DeltaError::InvalidCount(value))
    }
}

/// Rebuilds a snapshot from `from` and a decompressed delta payload.
pub fn unpack_delta(from: &Snapshot, delta: &[i32]) -> Result<Snapshot, DeltaError> {
    let mut reader = Reader {
        words: delta,
        position: 0,
    };

    let num_deleted = reader.count()?;
    let num_updated = reader.count()?;
    let _num_temp = reader.count()?;

    let deleted = reader.take(num_deleted)?;

    let mut builder = SnapshotBuilder::new();
    for item in from.items() {
        if !deleted.contains(&item.key) {
            builder.add_item(item.key, item.data);
        }
    }

    for _ in 0..num_updated {
        let type_id = reader.next()?;
        let id = reader.next()?;
        if !(0..=MAX_ITEM_TYPE).contains(&type_id) {
            return Err(DeltaError::InvalidType(type_id));
        }

        let size = match static_item_size(type_id) {
            Some(size) => size,
            None => {
                let size = reader.next()?;
                usize::try_from(size).map_err(|_| DeltaError::InvalidSize(size))?
            }
        };

        let diff = reader.take(size)?;
        let key = item_key(type_id, id);

        let base = from.find(key).filter(|base| base.len() == size);
        let data: Vec<i32> = match base {
            Some(base) => base
                .iter()
                .zip(diff)
                .map(|(old, change)| old.wrapping_add(*change))
                .collect(),
            None => diff.to_vec(),
        };

        builder.set_item(key, &data);
    }

    Ok(builder.finish())
}

/// Encodes `to` relative to `from` in the layout `unpack_delta` reads.
pub fn create_delta(from: &Snapshot, to: &Snapshot) -> Vec<i32> {
    let deleted: Vec<i32> = from
        .items()
        .filter(|item| to.index_of(item.key).is_none())
        .map(|item| item.key)
        .collect();

    let mut updates = Vec::new();
    let mut num_updated = 0;

    for item in to.items() {
        let base = from.find(item.key).filter(|base| base.len() == item.data.len());
        let data: Vec<i32> = match base {
            Some(base) => {
                let diff: Vec<i32> = item
                    .data
                    .iter()
                    .zip(base)
                    .map(|(new, old)| new.wrapping_sub(*old))
                    .collect();
                if diff.iter().all(|&word| word == 0) {
                    continue;
                }
                diff
            }
            None => item.data.to_vec(),
        };

        updates.push(item.type_id());
        updates.push(item.id());
        if static_item_size(item.type_id()).is_none() {
            updates.push(item.data.len() as i32);
        }
        updates.extend(data);
        num_updated += 1;
    }

    let mut delta = Vec::with_capacity(DELTA_HEADER_WORDS + deleted.len() + updates.len());
    delta.push(deleted.len() as i32);
    delta.push(num_updated);
    delta.push(0);
    delta.extend(deleted);
    delta.extend(updates);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::objects::obj;

    fn sorted_items(snapshot: &Snapshot) -> Vec<(i32, Vec<i32>)> {
        let mut items: Vec<_> = snapshot
            .items()
            .map(|item| (item.key, item.data.to_vec()))
            .collect();
        items.sort();
        items
    }

    fn character(x: i32) -> Vec<i32> {
        let mut words = vec![0; 22];
        words[1] = x;
        words
    }

    #[test]
    fn test_empty_delta_copies_base() {
        let mut builder = SnapshotBuilder::new();
        builder.add(obj::PICKUP, 2, &[1, 2, 3, 4]);
        let base = builder.finish();
        assert_eq!(unpack_delta(&base, &EMPTY_DELTA).unwrap(), base);
    }

    #[test]
    fn test_delta_reproduces_target() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add(obj::CHARACTER, 0, &character(100))
            .add(obj::CHARACTER, 1, &character(200))
            .add(obj::FLAG, 0, &[1, 2, 3])
            .add(0x4000, 7, &[9, 9]);
        let from = builder.finish();

        let mut builder = SnapshotBuilder::new();
        builder
            .add(obj::CHARACTER, 0, &character(132))
            .add(obj::FLAG, 0, &[1, 2, 3])
            .add(obj::LASER, 5, &[10, 20, 30, 40, 50])
            .add(0x4000, 7, &[9, 9, 9]);
        let to = builder.finish();

        let delta = create_delta(&from, &to);
        // one deleted character, unchanged flag omitted
        assert_eq!(&delta[..3], &[1, 3, 0]);

        let rebuilt = unpack_delta(&from, &delta).unwrap();
        assert_eq!(sorted_items(&rebuilt), sorted_items(&to));
        assert_eq!(rebuilt.crc(), to.crc());
    }

    #[test]
    fn test_delta_from_empty_base() {
        let mut builder = SnapshotBuilder::new();
        builder.add(obj::PLAYER_INFO, 3, &[1, 3, 0, 10, 50]);
        let to = builder.finish();

        let delta = create_delta(&Snapshot::empty(), &to);
        let rebuilt = unpack_delta(&Snapshot::empty(), &delta).unwrap();
        assert_eq!(rebuilt, to);
    }

    #[test]
    fn test_malformed_deltas() {
        let base = Snapshot::empty();
        assert_eq!(unpack_delta(&base, &[0, 0]), Err(DeltaError::Truncated(2)));
        assert_eq!(unpack_delta(&base, &[-1, 0, 0]), Err(DeltaError::InvalidCount(-1)));
        assert!(unpack_delta(&base, &[0, 1, 0, obj::CHARACTER, 0, 1, 2]).is_err());
        assert_eq!(
            unpack_delta(&base, &[0, 1, 0, -4, 0]),
            Err(DeltaError::InvalidType(-4))
        );
        assert_eq!(
            unpack_delta(&base, &[0, 1, 0, 40, 0, -2]),
            Err(DeltaError::InvalidSize(-2))
        );
    }
}
