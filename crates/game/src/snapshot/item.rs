pub fn item_key(type_id: i32, id: i32) -> i32 {
    (type_id << 16) | (id & 0xffff)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapItem<'a> {
    pub key: i32,
    pub data: &'a [i32],
}

impl SnapItem<'_> {
    pub fn type_id(&self) -> i32 {
        (self.key >> 16) & 0xffff
    }

    pub fn id(&self) -> i32 {
        self.key & 0xffff
    }
}

/// Items stored back to back as `[key, data...]` words with an offset table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    offsets: Vec<usize>,
    payload: Vec<i32>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<SnapItem<'_>> {
        let start = *self.offsets.get(index)?;
        let end = self
            .offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.payload.len());
        Some(SnapItem {
            key: self.payload[start],
            data: &self.payload[start + 1..end],
        })
    }

    pub fn items(&self) -> impl Iterator<Item = SnapItem<'_>> + '_ {
        (0..self.len()).filter_map(move |index| self.item(index))
    }

    pub fn index_of(&self, key: i32) -> Option<usize> {
        self.offsets
            .iter()
            .position(|&offset| self.payload[offset] == key)
    }

    pub fn find(&self, key: i32) -> Option<&[i32]> {
        let index = self.index_of(key)?;
        self.item(index).map(|item| item.data)
    }

    pub fn find_item(&self, type_id: i32, id: i32) -> Option<&[i32]> {
        self.find(item_key(type_id, id))
    }

    /// Wrapping sum of every data word, keys excluded.
    pub fn crc(&self) -> i32 {
        self.items()
            .flat_map(|item| item.data.iter())
            .fold(0i32, |sum, &word| sum.wrapping_add(word))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    offsets: Vec<usize>,
    payload: Vec<i32>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            offsets: snapshot.offsets.clone(),
            payload: snapshot.payload.clone(),
        }
    }

    pub fn add_item(&mut self, key: i32, data: &[i32]) -> &mut Self {
        self.offsets.push(self.payload.len());
        self.payload.push(key);
        self.payload.extend_from_slice(data);
        self
    }

    pub fn add(&mut self, type_id: i32, id: i32, data: &[i32]) -> &mut Self {
        self.add_item(item_key(type_id, id), data)
    }

    fn range_of(&self, key: i32) -> Option<(usize, usize)> {
        let index = self
            .offsets
            .iter()
            .position(|&offset| self.payload[offset] == key)?;
        let start = self.offsets[index] + 1;
        let end = self
            .offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.payload.len());
        Some((start, end))
    }

    pub fn item_mut(&mut self, key: i32) -> Option<&mut [i32]> {
        let (start, end) = self.range_of(key)?;
        Some(&mut self.payload[start..end])
    }

    /// Replaces the item with `key` or appends it.
    pub fn set_item(&mut self, key: i32, data: &[i32]) {
        match self.range_of(key) {
            Some((start, end)) if end - start == data.len() => {
                self.payload[start..end].copy_from_slice(data);
            }
            Some((start, end)) => {
                let index = self
                    .offsets
                    .iter()
                    .position(|&offset| offset == start - 1)
                    .unwrap_or(self.offsets.len());
                let removed = end - start + 1;
                self.payload.drain(start - 1..end);
                self.offsets.remove(index);
                for offset in &mut self.offsets[index..] {
                    *offset -= removed;
                }
                self.add_item(key, data);
            }
            None => {
                self.add_item(key, data);
            }
        }
    }

    pub fn finish(self) -> Snapshot {
        Snapshot {
            offsets: self.offsets,
            payload: self.payload,
        }
    }
}
