use crate::net::connection::Connection;
use crate::net::packer::decompress;
use crate::net::protocol::{MAX_SNAPSHOT_PACKSIZE, MAX_SNAPSHOT_PARTS, SnapKind, SnapPart};

use super::delta::{EMPTY_DELTA, unpack_delta};
use super::item::Snapshot;
use super::storage::SnapshotRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapOutcome {
    /// More parts of this tick are outstanding.
    Pending,
    /// A stale or duplicate part.
    Ignored,
    /// The delta base is gone; a full resend was requested.
    MissingBase,
    Malformed,
    CrcMismatch { resync: bool },
    Stored { tick: i32, received: u32 },
}

/// Reassembles snapshot parts, applies deltas and keeps the snapshot ring.
#[derive(Debug)]
pub struct SnapshotCodec {
    incoming: Vec<u8>,
    part_sizes: [usize; MAX_SNAPSHOT_PARTS],
    parts_mask: u64,
    recv_tick: i32,
    ring: SnapshotRing,
    received: u32,
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self {
            incoming: vec![0; MAX_SNAPSHOT_PARTS * MAX_SNAPSHOT_PACKSIZE],
            part_sizes: [0; MAX_SNAPSHOT_PARTS],
            parts_mask: 0,
            recv_tick: -1,
            ring: SnapshotRing::new(),
            received: 0,
        }
    }
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring(&self) -> &SnapshotRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut SnapshotRing {
        &mut self.ring
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn reset(&mut self) {
        self.parts_mask = 0;
        self.recv_tick = -1;
        self.ring.clear();
        self.received = 0;
    }

    pub fn receive(&mut self, part: &SnapPart, connection: &mut Connection, now: i64) -> SnapOutcome {
        if part.game_tick < self.recv_tick {
            return SnapOutcome::Ignored;
        }

        if part.game_tick != self.recv_tick {
            self.parts_mask = 0;
            self.recv_tick = part.game_tick;
        }

        if part.part >= part.num_parts
            || part.num_parts > MAX_SNAPSHOT_PARTS
            || part.data.len() > MAX_SNAPSHOT_PACKSIZE
        {
            return SnapOutcome::Malformed;
        }

        let offset = part.part * MAX_SNAPSHOT_PACKSIZE;
        self.incoming[offset..offset + part.data.len()].copy_from_slice(&part.data);
        self.part_sizes[part.part] = part.data.len();
        self.parts_mask |= 1u64 << part.part;

        let full_mask = if part.num_parts == 64 {
            u64::MAX
        } else {
            (1u64 << part.num_parts) - 1
        };
        if self.parts_mask != full_mask {
            return SnapOutcome::Pending;
        }

        let total = (part.num_parts - 1) * MAX_SNAPSHOT_PACKSIZE
            + self.part_sizes[part.num_parts - 1];
        self.parts_mask = 0;

        let base = if part.delta_tick >= 0 {
            match self.ring.get(part.delta_tick) {
                Some(holder) => holder.snapshot.clone(),
                None => {
                    log::debug!(
                        "Missing delta base {} for tick {}",
                        part.delta_tick,
                        part.game_tick
                    );
                    connection.request_resync();
                    return SnapOutcome::MissingBase;
                }
            }
        } else {
            Snapshot::empty()
        };

        let delta = if total == 0 {
            EMPTY_DELTA.to_vec()
        } else {
            match decompress(&self.incoming[..total]) {
                Ok(words) => words,
                Err(err) => {
                    log::debug!("Snapshot {} failed to decompress: {}", part.game_tick, err);
                    return SnapOutcome::Malformed;
                }
            }
        };

        let snapshot = match unpack_delta(&base, &delta) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::debug!("Snapshot {} delta rejected: {}", part.game_tick, err);
                return SnapOutcome::Malformed;
            }
        };

        if part.kind != SnapKind::Empty && snapshot.crc() != part.crc {
            let resync = connection.record_crc_error();
            if resync {
                log::warn!("Too many snapshot CRC errors, requesting full snapshot");
            } else {
                log::debug!(
                    "Snapshot {} CRC mismatch ({} errors)",
                    part.game_tick,
                    connection.crc_errors()
                );
            }
            return SnapOutcome::CrcMismatch { resync };
        }
        connection.record_crc_ok();

        let mut floor = part.delta_tick;
        for holder in [self.ring.prev(), self.ring.current()].into_iter().flatten() {
            floor = floor.min(holder.tick);
        }
        self.ring.purge_until(floor);

        self.ring.add(part.game_tick, now, snapshot);
        self.received += 1;

        if self.received == 2 {
            self.ring.set_pointers_to_ends();
        }

        connection.ack_tick = part.game_tick;

        SnapOutcome::Stored {
            tick: part.game_tick,
            received: self.received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packer::compress;
    use crate::snapshot::delta::create_delta;
    use crate::snapshot::item::SnapshotBuilder;
    use crate::snapshot::objects::obj;

    fn snapshot_with(x: i32) -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        builder.add(obj::FLAG, 0, &[x, 0, 1]);
        builder.finish()
    }

    fn single(game_tick: i32, delta_tick: i32, from: &Snapshot, to: &Snapshot) -> SnapPart {
        SnapPart {
            kind: SnapKind::Single,
            game_tick,
            delta_tick,
            num_parts: 1,
            part: 0,
            crc: to.crc(),
            data: compress(&create_delta(from, to)),
        }
    }

    #[test]
    fn test_first_two_snapshots_set_pointers() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();
        let a = snapshot_with(1);
        let b = snapshot_with(2);

        let outcome = codec.receive(&single(10, -1, &Snapshot::empty(), &a), &mut connection, 0);
        assert_eq!(outcome, SnapOutcome::Stored { tick: 10, received: 1 });
        assert!(codec.ring().current().is_none());

        let outcome = codec.receive(&single(11, 10, &a, &b), &mut connection, 0);
        assert_eq!(outcome, SnapOutcome::Stored { tick: 11, received: 2 });
        assert_eq!(codec.ring().prev().map(|h| h.tick), Some(10));
        assert_eq!(codec.ring().current().map(|h| h.tick), Some(11));
        assert_eq!(codec.ring().get(11).unwrap().snapshot, b);
        assert_eq!(connection.ack_tick, 11);
    }

    #[test]
    fn test_missing_base_requests_resync() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();
        connection.ack_tick = 40;
        let a = snapshot_with(1);

        let outcome = codec.receive(&single(50, 45, &a, &a), &mut connection, 0);
        assert_eq!(outcome, SnapOutcome::MissingBase);
        assert_eq!(connection.ack_tick, -1);
    }

    #[test]
    fn test_parts_assemble_out_of_order() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();

        let mut builder = SnapshotBuilder::new();
        for id in 0..120 {
            builder.add(obj::PICKUP, id, &[id * 1000, id * 3000, 1, 2]);
        }
        let big = builder.finish();
        let payload = compress(&create_delta(&Snapshot::empty(), &big));
        assert!(payload.len() > MAX_SNAPSHOT_PACKSIZE);

        let chunks: Vec<&[u8]> = payload.chunks(MAX_SNAPSHOT_PACKSIZE).collect();
        let num_parts = chunks.len();
        let mut outcomes = Vec::new();
        for index in (0..num_parts).rev() {
            let part = SnapPart {
                kind: SnapKind::Full,
                game_tick: 7,
                delta_tick: -1,
                num_parts,
                part: index,
                crc: big.crc(),
                data: chunks[index].to_vec(),
            };
            outcomes.push(codec.receive(&part, &mut connection, 0));
        }

        assert!(outcomes[..num_parts - 1].iter().all(|o| *o == SnapOutcome::Pending));
        assert_eq!(outcomes[num_parts - 1], SnapOutcome::Stored { tick: 7, received: 1 });
        assert_eq!(codec.ring().get(7).unwrap().snapshot, big);
    }

    #[test]
    fn test_eleven_mismatches_force_one_resync() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();
        let a = snapshot_with(1);
        codec.receive(&single(10, -1, &Snapshot::empty(), &a), &mut connection, 0);

        let mut resyncs = 0;
        for tick in 11..22 {
            let mut part = single(tick, 10, &a, &snapshot_with(tick));
            part.crc ^= 0x55;
            if let SnapOutcome::CrcMismatch { resync: true } =
                codec.receive(&part, &mut connection, 0)
            {
                resyncs += 1;
            }
        }

        assert_eq!(resyncs, 1);
        assert_eq!(connection.crc_errors(), 0);
        assert_eq!(connection.ack_tick, -1);
        assert_eq!(codec.received(), 1);
    }

    #[test]
    fn test_empty_variant_skips_crc() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();
        let a = snapshot_with(4);
        codec.receive(&single(10, -1, &Snapshot::empty(), &a), &mut connection, 0);

        let empty = SnapPart {
            kind: SnapKind::Empty,
            game_tick: 11,
            delta_tick: 10,
            num_parts: 1,
            part: 0,
            crc: 0,
            data: Vec::new(),
        };
        let outcome = codec.receive(&empty, &mut connection, 0);
        assert_eq!(outcome, SnapOutcome::Stored { tick: 11, received: 2 });
        assert_eq!(codec.ring().get(11).unwrap().snapshot, a);
    }

    #[test]
    fn test_purge_keeps_delta_base() {
        let mut codec = SnapshotCodec::new();
        let mut connection = Connection::new();
        let a = snapshot_with(1);
        codec.receive(&single(10, -1, &Snapshot::empty(), &a), &mut connection, 0);
        codec.receive(&single(11, 10, &a, &a), &mut connection, 0);
        codec.receive(&single(12, 11, &a, &a), &mut connection, 0);
        codec.receive(&single(13, 12, &a, &a), &mut connection, 0);

        assert!(codec.ring().get(10).is_some());
        codec.ring_mut().advance();
        codec.ring_mut().advance();
        codec.receive(&single(14, 13, &a, &a), &mut connection, 0);
        assert!(codec.ring().get(10).is_none());
        assert!(codec.ring().get(12).is_some());
    }
}
