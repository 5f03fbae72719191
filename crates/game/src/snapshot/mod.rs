mod codec;
mod delta;
mod item;
pub mod objects;
mod storage;

pub use codec::{SnapOutcome, SnapshotCodec};
pub use delta::{DeltaError, EMPTY_DELTA, create_delta, unpack_delta};
pub use item::{SnapItem, Snapshot, SnapshotBuilder, item_key};
pub use objects::{CharacterObj, ClientInfoObj, LaserObj, NetObject, PlayerInfoObj};
pub use storage::{SnapshotHolder, SnapshotRing};
