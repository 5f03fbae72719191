mod cache;
mod decoder;
mod store;

pub use cache::{MapCache, MapError, TileGridProvider, crc32, map_path};
pub use decoder::{DecodeError, GRID_MAGIC, MapDecoder, RawGridDecoder};
pub use store::{DirStore, MemoryStore, PersistentStore};
