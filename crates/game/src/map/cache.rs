use std::io;

use thiserror::Error;

use super::decoder::{DecodeError, MapDecoder};
use super::store::PersistentStore;
use crate::physics::MapGrid;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Map {0} is not cached")]
    NotFound(String),
    #[error("Failed to parse map: {0}")]
    Parse(#[from] DecodeError),
    #[error("Map checksum mismatch, expected {expected:08x} got {actual:08x}")]
    Checksum { expected: u32, actual: u32 },
    #[error("Map storage failed: {0}")]
    Storage(#[from] io::Error),
}

/// Resolves a map announced by the server into its collision grid.
pub trait TileGridProvider {
    fn load(&mut self, name: &str, crc: i32) -> Result<MapGrid, MapError>;
    fn install(&mut self, name: &str, crc: i32, data: &[u8]) -> Result<MapGrid, MapError>;
}

pub fn map_path(name: &str, crc: i32) -> String {
    format!("maps/{}/{:08x}.map", name, crc as u32)
}

/// IEEE CRC-32 as used for map checksums.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

fn verify(data: &[u8], crc: i32) -> Result<(), MapError> {
    let actual = crc32(data);
    if actual != crc as u32 {
        return Err(MapError::Checksum {
            expected: crc as u32,
            actual,
        });
    }
    Ok(())
}

pub struct MapCache<S, D> {
    store: S,
    decoder: D,
}

impl<S: PersistentStore, D: MapDecoder> MapCache<S, D> {
    pub fn new(store: S, decoder: D) -> Self {
        Self { store, decoder }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: PersistentStore, D: MapDecoder> TileGridProvider for MapCache<S, D> {
    fn load(&mut self, name: &str, crc: i32) -> Result<MapGrid, MapError> {
        let path = map_path(name, crc);
        if !self.store.exists(&path) {
            return Err(MapError::NotFound(path));
        }
        let data = self.store.read(&path)?;
        verify(&data, crc)?;
        Ok(self.decoder.decode(&data)?)
    }

    fn install(&mut self, name: &str, crc: i32, data: &[u8]) -> Result<MapGrid, MapError> {
        verify(data, crc)?;
        let grid = self.decoder.decode(data)?;
        let path = map_path(name, crc);
        self.store.write(&path, data)?;
        log::info!("Stored map {} ({} bytes)", path, data.len());
        Ok(grid)
    }
}
