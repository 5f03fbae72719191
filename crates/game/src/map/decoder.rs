use thiserror::Error;

use crate::physics::{MapGrid, TileFlags};

pub const GRID_MAGIC: &[u8; 4] = b"TGRD";
const HEADER_SIZE: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Missing grid header")]
    BadMagic,
    #[error("Grid of {width}x{height} does not match {actual} tile bytes")]
    SizeMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },
}

/// Turns a map file into the collision grid.
pub trait MapDecoder {
    fn decode(&self, data: &[u8]) -> Result<MapGrid, DecodeError>;
}

/// `TGRD`, u32 LE width, u32 LE height, then one flag byte per tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawGridDecoder;

impl RawGridDecoder {
    pub fn encode(grid: &MapGrid) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_SIZE + grid.width() * grid.height());
        data.extend_from_slice(GRID_MAGIC);
        data.extend_from_slice(&(grid.width() as u32).to_le_bytes());
        data.extend_from_slice(&(grid.height() as u32).to_le_bytes());
        for y in 0..grid.height() as i32 {
            for x in 0..grid.width() as i32 {
                data.push(grid.tile(x, y).bits());
            }
        }
        data
    }
}

impl MapDecoder for RawGridDecoder {
    fn decode(&self, data: &[u8]) -> Result<MapGrid, DecodeError> {
        if data.len() < HEADER_SIZE || &data[..4] != GRID_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let width = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let height = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
        let tiles = &data[HEADER_SIZE..];

        let mismatch = DecodeError::SizeMismatch {
            width,
            height,
            actual: tiles.len(),
        };
        if width.checked_mul(height) != Some(tiles.len()) {
            return Err(mismatch);
        }

        let tiles = tiles
            .iter()
            .map(|&b| TileFlags::from_bits_truncate(b))
            .collect();
        MapGrid::new(width, height, tiles).ok_or(mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let grid = MapGrid::from_rows(&["#..", "X.U"]).unwrap();
        let data = RawGridDecoder::encode(&grid);
        assert_eq!(&data[..4], GRID_MAGIC);
        assert_eq!(data.len(), 12 + 6);
        assert_eq!(RawGridDecoder.decode(&data).unwrap(), grid);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(RawGridDecoder.decode(b"MAP\0"), Err(DecodeError::BadMagic));

        let mut data = RawGridDecoder::encode(&MapGrid::from_rows(&["##"]).unwrap());
        data.pop();
        assert!(matches!(
            RawGridDecoder.decode(&data),
            Err(DecodeError::SizeMismatch { actual: 1, .. })
        ));

        let mut empty = GRID_MAGIC.to_vec();
        empty.extend_from_slice(&[0; 8]);
        assert!(RawGridDecoder.decode(&empty).is_err());
    }
}
