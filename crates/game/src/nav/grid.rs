use glam::{IVec2, Vec2};

use crate::physics::{MapGrid, TILE_SIZE, TileFlags};

pub const OPEN: i8 = 0;
pub const SOLID: i8 = 1;
pub const LETHAL: i8 = -1;

/// Walkability of each tile: 0 open, 1 solid, -1 lethal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: i32,
    height: i32,
    cells: Vec<i8>,
}

impl OccupancyGrid {
    pub fn new(width: i32, height: i32, cells: Vec<i8>) -> Option<Self> {
        if width <= 0 || height <= 0 || cells.len() != (width * height) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn from_rows(rows: &[&[i8]]) -> Option<Self> {
        let width = rows.first()?.len();
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        let cells = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Self::new(width as i32, rows.len() as i32, cells)
    }

    pub fn from_map(map: &MapGrid) -> Self {
        let mut cells = Vec::with_capacity(map.width() * map.height());
        for y in 0..map.height() as i32 {
            for x in 0..map.width() as i32 {
                let tile = map.tile(x, y);
                cells.push(if tile.contains(TileFlags::DEATH) {
                    LETHAL
                } else if tile.contains(TileFlags::SOLID) {
                    SOLID
                } else {
                    OPEN
                });
            }
        }
        Self {
            width: map.width() as i32,
            height: map.height() as i32,
            cells,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn get(&self, cell: IVec2) -> Option<i8> {
        self.contains(cell)
            .then(|| self.cells[(cell.y * self.width + cell.x) as usize])
    }

    pub fn clamp(&self, cell: IVec2) -> IVec2 {
        cell.clamp(IVec2::ZERO, IVec2::new(self.width - 1, self.height - 1))
    }

    pub fn cell_at(pos: Vec2) -> IVec2 {
        IVec2::new(
            (pos.x / TILE_SIZE).floor() as i32,
            (pos.y / TILE_SIZE).floor() as i32,
        )
    }
}

/// Cells crossed by hazards this tick. Cleared and refilled every tick.
#[derive(Debug, Clone, Default)]
pub struct HazardOverlay {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl HazardOverlay {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; (width.max(0) * height.max(0)) as usize],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    pub fn mark(&mut self, cell: IVec2) {
        if cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height {
            self.cells[(cell.y * self.width + cell.x) as usize] = true;
        }
    }

    /// Marks every tile a pixel-space segment passes through.
    pub fn mark_segment(&mut self, from: Vec2, to: Vec2) {
        let distance = from.distance(to);
        let end = (distance + 1.0) as i32;
        for i in 0..=end {
            let pos = from.lerp(to, i as f32 / end as f32);
            self.mark(OccupancyGrid::cell_at(pos));
        }
    }

    pub fn is_marked(&self, cell: IVec2) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && cell.x < self.width
            && cell.y < self.height
            && self.cells[(cell.y * self.width + cell.x) as usize]
    }

    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|&&marked| marked).count()
    }
}
