use bitflags::bitflags;
use glam::Vec2;

pub const TILE_SIZE: f32 = 32.0;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u8 {
        const SOLID = 1 << 0;
        const DEATH = 1 << 1;
        const UNHOOKABLE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit {
    pub point: Vec2,
    pub before: Vec2,
    pub flags: TileFlags,
}

/// Static tile classification of the loaded map, 32 px per tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapGrid {
    width: usize,
    height: usize,
    tiles: Vec<TileFlags>,
}

impl MapGrid {
    pub fn new(width: usize, height: usize, tiles: Vec<TileFlags>) -> Option<Self> {
        if width == 0 || height == 0 || tiles.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            tiles,
        })
    }

    /// Builds a grid from text rows: `#` solid, `X` death, `U` unhookable
    /// solid, anything else air.
    pub fn from_rows(rows: &[&str]) -> Option<Self> {
        let width = rows.first()?.len();
        let mut tiles = Vec::with_capacity(width * rows.len());
        for row in rows {
            if row.len() != width {
                return None;
            }
            tiles.extend(row.bytes().map(|b| match b {
                b'#' => TileFlags::SOLID,
                b'X' => TileFlags::DEATH,
                b'U' => TileFlags::SOLID | TileFlags::UNHOOKABLE,
                _ => TileFlags::empty(),
            }));
        }
        Self::new(width, rows.len(), tiles)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile(&self, tx: i32, ty: i32) -> TileFlags {
        let x = tx.clamp(0, self.width as i32 - 1) as usize;
        let y = ty.clamp(0, self.height as i32 - 1) as usize;
        self.tiles[y * self.width + x]
    }

    pub fn tile_at(&self, pos: Vec2) -> TileFlags {
        let x = pos.x.round() as i32 / TILE_SIZE as i32;
        let y = pos.y.round() as i32 / TILE_SIZE as i32;
        self.tile(x, y)
    }

    pub fn check_point(&self, pos: Vec2) -> bool {
        self.tile_at(pos).contains(TileFlags::SOLID)
    }

    pub fn intersect_line(&self, from: Vec2, to: Vec2) -> Option<LineHit> {
        let distance = from.distance(to);
        let end = (distance + 1.0) as i32;
        let mut last = from;

        for i in 0..=end {
            let pos = from.lerp(to, i as f32 / end as f32);
            if self.check_point(pos) {
                return Some(LineHit {
                    point: pos,
                    before: last,
                    flags: self.tile_at(pos),
                });
            }
            last = pos;
        }
        None
    }

    pub fn test_box(&self, pos: Vec2, size: Vec2) -> bool {
        let half = size * 0.5;
        self.check_point(Vec2::new(pos.x - half.x, pos.y - half.y))
            || self.check_point(Vec2::new(pos.x + half.x, pos.y - half.y))
            || self.check_point(Vec2::new(pos.x - half.x, pos.y + half.y))
            || self.check_point(Vec2::new(pos.x + half.x, pos.y + half.y))
    }

    /// Sweeps a box along `vel` in unit-length steps, resolving each axis
    /// separately. Returns the final position and velocity.
    pub fn move_box(&self, mut pos: Vec2, mut vel: Vec2, size: Vec2, elasticity: f32) -> (Vec2, Vec2) {
        let distance = vel.length();
        if distance <= 0.00001 {
            return (pos, vel);
        }

        let max = distance as i32;
        let fraction = 1.0 / (max + 1) as f32;

        for _ in 0..=max {
            let mut new_pos = pos + vel * fraction;

            if self.test_box(new_pos, size) {
                let mut hits = 0;

                if self.test_box(Vec2::new(pos.x, new_pos.y), size) {
                    new_pos.y = pos.y;
                    vel.y *= -elasticity;
                    hits += 1;
                }

                if self.test_box(Vec2::new(new_pos.x, pos.y), size) {
                    new_pos.x = pos.x;
                    vel.x *= -elasticity;
                    hits += 1;
                }

                // corner hit with both axes free on their own
                if hits == 0 {
                    new_pos = pos;
                    vel *= -elasticity;
                }
            }

            pos = new_pos;
        }

        (pos, vel)
    }

    pub fn is_grounded(&self, pos: Vec2, phys_size: f32) -> bool {
        let half = phys_size * 0.5;
        self.check_point(Vec2::new(pos.x + half, pos.y + half + 5.0))
            || self.check_point(Vec2::new(pos.x - half, pos.y + half + 5.0))
    }
}
