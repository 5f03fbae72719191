mod grid;
mod path;

pub use grid::{HazardOverlay, LETHAL, OPEN, OccupancyGrid, SOLID};
pub use path::{DistanceField, Pathfinder, UNREACHABLE, find_path};
