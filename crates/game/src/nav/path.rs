use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glam::IVec2;

use super::grid::{HazardOverlay, LETHAL, OPEN, OccupancyGrid};

const NEIGHBORS: [IVec2; 4] = [IVec2::X, IVec2::Y, IVec2::NEG_X, IVec2::NEG_Y];

pub const UNREACHABLE: u32 = u32::MAX;

/// Step counts from every cell to the nearest goal.
#[derive(Debug, Clone)]
pub struct DistanceField {
    width: i32,
    height: i32,
    distances: Vec<u32>,
}

impl DistanceField {
    /// Dijkstra from all goal cells at once. Goals are clamped into the
    /// grid; only open cells that are not above a lethal cell are entered.
    pub fn build(grid: &OccupancyGrid, goals: &[IVec2]) -> Self {
        let mut field = Self {
            width: grid.width(),
            height: grid.height(),
            distances: vec![UNREACHABLE; (grid.width() * grid.height()) as usize],
        };

        let mut queue = BinaryHeap::new();
        for &goal in goals {
            let goal = grid.clamp(goal);
            let index = field.index(goal);
            field.distances[index] = 0;
            queue.push(Reverse((0u32, goal.y, goal.x)));
        }

        while let Some(Reverse((dist, y, x))) = queue.pop() {
            let cell = IVec2::new(x, y);
            if dist > field.distances[field.index(cell)] {
                continue;
            }

            for offset in NEIGHBORS {
                let next = cell + offset;
                if !is_walkable(grid, next) || is_dangerous(grid, None, next) {
                    continue;
                }
                let index = field.index(next);
                if dist + 1 < field.distances[index] {
                    field.distances[index] = dist + 1;
                    queue.push(Reverse((dist + 1, next.y, next.x)));
                }
            }
        }

        field
    }

    fn index(&self, cell: IVec2) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    pub fn distance(&self, cell: IVec2) -> Option<u32> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        Some(self.distances[self.index(cell)]).filter(|&d| d != UNREACHABLE)
    }

    pub fn is_goal(&self, cell: IVec2) -> bool {
        self.distance(cell) == Some(0)
    }
}

fn is_walkable(grid: &OccupancyGrid, cell: IVec2) -> bool {
    grid.get(cell) == Some(OPEN)
}

fn is_lethal(grid: &OccupancyGrid, overlay: Option<&HazardOverlay>, cell: IVec2) -> bool {
    grid.get(cell) == Some(LETHAL) || overlay.is_some_and(|overlay| overlay.is_marked(cell))
}

/// A lethal cell or the cell directly above one.
fn is_dangerous(grid: &OccupancyGrid, overlay: Option<&HazardOverlay>, cell: IVec2) -> bool {
    grid.contains(cell)
        && (is_lethal(grid, overlay, cell) || is_lethal(grid, overlay, cell + IVec2::Y))
}

/// Greedy descent over the field. Each returned step is a unit offset.
pub fn find_path(
    grid: &OccupancyGrid,
    field: &DistanceField,
    overlay: Option<&HazardOverlay>,
    start: IVec2,
    max_steps: usize,
) -> Vec<IVec2> {
    let mut path = Vec::new();
    if !is_walkable(grid, start) || field.is_goal(start) {
        return path;
    }

    let mut cell = start;
    let mut current = field.distance(cell).unwrap_or(UNREACHABLE);

    while path.len() < max_steps {
        let mut best: Option<(IVec2, u32)> = None;
        for offset in NEIGHBORS {
            let next = cell + offset;
            if !is_walkable(grid, next) || is_dangerous(grid, overlay, next) {
                continue;
            }
            if is_dangerous(grid, overlay, next + IVec2::Y) {
                continue;
            }
            let Some(distance) = field.distance(next) else {
                continue;
            };
            if distance < current && best.is_none_or(|(_, d)| distance < d) {
                best = Some((offset, distance));
            }
        }

        let Some((offset, distance)) = best else {
            break;
        };
        cell += offset;
        current = distance;
        path.push(offset);
        if distance == 0 {
            break;
        }
    }

    path
}

/// Owns the occupancy grid of the loaded map and the field toward the
/// current goal. The field is rebuilt only when the goal cell moves.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    grid: OccupancyGrid,
    goal: Option<IVec2>,
    field: Option<DistanceField>,
    rebuilds: u64,
}

impl Pathfinder {
    pub fn new(grid: OccupancyGrid) -> Self {
        Self {
            grid,
            goal: None,
            field: None,
            rebuilds: 0,
        }
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn goal(&self) -> Option<IVec2> {
        self.goal
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Returns true when the field had to be rebuilt.
    pub fn set_goal(&mut self, goal: IVec2) -> bool {
        let goal = self.grid.clamp(goal);
        if self.goal == Some(goal) {
            return false;
        }
        self.field = Some(DistanceField::build(&self.grid, &[goal]));
        self.goal = Some(goal);
        self.rebuilds += 1;
        log::debug!("Path field rebuilt toward ({}, {})", goal.x, goal.y);
        true
    }

    pub fn set_goals(&mut self, goals: &[IVec2]) {
        self.field = Some(DistanceField::build(&self.grid, goals));
        self.goal = goals.first().map(|&goal| self.grid.clamp(goal));
        self.rebuilds += 1;
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
        self.field = None;
    }

    pub fn field(&self) -> Option<&DistanceField> {
        self.field.as_ref()
    }

    pub fn find_path(
        &self,
        start: IVec2,
        max_steps: usize,
        overlay: Option<&HazardOverlay>,
    ) -> Vec<IVec2> {
        match &self.field {
            Some(field) => find_path(&self.grid, field, overlay, start, max_steps),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hazard_grid() -> OccupancyGrid {
        OccupancyGrid::from_rows(&[&[0, 0, 0], &[0, 0, -1], &[0, 0, 0]]).unwrap()
    }

    #[test]
    fn test_path_avoids_hazard() {
        let grid = hazard_grid();
        let field = DistanceField::build(&grid, &[IVec2::new(2, 2)]);
        let path = find_path(&grid, &field, None, IVec2::ZERO, 20);

        assert_eq!(
            path,
            vec![IVec2::new(1, 0), IVec2::new(0, 1), IVec2::new(0, 1), IVec2::new(1, 0)]
        );

        let mut cell = IVec2::ZERO;
        let mut last = field.distance(cell).unwrap();
        for step in &path {
            cell += *step;
            assert_ne!(cell, IVec2::new(2, 1));
            assert_ne!(cell, IVec2::new(2, 0));
            let distance = field.distance(cell).unwrap();
            assert!(distance <= last);
            last = distance;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_start_on_goal_is_empty() {
        let grid = hazard_grid();
        let field = DistanceField::build(&grid, &[IVec2::new(2, 2)]);
        assert!(find_path(&grid, &field, None, IVec2::new(2, 2), 20).is_empty());
    }

    #[test]
    fn test_invalid_start_is_empty() {
        let grid = OccupancyGrid::from_rows(&[&[0, 1, 0], &[0, 0, 0]]).unwrap();
        let field = DistanceField::build(&grid, &[IVec2::new(2, 1)]);
        assert!(find_path(&grid, &field, None, IVec2::new(1, 0), 20).is_empty());
        assert!(find_path(&grid, &field, None, IVec2::new(-1, 0), 20).is_empty());
        assert!(find_path(&grid, &field, None, IVec2::new(5, 5), 20).is_empty());
    }

    #[test]
    fn test_max_steps_and_unreachable() {
        let grid = OccupancyGrid::from_rows(&[&[0; 8]]).unwrap();
        let field = DistanceField::build(&grid, &[IVec2::new(7, 0)]);
        assert_eq!(find_path(&grid, &field, None, IVec2::ZERO, 3).len(), 3);

        let walled = OccupancyGrid::from_rows(&[&[0, 1, 0]]).unwrap();
        let field = DistanceField::build(&walled, &[IVec2::new(2, 0)]);
        assert_eq!(field.distance(IVec2::ZERO), None);
        assert!(find_path(&walled, &field, None, IVec2::ZERO, 10).is_empty());
    }

    #[test]
    fn test_goal_clamped_into_grid() {
        let grid = OccupancyGrid::from_rows(&[&[0; 4], &[0; 4]]).unwrap();
        let field = DistanceField::build(&grid, &[IVec2::new(40, -3)]);
        assert!(field.is_goal(IVec2::new(3, 0)));
    }

    #[test]
    fn test_multiple_goals() {
        let grid = OccupancyGrid::from_rows(&[&[0; 9]]).unwrap();
        let field = DistanceField::build(&grid, &[IVec2::new(0, 0), IVec2::new(8, 0)]);
        assert_eq!(field.distance(IVec2::new(4, 0)), Some(4));
        assert_eq!(field.distance(IVec2::new(6, 0)), Some(2));
    }

    #[test]
    fn test_overlay_blocks_without_rebuild() {
        let grid = OccupancyGrid::from_rows(&[&[0; 5], &[0; 5]]).unwrap();
        let mut pathfinder = Pathfinder::new(grid);
        assert!(pathfinder.set_goal(IVec2::new(4, 0)));
        assert!(!pathfinder.set_goal(IVec2::new(4, 0)));
        assert_eq!(pathfinder.rebuilds(), 1);

        let open = pathfinder.find_path(IVec2::new(0, 0), 10, None);
        assert_eq!(open.len(), 4);

        let mut overlay = HazardOverlay::new(5, 2);
        overlay.mark(IVec2::new(2, 1));
        let blocked = pathfinder.find_path(IVec2::new(0, 0), 10, Some(&overlay));
        assert_eq!(blocked, vec![IVec2::X]);
        assert_eq!(pathfinder.rebuilds(), 1);

        assert!(pathfinder.set_goal(IVec2::new(0, 1)));
        assert_eq!(pathfinder.rebuilds(), 2);
    }
}
