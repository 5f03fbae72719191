mod character;
mod collision;
mod tuning;

pub use character::{
    CharacterCore, HookState, MAX_VELOCITY, PHYS_SIZE, PeerBody, PhysicsPredictor,
    closest_point_on_line,
};
pub use collision::{LineHit, MapGrid, TILE_SIZE, TileFlags};
pub use tuning::TuningParams;
