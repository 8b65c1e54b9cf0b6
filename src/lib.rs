pub mod biome;
pub mod climate;
pub mod config;
pub mod error;
pub mod grid;
pub mod heightmap;
pub mod morphology;
pub mod pipeline;
pub mod settlement;
pub mod steepness;
pub mod vegetation;
pub mod water;

pub use config::{ClimateSettings, SettlementSettings, TerrainPreset, TerrainSettings, WorldParams};
pub use error::{GenError, Result};
pub use grid::{Coord, Grid};
pub use heightmap::{Heightmap, generate_heightmap};
pub use pipeline::{World, generate_world};
pub use settlement::{CellState, Settlement, generate_settlement};
