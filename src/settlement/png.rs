// src/settlement/png.rs
//! Экспорт поселения: цветная карта состояний и сводка в JSON

use super::{CellState, Settlement};
use crate::error::Result;
use crate::grid::{Coord, Grid};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Цвет состояния на отладочной карте
#[must_use]
pub fn state_color(state: CellState) -> Rgb<u8> {
    match state {
        CellState::Outside => Rgb([0, 0, 0]),
        CellState::StandardArea => Rgb([255, 255, 255]),
        CellState::Border => Rgb([255, 0, 255]),
        CellState::VillageRoadEntry => Rgb([255, 255, 0]),
        CellState::MapRoadEntry => Rgb([255, 140, 0]),
        CellState::HouseSeed => Rgb([0, 255, 0]),
        CellState::Road => Rgb([191, 191, 191]),
        CellState::ReligiousSeed => Rgb([0, 0, 255]),
        CellState::FortificationSeed => Rgb([255, 0, 0]),
    }
}

#[must_use]
pub fn settlement_image(map: &Grid<CellState>) -> RgbImage {
    RgbImage::from_fn(map.width(), map.height(), |x, y| state_color(map[(x, y)]))
}

/// Краткая сводка поселения для внешних инструментов
#[derive(Debug, Clone, Serialize)]
pub struct SettlementSummary {
    pub complete: bool,
    pub seed: Option<Coord>,
    pub radius: u32,
    pub area: usize,
    pub houses: Vec<Coord>,
    pub religious: Vec<Coord>,
    pub fortifications: Vec<Coord>,
    pub village_entries: Vec<Coord>,
    pub map_entries: Vec<Coord>,
    pub road_cells: usize,
    pub country_roads: Vec<Vec<Coord>>,
}

impl SettlementSummary {
    #[must_use]
    pub fn new(settlement: &Settlement) -> Self {
        let map = &settlement.map;
        let cells = |state: CellState| map.positions_where(|&s| s == state);
        Self {
            complete: settlement.complete,
            seed: settlement.seed,
            radius: settlement.radius,
            area: map.data().iter().filter(|&&s| s != CellState::Outside).count(),
            houses: cells(CellState::HouseSeed),
            religious: cells(CellState::ReligiousSeed),
            fortifications: cells(CellState::FortificationSeed),
            village_entries: cells(CellState::VillageRoadEntry),
            map_entries: cells(CellState::MapRoadEntry),
            road_cells: settlement.count(CellState::Road),
            country_roads: settlement.country_roads.clone(),
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_uses_state_colors() {
        let mut map = Grid::new(3, 1, CellState::Outside);
        map[(1, 0)] = CellState::Road;
        map[(2, 0)] = CellState::FortificationSeed;
        let img = settlement_image(&map);
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([191, 191, 191]));
        assert_eq!(*img.get_pixel(2, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn summary_is_written_as_json() {
        let mut map = Grid::new(4, 4, CellState::Outside);
        map[(1, 1)] = CellState::HouseSeed;
        map[(2, 1)] = CellState::Road;
        let settlement = Settlement {
            low_res: Grid::new(1, 1, CellState::Outside),
            map,
            seed: Some((1, 1)),
            radius: 1,
            country_roads: vec![vec![(0, 0)]],
            complete: true,
        };
        let summary = SettlementSummary::new(&settlement);
        assert_eq!(summary.area, 2);
        assert_eq!(summary.houses, vec![(1, 1)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settlement.json");
        summary.save_json(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["road_cells"], 1);
        assert_eq!(value["complete"], true);
    }
}
