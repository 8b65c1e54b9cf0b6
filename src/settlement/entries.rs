// src/settlement/entries.rs
//! Входы дорог: на границе поселения и на краях карты

use super::{CellState, Layout, cells_of, nearest_distance};
use crate::grid::Coord;
use rand::Rng;
use rand::seq::SliceRandom;

/// Край карты
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    fn from_index(i: u32) -> Self {
        match i % 4 {
            0 => Edge::Left,
            1 => Edge::Right,
            2 => Edge::Top,
            _ => Edge::Bottom,
        }
    }

    fn random_cell(self, width: u32, height: u32, rng: &mut impl Rng) -> Coord {
        match self {
            Edge::Left => (0, rng.gen_range(0..height)),
            Edge::Right => (width - 1, rng.gen_range(0..height)),
            Edge::Top => (rng.gen_range(0..width), 0),
            Edge::Bottom => (rng.gen_range(0..width), height - 1),
        }
    }
}

/// Ставит до `count` входов на границу поселения на расстоянии не меньше
/// `road_entries.min_distance` друг от друга
pub(crate) fn place_village_entries(layout: &mut Layout<'_>, count: u32, rng: &mut impl Rng) -> Vec<Coord> {
    let candidates = cells_of(&layout.map, &[CellState::Border]);
    let min_distance = layout.settings.road_entries.min_distance;
    let mut placed: Vec<Coord> = Vec::new();
    if candidates.is_empty() {
        log::warn!("Граница поселения пуста, входы не построены");
        return placed;
    }

    let mut iterations = 0;
    while iterations < layout.settings.max_iterations && (placed.len() as u32) < count {
        iterations += 1;
        let Some(&pos) = candidates.choose(rng) else {
            break;
        };
        if !placed.contains(&pos) && nearest_distance(pos, &placed, min_distance) >= min_distance {
            layout.map[pos] = CellState::VillageRoadEntry;
            placed.push(pos);
        }
    }
    if (placed.len() as u32) < count {
        log::warn!("Поставлено входов в поселение: {} из {count}", placed.len());
    }
    placed
}

/// Ставит `count` входов на края карты; края перебираются по кругу
/// в случайном порядке, вход допустим, если средняя крутизна его блока
/// ниже верхней границы
pub(crate) fn place_map_entries(layout: &mut Layout<'_>, count: u32, rng: &mut impl Rng) -> Vec<Coord> {
    let (width, height) = (layout.map.width(), layout.map.height());
    let mut edges: Vec<Edge> = (0..count).map(Edge::from_index).collect();
    edges.shuffle(rng);

    let mut placed = Vec::new();
    for edge in edges {
        let found = (0..layout.settings.max_iterations)
            .map(|_| edge.random_cell(width, height, rng))
            .find(|&pos| {
                let block = layout.blocks.block_of(pos);
                layout.terrain.steepness.block_mean(&layout.blocks, block) < layout.settings.steepness.max
            });
        match found {
            Some(pos) => {
                layout.map[pos] = CellState::MapRoadEntry;
                placed.push(pos);
            }
            None => log::warn!("Край {edge:?}: не найдено пологое место для входа"),
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettlementSettings;
    use crate::grid::{BlockLayout, Grid, distance};
    use crate::settlement::SettlementTerrain;
    use crate::water::WaterDistance;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        heights: Grid<f32>,
        steepness: Grid<f32>,
        water: WaterDistance,
        settings: SettlementSettings,
    }

    impl Fixture {
        fn new(steepness: f32) -> Self {
            Self {
                heights: Grid::new(30, 30, 0.5),
                steepness: Grid::new(30, 30, steepness),
                water: WaterDistance::compute(&Grid::new(30, 30, false)),
                settings: SettlementSettings::default(),
            }
        }

        fn layout(&self) -> Layout<'_> {
            let mut map = Grid::new(30, 30, CellState::Outside);
            for x in 8..22 {
                map[(x, 8)] = CellState::Border;
                map[(x, 21)] = CellState::Border;
            }
            Layout {
                map,
                terrain: SettlementTerrain {
                    heights: &self.heights,
                    steepness: &self.steepness,
                    water: &self.water,
                },
                settings: &self.settings,
                blocks: BlockLayout::new(30, 30, 5).unwrap(),
                first_poi_connected: false,
            }
        }
    }

    #[test]
    fn village_entries_keep_their_distance() {
        let fixture = Fixture::new(0.1);
        let mut layout = fixture.layout();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let entries = place_village_entries(&mut layout, 3, &mut rng);
        assert_eq!(entries.len(), 3);
        for (i, &a) in entries.iter().enumerate() {
            assert_eq!(layout.map[a], CellState::VillageRoadEntry);
            for &b in &entries[i + 1..] {
                assert!(distance(a, b) >= fixture.settings.road_entries.min_distance);
            }
        }
    }

    #[test]
    fn map_entries_lie_on_edges() {
        let fixture = Fixture::new(0.1);
        let mut layout = fixture.layout();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let entries = place_map_entries(&mut layout, 5, &mut rng);
        assert_eq!(entries.len(), 5);
        for (x, y) in entries {
            assert!(x == 0 || y == 0 || x == 29 || y == 29);
        }
    }

    #[test]
    fn steep_edges_get_no_entries() {
        let fixture = Fixture::new(0.9);
        let mut layout = fixture.layout();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(place_map_entries(&mut layout, 4, &mut rng).is_empty());
        assert!(cells_of(&layout.map, &[CellState::MapRoadEntry]).is_empty());
    }
}
