// src/settlement/area.rs
//! Область поселения: зерно и рост кольцами
//!
//! Ближняя половина колец растёт по 8 соседям, дальняя по 4, что даёт
//! форму между квадратом и ромбом. Последнее кольцо помечается границей.

use super::{CellState, SettlementTerrain};
use crate::config::SettlementSettings;
use crate::grid::{Coord, Grid, NEIGHBORS_4, NEIGHBORS_8};
use rand::Rng;

/// Отступ от краёв карты, внутри которого поселение не строится
pub const EDGE_MARGIN: u32 = 5;

/// Итог роста области
#[derive(Debug, Clone)]
pub struct AreaOutcome {
    pub map: Grid<CellState>,
    pub seed: Coord,
    pub radius: u32,
    /// Число ячеек области вместе с зерном
    pub size: u32,
    /// Достигнут минимальный размер
    pub satisfied: bool,
}

/// Площадь ромба радиуса `radius` (ширина `2r + 1`)
#[must_use]
pub fn max_diamond_area(radius: u32) -> u32 {
    let diameter = 2 * radius + 1;
    let half: u32 = (1..=diameter.saturating_sub(2)).rev().step_by(2).sum();
    2 * half + diameter
}

fn inside_margin(terrain: &SettlementTerrain<'_>, pos: Coord) -> bool {
    pos.0 >= EDGE_MARGIN
        && pos.1 >= EDGE_MARGIN
        && pos.0 < terrain.width().saturating_sub(EDGE_MARGIN)
        && pos.1 < terrain.height().saturating_sub(EDGE_MARGIN)
}

/// Случайное зерно, подходящее по крутизне и расстоянию до воды
fn pick_seed(
    terrain: &SettlementTerrain<'_>,
    settings: &SettlementSettings,
    rng: &mut impl Rng,
) -> Option<Coord> {
    let x_end = terrain.width().saturating_sub(EDGE_MARGIN);
    let y_end = terrain.height().saturating_sub(EDGE_MARGIN);
    if x_end <= EDGE_MARGIN || y_end <= EDGE_MARGIN {
        log::warn!(
            "Карта {}×{} слишком мала для поселения",
            terrain.width(),
            terrain.height()
        );
        return None;
    }
    (0..settings.max_iterations)
        .map(|_| (rng.gen_range(EDGE_MARGIN..x_end), rng.gen_range(EDGE_MARGIN..y_end)))
        .find(|&pos| terrain.is_buildable(pos, settings))
}

/// Выращивает область вокруг зерна; возвращает число ячеек с зерном
pub fn grow(
    map: &mut Grid<CellState>,
    seed: Coord,
    radius: u32,
    terrain: &SettlementTerrain<'_>,
    settings: &SettlementSettings,
) -> u32 {
    map[seed] = CellState::StandardArea;
    let mut size = 1;
    for ring in 0..radius {
        let offsets: &[(i32, i32)] = if ring <= radius / 2 {
            &NEIGHBORS_8
        } else {
            &NEIGHBORS_4
        };
        let state = if ring + 1 < radius {
            CellState::StandardArea
        } else {
            CellState::Border
        };
        let snapshot = map.clone();
        for pos in snapshot.positions_where(|&s| s == CellState::StandardArea) {
            for n in snapshot.neighbors(pos, offsets) {
                if map[n] == CellState::Outside
                    && inside_margin(terrain, n)
                    && terrain.is_buildable(n, settings)
                {
                    map[n] = state;
                    size += 1;
                }
            }
        }
    }
    size
}

/// Ищет место для поселения.
///
/// Радиус выбирается один раз; затем до `max_iterations` раз выбирается
/// зерно и выращивается область. Если ни одна попытка не достигла
/// минимального размера, возвращается самая большая. Неудачный поиск
/// зерна завершает перебор, но уже выращенные области не теряются;
/// `None` только если зерно не нашлось ни разу.
pub fn grow_area(
    terrain: &SettlementTerrain<'_>,
    settings: &SettlementSettings,
    rng: &mut impl Rng,
) -> Option<AreaOutcome> {
    let radius = rng.gen_range(settings.radius.min..=settings.radius.max);
    let min_size = (max_diamond_area(radius) as f32 * settings.relative_min_size) as u32;
    log::debug!("Радиус поселения {radius}, минимальный размер {min_size}");

    let mut best: Option<AreaOutcome> = None;
    for _ in 0..settings.max_iterations {
        let Some(seed) = pick_seed(terrain, settings, rng) else {
            break;
        };
        let mut map = Grid::new(terrain.width(), terrain.height(), CellState::Outside);
        let size = grow(&mut map, seed, radius, terrain, settings);
        let outcome = AreaOutcome {
            map,
            seed,
            radius,
            size,
            satisfied: size >= min_size,
        };
        if outcome.satisfied {
            return Some(outcome);
        }
        if best.as_ref().is_none_or(|b| b.size < size) {
            best = Some(outcome);
        }
    }

    match &best {
        Some(b) => log::warn!(
            "Поселение: область не достигла {min_size} ячеек, берём наибольшую ({})",
            b.size
        ),
        None => log::warn!("Поселение: не найдено ни одного подходящего зерна"),
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::water::WaterDistance;
    use crate::config::Span;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Выдаёт заданные `next_u32` по порядку, затем повторяет `tail`
    struct Scripted {
        head: Vec<u32>,
        tail: u32,
    }

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            if self.head.is_empty() {
                self.tail
            } else {
                self.head.remove(0)
            }
        }

        fn next_u64(&mut self) -> u64 {
            u64::from(self.next_u32())
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(4) {
                let bytes = self.next_u32().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    struct Flat {
        heights: Grid<f32>,
        steepness: Grid<f32>,
        water: WaterDistance,
    }

    impl Flat {
        fn new(size: u32) -> Self {
            Self {
                heights: Grid::new(size, size, 0.5),
                steepness: Grid::new(size, size, 0.1),
                water: WaterDistance::compute(&Grid::new(size, size, false)),
            }
        }

        fn terrain(&self) -> SettlementTerrain<'_> {
            SettlementTerrain {
                heights: &self.heights,
                steepness: &self.steepness,
                water: &self.water,
            }
        }
    }

    #[test]
    fn diamond_area_matches_cell_count() {
        assert_eq!(max_diamond_area(0), 1);
        assert_eq!(max_diamond_area(1), 5);
        assert_eq!(max_diamond_area(2), 13);
        assert_eq!(max_diamond_area(3), 25);
    }

    #[test]
    fn last_ring_is_border() {
        let flat = Flat::new(40);
        let settings = SettlementSettings::default();
        let mut map = Grid::new(40, 40, CellState::Outside);
        let size = grow(&mut map, (20, 20), 4, &flat.terrain(), &settings);

        let border = map.positions_where(|&s| s == CellState::Border);
        let area = map.positions_where(|&s| s == CellState::StandardArea);
        assert_eq!(size as usize, border.len() + area.len());
        assert!(!border.is_empty());
        // три 8-связных кольца дают квадрат 7×7, четвёртое (4-связное) — граница
        assert!(area.contains(&(18, 18)));
        assert!(area.iter().all(|&(x, y)| x.abs_diff(20) <= 3 && y.abs_diff(20) <= 3));
    }

    #[test]
    fn growth_stops_at_the_margin() {
        let flat = Flat::new(14);
        let settings = SettlementSettings::default();
        let mut map = Grid::new(14, 14, CellState::Outside);
        grow(&mut map, (6, 6), 6, &flat.terrain(), &settings);
        for pos in map.positions_where(|&s| s != CellState::Outside) {
            assert!((EDGE_MARGIN..14 - EDGE_MARGIN).contains(&pos.0));
            assert!((EDGE_MARGIN..14 - EDGE_MARGIN).contains(&pos.1));
        }
    }

    #[test]
    fn steep_terrain_yields_nothing() {
        let mut flat = Flat::new(30);
        flat.steepness = Grid::new(30, 30, 0.9);
        let settings = SettlementSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(grow_area(&flat.terrain(), &settings, &mut rng).is_none());
    }

    #[test]
    fn flat_terrain_satisfies_minimum() {
        let flat = Flat::new(60);
        let settings = SettlementSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let outcome = grow_area(&flat.terrain(), &settings, &mut rng).unwrap();
        assert!(outcome.satisfied);
        assert!(settings.radius.contains(outcome.radius));
        assert_eq!(outcome.map[outcome.seed], CellState::StandardArea);
    }

    #[test]
    fn growth_never_leaves_the_radius() {
        let flat = Flat::new(40);
        let settings = SettlementSettings::default();
        for radius in 1..=6 {
            let mut map = Grid::new(40, 40, CellState::Outside);
            grow(&mut map, (20, 20), radius, &flat.terrain(), &settings);
            for pos in map.positions_where(|&s| s != CellState::Outside) {
                let reach = pos.0.abs_diff(20).max(pos.1.abs_diff(20));
                assert!(reach <= radius, "радиус {radius}: {pos:?}");
                if radius >= 2 && reach == 1 {
                    assert_eq!(map[pos], CellState::StandardArea);
                }
            }
        }
    }

    #[test]
    fn failed_seed_search_keeps_the_largest_attempt() {
        // строить можно только в (5, 5); поле зерна 12×12 — это [5, 7)²
        let mut flat = Flat::new(12);
        flat.steepness = Grid::from_fn(12, 12, |x, y| if (x, y) == (5, 5) { 0.1 } else { 0.9 });
        let settings = SettlementSettings {
            max_iterations: 3,
            radius: Span::new(1, 1),
            relative_min_size: 1.0,
            ..SettlementSettings::default()
        };
        // радиус, затем первое зерно (5, 5); дальше всегда (6, 6)
        let mut rng = Scripted {
            head: vec![0, 0, 0],
            tail: 0x8000_0000,
        };
        let outcome = grow_area(&flat.terrain(), &settings, &mut rng).unwrap();
        assert_eq!(outcome.seed, (5, 5));
        assert_eq!(outcome.size, 1);
        assert!(!outcome.satisfied);
    }
}
