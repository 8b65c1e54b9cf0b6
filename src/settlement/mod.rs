// src/settlement/mod.rs
//! Планировка поселения
//!
//! Поселение строится строго по шагам, каждый поиск ограничен
//! `max_iterations` попыток. Исчерпание попыток не ошибка: шаг логируется,
//! и генерация продолжается с тем, что удалось построить.
//!
//! 1. [`area`] — зерно и рост области кольцами до заданного радиуса
//! 2. [`entries`] — входы дорог на границе поселения и на краях карты
//! 3. [`seeding`] — храмы и укрепления на возвышенностях, затем дома
//!    по функции привлекательности; каждое здание сразу подключается дорогой
//! 4. [`roads`] — подключение входов, кольцевые дороги, прореживание
//!    и загородные дороги на уменьшенной сетке
//! 5. [`street`], [`png`] — маска улиц и экспорт
//!
//! Все дороги прокладываются через [`path::shortest_path`].

pub mod area;
pub mod entries;
pub mod path;
pub mod png;
pub mod roads;
pub mod seeding;
pub mod street;

use crate::config::SettlementSettings;
use crate::error::Result;
use crate::grid::{BlockLayout, Coord, Grid, NEIGHBORS_8, distance};
use crate::water::WaterDistance;
use path::{CostField, shortest_path};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Роль ячейки в планировке поселения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Outside,
    StandardArea,
    Border,
    VillageRoadEntry,
    MapRoadEntry,
    HouseSeed,
    Road,
    ReligiousSeed,
    FortificationSeed,
}

impl CellState {
    /// Участвует ли ячейка в дорожной сети (для прореживания дорог)
    #[must_use]
    pub fn is_connected_structure(self) -> bool {
        matches!(
            self,
            CellState::Road
                | CellState::HouseSeed
                | CellState::ReligiousSeed
                | CellState::FortificationSeed
                | CellState::VillageRoadEntry
        )
    }

    /// Дорога или вход в поселение (на маске улиц это дорога)
    #[must_use]
    pub fn is_street(self) -> bool {
        matches!(self, CellState::Road | CellState::VillageRoadEntry)
    }
}

/// Рельеф, на котором строится поселение
#[derive(Debug, Clone, Copy)]
pub struct SettlementTerrain<'a> {
    pub heights: &'a Grid<f32>,
    pub steepness: &'a Grid<f32>,
    pub water: &'a WaterDistance,
}

impl SettlementTerrain<'_> {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.heights.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.heights.height()
    }

    /// Годится ли ячейка для застройки по крутизне и расстоянию до воды
    #[must_use]
    pub fn is_buildable(&self, pos: Coord, settings: &SettlementSettings) -> bool {
        let Some(&steepness) = self.steepness.get(pos.0, pos.1) else {
            return false;
        };
        settings.steepness.contains(steepness)
            && (!self.water.has_water() || settings.water_distance.contains(self.water.get(pos)))
    }
}

/// Результат планировки
#[derive(Debug, Clone)]
pub struct Settlement {
    pub map: Grid<CellState>,
    /// Уменьшенная карта, на которой прокладывались загородные дороги
    pub low_res: Grid<CellState>,
    pub seed: Option<Coord>,
    pub radius: u32,
    /// Загородные дороги в координатах уменьшенной сетки
    pub country_roads: Vec<Vec<Coord>>,
    /// Область достигла минимального размера
    pub complete: bool,
}

impl Settlement {
    #[must_use]
    pub fn count(&self, state: CellState) -> usize {
        self.map.data().iter().filter(|&&s| s == state).count()
    }
}

/// Все ячейки с одним из состояний, построчно
pub(crate) fn cells_of(map: &Grid<CellState>, states: &[CellState]) -> Vec<Coord> {
    map.positions_where(|s| states.contains(s))
}

/// Ближайшая ячейка с одним из состояний; при равенстве — первая построчно
pub(crate) fn closest_of(map: &Grid<CellState>, pos: Coord, states: &[CellState]) -> Option<Coord> {
    cells_of(map, states)
        .into_iter()
        .fold(None, |best: Option<(Coord, f32)>, c| {
            let d = distance(pos, c);
            match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((c, d)),
            }
        })
        .map(|(c, _)| c)
}

pub(crate) fn farthest_of(map: &Grid<CellState>, pos: Coord, states: &[CellState]) -> Option<Coord> {
    cells_of(map, states)
        .into_iter()
        .fold(None, |best: Option<(Coord, f32)>, c| {
            let d = distance(pos, c);
            match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((c, d)),
            }
        })
        .map(|(c, _)| c)
}

/// Расстояние до ближайшей из точек; `default`, если точек нет
pub(crate) fn nearest_distance(pos: Coord, points: &[Coord], default: f32) -> f32 {
    points
        .iter()
        .map(|&p| distance(pos, p))
        .reduce(f32::min)
        .unwrap_or(default)
}

pub(crate) fn has_neighbor(map: &Grid<CellState>, pos: Coord, state: CellState) -> bool {
    map.neighbors(pos, &NEIGHBORS_8).any(|n| map[n] == state)
}

/// Изменяемое состояние планировки, общее для всех шагов
pub(crate) struct Layout<'a> {
    pub map: Grid<CellState>,
    pub terrain: SettlementTerrain<'a>,
    pub settings: &'a SettlementSettings,
    pub blocks: BlockLayout,
    /// Первый POI подключается к самому дальнему входу
    pub first_poi_connected: bool,
}

impl<'a> Layout<'a> {
    pub fn cost_field(&self, road_weight: f32) -> CostField<'a> {
        CostField {
            steepness: self.terrain.steepness,
            water: &self.terrain.water.grid,
            road_weight,
            steepness_band: Some(self.settings.steepness),
        }
    }

    /// Прокладывает дорогу по области поселения; возвращает длину пути
    pub fn connect(&mut self, from: Coord, to: Coord, road_weight: f32) -> usize {
        let field = self.cost_field(road_weight);
        let path = shortest_path(
            &self.map,
            &field,
            from,
            to,
            &[CellState::StandardArea, CellState::Road],
        );
        for &p in &path {
            self.map[p] = CellState::Road;
        }
        path.len()
    }
}

/// Строит поселение на готовом рельефе.
///
/// Ошибка возвращается только при некорректных параметрах разрешения;
/// неудачные поиски дают частичный результат с `complete == false`.
pub fn generate_settlement(
    terrain: SettlementTerrain<'_>,
    settings: &SettlementSettings,
    rng: &mut impl Rng,
) -> Result<Settlement> {
    let blocks = BlockLayout::new(terrain.width(), terrain.height(), settings.resolution_divider)?;

    let Some(area) = area::grow_area(&terrain, settings, rng) else {
        log::warn!("Поселение не построено: не найдено подходящее место");
        let map = Grid::new(terrain.width(), terrain.height(), CellState::Outside);
        let low_res = roads::low_res_settlement(&map, &blocks);
        return Ok(Settlement {
            map,
            low_res,
            seed: None,
            radius: 0,
            country_roads: Vec::new(),
            complete: false,
        });
    };
    log::info!(
        "Область поселения: зерно {:?}, радиус {}, {} ячеек",
        area.seed,
        area.radius,
        area.size
    );

    let mut layout = Layout {
        map: area.map,
        terrain,
        settings,
        blocks,
        first_poi_connected: false,
    };

    let entry_count = rng.gen_range(settings.road_entries.min..=settings.road_entries.max);
    let village_entries = entries::place_village_entries(&mut layout, entry_count, rng);
    let map_entries = entries::place_map_entries(&mut layout, entry_count, rng);
    log::info!(
        "Входы: {} в поселении, {} на краях карты",
        village_entries.len(),
        map_entries.len()
    );

    seeding::seed_pois(&mut layout, CellState::ReligiousSeed, settings.religious, rng);
    seeding::seed_pois(&mut layout, CellState::FortificationSeed, settings.fortifications, rng);
    roads::connect_entries(&mut layout);
    let houses = seeding::seed_houses(&mut layout, rng);
    log::info!("Дома: {houses}");

    if settings.road_cycles {
        let cycles = roads::build_road_cycles(&mut layout);
        log::info!("Кольцевые дороги: {cycles}");
    }
    if settings.thin_roads {
        roads::thin_roads(&mut layout.map);
    }

    let (low_res, country_roads) = roads::country_roads(&mut layout);

    Ok(Settlement {
        map: layout.map,
        low_res,
        seed: Some(area.seed),
        radius: area.radius,
        country_roads,
        complete: area.satisfied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_prefers_first_in_row_order_on_ties() {
        let mut map = Grid::new(5, 5, CellState::Outside);
        map[(1, 2)] = CellState::Road;
        map[(3, 2)] = CellState::Road;
        assert_eq!(closest_of(&map, (2, 2), &[CellState::Road]), Some((1, 2)));
        assert_eq!(closest_of(&map, (2, 2), &[CellState::HouseSeed]), None);
    }

    #[test]
    fn farthest_picks_the_most_distant_cell() {
        let mut map = Grid::new(6, 6, CellState::Outside);
        map[(1, 1)] = CellState::VillageRoadEntry;
        map[(5, 5)] = CellState::VillageRoadEntry;
        assert_eq!(
            farthest_of(&map, (0, 0), &[CellState::VillageRoadEntry]),
            Some((5, 5))
        );
    }

    #[test]
    fn nearest_distance_defaults_without_points() {
        assert_eq!(nearest_distance((0, 0), &[], 7.0), 7.0);
        assert_eq!(nearest_distance((0, 0), &[(3, 4), (6, 8)], 7.0), 5.0);
    }
}
