// src/settlement/roads.rs
//! Дорожная сеть: подключение входов, кольца, прореживание, загородные дороги

use super::path::{CostField, shortest_path};
use super::{CellState, Layout, cells_of, closest_of, has_neighbor};
use crate::grid::{BlockLayout, Coord, Grid, NEIGHBORS_8, distance, lerp};

/// Доля диапазона крутизны, задающая цену существующей дороги для колец
const CYCLE_ROAD_WEIGHT: f32 = 0.4;
/// Допустимое число посторонних дорог рядом с новым кольцом
const MAX_UNRELATED_ROADS: usize = 2;

/// Входы без соседней дороги подключаются к ближайшей дороге
pub(crate) fn connect_entries(layout: &mut Layout<'_>) {
    for entry in cells_of(&layout.map, &[CellState::VillageRoadEntry]) {
        if has_neighbor(&layout.map, entry, CellState::Road) {
            continue;
        }
        if let Some(road) = closest_of(&layout.map, entry, &[CellState::Road]) {
            layout.connect(entry, road, layout.settings.road_weight);
        }
    }
}

/// Угол между векторами в градусах
fn angle_between(a: (f32, f32), b: (f32, f32)) -> f32 {
    let norm = (a.0.hypot(a.1)) * (b.0.hypot(b.1));
    if norm <= f32::EPSILON {
        return 0.0;
    }
    ((a.0 * b.0 + a.1 * b.1) / norm).clamp(-1.0, 1.0).acos().to_degrees()
}

fn delta(from: Coord, to: Coord) -> (f32, f32) {
    (to.0 as f32 - from.0 as f32, to.1 as f32 - from.1 as f32)
}

/// Ближайшая дорога в конусе с вершиной в `origin` вдоль `direction`
fn closest_road_in_cone(map: &Grid<CellState>, origin: Coord, direction: (f32, f32), cone: f32) -> Option<Coord> {
    cells_of(map, &[CellState::Road])
        .into_iter()
        .filter(|&r| angle_between(direction, delta(origin, r)) < cone)
        .fold(None, |best: Option<(Coord, f32)>, r| {
            let d = distance(origin, r);
            match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((r, d)),
            }
        })
        .map(|(r, _)| r)
}

/// Сколько соседей-дорог у клеток пути не принадлежат самому пути
fn unrelated_road_neighbors(map: &Grid<CellState>, path: &[Coord]) -> usize {
    path.iter()
        .map(|&p| {
            map.neighbors(p, &NEIGHBORS_8)
                .filter(|n| map[*n] == CellState::Road && !path.contains(n))
                .count()
        })
        .sum()
}

/// Замыкает тупики: от дома с единственной соседней дорогой
/// строится путь вперёд к ближайшей дороге в конусе направлений.
///
/// Путь принимается, если он не короче `min_road_cycle_length` и почти
/// не касается посторонних дорог. Возвращает число построенных колец.
pub(crate) fn build_road_cycles(layout: &mut Layout<'_>) -> usize {
    let s = layout.settings;
    let weight = lerp(s.steepness.min, s.steepness.max, CYCLE_ROAD_WEIGHT);
    let mut built = 0;

    for house in cells_of(&layout.map, &[CellState::HouseSeed]) {
        let roads: Vec<Coord> = layout
            .map
            .neighbors(house, &NEIGHBORS_8)
            .filter(|&n| layout.map[n] == CellState::Road)
            .collect();
        let [road] = roads[..] else {
            continue;
        };
        let direction = delta(road, house);
        let Some(target) = closest_road_in_cone(&layout.map, house, direction, s.road_cycle_angle) else {
            continue;
        };

        let field = layout.cost_field(weight);
        let path = shortest_path(
            &layout.map,
            &field,
            road,
            target,
            &[CellState::StandardArea, CellState::Road],
        );
        if path.is_empty() || path.len() < s.min_road_cycle_length {
            continue;
        }
        if unrelated_road_neighbors(&layout.map, &path) > MAX_UNRELATED_ROADS {
            continue;
        }
        for &p in &path {
            layout.map[p] = CellState::Road;
        }
        built += 1;
    }
    built
}

/// Убирает лишние клетки дорог.
///
/// Дорога с одним соседом-сооружением или без них становится обычной
/// областью. Иначе клетка удаляется, если все её соседи-сооружения
/// связаны между собой и без неё.
pub fn thin_roads(map: &mut Grid<CellState>) {
    for pos in map.positions_where(|&s| s == CellState::Road) {
        let structures: Vec<Coord> = map
            .neighbors(pos, &NEIGHBORS_8)
            .filter(|&n| map[n].is_connected_structure())
            .collect();
        if structures.len() <= 1 {
            map[pos] = CellState::StandardArea;
            continue;
        }
        let isolated = structures.iter().any(|&a| {
            !structures
                .iter()
                .any(|&b| a != b && a.0.abs_diff(b.0) <= 1 && a.1.abs_diff(b.1) <= 1)
        });
        if !isolated {
            map[pos] = CellState::StandardArea;
        }
    }
}

/// Уменьшенная карта поселения.
///
/// Блок с входом получает его состояние (первый найденный построчно),
/// иначе блок вне поселения, если внешних ячеек больше, чем внутренних.
#[must_use]
pub fn low_res_settlement(map: &Grid<CellState>, blocks: &BlockLayout) -> Grid<CellState> {
    Grid::from_fn(blocks.width(), blocks.height(), |bx, by| {
        let (xs, ys) = blocks.block_range((bx, by));
        let mut outside = 0;
        let mut inside = 0;
        for y in ys {
            for x in xs.clone() {
                match map[(x, y)] {
                    s @ (CellState::VillageRoadEntry | CellState::MapRoadEntry) => return s,
                    CellState::Outside => outside += 1,
                    _ => inside += 1,
                }
            }
        }
        if outside > inside {
            CellState::Outside
        } else {
            CellState::StandardArea
        }
    })
}

/// Уменьшенное поле расстояний до воды: значение в начале блока,
/// расстояния меньше размера блока считаются водой
#[must_use]
pub fn low_res_water(water: &Grid<i32>, blocks: &BlockLayout) -> Grid<i32> {
    let k = blocks.factor() as i32;
    Grid::from_fn(blocks.width(), blocks.height(), |bx, by| {
        let d = water[blocks.block_origin((bx, by))];
        if d < 0 {
            d
        } else if d < k {
            0
        } else {
            d
        }
    })
}

/// Шаг за шагом к цели по соседу, ближайшему к ней; проходя вне зданий,
/// ставит дорогу
pub fn step_towards(map: &mut Grid<CellState>, start: Coord, end: Coord) {
    let mut current = start;
    // каждый шаг строго сокращает расстояние, предел — страховка от зацикливания
    for _ in 0..map.len() {
        if current == end {
            return;
        }
        let mut next = current;
        let mut best = f32::INFINITY;
        for n in map.neighbors(current, &NEIGHBORS_8) {
            let d = distance(n, end);
            if d < best {
                best = d;
                next = n;
            }
        }
        if matches!(
            map[next],
            CellState::Outside | CellState::StandardArea | CellState::Border
        ) {
            map[next] = CellState::Road;
        }
        current = next;
    }
}

/// Переносит загородную дорогу с уменьшенной сетки на полную: вход
/// поселения → центры блоков по порядку → вход на краю карты
fn project_road(map: &mut Grid<CellState>, road: &[Coord], blocks: &BlockLayout) {
    let centers: Vec<Coord> = road.iter().map(|&b| blocks.block_center(b)).collect();
    let (Some(&first), Some(&last)) = (centers.first(), centers.last()) else {
        return;
    };
    if let Some(entry) = closest_of(map, first, &[CellState::VillageRoadEntry]) {
        step_towards(map, entry, first);
    }
    for pair in centers.windows(2) {
        step_towards(map, pair[0], pair[1]);
    }
    if let Some(entry) = closest_of(map, last, &[CellState::MapRoadEntry]) {
        step_towards(map, entry, last);
    }
}

/// Загородные дороги: входы поселения попарно соединяются со входами на
/// краях карты по уменьшенной сетке, затем дороги переносятся на полную карту.
///
/// Возвращает уменьшенную карту с дорогами и сами дороги в её координатах.
pub(crate) fn country_roads(layout: &mut Layout<'_>) -> (Grid<CellState>, Vec<Vec<Coord>>) {
    let blocks = layout.blocks;
    let mut low = low_res_settlement(&layout.map, &blocks);
    let steepness = layout.terrain.steepness.downsample_mean(&blocks);
    let water = low_res_water(&layout.terrain.water.grid, &blocks);
    let field = CostField {
        steepness: &steepness,
        water: &water,
        road_weight: 0.0,
        steepness_band: Some(layout.settings.steepness),
    };

    let village = cells_of(&low, &[CellState::VillageRoadEntry]);
    let edges = cells_of(&low, &[CellState::MapRoadEntry]);
    let mut roads = Vec::new();
    for (&from, &to) in village.iter().zip(&edges) {
        let road = shortest_path(&low, &field, from, to, &[CellState::Outside, CellState::Road]);
        if road.is_empty() {
            log::warn!("Загородная дорога {from:?} → {to:?} не построена");
            continue;
        }
        for &p in &road {
            low[p] = CellState::Road;
        }
        roads.push(road);
    }

    for road in &roads {
        project_road(&mut layout.map, road, &blocks);
    }
    log::info!("Загородные дороги: {} из {}", roads.len(), village.len().min(edges.len()));
    (low, roads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettlementSettings;
    use crate::settlement::SettlementTerrain;
    use crate::water::WaterDistance;

    /// Тупик: дом (4, 9) над дорогой (4, 10), впереди дорога (4, 3).
    /// Пройти можно только коридором x = 5, y ∈ [4, 9].
    struct CycleFixture {
        heights: Grid<f32>,
        steepness: Grid<f32>,
        water: WaterDistance,
        settings: SettlementSettings,
    }

    impl CycleFixture {
        fn new() -> Self {
            Self {
                heights: Grid::new(20, 20, 0.5),
                steepness: Grid::new(20, 20, 0.1),
                water: WaterDistance::compute(&Grid::new(20, 20, false)),
                settings: SettlementSettings {
                    road_cycle_angle: 30.0,
                    ..SettlementSettings::default()
                },
            }
        }

        fn layout(&self) -> Layout<'_> {
            let mut map = Grid::new(20, 20, CellState::Outside);
            for y in 4..10 {
                map[(5, y)] = CellState::StandardArea;
            }
            map[(4, 9)] = CellState::HouseSeed;
            map[(4, 10)] = CellState::Road;
            map[(4, 3)] = CellState::Road;
            Layout {
                map,
                terrain: SettlementTerrain {
                    heights: &self.heights,
                    steepness: &self.steepness,
                    water: &self.water,
                },
                settings: &self.settings,
                blocks: BlockLayout::new(20, 20, 5).unwrap(),
                first_poi_connected: false,
            }
        }
    }

    #[test]
    fn dead_end_house_gets_a_cycle() {
        let fixture = CycleFixture::new();
        let mut layout = fixture.layout();
        assert_eq!(build_road_cycles(&mut layout), 1);
        assert!((4..10).all(|y| layout.map[(5, y)] == CellState::Road));
        assert_eq!(cells_of(&layout.map, &[CellState::Road]).len(), 8);
    }

    #[test]
    fn short_cycle_is_discarded() {
        let mut fixture = CycleFixture::new();
        // путь по коридору — 6 клеток
        fixture.settings.min_road_cycle_length = 7;
        let mut layout = fixture.layout();
        let before = layout.map.clone();
        assert_eq!(build_road_cycles(&mut layout), 0);
        assert_eq!(layout.map, before);
    }

    #[test]
    fn cycle_along_foreign_roads_is_discarded() {
        let fixture = CycleFixture::new();
        let mut layout = fixture.layout();
        // чужая дорога вдоль коридора, вне конуса поиска
        for y in 6..9 {
            layout.map[(6, y)] = CellState::Road;
        }
        let before = layout.map.clone();
        assert_eq!(build_road_cycles(&mut layout), 0);
        assert_eq!(layout.map, before);
    }

    #[test]
    fn angle_between_is_in_degrees() {
        assert!((angle_between((1.0, 0.0), (0.0, 1.0)) - 90.0).abs() < 1e-4);
        assert!(angle_between((1.0, 0.0), (5.0, 0.0)).abs() < 1e-4);
        assert!((angle_between((1.0, 0.0), (-1.0, 0.0)) - 180.0).abs() < 1e-3);
    }

    #[test]
    fn cone_filters_roads_behind() {
        let mut map = Grid::new(10, 10, CellState::StandardArea);
        map[(2, 5)] = CellState::Road;
        map[(8, 5)] = CellState::Road;
        let found = closest_road_in_cone(&map, (4, 5), (1.0, 0.0), 70.0);
        assert_eq!(found, Some((8, 5)));
    }

    #[test]
    fn dead_end_road_is_removed() {
        let mut map = Grid::new(5, 5, CellState::StandardArea);
        map[(2, 2)] = CellState::Road;
        map[(1, 1)] = CellState::HouseSeed;
        thin_roads(&mut map);
        assert_eq!(map[(2, 2)], CellState::StandardArea);
    }

    #[test]
    fn road_between_houses_is_kept() {
        let mut map = Grid::new(5, 5, CellState::StandardArea);
        map[(0, 2)] = CellState::HouseSeed;
        map[(4, 2)] = CellState::HouseSeed;
        for x in 1..4 {
            map[(x, 2)] = CellState::Road;
        }
        thin_roads(&mut map);
        assert!((1..4).all(|x| map[(x, 2)] == CellState::Road));
    }

    #[test]
    fn redundant_corner_is_removed() {
        // угол L-образной дороги: соседи (1, 2) и (2, 1) касаются друг друга
        let mut map = Grid::new(5, 5, CellState::StandardArea);
        map[(0, 2)] = CellState::HouseSeed;
        map[(1, 2)] = CellState::Road;
        map[(2, 2)] = CellState::Road;
        map[(2, 1)] = CellState::Road;
        map[(2, 0)] = CellState::HouseSeed;
        thin_roads(&mut map);
        assert_eq!(map[(2, 2)], CellState::StandardArea);
        assert_eq!(map[(1, 2)], CellState::Road);
        assert_eq!(map[(2, 1)], CellState::Road);
    }

    #[test]
    fn low_res_keeps_entries_and_majority() {
        let mut map = Grid::new(6, 6, CellState::Outside);
        for y in 0..3 {
            for x in 3..6 {
                map[(x, y)] = CellState::StandardArea;
            }
        }
        map[(1, 4)] = CellState::MapRoadEntry;
        let blocks = BlockLayout::new(6, 6, 3).unwrap();
        let low = low_res_settlement(&map, &blocks);
        assert_eq!(low[(0, 0)], CellState::Outside);
        assert_eq!(low[(1, 0)], CellState::StandardArea);
        assert_eq!(low[(0, 1)], CellState::MapRoadEntry);
    }

    #[test]
    fn low_res_water_marks_near_cells_as_water() {
        let water = Grid::from_fn(8, 4, |x, _| x as i32 - 1);
        let blocks = BlockLayout::new(8, 4, 2).unwrap();
        let low = low_res_water(&water, &blocks);
        // начала блоков: x = 0, 2, 4, 6 → -1, 1, 3, 5
        assert_eq!(low[(0, 0)], -1);
        assert_eq!(low[(1, 0)], 0);
        assert_eq!(low[(2, 0)], 3);
        assert_eq!(low[(3, 0)], 5);
    }

    #[test]
    fn stepping_draws_a_diagonal_then_straight_line() {
        let mut map = Grid::new(8, 8, CellState::Outside);
        map[(0, 0)] = CellState::VillageRoadEntry;
        map[(2, 2)] = CellState::HouseSeed;
        step_towards(&mut map, (0, 0), (5, 2));
        assert_eq!(map[(1, 1)], CellState::Road);
        // дом не затирается
        assert_eq!(map[(2, 2)], CellState::HouseSeed);
        assert_eq!(map[(5, 2)], CellState::Road);
        assert_eq!(map[(0, 0)], CellState::VillageRoadEntry);
    }
}
