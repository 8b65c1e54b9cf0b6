// src/climate.rs
//! Климатические зоны на основе взвешенной диаграммы Вороного
//!
//! Каждая ось климата (температура, осадки) строится независимо:
//! 1. Ячейки делятся на регионы по ближайшему центроиду в метрике Минковского.
//!    Пара «ближайший / второй ближайший» центроид даёт ребро графа соседства.
//! 2. Регионам в порядке индексов присваивается уровень интенсивности с учётом
//!    уже назначенных соседей. Это эвристика: соседние регионы всё равно могут
//!    получить одинаковый крайний уровень.
//! 3. Поправки: вершины становятся холоднее, окрестности воды — влажнее.

use crate::grid::{Coord, Grid};
use crate::heightmap::Heightmap;
use crate::water::dilate_mask;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Дискретный уровень климата: 0 — крайний нижний, 1 — средний, 2 — крайний верхний
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Intensity {
    Low = 0,
    Mid = 1,
    High = 2,
}

impl Intensity {
    pub const ALL: [Intensity; 3] = [Intensity::Low, Intensity::Mid, Intensity::High];

    /// Уровень по номеру; значения больше 2 зажимаются
    #[must_use]
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Intensity::Low,
            1 => Intensity::Mid,
            _ => Intensity::High,
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// На уровень ниже, не ниже `Low`
    #[must_use]
    pub fn lowered(self) -> Self {
        Self::from_level(self.level().saturating_sub(1))
    }

    /// На уровень выше, не выше `High`
    #[must_use]
    pub fn raised(self) -> Self {
        Self::from_level(self.level() + 1)
    }
}

/// Ось климата
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateAxis {
    Temperature,
    Precipitation,
}

/// Обобщённое расстояние `(|dx|^λ + |dy|^λ)^(1/λ)`
#[must_use]
pub fn minkowski_distance(a: Coord, b: Coord, lambda: f32) -> f32 {
    let dx = (a.0 as f32 - b.0 as f32).abs();
    let dy = (a.1 as f32 - b.1 as f32).abs();
    (dx.powf(lambda) + dy.powf(lambda)).powf(1.0 / lambda)
}

/// Случайные центроиды, равномерно по всей сетке
pub fn random_centroids(count: usize, width: u32, height: u32, rng: &mut impl Rng) -> Vec<Coord> {
    (0..count)
        .map(|_| (rng.gen_range(0..width), rng.gen_range(0..height)))
        .collect()
}

/// Разбиение сетки на регионы и граф их соседства
#[derive(Debug, Clone)]
pub struct RegionMap {
    /// Индекс региона (центроида) для каждой ячейки
    pub regions: Grid<usize>,
    /// Узел `i` — центроид `i`; рёбра только из наблюдённых пар ближайший/второй
    pub adjacency: UnGraph<Coord, ()>,
}

impl RegionMap {
    /// Делит сетку по ближайшему центроиду.
    ///
    /// Без центроидов все ячейки попадают в регион 0, граф пуст.
    #[must_use]
    pub fn partition(width: u32, height: u32, centroids: &[Coord], lambda: f32) -> Self {
        let mut adjacency = UnGraph::with_capacity(centroids.len(), centroids.len() * 3);
        for &c in centroids {
            adjacency.add_node(c);
        }

        let nearest = Grid::par_from_fn(width, height, |x, y| {
            nearest_two(centroids, (x, y), lambda)
        });

        for &(first, second) in nearest.data() {
            if let Some(second) = second {
                adjacency.update_edge(NodeIndex::new(first), NodeIndex::new(second), ());
            }
        }

        Self {
            regions: nearest.map(|&(first, _)| first),
            adjacency,
        }
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.adjacency.node_count()
    }

    /// Соседи региона в графе (порядок не определён)
    pub fn neighbors(&self, region: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency
            .neighbors(NodeIndex::new(region))
            .map(NodeIndex::index)
    }

    #[must_use]
    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .is_some()
    }
}

/// Ближайший и второй ближайший центроид; при равенстве выигрывает меньший индекс
fn nearest_two(centroids: &[Coord], pos: Coord, lambda: f32) -> (usize, Option<usize>) {
    let mut first: Option<(usize, f32)> = None;
    let mut second: Option<(usize, f32)> = None;
    for (i, &c) in centroids.iter().enumerate() {
        let d = minkowski_distance(pos, c, lambda);
        match first {
            Some((_, fd)) if d >= fd => {
                if second.is_none_or(|(_, sd)| d < sd) {
                    second = Some((i, d));
                }
            }
            _ => {
                second = first;
                first = Some((i, d));
            }
        }
    }
    (first.map_or(0, |(i, _)| i), second.map(|(i, _)| i))
}

/// Какие уровни разрешены региону
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    /// Соседи не держат крайних уровней: выбор между двумя крайними
    Extremes,
    /// У соседей есть `High`: выбор из `Mid`/`High`
    UpperPair,
    /// У соседей есть `Low`: выбор из `Low`/`Mid`
    LowerPair,
}

/// Бросок уровня со смещением к верхнему по среднему значению оси
fn roll_intensity(choice: Choice, average: f32, rng: &mut impl Rng) -> Intensity {
    let die: f32 = rng.r#gen();
    let upper = die >= 1.0 - average;
    match (choice, upper) {
        (Choice::Extremes, false) => Intensity::Low,
        (Choice::Extremes, true) | (Choice::UpperPair, true) => Intensity::High,
        (Choice::UpperPair, false) | (Choice::LowerPair, true) => Intensity::Mid,
        (Choice::LowerPair, false) => Intensity::Low,
    }
}

/// Ограничение по уже назначенным соседям; `None` — соседи держат оба крайних уровня
fn choice_for(neighbours: impl IntoIterator<Item = Intensity>) -> Option<Choice> {
    let (mut has_low, mut has_high) = (false, false);
    for n in neighbours {
        match n {
            Intensity::Low => has_low = true,
            Intensity::High => has_high = true,
            Intensity::Mid => {}
        }
    }
    match (has_low, has_high) {
        (false, false) => Some(Choice::Extremes),
        (false, true) => Some(Choice::UpperPair),
        (true, false) => Some(Choice::LowerPair),
        (true, true) => None,
    }
}

/// Назначает уровни регионам в порядке индексов центроидов
pub fn assign_intensities(map: &RegionMap, average: f32, rng: &mut impl Rng) -> Vec<Intensity> {
    let count = map.region_count();
    let mut assigned: Vec<Option<Intensity>> = vec![None; count];

    for region in 0..count {
        let neighbours = map.neighbors(region).filter_map(|n| assigned[n]);
        let value = match choice_for(neighbours) {
            Some(choice) => roll_intensity(choice, average, rng),
            None => Intensity::Mid,
        };
        assigned[region] = Some(value);
    }

    assigned
        .into_iter()
        .map(|v| v.unwrap_or(Intensity::Mid))
        .collect()
}

/// Климатическая карта одной оси
#[derive(Debug, Clone)]
pub struct ClimateMap {
    pub axis: ClimateAxis,
    pub centroids: Vec<Coord>,
    pub regions: RegionMap,
    /// Уровень каждого региона
    pub region_intensities: Vec<Intensity>,
    pub grid: Grid<Intensity>,
}

impl ClimateMap {
    /// Строит карту оси по готовым центроидам
    pub fn classify(
        axis: ClimateAxis,
        width: u32,
        height: u32,
        centroids: Vec<Coord>,
        lambda: f32,
        average: f32,
        rng: &mut impl Rng,
    ) -> Self {
        let regions = RegionMap::partition(width, height, &centroids, lambda);
        let region_intensities = assign_intensities(&regions, average, rng);
        let grid = regions.regions.map(|&r| {
            region_intensities
                .get(r)
                .copied()
                .unwrap_or(Intensity::Mid)
        });

        log::info!(
            "Климат {axis:?}: {} регионов, {} рёбер соседства",
            regions.region_count(),
            regions.adjacency.edge_count()
        );

        Self {
            axis,
            centroids,
            regions,
            region_intensities,
            grid,
        }
    }
}

/// Вершины выше `max - (max - min) × relative` становятся на уровень холоднее
pub fn apply_mountain_cold(grid: &mut Grid<Intensity>, heightmap: &Heightmap, relative: f32) {
    let limit = heightmap.max - (heightmap.max - heightmap.min) * relative;
    for (value, &h) in grid.data_mut().iter_mut().zip(heightmap.grid.data()) {
        if h > limit {
            *value = value.lowered();
        }
    }
}

/// Вода и её окрестность радиусом `spread` становятся на уровень влажнее
pub fn apply_water_humidity(grid: &mut Grid<Intensity>, water: &Grid<bool>, spread: u32) {
    let humid = dilate_mask(water, spread);
    for (value, &wet) in grid.data_mut().iter_mut().zip(humid.data()) {
        if wet {
            *value = value.raised();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn single_centroid_owns_everything() {
        let map = RegionMap::partition(10, 10, &[(5, 5)], 2.0);
        assert!(map.regions.data().iter().all(|&r| r == 0));
        assert_eq!(map.adjacency.edge_count(), 0);
    }

    #[test]
    fn no_centroids_degenerates_to_region_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let climate = ClimateMap::classify(ClimateAxis::Temperature, 6, 4, Vec::new(), 3.0, 0.5, &mut rng);
        assert!(climate.regions.regions.data().iter().all(|&r| r == 0));
        assert!(climate.grid.data().iter().all(|&i| i == Intensity::Mid));
    }

    #[test]
    fn adjacency_is_symmetric() {
        let map = RegionMap::partition(20, 20, &[(2, 2), (17, 2), (10, 17)], 2.0);
        for a in 0..3 {
            for b in map.neighbors(a) {
                assert!(map.are_adjacent(b, a));
            }
        }
        assert!(map.are_adjacent(0, 1));
    }

    #[test]
    fn minkowski_matches_manhattan_and_euclid() {
        assert!((minkowski_distance((0, 0), (3, 4), 1.0) - 7.0).abs() < 1e-5);
        assert!((minkowski_distance((0, 0), (3, 4), 2.0) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn neighbours_restrict_the_choice() {
        use Intensity::{High, Low, Mid};
        assert_eq!(choice_for(Vec::new()), Some(Choice::Extremes));
        assert_eq!(choice_for([Mid]), Some(Choice::Extremes));
        assert_eq!(choice_for([High, Mid]), Some(Choice::UpperPair));
        assert_eq!(choice_for([Low]), Some(Choice::LowerPair));
        assert_eq!(choice_for([Low, Mid, High]), None);
    }

    #[test]
    fn average_biases_the_roll() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(roll_intensity(Choice::Extremes, 1.0, &mut rng), Intensity::High);
            assert_eq!(roll_intensity(Choice::Extremes, 0.0, &mut rng), Intensity::Low);
            assert_eq!(roll_intensity(Choice::LowerPair, 1.0, &mut rng), Intensity::Mid);
            assert_eq!(roll_intensity(Choice::UpperPair, 0.0, &mut rng), Intensity::Mid);
        }
    }

    #[test]
    fn hot_average_makes_every_region_hot() {
        let map = RegionMap::partition(30, 10, &[(0, 0), (29, 0), (15, 9)], 2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let levels = assign_intensities(&map, 1.0, &mut rng);
        assert_eq!(levels, vec![Intensity::High; 3]);
    }

    #[test]
    fn adjustments_stay_in_range() {
        let heightmap = Heightmap {
            grid: Grid::from_fn(4, 1, |x, _| x as f32),
            min: 0.0,
            max: 3.0,
        };
        let mut temp = Grid::new(4, 1, Intensity::Low);
        for _ in 0..3 {
            apply_mountain_cold(&mut temp, &heightmap, 0.5);
        }
        assert!(temp.data().iter().all(|&t| t == Intensity::Low));

        let mut water = Grid::new(4, 1, false);
        water[(0, 0)] = true;
        let mut prec = Grid::new(4, 1, Intensity::High);
        for _ in 0..3 {
            apply_water_humidity(&mut prec, &water, 1);
        }
        assert!(prec.data().iter().all(|&p| p == Intensity::High));
    }

    #[test]
    fn cold_applies_only_above_limit() {
        let heightmap = Heightmap {
            grid: Grid::from_fn(4, 1, |x, _| x as f32),
            min: 0.0,
            max: 3.0,
        };
        let mut temp = Grid::new(4, 1, Intensity::High);
        apply_mountain_cold(&mut temp, &heightmap, 0.5);
        let levels: Vec<u8> = temp.data().iter().map(|t| t.level()).collect();
        assert_eq!(levels, vec![2, 2, 1, 1]);
    }
}
