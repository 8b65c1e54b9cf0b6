// src/settlement/seeding.rs
//! Здания: храмы и укрепления на возвышенностях, дома по привлекательности
//!
//! Каждое поставленное здание сразу подключается дорогой, поэтому следующие
//! здания уже видят сеть дорог при оценке места.

use super::{CellState, Layout, cells_of, closest_of, farthest_of, nearest_distance};
use crate::config::{InterestCurve, PointCount};
use crate::grid::{Coord, distance, inverse_lerp};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Доля оценки, которую даёт близость к доминанте
const DOMINATION_BONUS: f32 = 0.3;
/// Нижняя граница средней оценки ненулевого места
const INTEREST_FLOOR: f32 = 0.2;

/// `ceil(n × fraction)` самых высоких ячеек из `candidates`
fn highest_cells(layout: &Layout<'_>, candidates: &[Coord], fraction: f32) -> HashSet<Coord> {
    let keep = (candidates.len() as f32 * fraction).ceil() as usize;
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|&a, &b| layout.terrain.heights[b].total_cmp(&layout.terrain.heights[a]));
    sorted.into_iter().take(keep).collect()
}

/// Подключает доминанту к сети дорог.
///
/// Первая доминанта соединяется с самым дальним входом, чтобы дорога прошла
/// через всё поселение. Остальные с ближайшей дорогой или входом; если
/// ближайшим оказался вход, дополнительно строится путь к ближайшей дороге.
fn connect_poi(layout: &mut Layout<'_>, poi: Coord) {
    let weight = layout.settings.road_weight;
    if !layout.first_poi_connected {
        layout.first_poi_connected = true;
        match farthest_of(&layout.map, poi, &[CellState::VillageRoadEntry]) {
            Some(entry) => {
                layout.connect(entry, poi, weight);
            }
            None => log::debug!("Доминанта {poi:?}: нет входов для подключения"),
        }
        return;
    }

    let Some(target) = closest_of(&layout.map, poi, &[CellState::VillageRoadEntry, CellState::Road]) else {
        log::debug!("Доминанта {poi:?}: нет дорог и входов для подключения");
        return;
    };
    if layout.map[target] == CellState::VillageRoadEntry
        && let Some(road) = closest_of(&layout.map, poi, &[CellState::Road])
    {
        layout.connect(road, poi, weight);
    }
    layout.connect(target, poi, weight);
}

/// Ставит доминанты одного вида (храмы или укрепления).
///
/// Кандидаты — ячейки области на момент начала шага, из них допустимы
/// только самые высокие (`poi_height_restriction`) на расстоянии не меньше
/// `min_distance` от уже поставленных того же вида.
pub(crate) fn seed_pois(layout: &mut Layout<'_>, kind: CellState, points: PointCount, rng: &mut impl Rng) -> usize {
    let candidates = cells_of(&layout.map, &[CellState::StandardArea]);
    if candidates.is_empty() {
        return 0;
    }
    let count = rng.gen_range(points.min..=points.max) as usize;
    let highest = highest_cells(layout, &candidates, layout.settings.poi_height_restriction);

    let mut placed: Vec<Coord> = Vec::new();
    let mut iterations = 0;
    while iterations < layout.settings.max_iterations && placed.len() < count {
        iterations += 1;
        let Some(&pos) = candidates.choose(rng) else {
            break;
        };
        if layout.map[pos] != CellState::StandardArea || !highest.contains(&pos) {
            continue;
        }
        if nearest_distance(pos, &placed, points.min_distance) < points.min_distance {
            continue;
        }
        layout.map[pos] = kind;
        placed.push(pos);
        connect_poi(layout, pos);
    }

    if placed.len() < count {
        log::warn!("{kind:?}: поставлено {} из {count}", placed.len());
    }
    placed.len()
}

/// Оценка расстояния по треугольной кривой: 1 в точке `best`,
/// 0 при `too_close` и ближе или при `too_far` и дальше
fn curve_score(curve: InterestCurve, d: f32) -> f32 {
    let curve = curve.normalized();
    if d < curve.best {
        inverse_lerp(curve.too_close, curve.best, d)
    } else {
        1.0 - inverse_lerp(curve.best, curve.too_far, d)
    }
}

/// Оценка по ближайшей точке из набора; без точек — наилучшая
fn feature_score(curve: InterestCurve, pos: Coord, points: &[Coord]) -> f32 {
    curve_score(curve, nearest_distance(pos, points, curve.normalized().best))
}

/// Привлекательность места для дома в [0, 1.3].
///
/// Четыре признака: соседи-дома, храмы, дороги и укрепления. Если хоть один
/// равен нулю, место непригодно. Иначе среднее (не меньше 0.2) плюс бонус
/// за близость к доминанте и высоту относительно неё.
pub(crate) fn interest(layout: &Layout<'_>, pos: Coord) -> f32 {
    let map = &layout.map;
    let s = layout.settings;
    let houses = cells_of(map, &[CellState::HouseSeed]);
    let temples = cells_of(map, &[CellState::ReligiousSeed]);
    let roads = cells_of(map, &[CellState::Road]);
    let forts = cells_of(map, &[CellState::FortificationSeed]);

    let scores = [
        feature_score(s.sociability, pos, &houses),
        feature_score(s.worship, pos, &temples),
        feature_score(s.accessibility, pos, &roads),
        feature_score(s.defense, pos, &forts),
    ];
    if scores.contains(&0.0) {
        return 0.0;
    }
    let average = (scores.iter().sum::<f32>() / scores.len() as f32).max(INTEREST_FLOOR);
    average + domination_bonus(layout, pos)
}

fn domination_bonus(layout: &Layout<'_>, pos: Coord) -> f32 {
    let Some(poi) = closest_of(
        &layout.map,
        pos,
        &[CellState::ReligiousSeed, CellState::FortificationSeed],
    ) else {
        return 0.0;
    };
    let heights = layout.terrain.heights;
    let lowest = layout
        .map
        .positions_where(|&s| s != CellState::Outside)
        .into_iter()
        .map(|p| heights[p])
        .reduce(f32::min)
        .unwrap_or(heights[pos]);

    let distance_impact = 1.0 - inverse_lerp(0.0, layout.settings.domination_max_distance, distance(pos, poi));
    let height_impact = inverse_lerp(lowest, heights[poi], heights[pos]);
    DOMINATION_BONUS * height_impact * distance_impact
}

/// Ставит дома: случайная ячейка области принимается с вероятностью,
/// равной её привлекательности, и подключается к ближайшему входу.
pub(crate) fn seed_houses(layout: &mut Layout<'_>, rng: &mut impl Rng) -> usize {
    let s = layout.settings;
    let count = rng.gen_range(s.houses.min..=s.houses.max) as usize;
    let candidates = cells_of(&layout.map, &[CellState::StandardArea]);
    if candidates.is_empty() {
        return 0;
    }

    let mut placed = 0;
    let mut iterations = 0;
    while iterations < s.max_iterations && placed < count {
        iterations += 1;
        let Some(&pos) = candidates.choose(rng) else {
            break;
        };
        if layout.map[pos] != CellState::StandardArea {
            continue;
        }
        let value = interest(layout, pos);
        if value <= rng.r#gen::<f32>() {
            continue;
        }
        layout.map[pos] = CellState::HouseSeed;
        placed += 1;
        if let Some(entry) = closest_of(&layout.map, pos, &[CellState::VillageRoadEntry]) {
            layout.connect(entry, pos, s.road_weight);
        }
    }

    if placed < count {
        log::warn!("Дома: поставлено {placed} из {count} за {iterations} итераций");
    }
    placed
}
