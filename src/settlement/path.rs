// src/settlement/path.rs
//! Взвешенный кратчайший путь (Дейкстра) по 8-связной сетке
//!
//! Цена шага — крутизна ячейки назначения. Существующая дорога стоит
//! `road_weight`, вода (расстояние 0) непроходима. Путь возвращается без
//! начальной и конечной точек; пустой путь означает, что пути нет (или
//! начало совпадает с концом).

use super::CellState;
use crate::config::Span;
use crate::grid::{Coord, Grid, NEIGHBORS_8};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Поля, из которых складывается цена шага
#[derive(Debug, Clone, Copy)]
pub struct CostField<'a> {
    pub steepness: &'a Grid<f32>,
    pub water: &'a Grid<i32>,
    /// Цена шага на существующую дорогу
    pub road_weight: f32,
    /// Ячейки с крутизной вне диапазона непроходимы
    pub steepness_band: Option<Span<f32>>,
}

impl CostField<'_> {
    /// Цена входа в ячейку; `None` — ячейка непроходима
    fn step_cost(&self, map: &Grid<CellState>, pos: Coord) -> Option<f32> {
        if self.water.get(pos.0, pos.1).copied() == Some(0) {
            return None;
        }
        if map[pos] == CellState::Road {
            return Some(self.road_weight);
        }
        let steepness = self.steepness.get(pos.0, pos.1).copied()?;
        match self.steepness_band {
            Some(band) if !band.contains(steepness) => None,
            _ => Some(steepness),
        }
    }
}

/// Узел очереди: сначала меньшая цена, затем меньше шагов
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f32,
    hops: u32,
    pos: Coord,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap — max-heap, поэтому порядок обратный
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn better(a: (f32, u32), b: (f32, u32)) -> bool {
    match a.0.total_cmp(&b.0) {
        Ordering::Less => true,
        Ordering::Equal => a.1 < b.1,
        Ordering::Greater => false,
    }
}

/// Кратчайший путь от `from` до `to` по ячейкам с состоянием из `traversable`.
///
/// Начало и конец допустимы всегда, независимо от их состояния.
pub fn shortest_path(
    map: &Grid<CellState>,
    field: &CostField<'_>,
    from: Coord,
    to: Coord,
    traversable: &[CellState],
) -> Vec<Coord> {
    if from == to || map.get(from.0, from.1).is_none() || map.get(to.0, to.1).is_none() {
        return Vec::new();
    }

    let mut best: Grid<Option<(f32, u32)>> = Grid::new(map.width(), map.height(), None);
    let mut previous: Grid<Option<Coord>> = Grid::new(map.width(), map.height(), None);
    let mut heap = BinaryHeap::new();

    best[from] = Some((0.0, 0));
    heap.push(Frontier {
        cost: 0.0,
        hops: 0,
        pos: from,
    });

    while let Some(Frontier { cost, hops, pos }) = heap.pop() {
        if pos == to {
            break;
        }
        if best[pos].is_some_and(|b| better(b, (cost, hops))) {
            continue;
        }
        for n in map.neighbors(pos, &NEIGHBORS_8) {
            if n == from || (n != to && !traversable.contains(&map[n])) {
                continue;
            }
            let Some(step) = field.step_cost(map, n) else {
                continue;
            };
            let candidate = (cost + step, hops + 1);
            if best[n].is_none_or(|b| better(candidate, b)) {
                best[n] = Some(candidate);
                previous[n] = Some(pos);
                heap.push(Frontier {
                    cost: candidate.0,
                    hops: candidate.1,
                    pos: n,
                });
            }
        }
    }

    if previous[to].is_none() {
        log::debug!("Путь {from:?} → {to:?} не найден, дорога не построена");
        return Vec::new();
    }

    let mut path = Vec::new();
    let mut current = previous[to];
    while let Some(pos) = current {
        if pos == from {
            break;
        }
        path.push(pos);
        current = previous[pos];
    }
    path.reverse();
    path
}
