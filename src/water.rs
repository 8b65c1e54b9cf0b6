// src/water.rs
//! Вода: уровень воды, поле расстояний до воды и зона влияния
//!
//! Расстояние считается многоисточниковым обходом в ширину по 8-связности
//! от всех ячеек ниже уровня воды. Недостижимые ячейки хранят [`NO_WATER`].

use crate::grid::{Coord, Grid, NEIGHBORS_4, NEIGHBORS_8, inverse_lerp, lerp};
use crate::heightmap::Heightmap;
use std::collections::VecDeque;

/// Вода недостижима или отсутствует
pub const NO_WATER: i32 = -1;

/// Абсолютная высота воды между минимумом и максимумом рельефа
#[must_use]
pub fn water_level(heightmap: &Heightmap, relative_water_height: f32) -> f32 {
    lerp(heightmap.min, heightmap.max, relative_water_height)
}

/// Ячейки строго ниже уровня воды
#[must_use]
pub fn water_mask(heightmap: &Heightmap, level: f32) -> Grid<bool> {
    heightmap.grid.map(|&h| h < level)
}

/// Поле расстояний до воды (в шагах 8-связности)
#[derive(Debug, Clone)]
pub struct WaterDistance {
    pub grid: Grid<i32>,
    /// Наибольшее достигнутое расстояние; 0, если воды нет
    pub max_distance: i32,
}

impl WaterDistance {
    /// Многоисточниковый обход в ширину от водных ячеек
    #[must_use]
    pub fn compute(mask: &Grid<bool>) -> Self {
        let mut grid = Grid::new(mask.width(), mask.height(), NO_WATER);
        let mut queue: VecDeque<Coord> = VecDeque::new();

        for pos in mask.positions_where(|&w| w) {
            grid[pos] = 0;
            queue.push_back(pos);
        }

        let mut max_distance = 0;
        while let Some(pos) = queue.pop_front() {
            let next = grid[pos] + 1;
            for n in mask.neighbors(pos, &NEIGHBORS_8) {
                if grid[n] == NO_WATER {
                    grid[n] = next;
                    max_distance = max_distance.max(next);
                    queue.push_back(n);
                }
            }
        }

        Self { grid, max_distance }
    }

    #[must_use]
    pub fn has_water(&self) -> bool {
        self.grid.data().contains(&0)
    }

    #[must_use]
    pub fn get(&self, pos: Coord) -> i32 {
        self.grid.get(pos.0, pos.1).copied().unwrap_or(NO_WATER)
    }

    /// Расстояния, нормированные на максимальное; без воды — везде 1.0
    #[must_use]
    pub fn visualize(&self) -> Grid<f32> {
        if !self.has_water() {
            return self.grid.map(|_| 1.0);
        }
        let max = self.max_distance as f32;
        self.grid.map(|&d| {
            if d == NO_WATER {
                1.0
            } else {
                inverse_lerp(0.0, max, d as f32)
            }
        })
    }
}

/// Зона влияния воды: маска, расширенная `passes` раз по 4-связности
#[must_use]
pub fn dilate_mask(mask: &Grid<bool>, passes: u32) -> Grid<bool> {
    let mut current = mask.clone();
    for _ in 0..passes {
        let prev = current.clone();
        for pos in prev.positions_where(|&w| w) {
            for n in prev.neighbors(pos, &NEIGHBORS_4) {
                current[n] = true;
            }
        }
    }
    current
}
