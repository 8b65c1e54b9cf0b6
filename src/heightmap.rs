// src/heightmap.rs
//! Карта высот из нескольких слоёв шума Перлина
//!
//! Базовый рельеф — шум с частотой `height_density`. Поверх него накладываются
//! две октавы шероховатости: отдельный профиль для низин и для вершин.
//! Граница между ними задаётся долей `upper_height_percent`, а в полосе
//! `blend_band` амплитуда шероховатости линейно уходит в ноль, чтобы шов не был виден.
//! Рамка сетки опускается до минимальной высоты, чтобы замкнуть рельеф.

use crate::config::{NoiseLayer, TerrainSettings};
use crate::error::{GenError, Result};
use crate::grid::{Coord, Grid};
use fastnoise_lite::{FastNoiseLite, NoiseType};
use std::path::Path;

/// Смещения октав шероховатости, чтобы они не повторяли базовый шум
const LAYER_OFFSET_1: (f32, f32) = (5.3, 9.1);
const LAYER_OFFSET_2: (f32, f32) = (17.8, 23.5);

/// Карта высот и диапазон высот внутренней области
#[derive(Debug, Clone)]
pub struct Heightmap {
    pub grid: Grid<f32>,
    /// Минимум по внутренним ячейкам (им же заполнена рамка)
    pub min: f32,
    pub max: f32,
}

impl Heightmap {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.grid.get(x, y).copied().unwrap_or(self.min)
    }

    /// Высота, нормированная в [0, 1] относительно `min..max`
    #[must_use]
    pub fn normalized(&self) -> Grid<f32> {
        let range = self.max - self.min;
        self.grid.map(|&h| {
            if range > f32::EPSILON {
                (h - self.min) / range
            } else {
                0.0
            }
        })
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.normalized().save_as_png(path)
    }
}

pub(crate) fn perlin(seed: u64) -> FastNoiseLite {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(seed as i32));
    noise.set_noise_type(Some(NoiseType::Perlin));
    // частоту задаём вручную через координаты
    noise.set_frequency(Some(1.0));
    noise
}

/// Шум в диапазоне [0, 1]
pub(crate) fn sample01(noise: &FastNoiseLite, x: f32, y: f32) -> f32 {
    ((noise.get_noise_2d(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Вес шероховатости по расстоянию до точки перелома: 0 на границе, 1 за полосой
fn band_weight(distance: f32, band: f32) -> f32 {
    if band <= f32::EPSILON {
        1.0
    } else {
        (distance / band).clamp(0.0, 1.0)
    }
}

/// Добавляет две октавы шероховатости и нормирует сумму обратно в [0, 1]
fn apply_layer(
    noise: &FastNoiseLite,
    value: f32,
    variety: f32,
    layer: &NoiseLayer,
    x: f32,
    y: f32,
    offset: [f32; 2],
) -> f32 {
    if variety <= 0.0 {
        return value;
    }
    let d = layer.density;
    let mut v = value;
    v += variety
        * sample01(
            noise,
            x * d + offset[0] + LAYER_OFFSET_1.0,
            y * d + offset[1] + LAYER_OFFSET_1.1,
        );
    v += variety
        * 0.5
        * sample01(
            noise,
            x * 2.0 * d + offset[0] + LAYER_OFFSET_2.0,
            y * 2.0 * d + offset[1] + LAYER_OFFSET_2.1,
        );
    v / (1.0 + variety + variety * 0.5)
}

/// Генерирует карту высот.
///
/// Минимум и максимум считаются только по внутренним ячейкам; рамка после
/// синтеза заполняется минимумом.
pub fn generate_heightmap(
    seed: u64,
    width: u32,
    height: u32,
    terrain: &TerrainSettings,
) -> Result<Heightmap> {
    if width < 3 || height < 3 {
        return Err(GenError::config(format!(
            "карта высот {width}×{height}: нет внутренних ячеек"
        )));
    }

    let noise = perlin(seed);
    let offset = terrain.noise_offset;
    let density = terrain.height_density;

    // === 1. Базовый шум ===
    let base = Grid::par_from_fn(width, height, |x, y| {
        sample01(
            &noise,
            x as f32 * density + offset[0],
            y as f32 * density + offset[1],
        )
    });

    let Some((base_min, base_max)) = interior_range(&base) else {
        return Err(GenError::config("карта высот без внутренних ячеек"));
    };

    // === 2. Шероховатость по диапазонам высот ===
    let diff = base_max - base_min;
    let breakpoint = base_min + diff * (1.0 - terrain.upper_height_percent.clamp(0.0, 1.0));
    let band = diff * terrain.blend_band.max(0.0);

    let mut grid = Grid::par_from_fn(width, height, |x, y| {
        let v = base[(x, y)];
        let (fx, fy) = (x as f32, y as f32);
        let v = if v < breakpoint {
            let variety = terrain.lower_layer.variety * band_weight(breakpoint - v, band);
            apply_layer(&noise, v, variety, &terrain.lower_layer, fx, fy, offset)
        } else {
            let variety = terrain.upper_layer.variety * band_weight(v - breakpoint, band);
            apply_layer(&noise, v, variety, &terrain.upper_layer, fx, fy, offset)
        };
        v.max(0.0).powf(terrain.noise_power) * terrain.height_variety * terrain.scale
    });

    // === 3. Замыкание рамки ===
    let Some((min, max)) = interior_range(&grid) else {
        return Err(GenError::config("карта высот без внутренних ячеек"));
    };
    for pos in grid.coords() {
        if grid.is_border(pos) {
            grid[pos] = min;
        }
    }

    log::info!("Карта высот {width}×{height}: высоты {min:.3}..{max:.3}");
    Ok(Heightmap { grid, min, max })
}

/// Минимум и максимум по внутренним ячейкам; первая внутренняя ячейка — начальное значение
fn interior_range(grid: &Grid<f32>) -> Option<(f32, f32)> {
    grid.coords()
        .filter(|&pos| !grid.is_border(pos))
        .map(|pos| grid[pos])
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Локальные минимумы: внутренние ячейки, у которых в квадратном окне радиуса
/// `radius` нет строго более низкой внутренней ячейки.
///
/// Используются как центроиды климатических зон.
#[must_use]
pub fn find_local_minima(heightmap: &Heightmap, radius: u32) -> Vec<Coord> {
    let grid = &heightmap.grid;
    let r = i64::from(radius);
    let mut minima = Vec::new();

    for pos in grid.coords() {
        if grid.is_border(pos) {
            continue;
        }
        let h = grid[pos];
        let (cx, cy) = (i64::from(pos.0), i64::from(pos.1));
        let mut lowest = true;
        'window: for y in (cy - r)..=(cy + r) {
            for x in (cx - r)..=(cx + r) {
                if !grid.contains(x, y) {
                    continue;
                }
                let other = (x as u32, y as u32);
                if !grid.is_border(other) && grid[other] < h {
                    lowest = false;
                    break 'window;
                }
            }
        }
        if lowest {
            minima.push(pos);
        }
    }

    log::debug!("Найдено локальных минимумов: {}", minima.len());
    minima
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain() -> TerrainSettings {
        TerrainSettings {
            upper_height_percent: 0.3,
            blend_band: 0.1,
            ..TerrainSettings::default()
        }
    }

    #[test]
    fn border_equals_interior_minimum() {
        let map = generate_heightmap(11, 32, 24, &terrain()).unwrap();
        for pos in map.grid.coords() {
            if map.grid.is_border(pos) {
                assert_eq!(map.grid[pos], map.min);
            } else {
                assert!(map.grid[pos] >= map.min && map.grid[pos] <= map.max);
            }
        }
    }

    #[test]
    fn heights_are_non_negative_and_deterministic() {
        let a = generate_heightmap(5, 20, 20, &terrain()).unwrap();
        let b = generate_heightmap(5, 20, 20, &terrain()).unwrap();
        assert_eq!(a.grid, b.grid);
        assert!(a.grid.data().iter().all(|&h| h >= 0.0));
    }

    #[test]
    fn tiny_grid_is_rejected() {
        assert!(generate_heightmap(0, 2, 10, &terrain()).is_err());
    }

    #[test]
    fn local_minima_of_a_bowl() {
        let grid = Grid::from_fn(7, 7, |x, y| {
            let dx = x as f32 - 3.0;
            let dy = y as f32 - 3.0;
            dx * dx + dy * dy
        });
        let map = Heightmap {
            grid,
            min: 0.0,
            max: 18.0,
        };
        assert_eq!(find_local_minima(&map, 2), vec![(3, 3)]);
    }

    #[test]
    fn normalized_is_unit_range() {
        let map = generate_heightmap(3, 16, 16, &terrain()).unwrap();
        let norm = map.normalized();
        assert!(norm.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
