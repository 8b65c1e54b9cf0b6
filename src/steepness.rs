// src/steepness.rs
//! Крутизна склонов: 0 — ровная поверхность, 1 — около 90°

use crate::grid::{Grid, inverse_lerp};
use crate::heightmap::Heightmap;

/// Угол (в радианах), соответствующий крутизне 1.0
pub const MAX_SLOPE_ANGLE: f32 = 1.6;

/// Центральная разность вдоль одной оси; на краю — односторонняя, удвоенная
fn axis_slope(prev: Option<f32>, here: f32, next: Option<f32>) -> f32 {
    match (prev, next) {
        (Some(p), Some(n)) => n - p,
        (None, Some(n)) => 2.0 * (n - here),
        (Some(p), None) => 2.0 * (here - p),
        (None, None) => 0.0,
    }
}

/// Крутизна каждой ячейки по нормали к поверхности.
///
/// Высоты делятся на масштаб сетки, чтобы наклон считался в единицах узлов.
#[must_use]
pub fn compute_steepness(heightmap: &Heightmap, scale: f32) -> Grid<f32> {
    let grid = &heightmap.grid;
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let h = |x: i64, y: i64| -> Option<f32> {
        grid.contains(x, y)
            .then(|| grid[(x as u32, y as u32)] / scale)
    };

    Grid::par_from_fn(grid.width(), grid.height(), |x, y| {
        let (xi, yi) = (i64::from(x), i64::from(y));
        let here = grid[(x, y)] / scale;
        let sx = axis_slope(h(xi - 1, yi), here, h(xi + 1, yi));
        let sz = axis_slope(h(xi, yi - 1), here, h(xi, yi + 1));

        let (nx, ny, nz) = (-sx, 1.0, sz);
        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        let angle = (ny / len).clamp(-1.0, 1.0).acos();
        inverse_lerp(0.0, MAX_SLOPE_ANGLE, angle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(grid: Grid<f32>) -> Heightmap {
        Heightmap {
            grid,
            min: 0.0,
            max: 1.0,
        }
    }

    #[test]
    fn flat_terrain_has_zero_steepness() {
        let steep = compute_steepness(&map(Grid::new(5, 5, 3.0)), 1.0);
        assert!(steep.data().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn constant_slope_is_uniform_including_borders() {
        // разность через узел равна 2, в том числе на краях
        let steep = compute_steepness(&map(Grid::from_fn(6, 4, |x, _| x as f32)), 1.0);
        let expected = (1.0f32 / 5.0f32.sqrt()).acos() / MAX_SLOPE_ANGLE;
        for &s in steep.data() {
            assert!((s - expected).abs() < 1e-5, "{s} != {expected}");
        }
    }

    #[test]
    fn steepness_stays_in_unit_range() {
        let steep = compute_steepness(&map(Grid::from_fn(5, 5, |x, y| (x * y * 50) as f32)), 1.0);
        assert!(steep.data().iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
