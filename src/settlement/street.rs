// src/settlement/street.rs
//! Маска улиц для текстурирования: дороги чёрные на белом
//!
//! Карта увеличивается в `resolution` раз, углы диагональных дорог
//! заполняются, затем дороги сужаются эрозией.

use super::CellState;
use crate::grid::{Grid, NEIGHBORS_4};
use image::{GrayImage, Luma, imageops};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

const ROAD: Luma<u8> = Luma([255]);

/// Ячейки-дороги со сторонами хотя бы двух дорог заполняются, что
/// превращает диагональные ступени в сплошную линию
fn fill_corners(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    for y in 0..h {
        for x in 0..w {
            if image.get_pixel(x, y)[0] != 0 {
                continue;
            }
            let roads = NEIGHBORS_4
                .iter()
                .filter(|&&(dx, dy)| {
                    let (nx, ny) = (x as i64 + dx as i64, y as i64 + dy as i64);
                    nx >= 0
                        && ny >= 0
                        && nx < w as i64
                        && ny < h as i64
                        && image.get_pixel(nx as u32, ny as u32)[0] != 0
                })
                .count();
            if roads >= 2 {
                out.put_pixel(x, y, ROAD);
            }
        }
    }
    out
}

/// Маска улиц: `resolution - 1` проходов заполнения углов и `erosion`
/// проходов эрозии (4-связной), затем инверсия
#[must_use]
pub fn street_mask(map: &Grid<CellState>, resolution: u32, erosion: u32) -> GrayImage {
    let k = resolution.max(1);
    let mut image = GrayImage::from_fn(map.width() * k, map.height() * k, |x, y| {
        if map[(x / k, y / k)].is_street() {
            ROAD
        } else {
            Luma([0])
        }
    });
    for _ in 1..k {
        image = fill_corners(&image);
    }
    for _ in 0..erosion {
        image = erode(&image, Norm::L1, 1);
    }
    imageops::invert(&mut image);
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roads_are_black_and_upscaled() {
        let mut map = Grid::new(3, 3, CellState::Outside);
        map[(1, 1)] = CellState::Road;
        let mask = street_mask(&map, 2, 0);
        assert_eq!(mask.dimensions(), (6, 6));
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn diagonal_steps_are_filled() {
        let mut map = Grid::new(2, 2, CellState::Outside);
        map[(0, 0)] = CellState::Road;
        map[(1, 1)] = CellState::VillageRoadEntry;
        let mask = street_mask(&map, 2, 0);
        // пиксели (2, 1) и (1, 2) касаются обоих блоков
        assert_eq!(mask.get_pixel(2, 1)[0], 0);
        assert_eq!(mask.get_pixel(1, 2)[0], 0);
        assert_eq!(mask.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn erosion_thins_roads() {
        let mut map = Grid::new(3, 3, CellState::Outside);
        map[(1, 1)] = CellState::Road;
        let mask = street_mask(&map, 3, 1);
        // из блока 3×3 остаётся только центр
        assert_eq!(mask.get_pixel(4, 4)[0], 0);
        assert_eq!(mask.get_pixel(3, 4)[0], 255);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
    }
}
