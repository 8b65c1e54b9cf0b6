// src/morphology/open.rs
//! Морфологическое открытие растра классов
//!
//! Для каждого класса по очереди (в порядке первого появления при построчном
//! обходе) выполняется эрозия, затем дилатация. Следующий класс видит результат
//! предыдущего.

use crate::grid::{Coord, Grid};

/// Порядок проверки соседей: влево, вправо, вниз, вверх
const PROBE_ORDER: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Различные значения растра в порядке первого появления
pub fn distinct_values<T: Copy + PartialEq>(grid: &Grid<T>) -> Vec<T> {
    let mut values = Vec::new();
    for &v in grid.data() {
        if !values.contains(&v) {
            values.push(v);
        }
    }
    values
}

fn first_neighbor<T>(grid: &Grid<T>, pos: Coord, pred: impl Fn(&T) -> bool) -> Option<Coord> {
    PROBE_ORDER
        .iter()
        .filter_map(|&d| grid.offset(pos, d))
        .find(|&n| pred(&grid[n]))
}

/// Эрозия: ячейка класса `class` получает класс первого соседа другого класса
pub fn erode<T: Copy + PartialEq>(grid: &Grid<T>, class: T) -> Grid<T> {
    let mut out = grid.clone();
    for pos in grid.coords() {
        if grid[pos] != class {
            continue;
        }
        if let Some(n) = first_neighbor(grid, pos, |v| *v != class) {
            out[pos] = grid[n];
        }
    }
    out
}

/// Дилатация: ячейка другого класса, граничащая с `class`, становится `class`
pub fn dilate<T: Copy + PartialEq>(grid: &Grid<T>, class: T) -> Grid<T> {
    let mut out = grid.clone();
    for pos in grid.coords() {
        if grid[pos] != class && first_neighbor(grid, pos, |v| *v == class).is_some() {
            out[pos] = class;
        }
    }
    out
}

/// Открытие каждого класса по очереди
pub fn open<T: Copy + PartialEq>(grid: &Grid<T>) -> Grid<T> {
    let mut current = grid.clone();
    for class in distinct_values(grid) {
        current = erode(&current, class);
        current = dilate(&current, class);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_colour_image_is_unchanged() {
        let grid = Grid::new(6, 4, 3u8);
        assert_eq!(open(&grid), grid);
    }

    #[test]
    fn erosion_takes_left_neighbour_first() {
        let mut grid = Grid::new(3, 3, 0u8);
        grid[(1, 1)] = 5;
        grid[(0, 1)] = 7;
        let eroded = erode(&grid, 5);
        assert_eq!(eroded[(1, 1)], 7);
    }

    #[test]
    fn dilation_reaches_grid_edges() {
        let mut grid = Grid::new(3, 3, 0u8);
        grid[(1, 0)] = 1;
        let dilated = dilate(&grid, 1);
        assert_eq!(dilated[(0, 0)], 1);
        assert_eq!(dilated[(2, 0)], 1);
        assert_eq!(dilated[(1, 1)], 1);
        assert_eq!(dilated[(0, 1)], 0);
    }

    #[test]
    fn open_removes_one_pixel_speck() {
        let mut grid = Grid::new(5, 5, 0u8);
        grid[(2, 2)] = 9;
        let opened = open(&grid);
        assert!(opened.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn distinct_values_keep_first_appearance_order() {
        let grid = Grid::from_vec(4, 1, vec![2u8, 1, 2, 0]).unwrap();
        assert_eq!(distinct_values(&grid), vec![2, 1, 0]);
    }
}
