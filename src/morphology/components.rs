// src/morphology/components.rs
//! Связные области одного класса (4-связность) и удаление мелких областей

use crate::grid::{Coord, Grid, NEIGHBORS_4};
use std::collections::VecDeque;

/// Разметка связных областей
#[derive(Debug, Clone)]
pub struct Components {
    /// Номер области для каждой ячейки
    pub labels: Grid<usize>,
    /// Размер каждой области в ячейках
    pub sizes: Vec<usize>,
}

impl Components {
    /// Номера двух самых больших областей (при равенстве — меньший номер)
    #[must_use]
    pub fn two_largest(&self) -> (Option<usize>, Option<usize>) {
        let mut order: Vec<usize> = (0..self.sizes.len()).collect();
        order.sort_by(|&a, &b| self.sizes[b].cmp(&self.sizes[a]).then(a.cmp(&b)));
        (order.first().copied(), order.get(1).copied())
    }
}

/// Заливка из каждой непомеченной ячейки по равным соседям
pub fn label_components<T: PartialEq>(grid: &Grid<T>) -> Components {
    let mut labels: Grid<Option<usize>> = Grid::new(grid.width(), grid.height(), None);
    let mut sizes = Vec::new();
    let mut queue: VecDeque<Coord> = VecDeque::new();

    for start in grid.coords() {
        if labels[start].is_some() {
            continue;
        }
        let id = sizes.len();
        let mut size = 0;
        labels[start] = Some(id);
        queue.push_back(start);

        while let Some(pos) = queue.pop_front() {
            size += 1;
            for n in grid.neighbors(pos, &NEIGHBORS_4) {
                if labels[n].is_none() && grid[n] == grid[start] {
                    labels[n] = Some(id);
                    queue.push_back(n);
                }
            }
        }
        sizes.push(size);
    }

    Components {
        labels: labels.map(|l| l.unwrap_or(0)),
        sizes,
    }
}

/// Удаляет области меньше `min(round(площадь × fraction), размер второй по величине)`.
///
/// Две самые большие области сохраняются всегда. Ячейки удалённой области
/// перекрашиваются в класс ближайшей сохранённой ячейки; если такой нет, в `fallback`.
pub fn eliminate_small_regions<T: Copy + PartialEq>(grid: &Grid<T>, fraction: f32, fallback: T) -> Grid<T> {
    let components = label_components(grid);
    let (_, second) = components.two_largest();
    let second_size = second.map_or(0, |id| components.sizes[id]);
    let threshold = ((grid.len() as f32 * fraction).round() as usize).min(second_size);

    let eliminated: Vec<bool> = components.sizes.iter().map(|&s| s < threshold).collect();
    let removed = eliminated.iter().filter(|&&e| e).count();
    if removed == 0 {
        return grid.clone();
    }
    log::debug!(
        "Удаление мелких областей: {removed} из {} (порог {threshold})",
        components.sizes.len()
    );

    let keeps = |pos: Coord| !eliminated[components.labels[pos]];
    Grid::from_fn(grid.width(), grid.height(), |x, y| {
        let pos = (x, y);
        if keeps(pos) {
            grid[pos]
        } else {
            nearest_kept(grid, pos, &keeps).map_or(fallback, |p| grid[p])
        }
    })
}

/// Поиск расширяющимися кольцами: сначала четыре соседа (вверх, вправо, вниз, влево),
/// затем кольца Чебышёва радиуса 2.. — верхняя строка, правый столбец, нижняя строка, левый столбец
fn nearest_kept<T>(grid: &Grid<T>, pos: Coord, keeps: &impl Fn(Coord) -> bool) -> Option<Coord> {
    let check = |dx: i32, dy: i32| grid.offset(pos, (dx, dy)).filter(|&p| keeps(p));

    for (dx, dy) in [(0, 1), (1, 0), (0, -1), (-1, 0)] {
        if let Some(p) = check(dx, dy) {
            return Some(p);
        }
    }

    let max_distance = grid.width().max(grid.height()) as i32;
    for d in 2..max_distance {
        let ring = (-d..=d)
            .map(|dx| (dx, d))
            .chain((1 - d..d).map(|dy| (d, dy)))
            .chain((-d..=d).map(|dx| (dx, -d)))
            .chain((1 - d..d).map(|dy| (-d, dy)));
        for (dx, dy) in ring {
            if let Some(p) = check(dx, dy) {
                return Some(p);
            }
        }
    }
    None
}
