// src/grid.rs
//! Двумерная сетка — общий формат всех растров генератора
//!
//! Все слои мира (высоты, крутизна, климат, поселение) хранятся в [`Grid`]:
//! построчно (`y * width + x`), с единым размером на один прогон генерации.
//! Доступ к соседям всегда проходит через проверку границ ([`Grid::offset`]),
//! неявного зацикливания или зажима координат нет.
//!
//! [`BlockLayout`] описывает уменьшение сетки в целое число раз: остаток строк
//! и столбцов, не кратный множителю, присоединяется к последнему блоку.

use crate::error::{GenError, Result};
use image::GrayImage;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::ops::{Index, IndexMut, Range};
use std::path::Path;

/// Координата ячейки `(x, y)`
pub type Coord = (u32, u32);

/// 4-связность: вправо, вниз, влево, вверх
pub const NEIGHBORS_4: [(i32, i32); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

/// 8-связность, обход по часовой стрелке начиная с диагонали `(1, 1)`
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; (width * height) as usize],
        }
    }
}

impl<T> Grid<T> {
    /// Оборачивает готовый вектор; длина обязана совпадать с `width × height`
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(GenError::GridSize {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Лежит ли координата (в том числе отрицательная) внутри сетки
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    #[must_use]
    pub fn index_of(&self, pos: Coord) -> usize {
        debug_assert!(pos.0 < self.width && pos.1 < self.height);
        (pos.1 * self.width + pos.0) as usize
    }

    #[must_use]
    pub fn coord_of(&self, idx: usize) -> Coord {
        let w = self.width as usize;
        ((idx % w) as u32, (idx / w) as u32)
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut T> {
        if x < self.width && y < self.height {
            self.data.get_mut((y * self.width + x) as usize)
        } else {
            None
        }
    }

    /// Записывает значение; возвращает `false`, если координата вне сетки
    pub fn set(&mut self, pos: Coord, value: T) -> bool {
        match self.get_mut(pos.0, pos.1) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Смещённая координата, если она остаётся внутри сетки
    #[must_use]
    pub fn offset(&self, pos: Coord, delta: (i32, i32)) -> Option<Coord> {
        let nx = i64::from(pos.0) + i64::from(delta.0);
        let ny = i64::from(pos.1) + i64::from(delta.1);
        if self.contains(nx, ny) {
            Some((nx as u32, ny as u32))
        } else {
            None
        }
    }

    /// Соседи ячейки из заданной окрестности, лежащие внутри сетки
    pub fn neighbors<'a>(
        &'a self,
        pos: Coord,
        offsets: &'a [(i32, i32)],
    ) -> impl Iterator<Item = Coord> + 'a {
        offsets.iter().filter_map(move |&d| self.offset(pos, d))
    }

    /// Все координаты построчно
    pub fn coords(&self) -> impl Iterator<Item = Coord> + use<T> {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| (x, y)))
    }

    #[must_use]
    pub fn is_border(&self, pos: Coord) -> bool {
        pos.0 == 0 || pos.1 == 0 || pos.0 + 1 == self.width || pos.1 + 1 == self.height
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Координаты всех ячеек, удовлетворяющих предикату, построчно
    pub fn positions_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<Coord> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| pred(v))
            .map(|(i, _)| self.coord_of(i))
            .collect()
    }
}

impl<T: Send> Grid<T> {
    /// Как [`Grid::from_fn`], но ячейки вычисляются параллельно при фиче `parallel`.
    /// Функция обязана быть чистой: порядок вычисления не определён.
    pub fn par_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> T + Sync + Send) -> Self {
        let cells = width * height;
        #[cfg(feature = "parallel")]
        let data = (0..cells)
            .into_par_iter()
            .map(|i| f(i % width, i / width))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let data = (0..cells).map(|i| f(i % width, i / width)).collect();
        Self {
            width,
            height,
            data,
        }
    }
}

impl<T> Index<Coord> for Grid<T> {
    type Output = T;

    fn index(&self, pos: Coord) -> &T {
        &self.data[self.index_of(pos)]
    }
}

impl<T> IndexMut<Coord> for Grid<T> {
    fn index_mut(&mut self, pos: Coord) -> &mut T {
        let idx = self.index_of(pos);
        &mut self.data[idx]
    }
}

impl Grid<f32> {
    /// Среднее значение по блоку уменьшенной сетки
    #[must_use]
    pub fn block_mean(&self, layout: &BlockLayout, block: Coord) -> f32 {
        let (xs, ys) = layout.block_range(block);
        let mut sum = 0.0;
        let mut count = 0u32;
        for y in ys {
            for x in xs.clone() {
                if let Some(v) = self.get(x, y) {
                    sum += v;
                    count += 1;
                }
            }
        }
        if count == 0 { 0.0 } else { sum / count as f32 }
    }

    #[must_use]
    pub fn downsample_mean(&self, layout: &BlockLayout) -> Grid<f32> {
        Grid::from_fn(layout.width(), layout.height(), |bx, by| {
            self.block_mean(layout, (bx, by))
        })
    }

    /// Значения [0, 1] → оттенки серого (значения вне диапазона зажимаются)
    #[must_use]
    pub fn to_grayscale_image(&self) -> GrayImage {
        let pixels = self
            .data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        // длина данных всегда равна width × height
        GrayImage::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_grayscale_image().save(path)?;
        Ok(())
    }
}

/// Разбиение сетки на квадратные блоки `factor × factor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    factor: u32,
    src_width: u32,
    src_height: u32,
}

impl BlockLayout {
    pub fn new(src_width: u32, src_height: u32, factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(GenError::config("множитель уменьшения должен быть >= 1"));
        }
        if src_width < factor || src_height < factor {
            return Err(GenError::config(format!(
                "сетка {src_width}×{src_height} меньше блока {factor}×{factor}"
            )));
        }
        Ok(Self {
            factor,
            src_width,
            src_height,
        })
    }

    #[must_use]
    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Ширина уменьшенной сетки
    #[must_use]
    pub fn width(&self) -> u32 {
        self.src_width / self.factor
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.src_height / self.factor
    }

    /// Блок, которому принадлежит ячейка полной сетки (остаток — в последнем блоке)
    #[must_use]
    pub fn block_of(&self, pos: Coord) -> Coord {
        (
            (pos.0 / self.factor).min(self.width() - 1),
            (pos.1 / self.factor).min(self.height() - 1),
        )
    }

    /// Диапазоны координат полной сетки, покрываемые блоком
    #[must_use]
    pub fn block_range(&self, block: Coord) -> (Range<u32>, Range<u32>) {
        let axis = |b: u32, blocks: u32, src: u32| {
            let start = b * self.factor;
            let end = if b + 1 >= blocks {
                src
            } else {
                (b + 1) * self.factor
            };
            start..end
        };
        (
            axis(block.0, self.width(), self.src_width),
            axis(block.1, self.height(), self.src_height),
        )
    }

    #[must_use]
    pub fn block_origin(&self, block: Coord) -> Coord {
        (block.0 * self.factor, block.1 * self.factor)
    }

    /// Центр блока в координатах полной сетки
    #[must_use]
    pub fn block_center(&self, block: Coord) -> Coord {
        let half = self.factor / 2;
        (
            (block.0 * self.factor + half).min(self.src_width - 1),
            (block.1 * self.factor + half).min(self.src_height - 1),
        )
    }
}

/// Евклидово расстояние между ячейками
#[must_use]
pub fn distance(a: Coord, b: Coord) -> f32 {
    let dx = a.0 as f32 - b.0 as f32;
    let dy = a.1 as f32 - b.1 as f32;
    (dx * dx + dy * dy).sqrt()
}

#[must_use]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Обратная интерполяция с зажимом в [0, 1]; при `a == b` возвращает 0
#[must_use]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() > f32::EPSILON {
        ((value - a) / (b - a)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
