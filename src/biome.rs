// src/biome.rs
//! Биомы: объединение двух климатических осей
//!
//! Биом — пара (температура, осадки), всего 9 классов с индексом `3·t + p`.
//! Цвет биома — смесь 50/50 цветов температуры и осадков.
//!
//! Для текстурирования карта биомов раскладывается на три сплат-маски,
//! по одной на уровень температуры: канал `p` маски `t` равен 1 там, где биом `(t, p)`.

use crate::climate::{ClimateAxis, Intensity};
use crate::error::{GenError, Result};
use crate::grid::Grid;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Цвета уровней температуры: холодно → жарко
pub const TEMPERATURE_COLORS: [[f32; 3]; 3] = [[0.9, 0.9, 0.0], [1.0, 0.4, 0.0], [0.9, 0.0, 0.0]];

/// Цвета уровней осадков: сухо → влажно
pub const PRECIPITATION_COLORS: [[f32; 3]; 3] =
    [[0.1, 1.0, 0.9], [0.1, 0.6, 1.0], [0.0, 0.1, 0.9]];

/// Веса каналов сплат-маски (R, G, B)
pub type Splat = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BiomeClass {
    pub temperature: Intensity,
    pub precipitation: Intensity,
}

impl Default for BiomeClass {
    fn default() -> Self {
        Self {
            temperature: Intensity::Mid,
            precipitation: Intensity::Mid,
        }
    }
}

impl BiomeClass {
    #[must_use]
    pub fn new(temperature: Intensity, precipitation: Intensity) -> Self {
        Self {
            temperature,
            precipitation,
        }
    }

    /// Индекс `3·t + p` в диапазоне 0..9
    #[must_use]
    pub fn index(self) -> usize {
        3 * usize::from(self.temperature.level()) + usize::from(self.precipitation.level())
    }

    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::new(
            Intensity::from_level((index / 3).min(2) as u8),
            Intensity::from_level((index % 3) as u8),
        )
    }

    #[must_use]
    pub fn color(self) -> [f32; 3] {
        let t = TEMPERATURE_COLORS[usize::from(self.temperature.level())];
        let p = PRECIPITATION_COLORS[usize::from(self.precipitation.level())];
        [
            (t[0] + p[0]) * 0.5,
            (t[1] + p[1]) * 0.5,
            (t[2] + p[2]) * 0.5,
        ]
    }
}

fn to_rgb8(color: [f32; 3]) -> Rgb<u8> {
    Rgb(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

/// Объединяет карты температуры и осадков в карту биомов
pub fn merge_climate(
    temperature: &Grid<Intensity>,
    precipitation: &Grid<Intensity>,
) -> Result<Grid<BiomeClass>> {
    if temperature.width() != precipitation.width()
        || temperature.height() != precipitation.height()
    {
        return Err(GenError::GridSize {
            width: temperature.width(),
            height: temperature.height(),
            len: precipitation.len(),
        });
    }
    let data = temperature
        .data()
        .iter()
        .zip(precipitation.data())
        .map(|(&t, &p)| BiomeClass::new(t, p))
        .collect();
    Grid::from_vec(temperature.width(), temperature.height(), data)
}

/// Три сплат-маски (по уровню температуры) с единичными весами внутри биомов
#[must_use]
pub fn extract_splatmaps(biomes: &Grid<BiomeClass>) -> [Grid<Splat>; 3] {
    Intensity::ALL.map(|t| {
        biomes.map(|b| {
            let mut splat = [0.0; 3];
            if b.temperature == t {
                splat[usize::from(b.precipitation.level())] = 1.0;
            }
            splat
        })
    })
}

#[must_use]
pub fn intensity_image(grid: &Grid<Intensity>, axis: ClimateAxis) -> RgbImage {
    let palette = match axis {
        ClimateAxis::Temperature => &TEMPERATURE_COLORS,
        ClimateAxis::Precipitation => &PRECIPITATION_COLORS,
    };
    RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
        to_rgb8(palette[usize::from(grid[(x, y)].level())])
    })
}

#[must_use]
pub fn biome_image(biomes: &Grid<BiomeClass>) -> RgbImage {
    RgbImage::from_fn(biomes.width(), biomes.height(), |x, y| {
        to_rgb8(biomes[(x, y)].color())
    })
}

#[must_use]
pub fn splat_image(splat: &Grid<Splat>) -> RgbImage {
    RgbImage::from_fn(splat.width(), splat.height(), |x, y| to_rgb8(splat[(x, y)]))
}

pub fn save_image(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    image.save(path)?;
    Ok(())
}
