// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Рельеф (шум, слои шероховатости, уровень воды) и готовые пресеты ландшафта
//! - Климатические зоны (центроиды Вороного, средние температура и осадки)
//! - Постобработку карты биомов и смешивание сплат-масок
//! - Планировку поселения (радиус, входы, здания, дороги)
//! - Расстановку растительности
//!
//! Все структуры поддерживают сериализацию в TOML/JSON. Конфигурация неизменяема
//! во время генерации и передаётся в каждую стадию явно.

use crate::error::{GenError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Готовый ландшафт
///
/// Пресет перезаписывает параметры рельефа перед генерацией.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum TerrainPreset {
    /// Используются параметры из секции `[terrain]` как есть
    #[default]
    Custom,
    /// Высокие острые горы с узкими долинами и небольшим уровнем воды
    Mountains,
    /// Пологие острова, почти половина карты под водой
    Islands,
}

impl TerrainPreset {
    /// Переносит параметры пресета в настройки рельефа.
    ///
    /// Смещение шума и масштаб сетки не меняются.
    pub fn apply(self, terrain: &mut TerrainSettings) {
        let (density, variety, power, lower, upper_percent, upper, water) = match self {
            TerrainPreset::Custom => return,
            TerrainPreset::Mountains => (0.045, 25.0, 2.0, (0.15, 0.1), 0.5, (0.2, 0.2), 0.09),
            TerrainPreset::Islands => (0.035, 10.0, 1.5, (0.2, 0.15), 0.341, (0.2, 0.3), 0.434),
        };
        terrain.height_density = density;
        terrain.height_variety = variety;
        terrain.noise_power = power;
        terrain.lower_layer = NoiseLayer {
            variety: lower.0,
            density: lower.1,
        };
        terrain.upper_height_percent = upper_percent;
        terrain.upper_layer = NoiseLayer {
            variety: upper.0,
            density: upper.1,
        };
        terrain.relative_water_height = water;
    }
}

/// Слой шероховатости: две дополнительные октавы шума поверх базового рельефа
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NoiseLayer {
    /// Высота неровностей [0, 1]
    pub variety: f32,
    /// Частота неровностей [0, 1]
    pub density: f32,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        Self {
            variety: 0.2,
            density: 0.2,
        }
    }
}

/// Настройки рельефа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Частота гор и долин (0..0.5)
    #[serde(default = "default_height_density")]
    pub height_density: f32,

    /// Перепад высот
    #[serde(default = "default_height_variety")]
    pub height_variety: f32,

    /// Степень нелинейности высоты:
    /// - `<1.0` → плато и пологие склоны,
    /// - `>1.0` → острые пики и широкие низины.
    #[serde(default = "default_noise_power")]
    pub noise_power: f32,

    /// Расстояние между соседними узлами сетки в мировых единицах
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Смещение шума `[x, z]` — сдвигает ландшафт без изменения параметров
    #[serde(default)]
    pub noise_offset: [f32; 2],

    /// Шероховатость нижнего диапазона высот
    #[serde(default)]
    pub lower_layer: NoiseLayer,

    /// Шероховатость верхнего диапазона высот
    #[serde(default)]
    pub upper_layer: NoiseLayer,

    /// Доля рельефа сверху, к которой применяется верхний слой (0 = только нижний слой)
    #[serde(default)]
    pub upper_height_percent: f32,

    /// Ширина полосы плавного перехода между слоями (доля перепада высот)
    #[serde(default)]
    pub blend_band: f32,

    /// Уровень воды как доля между минимальной и максимальной высотой
    #[serde(default)]
    pub relative_water_height: f32,
}

fn default_height_density() -> f32 {
    0.05
}
fn default_height_variety() -> f32 {
    10.0
}
fn default_noise_power() -> f32 {
    1.0
}
fn default_scale() -> f32 {
    1.0
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            height_density: 0.05,
            height_variety: 10.0,
            noise_power: 1.0,
            scale: 1.0,
            noise_offset: [0.0, 0.0],
            lower_layer: NoiseLayer::default(),
            upper_layer: NoiseLayer::default(),
            upper_height_percent: 0.0,
            blend_band: 0.0,
            relative_water_height: 0.0,
        }
    }
}

/// Источник центроидов диаграммы Вороного
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CentroidSource {
    /// Случайные точки, отдельный набор для каждой климатической оси
    Random { count: usize },
    /// Локальные минимумы высот в квадратном окне заданного радиуса (общие для обеих осей)
    LocalMinima { radius: u32 },
}

impl Default for CentroidSource {
    fn default() -> Self {
        CentroidSource::Random { count: 12 }
    }
}

/// Климатические зоны
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateSettings {
    pub centroids: CentroidSource,

    /// Показатель метрики Минковского: 1 = манхэттенская, 2 = евклидова
    pub minkowski_lambda: f32,

    /// Средняя температура [0, 1]: смещает выбор крайних уровней к жаркому
    pub average_temperature: f32,

    /// Средние осадки [0, 1]
    pub average_precipitation: f32,

    /// Доля рельефа сверху, которая становится на уровень холоднее
    pub relative_cold_heights: f32,

    /// Радиус (в узлах) вокруг воды, где осадков становится на уровень больше
    pub humidity_spread: u32,
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            centroids: CentroidSource::default(),
            minkowski_lambda: 3.0,
            average_temperature: 0.5,
            average_precipitation: 0.5,
            relative_cold_heights: 0.0,
            humidity_spread: 0,
        }
    }
}

/// Постобработка карты биомов и сплат-масок
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologySettings {
    /// Удалять мелкие связные области
    pub eliminate_small_regions: bool,

    /// Области меньше `width × height × elimination_fraction` удаляются
    pub elimination_fraction: f32,

    /// Применять морфологическое открытие к каждому биому
    pub open_biomes: bool,

    /// Толщина полосы смешивания на границе биомов в пикселях (0 = без смешивания)
    pub blend_band_width: u32,

    /// Интенсивность цвета в полосе смешивания
    pub blend_gradation_factor: f32,

    /// Ускорение затухания цвета за границей области
    pub fading_out_factor: f32,
}

impl Default for MorphologySettings {
    fn default() -> Self {
        Self {
            eliminate_small_regions: true,
            elimination_fraction: 0.001,
            open_biomes: false,
            blend_band_width: 4,
            blend_gradation_factor: 1.0,
            fading_out_factor: 0.5,
        }
    }
}

/// Диапазон `[min, max]` (включительно)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Span<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Количество точек и минимальное расстояние между ними
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PointCount {
    pub min: u32,
    pub max: u32,
    pub min_distance: f32,
}

/// Треугольная кривая привлекательности: слишком близко / лучше всего / слишком далеко
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InterestCurve {
    pub too_close: f32,
    pub best: f32,
    pub too_far: f32,
}

impl InterestCurve {
    /// Гарантирует `too_close <= best <= too_far`
    #[must_use]
    pub fn normalized(self) -> Self {
        let best = self.best.max(self.too_close);
        Self {
            too_close: self.too_close,
            best,
            too_far: self.too_far.max(best),
        }
    }
}

/// Планировка поселения
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    /// Строить поселение
    pub enabled: bool,

    /// Предел итераций для каждого поиска
    pub max_iterations: u32,

    /// Во сколько раз уменьшается сетка для загородных дорог
    pub resolution_divider: u32,

    /// Во сколько раз увеличивается сетка для маски улиц
    pub street_mask_resolution: u32,

    /// Сколько раз сужаются дороги на маске улиц
    pub street_erosion: u32,

    /// Радиус поселения в узлах
    pub radius: Span<u32>,

    /// Минимальная площадь как доля максимально возможной (ромб радиуса)
    pub relative_min_size: f32,

    /// Входы дорог в поселение
    pub road_entries: PointCount,

    /// Допустимая крутизна для застройки и дорог [0, 1]
    pub steepness: Span<f32>,

    /// Допустимое расстояние до воды (игнорируется, если воды нет)
    pub water_distance: Span<i32>,

    pub houses: Span<u32>,

    /// Соседи-дома
    pub sociability: InterestCurve,
    /// Храм
    pub worship: InterestCurve,
    /// Дороги
    pub accessibility: InterestCurve,
    /// Укрепления
    pub defense: InterestCurve,

    /// Дальше этого расстояния до POI высота дома не влияет на привлекательность
    pub domination_max_distance: f32,

    /// POI ставятся только на `poi_height_restriction × 100%` самых высоких ячеек
    pub poi_height_restriction: f32,

    pub religious: PointCount,
    pub fortifications: PointCount,

    /// Цена прохода по существующей дороге
    pub road_weight: f32,

    /// Строить кольцевые дороги от тупиковых домов
    pub road_cycles: bool,

    /// Минимальная длина кольцевой дороги
    pub min_road_cycle_length: usize,

    /// Угол раствора конуса поиска кольцевой дороги, в градусах
    pub road_cycle_angle: f32,

    /// Прореживать дороги, не несущие связности
    pub thin_roads: bool,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 500,
            resolution_divider: 5,
            street_mask_resolution: 4,
            street_erosion: 1,
            radius: Span::new(8, 12),
            relative_min_size: 0.4,
            road_entries: PointCount {
                min: 2,
                max: 3,
                min_distance: 6.0,
            },
            steepness: Span::new(0.0, 0.35),
            water_distance: Span::new(1, 40),
            houses: Span::new(12, 20),
            sociability: InterestCurve {
                too_close: 2.0,
                best: 3.0,
                too_far: 8.0,
            },
            worship: InterestCurve {
                too_close: 2.0,
                best: 5.0,
                too_far: 20.0,
            },
            accessibility: InterestCurve {
                too_close: 1.0,
                best: 1.0,
                too_far: 4.0,
            },
            defense: InterestCurve {
                too_close: 2.0,
                best: 6.0,
                too_far: 20.0,
            },
            domination_max_distance: 8.0,
            poi_height_restriction: 0.3,
            religious: PointCount {
                min: 1,
                max: 1,
                min_distance: 5.0,
            },
            fortifications: PointCount {
                min: 0,
                max: 1,
                min_distance: 5.0,
            },
            road_weight: 0.0,
            road_cycles: false,
            min_road_cycle_length: 3,
            road_cycle_angle: 70.0,
            thin_roads: false,
        }
    }
}

/// Вариант растения с частотой появления
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefabWeight {
    pub name: String,
    /// Частота = frequency / сумма частот набора
    pub frequency: u32,
}

/// Набор растений одного биома
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VegetationSet {
    pub name: String,
    /// Добавляется к шагу посадки; отрицательное значение отключает набор
    #[serde(default)]
    pub density_penalty: i32,
    #[serde(default)]
    pub prefabs: Vec<PrefabWeight>,
}

/// Расстановка растительности
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationSettings {
    pub noise_density: f32,
    pub noise_offset: [f32; 2],
    /// Размер лесов (0..1.5)
    pub forest_size: f32,
    /// Случайный разброс пригодности (0..0.5)
    pub forest_spread: f32,
    /// Растение ставится не чаще, чем раз в `forest_density` узлов (1..10)
    pub forest_density: u32,
    /// Доля самых крутых склонов, где растения почти не растут [0, 1]
    pub steepness_influence: f32,
    /// Доля высот снизу, где растения растут свободно [0, 1]
    pub relative_tree_height_limit: f32,
    /// Девять наборов: индекс `температура × 3 + осадки`; пусто — растительность отключена
    pub sets: Vec<VegetationSet>,
}

impl Default for VegetationSettings {
    fn default() -> Self {
        Self {
            noise_density: 0.05,
            noise_offset: [0.0, 0.0],
            forest_size: 0.8,
            forest_spread: 0.1,
            forest_density: 3,
            steepness_influence: 0.3,
            relative_tree_height_limit: 0.8,
            sets: Vec::new(),
        }
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация одного прогона. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Ширина сетки в узлах, включая замыкающую рамку
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота сетки в узлах, включая замыкающую рамку
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub preset: TerrainPreset,

    #[serde(default)]
    pub terrain: TerrainSettings,

    #[serde(default)]
    pub climate: ClimateSettings,

    #[serde(default)]
    pub morphology: MorphologySettings,

    #[serde(default)]
    pub settlement: SettlementSettings,

    #[serde(default)]
    pub vegetation: VegetationSettings,
}

fn default_width() -> u32 {
    103
}
fn default_height() -> u32 {
    103
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 103,
            height: 103,
            preset: TerrainPreset::Custom,
            terrain: TerrainSettings::default(),
            climate: ClimateSettings::default(),
            morphology: MorphologySettings::default(),
            settlement: SettlementSettings::default(),
            vegetation: VegetationSettings::default(),
        }
    }
}

impl WorldParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// width = 128
    /// height = 128
    /// preset = "Islands"
    ///
    /// [climate]
    /// centroids = { LocalMinima = { radius = 6 } }
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        Ok(params)
    }

    /// Параметры рельефа с применённым пресетом
    #[must_use]
    pub fn effective_terrain(&self) -> TerrainSettings {
        let mut terrain = self.terrain.clone();
        self.preset.apply(&mut terrain);
        terrain
    }

    /// Проверяет конфигурацию до запуска генерации.
    ///
    /// Исчерпание итераций во время генерации ошибкой не является; здесь ловятся
    /// только параметры, с которыми результат не определён.
    pub fn validate(&self) -> Result<()> {
        if self.width < 3 || self.height < 3 {
            return Err(GenError::config(format!(
                "сетка {}×{} слишком мала: нужна хотя бы одна внутренняя ячейка",
                self.width, self.height
            )));
        }

        let terrain = self.effective_terrain();
        if terrain.scale <= 0.0 {
            return Err(GenError::config("terrain.scale должен быть > 0"));
        }
        if !(0.0..=1.0).contains(&terrain.relative_water_height) {
            return Err(GenError::config(
                "terrain.relative_water_height вне диапазона [0, 1]",
            ));
        }

        if self.climate.minkowski_lambda <= 0.0 {
            return Err(GenError::config("climate.minkowski_lambda должен быть > 0"));
        }
        if let CentroidSource::Random { count: 0 } = self.climate.centroids {
            return Err(GenError::config(
                "climate.centroids: количество случайных центроидов равно 0",
            ));
        }

        let morph = &self.morphology;
        if !(0.0..=1.0).contains(&morph.elimination_fraction) {
            return Err(GenError::config(
                "morphology.elimination_fraction вне диапазона [0, 1]",
            ));
        }
        if morph.blend_band_width > 0 && morph.blend_gradation_factor <= 0.0 {
            return Err(GenError::config(
                "morphology.blend_gradation_factor должен быть > 0 при ненулевой полосе смешивания",
            ));
        }

        if self.settlement.enabled {
            self.validate_settlement()?;
        }
        self.validate_vegetation()
    }

    fn validate_settlement(&self) -> Result<()> {
        let s = &self.settlement;
        if s.resolution_divider == 0 || s.street_mask_resolution == 0 {
            return Err(GenError::config(
                "settlement: множители разрешения должны быть >= 1",
            ));
        }
        if s.resolution_divider > self.width.min(self.height) {
            return Err(GenError::config(
                "settlement.resolution_divider больше размера сетки",
            ));
        }
        if s.max_iterations == 0 {
            return Err(GenError::config("settlement.max_iterations должен быть > 0"));
        }
        let counts = [
            ("road_entries", s.road_entries),
            ("religious", s.religious),
            ("fortifications", s.fortifications),
        ];
        for (name, count) in counts {
            if count.min > count.max {
                return Err(GenError::config(format!("settlement.{name}: min > max")));
            }
        }
        if !s.radius.is_ordered()
            || !s.houses.is_ordered()
            || !s.steepness.is_ordered()
            || !s.water_distance.is_ordered()
        {
            return Err(GenError::config("settlement: диапазон с min > max"));
        }
        if !(0.01..=1.0).contains(&s.poi_height_restriction) {
            return Err(GenError::config(
                "settlement.poi_height_restriction вне диапазона [0.01, 1]",
            ));
        }
        Ok(())
    }

    fn validate_vegetation(&self) -> Result<()> {
        let v = &self.vegetation;
        if v.sets.is_empty() {
            return Ok(());
        }
        if v.sets.len() != 9 {
            return Err(GenError::config(format!(
                "vegetation.sets: ожидается 9 наборов (по одному на биом), получено {}",
                v.sets.len()
            )));
        }
        if v.forest_density == 0 {
            return Err(GenError::config("vegetation.forest_density должен быть >= 1"));
        }
        for set in &v.sets {
            let total: u64 = set.prefabs.iter().map(|p| u64::from(p.frequency)).sum();
            if !set.prefabs.is_empty() && total == 0 {
                return Err(GenError::config(format!(
                    "vegetation.sets[{}]: сумма частот равна 0",
                    set.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(WorldParams::default().validate().is_ok());
    }

    #[test]
    fn zero_random_centroids_fail_fast() {
        let mut params = WorldParams::default();
        params.climate.centroids = CentroidSource::Random { count: 0 };
        assert!(matches!(
            params.validate(),
            Err(GenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let params = WorldParams {
            width: 2,
            ..WorldParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_weight_vegetation_set_is_rejected() {
        let mut params = WorldParams::default();
        params.vegetation.sets = (0..9)
            .map(|i| VegetationSet {
                name: format!("set{i}"),
                density_penalty: 0,
                prefabs: vec![PrefabWeight {
                    name: "tree".into(),
                    frequency: u32::from(i != 4),
                }],
            })
            .collect();
        assert!(params.validate().is_err());
    }

    #[test]
    fn preset_overrides_terrain() {
        let params = WorldParams {
            preset: TerrainPreset::Mountains,
            ..WorldParams::default()
        };
        let terrain = params.effective_terrain();
        assert_eq!(terrain.height_variety, 25.0);
        assert_eq!(terrain.upper_height_percent, 0.5);
        assert_eq!(terrain.scale, params.terrain.scale);
    }

    #[test]
    fn interest_curve_is_normalized() {
        let curve = InterestCurve {
            too_close: 5.0,
            best: 2.0,
            too_far: 1.0,
        }
        .normalized();
        assert_eq!((curve.too_close, curve.best, curve.too_far), (5.0, 5.0, 5.0));
    }

    #[test]
    fn parses_minimal_toml() {
        let params: WorldParams = toml::from_str(
            r#"
            seed = 7
            width = 40
            height = 30
            preset = "Islands"

            [climate]
            centroids = { LocalMinima = { radius = 4 } }
            minkowski_lambda = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.climate.centroids, CentroidSource::LocalMinima { radius: 4 });
        assert_eq!(params.settlement.max_iterations, 500);
        assert!(params.validate().is_ok());
    }
}
