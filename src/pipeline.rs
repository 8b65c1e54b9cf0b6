// src/pipeline.rs
//! Полный прогон генерации мира
//!
//! Стадии выполняются строго по порядку, каждая получает готовые результаты
//! предыдущих:
//!
//! 1. Карта высот → уровень воды, поле расстояний до воды, крутизна
//! 2. Климат: температура и осадки по диаграммам Вороного, поправки на горы и воду
//! 3. Биомы: слияние осей, удаление мелких областей, открытие, сплат-маски, смешивание
//! 4. Поселение
//! 5. Растительность
//!
//! Каждая стадия со случайностью получает свой `ChaCha8Rng`, засеянный
//! от общего сида, поэтому изменение одной стадии не сдвигает остальные.

use crate::biome::{self, BiomeClass, Splat, extract_splatmaps, merge_climate};
use crate::climate::{ClimateAxis, ClimateMap, Intensity, apply_mountain_cold, apply_water_humidity, random_centroids};
use crate::config::{CentroidSource, WorldParams};
use crate::error::Result;
use crate::grid::{Coord, Grid};
use crate::heightmap::{Heightmap, find_local_minima, generate_heightmap};
use crate::morphology::{blend_borders, eliminate_small_regions, open};
use crate::settlement::png::{SettlementSummary, settlement_image};
use crate::settlement::street::street_mask;
use crate::settlement::{CellState, Settlement, SettlementTerrain, generate_settlement};
use crate::steepness::compute_steepness;
use crate::vegetation::{Placement, VegetationInputs, plan_vegetation};
use crate::water::{WaterDistance, water_level, water_mask};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Смещения сида для стадий
#[derive(Debug, Clone, Copy)]
enum Stage {
    Temperature = 1,
    Precipitation = 2,
    Settlement = 3,
    Vegetation = 4,
    VegetationNoise = 5,
}

fn stage_seed(seed: u64, stage: Stage) -> u64 {
    seed.wrapping_add(stage as u64)
}

fn stage_rng(seed: u64, stage: Stage) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(stage_seed(seed, stage))
}

/// Результат генерации.
///
/// Растровые слои (высоты, вода, крутизна, климат, биомы, сплаты) строятся
/// детерминированно и всегда полны, если `generate_world` вернула `Ok`.
/// Частичным может быть только поселение: его поиски ограничены
/// `max_iterations`, и признак готовности хранится в `Settlement::complete`.
#[derive(Debug, Clone)]
pub struct World {
    pub heightmap: Heightmap,
    /// Абсолютная высота воды
    pub water_level: f32,
    pub water_mask: Grid<bool>,
    pub water_distance: WaterDistance,
    pub steepness: Grid<f32>,
    pub temperature: ClimateMap,
    pub precipitation: ClimateMap,
    /// Биомы после морфологической обработки
    pub biomes: Grid<BiomeClass>,
    /// Размытые сплат-маски по уровню температуры
    pub splats: [Grid<Splat>; 3],
    pub settlement: Option<Settlement>,
    pub vegetation: Vec<Placement>,
    /// Разрешение маски улиц и число проходов эрозии
    street_mask_params: (u32, u32),
}

impl World {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.heightmap.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.heightmap.height()
    }

    #[must_use]
    pub fn height_at(&self, x: u32, y: u32) -> Option<f32> {
        self.heightmap.grid.get(x, y).copied()
    }

    #[must_use]
    pub fn climate_at(&self, x: u32, y: u32) -> Option<(Intensity, Intensity)> {
        let t = self.temperature.grid.get(x, y)?;
        let p = self.precipitation.grid.get(x, y)?;
        Some((*t, *p))
    }

    #[must_use]
    pub fn biome_at(&self, x: u32, y: u32) -> Option<BiomeClass> {
        self.biomes.get(x, y).copied()
    }

    #[must_use]
    pub fn settlement_at(&self, x: u32, y: u32) -> Option<CellState> {
        self.settlement.as_ref()?.map.get(x, y).copied()
    }

    /// Поселение построено полностью (область достигла минимального размера).
    /// `false`, если поселение отключено или не найдено место
    #[must_use]
    pub fn is_settlement_complete(&self) -> bool {
        self.settlement.as_ref().is_some_and(|s| s.complete)
    }

    /// Сохраняет все слои в каталог; возвращает пути записанных файлов
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        let mut path = |name: &str| {
            let p = dir.join(name);
            written.push(p.clone());
            p
        };

        self.heightmap.save_as_png(path("height.png"))?;
        self.steepness.save_as_png(path("steepness.png"))?;
        self.water_distance.visualize().save_as_png(path("water_distance.png"))?;
        biome::save_image(
            &biome::intensity_image(&self.temperature.grid, ClimateAxis::Temperature),
            path("temperature.png"),
        )?;
        biome::save_image(
            &biome::intensity_image(&self.precipitation.grid, ClimateAxis::Precipitation),
            path("precipitation.png"),
        )?;
        biome::save_image(&biome::biome_image(&self.biomes), path("biomes.png"))?;
        for (t, splat) in self.splats.iter().enumerate() {
            biome::save_image(&biome::splat_image(splat), path(&format!("splat_{t}.png")))?;
        }

        if let Some(settlement) = &self.settlement {
            biome::save_image(&settlement_image(&settlement.map), path("settlement.png"))?;
            biome::save_image(&settlement_image(&settlement.low_res), path("settlement_low_res.png"))?;
            let (resolution, erosion) = self.street_mask_params;
            street_mask(&settlement.map, resolution, erosion).save(path("streets.png"))?;
            SettlementSummary::new(settlement).save_json(path("settlement.json"))?;
        }

        if !self.vegetation.is_empty() {
            let writer = BufWriter::new(File::create(path("vegetation.json"))?);
            serde_json::to_writer_pretty(writer, &self.vegetation)?;
        }

        log::info!("Сохранено файлов: {} в {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Центроиды обеих осей: случайные (свои для каждой оси) или общие локальные минимумы
fn centroids(
    source: CentroidSource,
    heightmap: &Heightmap,
    temperature_rng: &mut ChaCha8Rng,
    precipitation_rng: &mut ChaCha8Rng,
) -> (Vec<Coord>, Vec<Coord>) {
    let (w, h) = (heightmap.width(), heightmap.height());
    match source {
        CentroidSource::Random { count } => (
            random_centroids(count, w, h, temperature_rng),
            random_centroids(count, w, h, precipitation_rng),
        ),
        CentroidSource::LocalMinima { radius } => {
            let minima = find_local_minima(heightmap, radius);
            (minima.clone(), minima)
        }
    }
}

/// Генерирует мир целиком.
///
/// Конфигурация проверяется до запуска первой стадии. Ошибка означает,
/// что мир не построен вовсе; неудачный поиск места для поселения ошибкой
/// не считается, см. [`World::is_settlement_complete`].
pub fn generate_world(params: &WorldParams) -> Result<World> {
    params.validate()?;
    let (width, height) = (params.width, params.height);
    let terrain = params.effective_terrain();
    log::info!("Генерация мира {width}×{height}, сид {}", params.seed);

    // === 1. Рельеф и вода ===
    let heightmap = generate_heightmap(params.seed, width, height, &terrain)?;
    let level = water_level(&heightmap, terrain.relative_water_height);
    let mask = water_mask(&heightmap, level);
    let water_distance = WaterDistance::compute(&mask);
    let steepness = compute_steepness(&heightmap, terrain.scale);
    log::info!(
        "Вода: уровень {level:.3}, наибольшее расстояние {}",
        water_distance.max_distance
    );

    // === 2. Климат ===
    let climate = &params.climate;
    let mut t_rng = stage_rng(params.seed, Stage::Temperature);
    let mut p_rng = stage_rng(params.seed, Stage::Precipitation);
    let (t_centroids, p_centroids) = centroids(climate.centroids, &heightmap, &mut t_rng, &mut p_rng);
    let mut temperature = ClimateMap::classify(
        ClimateAxis::Temperature,
        width,
        height,
        t_centroids,
        climate.minkowski_lambda,
        climate.average_temperature,
        &mut t_rng,
    );
    let mut precipitation = ClimateMap::classify(
        ClimateAxis::Precipitation,
        width,
        height,
        p_centroids,
        climate.minkowski_lambda,
        climate.average_precipitation,
        &mut p_rng,
    );
    apply_mountain_cold(&mut temperature.grid, &heightmap, climate.relative_cold_heights);
    apply_water_humidity(&mut precipitation.grid, &mask, climate.humidity_spread);

    // === 3. Биомы ===
    let morph = &params.morphology;
    let mut biomes = merge_climate(&temperature.grid, &precipitation.grid)?;
    if morph.eliminate_small_regions {
        biomes = eliminate_small_regions(&biomes, morph.elimination_fraction, BiomeClass::default());
    }
    if morph.open_biomes {
        biomes = open(&biomes);
    }
    let [s0, s1, s2] = extract_splatmaps(&biomes);
    let blend = |s: &Grid<Splat>| {
        blend_borders(
            s,
            morph.blend_band_width,
            morph.blend_gradation_factor,
            morph.fading_out_factor,
        )
    };
    let splats = [blend(&s0)?, blend(&s1)?, blend(&s2)?];

    // === 4. Поселение ===
    let settlement = if params.settlement.enabled {
        let mut rng = stage_rng(params.seed, Stage::Settlement);
        let terrain = SettlementTerrain {
            heights: &heightmap.grid,
            steepness: &steepness,
            water: &water_distance,
        };
        Some(generate_settlement(terrain, &params.settlement, &mut rng)?)
    } else {
        log::info!("Поселение отключено");
        None
    };

    // === 5. Растительность ===
    let vegetation = {
        let mut rng = stage_rng(params.seed, Stage::Vegetation);
        let inputs = VegetationInputs {
            heightmap: &heightmap,
            steepness: &steepness,
            splats: &splats,
            settlement: settlement.as_ref().map(|s| &s.map),
            water_level: level,
        };
        plan_vegetation(
            inputs,
            &params.vegetation,
            stage_seed(params.seed, Stage::VegetationNoise),
            &mut rng,
        )?
    };

    Ok(World {
        heightmap,
        water_level: level,
        water_mask: mask,
        water_distance,
        steepness,
        temperature,
        precipitation,
        biomes,
        splats,
        settlement,
        vegetation,
        street_mask_params: (
            params.settlement.street_mask_resolution,
            params.settlement.street_erosion,
        ),
    })
}
