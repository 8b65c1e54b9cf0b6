// src/vegetation.rs
//! План расстановки растительности
//!
//! Сами модели не создаются: результат — список позиций с выбранным
//! биомом, набором, вариантом растения и поворотом.
//!
//! Пригодность узла — шум Перлина плюс случайный разброс, со штрафами за
//! крутизну и высоту. Биом узла выбирается случайно пропорционально
//! значениям размытых сплат-масок, поэтому на границах биомов леса смешиваются.

use crate::biome::{BiomeClass, Splat};
use crate::climate::Intensity;
use crate::config::{PrefabWeight, VegetationSettings};
use crate::error::{GenError, Result};
use crate::grid::{Coord, Grid, NEIGHBORS_8, lerp};
use crate::heightmap::{Heightmap, perlin, sample01};
use crate::settlement::CellState;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;

/// Штраф пригодности за крутой склон и за высоту выше предела
const FITNESS_PENALTY: f32 = 0.7;
/// Порог пригодности: растение ставится, если пригодность > `FOREST_THRESHOLD - forest_size`
const FOREST_THRESHOLD: f32 = 1.5;
/// Смещение внутри ячейки, после которого высота берётся у соседнего узла
const NEIGHBOR_OFFSET: f32 = 0.1666;

/// Одно растение
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    /// Позиция в координатах сетки со смещением внутри ячейки
    pub position: [f32; 2],
    pub height: f32,
    pub biome: BiomeClass,
    /// Индекс набора (`BiomeClass::index`)
    pub set: usize,
    pub prefab: usize,
    /// Поворот вокруг вертикали, градусы
    pub rotation: f32,
}

/// Готовые слои мира, нужные для посадки
#[derive(Debug, Clone, Copy)]
pub struct VegetationInputs<'a> {
    pub heightmap: &'a Heightmap,
    pub steepness: &'a Grid<f32>,
    /// Размытые сплат-маски по уровню температуры
    pub splats: &'a [Grid<Splat>; 3],
    pub settlement: Option<&'a Grid<CellState>>,
    pub water_level: f32,
}

/// Карта пригодности из шума Перлина в [0, 1]
#[must_use]
pub fn placement_noise(width: u32, height: u32, seed: u64, settings: &VegetationSettings) -> Grid<f32> {
    let noise = perlin(seed);
    let [ox, oy] = settings.noise_offset;
    Grid::par_from_fn(width, height, |x, y| {
        sample01(
            &noise,
            x as f32 * settings.noise_density + ox,
            y as f32 * settings.noise_density + oy,
        )
    })
}

/// Биом узла: случайный выбор пропорционально значениям сплат-масок.
/// Если все значения нулевые — средний биом.
fn choose_biome(splats: &[Grid<Splat>; 3], pos: Coord, rng: &mut impl Rng) -> BiomeClass {
    let weights: Vec<f32> = splats
        .iter()
        .flat_map(|splat| splat.get(pos.0, pos.1).copied().unwrap_or_default())
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => BiomeClass::from_index(dist.sample(rng)),
        Err(_) => BiomeClass::default(),
    }
}

/// Вариант растения по частотам набора
fn roll_prefab(prefabs: &[PrefabWeight], rng: &mut impl Rng) -> Result<usize> {
    let dist = WeightedIndex::new(prefabs.iter().map(|p| p.frequency))
        .map_err(|e| GenError::config(format!("частоты растений: {e}")))?;
    Ok(dist.sample(rng))
}

/// Шаг посадки для набора; отрицательный штраф фактически отключает набор
fn local_density(settings: &VegetationSettings, penalty: i32, max_map_size: u32) -> u32 {
    let penalty = u32::try_from(penalty).unwrap_or(max_map_size);
    settings.forest_density + penalty
}

fn vertex_offset(offset: f32) -> i32 {
    if offset < -NEIGHBOR_OFFSET {
        -1
    } else if offset > NEIGHBOR_OFFSET {
        1
    } else {
        0
    }
}

/// Ячейка занята зданием, дорогой или входом (или соседствует с ними)
fn is_blocked(settlement: Option<&Grid<CellState>>, pos: Coord) -> bool {
    let Some(map) = settlement else {
        return false;
    };
    let occupied = |s: CellState| !matches!(s, CellState::Outside | CellState::StandardArea | CellState::Border);
    occupied(map[pos]) || map.neighbors(pos, &NEIGHBORS_8).any(|n| occupied(map[n]))
}

struct Planner<'a> {
    inputs: VegetationInputs<'a>,
    settings: &'a VegetationSettings,
    noise: Grid<f32>,
    tree_height_limit: f32,
}

impl Planner<'_> {
    fn fitness(&self, pos: Coord, rng: &mut impl Rng) -> f32 {
        let s = self.settings;
        let mut fitness = self.noise[pos];
        if s.forest_spread > 0.0 {
            fitness += rng.gen_range(-s.forest_spread..s.forest_spread);
        }
        if self.inputs.steepness[pos] > 1.0 - s.steepness_influence {
            fitness -= FITNESS_PENALTY;
        }
        if self.inputs.heightmap.get(pos.0, pos.1) > self.tree_height_limit {
            fitness -= FITNESS_PENALTY;
        }
        fitness
    }

    /// Высота растения, смещённого внутри ячейки: интерполяция к соседнему узлу
    fn offset_height(&self, vertex: Coord, offset: (f32, f32)) -> f32 {
        let hm = self.inputs.heightmap;
        let base = hm.get(vertex.0, vertex.1);
        let nx = vertex.0 as i64 + i64::from(vertex_offset(offset.0));
        let ny = vertex.1 as i64 + i64::from(vertex_offset(offset.1));
        if nx > 0 && ny > 0 && nx < i64::from(hm.width()) - 1 && ny < i64::from(hm.height()) - 1 {
            let neighbor = hm.get(nx as u32, ny as u32);
            lerp(base, neighbor, offset.0.abs().max(offset.1.abs()))
        } else {
            base
        }
    }

    fn in_map(&self, position: [f32; 2]) -> bool {
        let w = self.noise.width() as f32 - 1.0;
        let h = self.noise.height() as f32 - 1.0;
        position[0] >= 1.0 && position[0] < w - 1.0 && position[1] >= 1.0 && position[1] < h - 1.0
    }

    fn visit(&self, cell: Coord, rng: &mut impl Rng) -> Result<Option<Placement>> {
        let (width, height) = (self.noise.width(), self.noise.height());
        let biome = choose_biome(self.inputs.splats, cell, rng);
        let set_index = biome.index();
        let Some(set) = self.settings.sets.get(set_index) else {
            return Ok(None);
        };

        let density = local_density(self.settings, set.density_penalty, width.max(height));
        let vertex = (
            cell.0 + rng.gen_range(0..density.saturating_sub(1).max(1)),
            cell.1 + rng.gen_range(0..density.saturating_sub(1).max(1)),
        );
        if vertex.0 >= width
            || vertex.1 >= height
            || cell.0 % density != 0
            || cell.1 % density != 0
            || self.fitness(vertex, rng) <= FOREST_THRESHOLD - self.settings.forest_size
        {
            return Ok(None);
        }

        let offset: (f32, f32) = (rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
        let height_at = self.offset_height(vertex, offset);
        let position = [vertex.0 as f32 + offset.0, vertex.1 as f32 + offset.1];
        let rounded = (position[0].round() as u32, position[1].round() as u32);

        if !self.in_map(position)
            || height_at <= self.inputs.water_level
            || is_blocked(self.inputs.settlement, rounded)
            || set.prefabs.is_empty()
        {
            return Ok(None);
        }

        let prefab = roll_prefab(&set.prefabs, rng)?;
        Ok(Some(Placement {
            position,
            height: height_at,
            biome,
            set: set_index,
            prefab,
            rotation: rng.gen_range(0.0..360.0),
        }))
    }
}

/// Строит план растительности.
///
/// Пустой список наборов отключает растительность. Частоты проверяются
/// заранее; набор с нулевой суммой частот даёт `InvalidConfig`.
pub fn plan_vegetation(
    inputs: VegetationInputs<'_>,
    settings: &VegetationSettings,
    noise_seed: u64,
    rng: &mut impl Rng,
) -> Result<Vec<Placement>> {
    if settings.sets.is_empty() {
        log::info!("Растительность отключена: наборы не заданы");
        return Ok(Vec::new());
    }

    let hm = inputs.heightmap;
    let planner = Planner {
        inputs,
        settings,
        noise: placement_noise(hm.width(), hm.height(), noise_seed, settings),
        tree_height_limit: hm.max - (hm.max - hm.min) * (1.0 - settings.relative_tree_height_limit),
    };

    let mut placements = Vec::new();
    for cell in planner.noise.coords() {
        if let Some(p) = planner.visit(cell, rng)? {
            placements.push(p);
        }
    }

    let per_level = Intensity::ALL.map(|t| placements.iter().filter(|p| p.biome.temperature == t).count());
    log::info!(
        "Растительность: {} растений (по температуре {:?})",
        placements.len(),
        per_level
    );
    Ok(placements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VegetationSet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sets(frequency: u32) -> Vec<VegetationSet> {
        (0..9)
            .map(|i| VegetationSet {
                name: format!("set{i}"),
                density_penalty: 0,
                prefabs: vec![
                    PrefabWeight {
                        name: "oak".into(),
                        frequency,
                    },
                    PrefabWeight {
                        name: "pine".into(),
                        frequency: 0,
                    },
                ],
            })
            .collect()
    }

    struct World {
        heightmap: Heightmap,
        steepness: Grid<f32>,
        splats: [Grid<Splat>; 3],
    }

    impl World {
        fn flat(size: u32) -> Self {
            let splat = |t: usize| Grid::new(size, size, if t == 2 { [0.0, 1.0, 0.0] } else { [0.0; 3] });
            Self {
                heightmap: Heightmap {
                    grid: Grid::new(size, size, 0.5),
                    min: 0.0,
                    max: 1.0,
                },
                steepness: Grid::new(size, size, 0.0),
                splats: [splat(0), splat(1), splat(2)],
            }
        }

        fn inputs(&self) -> VegetationInputs<'_> {
            VegetationInputs {
                heightmap: &self.heightmap,
                steepness: &self.steepness,
                splats: &self.splats,
                settlement: None,
                water_level: 0.1,
            }
        }
    }

    fn lush() -> VegetationSettings {
        VegetationSettings {
            forest_size: 1.5,
            forest_density: 2,
            sets: sets(3),
            ..VegetationSettings::default()
        }
    }

    #[test]
    fn disabled_without_sets() {
        let world = World::flat(20);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let plan = plan_vegetation(world.inputs(), &VegetationSettings::default(), 1, &mut rng).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn splat_weights_pick_the_biome() {
        let world = World::flat(20);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let plan = plan_vegetation(world.inputs(), &lush(), 3, &mut rng).unwrap();
        assert!(!plan.is_empty());
        for p in &plan {
            assert_eq!(p.biome, BiomeClass::new(Intensity::High, Intensity::Mid));
            assert_eq!(p.set, 7);
            // частота второго варианта нулевая
            assert_eq!(p.prefab, 0);
            assert!((0.0..360.0).contains(&p.rotation));
        }
    }

    #[test]
    fn zero_splats_fall_back_to_middle_biome() {
        let splats = [Grid::new(2, 2, [0.0; 3]), Grid::new(2, 2, [0.0; 3]), Grid::new(2, 2, [0.0; 3])];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(choose_biome(&splats, (1, 1), &mut rng), BiomeClass::default());
    }

    #[test]
    fn zero_frequency_sum_is_a_config_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let prefabs = vec![PrefabWeight {
            name: "dead".into(),
            frequency: 0,
        }];
        assert!(matches!(roll_prefab(&prefabs, &mut rng), Err(GenError::InvalidConfig(_))));
    }

    #[test]
    fn nothing_grows_under_water() {
        let mut world = World::flat(20);
        world.heightmap.grid = Grid::new(20, 20, 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert!(plan_vegetation(world.inputs(), &lush(), 3, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn settlement_structures_block_planting() {
        let world = World::flat(20);
        let village = Grid::new(20, 20, CellState::Road);
        let inputs = VegetationInputs {
            settlement: Some(&village),
            ..world.inputs()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(plan_vegetation(inputs, &lush(), 3, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn negative_penalty_disables_a_set() {
        let settings = lush();
        assert_eq!(local_density(&settings, -1, 64), 66);
        assert_eq!(local_density(&settings, 2, 64), 4);
    }
}
