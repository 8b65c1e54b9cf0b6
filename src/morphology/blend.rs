// src/morphology/blend.rs
//! Полоса смешивания на границах сплат-масок
//!
//! Каждый канал обрабатывается отдельно за `band` проходов. Первая половина
//! проходов вносит цвет внутрь области от её границы, вторая выводит его наружу,
//! с ускорением затухания на каждом проходе. Проход читает снимок растра
//! и пишет в новый, значения округляются до сотых.

use crate::biome::Splat;
use crate::error::{GenError, Result};
use crate::grid::{Coord, Grid, NEIGHBORS_8};

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Параметры одного смешивания
#[derive(Debug, Clone, Copy)]
struct Gradation {
    band: u32,
    /// Шаг изменения цвета за проход
    step: f32,
    fading_out: f32,
}

fn fade_in(read: &Grid<Splat>, write: &mut Grid<Splat>, pos: Coord, channel: usize, g: Gradation) {
    if read[pos][channel] != 1.0 {
        return;
    }
    let floor = 1.0 - g.step * (g.band / 2) as f32;
    let neighbor = read
        .neighbors(pos, &NEIGHBORS_8)
        .map(|n| read[n][channel])
        .find(|&v| v < 1.0);
    if let Some(nv) = neighbor {
        write[pos][channel] = round2((nv + g.step).max(floor).min(1.0));
    }
}

fn fade_out(
    read: &Grid<Splat>,
    write: &mut Grid<Splat>,
    pos: Coord,
    channel: usize,
    pass: u32,
    g: Gradation,
) {
    let value = read[pos][channel];
    if value <= 0.0 {
        return;
    }
    let faded = round2((value - (g.step + g.step * g.fading_out * pass as f32)).max(0.0));
    for n in read.neighbors(pos, &NEIGHBORS_8) {
        if read[n][channel] <= 0.0 {
            write[n][channel] = faded;
        }
    }
}

/// Размывает границы областей сплат-маски.
///
/// `band == 0` возвращает копию без изменений. Шаг цвета равен
/// `1 / (band × gradation_factor)`, поэтому множитель обязан быть положительным.
pub fn blend_borders(
    splat: &Grid<Splat>,
    band: u32,
    gradation_factor: f32,
    fading_out: f32,
) -> Result<Grid<Splat>> {
    if band == 0 {
        return Ok(splat.clone());
    }
    if gradation_factor <= 0.0 {
        return Err(GenError::config(
            "множитель градации смешивания должен быть > 0",
        ));
    }
    let g = Gradation {
        band,
        step: 1.0 / (band as f32 * gradation_factor),
        fading_out,
    };

    let mut current = splat.clone();
    for channel in 0..3 {
        for pass in 0..band {
            let mut next = current.clone();
            for pos in current.coords() {
                if pass < band / 2 {
                    fade_in(&current, &mut next, pos, channel, g);
                } else {
                    fade_out(&current, &mut next, pos, channel, pass, g);
                }
            }
            current = next;
        }
    }
    Ok(current)
}
