// src/morphology/mod.rs
//! Морфологическая постобработка растров классов
//!
//! - [`components`] — удаление мелких связных областей
//! - [`open`] — открытие (эрозия + дилатация) для каждого класса по очереди
//! - [`blend`] — диффузия на границах областей для сплат-масок
//!
//! Операторы не изменяют входной растр, а возвращают новый.

pub mod blend;
pub mod components;
pub mod open;

pub use blend::blend_borders;
pub use components::{Components, eliminate_small_regions, label_components};
pub use open::{dilate, distinct_values, erode, open};
