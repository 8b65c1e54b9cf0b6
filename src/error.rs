// src/error.rs
//! Ошибки генератора мира
//!
//! Исчерпанные поиски (сид поселения, точки входа, пути) ошибками не считаются:
//! они логируются, а стадия возвращает частичный результат. Ошибка возвращается
//! только для некорректной конфигурации и сбоев ввода-вывода.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Некорректная конфигурация: {0}")]
    InvalidConfig(String),

    #[error("Размер сетки {width}×{height} не совпадает с длиной данных {len}")]
    GridSize { width: u32, height: u32, len: usize },

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка разбора TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Ошибка изображения: {0}")]
    Image(#[from] image::ImageError),

    #[error("Ошибка сериализации JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
