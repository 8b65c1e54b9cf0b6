use clap::Parser;
use std::path::PathBuf;
use worldgen::{WorldParams, generate_world};

/// Процедурный генератор мира: рельеф, климат, биомы, поселение
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог для сохранения слоёв (по умолчанию: ./output)
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Переопределить сид из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(path) => {
            log::info!("Загрузка конфигурации из {}", path.display());
            WorldParams::from_toml_file(path)?
        }
        None => {
            log::info!("Конфигурация не задана, используются параметры по умолчанию");
            WorldParams::default()
        }
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }

    let world = generate_world(&params)?;
    if world.settlement.is_some() && !world.is_settlement_complete() {
        log::warn!("Поселение построено не полностью");
    }

    let files = world.export(&cli.output)?;
    for file in &files {
        log::debug!("  {}", file.display());
    }
    log::info!("Готово: {} файлов в {}", files.len(), cli.output.display());
    Ok(())
}
