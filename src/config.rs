//! Конфигурация генерации (symcsr.toml и флаги командной строки).
//!
//! Значения берутся из файла TOML, если он указан, а затем
//! переопределяются флагами.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{SymbError, SymbResult};

/// Поддерживаемые значения разрядности.
pub const SUPPORTED_XLEN: [i64; 3] = [32, 64, 128];

/// Режим построения каталога.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Построить граф один раз и вычислить его для каждого xlen
    #[default]
    Symbolic,
    /// Построить каталог заново для каждого xlen
    Eager,
}

/// Формат вывода.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Списки полей и регистров, затем объявления BSV
    #[default]
    Report,
    /// Только объявления BSV
    Bsv,
    /// Записи в JSON
    Json,
}

/// Настройки генерации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    /// Значения xlen, для которых строится каталог
    pub xlen: Vec<i64>,

    pub mode: ModeKind,

    pub format: OutputFormat,

    /// Файл вывода; без него вывод идёт в stdout
    pub output: Option<PathBuf>,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            xlen: vec![64],
            mode: ModeKind::default(),
            format: OutputFormat::default(),
            output: None,
        }
    }
}

impl GenConfig {
    /// Загрузить конфигурацию из файла.
    pub fn load(path: impl AsRef<Path>) -> SymbResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SymbError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Разобрать конфигурацию из строки TOML.
    pub fn parse(content: &str) -> SymbResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить согласованность значений.
    pub fn validate(&self) -> SymbResult<()> {
        if self.xlen.is_empty() {
            return Err(SymbError::Config("at least one xlen is required".to_string()));
        }
        if let Some(xlen) = self.xlen.iter().find(|x| !SUPPORTED_XLEN.contains(x)) {
            return Err(SymbError::Config(format!(
                "unsupported xlen {}, expected one of {:?}",
                xlen, SUPPORTED_XLEN
            )));
        }
        Ok(())
    }
}

/// Генератор объявлений CSR RISC-V с параметрической разрядностью
#[derive(Debug, Parser)]
#[command(name = "symcsr")]
#[command(version)]
#[command(about = "Generate RISC-V CSR declarations for one or more XLEN values", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// XLEN value; may be repeated
    #[arg(short, long)]
    pub xlen: Vec<i64>,

    /// Build mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeKind>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Итоговая конфигурация: файл, затем флаги.
    pub fn into_config(self) -> SymbResult<GenConfig> {
        let mut config = match &self.config {
            Some(path) => GenConfig::load(path)?,
            None => GenConfig::default(),
        };
        if !self.xlen.is_empty() {
            config.xlen = self.xlen;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GenConfig::default();
        assert_eq!(config.xlen, vec![64]);
        assert_eq!(config.mode, ModeKind::Symbolic);
        assert_eq!(config.format, OutputFormat::Report);
        assert!(config.output.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config = GenConfig::parse(
            r#"
xlen = [32, 64]
mode = "eager"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.xlen, vec![32, 64]);
        assert_eq!(config.mode, ModeKind::Eager);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(matches!(
            GenConfig::parse("xlen = [48]"),
            Err(SymbError::Config(_))
        ));
        assert!(matches!(
            GenConfig::parse("xlen = []"),
            Err(SymbError::Config(_))
        ));
        assert!(matches!(
            GenConfig::parse("mode = \"lazy\""),
            Err(SymbError::Config(_))
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "xlen = [32]\nformat = \"bsv\"").unwrap();

        let cli = Cli::try_parse_from([
            "symcsr",
            "--config",
            file.path().to_str().unwrap(),
            "--xlen",
            "64",
            "--xlen",
            "128",
            "--mode",
            "eager",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.xlen, vec![64, 128]);
        assert_eq!(config.mode, ModeKind::Eager);
        assert_eq!(config.format, OutputFormat::Bsv);
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["symcsr", "--config", "/nonexistent/symcsr.toml"]).unwrap();
        assert!(matches!(cli.into_config(), Err(SymbError::Config(_))));
    }
}
