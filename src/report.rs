//! Генерация: построение каталога, вычисление для каждого xlen и вывод.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};

use log::info;
use serde::Serialize;

use crate::bsv;
use crate::catalog::{self, Resolved, XLEN};
use crate::config::{GenConfig, ModeKind, OutputFormat};
use crate::csr::{Csr, Field};
use crate::error::SymbResult;
use crate::evaluator::{Context, Evaluator};
use crate::mode::{Eager, Symbolic};

/// Результат генерации для одного значения xlen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub xlen: i64,
    /// Текстовое представление поля `vm_mode` до вычисления
    pub vm_mode: String,
    pub fields: Vec<Field>,
    pub csrs: Vec<Csr>,
}

impl Generation {
    fn new(xlen: i64, vm_mode: String, resolved: Resolved) -> Self {
        info!(
            "xlen={}: {} fields, {} CSRs",
            xlen,
            resolved.fields.len(),
            resolved.csrs.len()
        );
        Self {
            xlen,
            vm_mode,
            fields: resolved.fields,
            csrs: resolved.csrs,
        }
    }
}

/// Построить и вычислить каталог для всех xlen из конфигурации.
pub fn run(config: &GenConfig) -> SymbResult<Vec<Generation>> {
    config.validate()?;
    match config.mode {
        ModeKind::Symbolic => {
            let catalog = catalog::build(&Symbolic::new())?;
            let vm_mode = catalog.vm_mode.to_string();
            let mut evaluator = Evaluator::new();
            let generations = config
                .xlen
                .iter()
                .map(|&xlen| {
                    let ctx = Context::new().with(XLEN, xlen);
                    let resolved = catalog.realize(&mut evaluator, &ctx)?;
                    Ok(Generation::new(xlen, vm_mode.clone(), resolved))
                })
                .collect::<SymbResult<Vec<_>>>()?;
            let stats = evaluator.stats();
            info!("memo: {} hits, {} misses", stats.hits, stats.misses);
            Ok(generations)
        }
        ModeKind::Eager => config
            .xlen
            .iter()
            .map(|&xlen| {
                let mode = Eager::new(Context::new().with(XLEN, xlen));
                let catalog = catalog::build(&mode)?;
                let resolved = catalog.concrete()?;
                Ok(Generation::new(xlen, catalog.vm_mode.to_string(), resolved))
            })
            .collect(),
    }
}

/// Отрисовать результаты в формате из конфигурации.
pub fn render(config: &GenConfig, generations: &[Generation]) -> SymbResult<String> {
    match config.format {
        OutputFormat::Report => Ok(render_report(config.mode, generations)),
        OutputFormat::Bsv => Ok(render_bsv(generations)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(generations)? + "\n"),
    }
}

/// Построить, вычислить и отрисовать.
pub fn generate(config: &GenConfig) -> SymbResult<String> {
    render(config, &run(config)?)
}

/// Записать текст в файл из конфигурации или в stdout.
pub fn emit(config: &GenConfig, text: &str) -> SymbResult<()> {
    match &config.output {
        Some(path) => {
            fs::write(path, text)?;
            info!("wrote {}", path.display());
        }
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn render_report(mode: ModeKind, generations: &[Generation]) -> String {
    let mut out = String::new();
    for generation in generations {
        if generations.len() > 1 {
            let _ = writeln!(out, "=== xlen = {} ===", generation.xlen);
        }
        if mode == ModeKind::Symbolic {
            let _ = writeln!(out, "symbolic example:");
        }
        let _ = writeln!(out, "str(vm_mode) = {}", generation.vm_mode);

        let _ = writeln!(out, "\nFields:");
        for field in &generation.fields {
            let _ = writeln!(out, "    {}", field);
        }
        let _ = writeln!(out, "\nCSRs:");
        for csr in &generation.csrs {
            let _ = writeln!(out, "    {}", csr);
        }
        let _ = writeln!(out, "\nBSV:");
        write_bsv(&mut out, generation);
        if generations.len() > 1 {
            out.push('\n');
        }
    }
    out
}

fn render_bsv(generations: &[Generation]) -> String {
    let mut out = String::new();
    for generation in generations {
        let _ = writeln!(out, "// xlen = {}", generation.xlen);
        write_bsv(&mut out, generation);
    }
    out
}

fn write_bsv(out: &mut String, generation: &Generation) {
    let _ = writeln!(out, "    // Field Definitions");
    for line in generation.fields.iter().filter_map(bsv::field_init) {
        let _ = writeln!(out, "    {}", line);
    }
    let _ = writeln!(out, "    // CSR Definitions");
    for csr in &generation.csrs {
        let _ = writeln!(out, "    {}", bsv::csr_init(csr));
    }
}
