//! symcsr CLI - генерация описаний CSR RISC-V.
//!
//! Использование:
//!   symcsr                          - отчёт для xlen = 64
//!   symcsr --xlen 32 --xlen 64      - несколько значений xlen
//!   symcsr --format bsv -o csrs.bsv - объявления BSV в файл
//!   symcsr --config symcsr.toml     - настройки из файла
//!
//! Подробность журнала задаётся переменной `RUST_LOG`.

use std::process::ExitCode;

use clap::Parser;

use symcsr::config::Cli;
use symcsr::report;
use symcsr::SymbResult;

fn run(cli: Cli) -> SymbResult<()> {
    let config = cli.into_config()?;
    let text = report::generate(&config)?;
    report::emit(&config, &text)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
