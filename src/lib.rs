//! # symcsr
//!
//! Отложенные (символические) выражения и их применение к описанию
//! регистров управления и состояния RISC-V с параметрической разрядностью.
//!
//! ## Основные модули
//!
//! - [`node`] - Граф отложенных вычислений
//! - [`deferred`] - Построение выражений через операторы
//! - [`evaluator`] - Вычисление графа в контексте с мемоизацией
//! - [`registry`] - Реестры созданных экземпляров
//! - [`mode`] - Символический и энергичный режимы построения
//!
//! ## Предметная область
//!
//! - [`csr`] - Поля и регистры
//! - [`catalog`] - Каталог CSR привилегированной архитектуры
//! - [`bsv`] - Объявления на Bluespec SystemVerilog
//!
//! ## Пример
//!
//! ```rust
//! use symcsr::{cond, symbol, Context, Evaluator, Value};
//!
//! let xlen = symbol("xlen");
//! let base = &xlen - 2;
//! let vm_mode = cond(xlen.ne(32), 4, 1);
//!
//! let mut evaluator = Evaluator::new();
//! for (width, expected) in [(64, 4), (32, 1)] {
//!     let ctx = Context::new().with("xlen", width);
//!     assert_eq!(evaluator.evaluate(&vm_mode, &ctx).unwrap(), Value::Int(expected));
//!     assert_eq!(evaluator.evaluate(&base, &ctx).unwrap(), Value::Int(width - 2));
//! }
//! ```

// === Ядро ===
pub mod deferred;
pub mod error;
pub mod evaluator;
pub mod macros;
pub mod mode;
pub mod node;
pub mod ops;
pub mod registry;
pub mod value;

// === Предметная область ===
pub mod bsv;
pub mod catalog;
pub mod csr;

// === Окружение ===
pub mod config;
pub mod report;

// === Re-exports для удобства ===
pub use deferred::{cond, constant, symbol, Deferred};
pub use error::{SymbError, SymbResult};
pub use evaluator::{Context, EvalStats, Evaluator};
pub use mode::{Eager, Mode, Symbolic};
pub use node::{Node, NodeRef, Operand};
pub use ops::Operator;
pub use registry::{collect, Construction, Constructor, Guard, Registry, Tracker};
pub use value::{Args, Callable, DomainObject, Object, Value};
