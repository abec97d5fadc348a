//! Определения ошибок для symcsr.

use thiserror::Error;

/// Основной тип `Result` для библиотеки.
pub type SymbResult<T> = Result<T, SymbError>;

/// Перечисление всех возможных ошибок.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbError {
    /// Символ, достижимый на вычисляемом пути, отсутствует в контексте.
    #[error("\"{0}\" not found in context")]
    UnresolvedSymbol(String),

    /// Операция, которую нельзя отложить (bool, итерация, индекс, длина).
    #[error("{0} not supported on a deferred value")]
    UnsupportedOperation(String),

    /// Нарушено ограничение предметной области при создании записи.
    #[error("Invalid construction: {0}")]
    InvalidConstruction(String),

    /// Сохранённая реализация не вызываема. Признак дефекта построителя.
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Type mismatch during evaluation: {0}")]
    TypeError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown attribute '{attribute}' on {type_name}")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("Wrong number of arguments for '{name}': expected {expected}, got {got}")]
    WrongArity {
        name: String,
        expected: String,
        got: usize,
    },

    // === Ошибки окружения (CLI, конфигурация, вывод) ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SymbError {
    /// Создать ошибку "неподдерживаемая операция над отложенным значением".
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation(operation.into())
    }

    /// Создать ошибку "неверное количество аргументов".
    pub fn wrong_arity(name: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        Self::WrongArity {
            name: name.into(),
            expected: expected.into(),
            got,
        }
    }
}

impl From<std::io::Error> for SymbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for SymbError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for SymbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
