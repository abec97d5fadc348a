//! Описания регистров управления и состояния RISC-V (CSR).
//!
//! Конкретные записи: поле ([`Field`]), поле только для чтения
//! ([`ReadOnly`]) и регистр ([`Csr`]). Все ширины здесь уже целые числа;
//! параметрические ширины разрешаются вычислителем до создания записи.

use std::fmt;

use serde::Serialize;

use crate::error::{SymbError, SymbResult};
use crate::node::Operand;
use crate::value::{Args, Callable, DomainObject, Value};

/// Вид поля по терминологии привилегированной архитектуры.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    #[default]
    None,
    /// Write-Invalid Read-Invalid
    Wiri,
    /// Write-Preserve Read-Invalid
    Wpri,
    /// Write-Any Read-Legal
    Warl,
    /// Write-Legal Read-Legal
    Wlrl,
    Reg,
    MaskedReg,
    Derived,
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::None => "NONE",
            FieldKind::Wiri => "WIRI",
            FieldKind::Wpri => "WPRI",
            FieldKind::Warl => "WARL",
            FieldKind::Wlrl => "WLRL",
            FieldKind::Reg => "REG",
            FieldKind::MaskedReg => "MASKED_REG",
            FieldKind::Derived => "DERIVED",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field.{}", self.label())
    }
}

impl DomainObject for FieldKind {
    fn type_name(&self) -> &'static str {
        "FieldKind"
    }
}

impl From<FieldKind> for Operand {
    fn from(kind: FieldKind) -> Self {
        Operand::Value(Value::object(kind))
    }
}

/// Поле регистра.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub name: String,
    pub width: i64,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, width: i64, kind: FieldKind) -> SymbResult<Self> {
        if width < 1 {
            return Err(SymbError::InvalidConstruction(format!(
                "width must be at least 1, got {}",
                width
            )));
        }
        Ok(Self {
            name: name.into(),
            width,
            kind,
        })
    }

    /// Хранит ли поле полезное состояние.
    pub fn holds_state(&self) -> bool {
        !matches!(self.kind, FieldKind::Wiri | FieldKind::Wpri)
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Str(self.name.clone())),
            "width" => Some(Value::Int(self.width)),
            "kind" => Some(Value::object(self.kind)),
            _ => None,
        }
    }

    fn invoke_method(&self, type_name: &str, name: &str, args: &Args) -> SymbResult<Value> {
        match name {
            "holds_state" => {
                args.expect_arity(name, 0, 0)?;
                Ok(Value::Bool(self.holds_state()))
            }
            _ => Err(SymbError::UnknownAttribute {
                type_name: type_name.to_string(),
                attribute: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FieldKind::None => write!(f, "Field('{}', {})", self.name, self.width),
            kind => write!(f, "Field('{}', {}, {})", self.name, self.width, kind),
        }
    }
}

impl DomainObject for Field {
    fn type_name(&self) -> &'static str {
        "Field"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.lookup(name)
    }

    fn methods(&self) -> &'static [&'static str] {
        &["holds_state"]
    }

    fn call_method(&self, name: &str, args: &Args) -> SymbResult<Value> {
        self.invoke_method("Field", name, args)
    }
}

/// Поле, доступное только для чтения. Атрибуты берутся у поля.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadOnly(pub Field);

impl fmt::Display for ReadOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadOnly({})", self.0)
    }
}

impl DomainObject for ReadOnly {
    fn type_name(&self) -> &'static str {
        "ReadOnly"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "field" => Some(Value::object(self.0.clone())),
            _ => self.0.lookup(name),
        }
    }

    fn methods(&self) -> &'static [&'static str] {
        &["holds_state"]
    }

    fn call_method(&self, name: &str, args: &Args) -> SymbResult<Value> {
        self.0.invoke_method("ReadOnly", name, args)
    }
}

/// Поле в составе регистра.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "access", content = "field", rename_all = "snake_case")]
pub enum CsrField {
    Field(Field),
    ReadOnly(Field),
}

impl CsrField {
    pub fn field(&self) -> &Field {
        match self {
            CsrField::Field(field) | CsrField::ReadOnly(field) => field,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, CsrField::ReadOnly(_))
    }

    pub fn width(&self) -> i64 {
        self.field().width
    }

    /// Извлечь поле из вычисленного значения.
    pub fn from_value(value: &Value) -> SymbResult<Self> {
        if let Some(field) = value.downcast_ref::<Field>() {
            return Ok(CsrField::Field(field.clone()));
        }
        if let Some(ReadOnly(field)) = value.downcast_ref::<ReadOnly>() {
            return Ok(CsrField::ReadOnly(field.clone()));
        }
        Err(SymbError::TypeError(format!(
            "expected Field or ReadOnly, got {}",
            value.type_name()
        )))
    }

    fn to_value(&self) -> Value {
        match self {
            CsrField::Field(field) => Value::object(field.clone()),
            CsrField::ReadOnly(field) => Value::object(ReadOnly(field.clone())),
        }
    }
}

impl fmt::Display for CsrField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsrField::Field(field) => write!(f, "{}", field),
            CsrField::ReadOnly(field) => write!(f, "ReadOnly({})", field),
        }
    }
}

/// Регистр управления и состояния.
///
/// Поля перечисляются от старших битов к младшим.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Csr {
    pub name: String,
    pub address: i64,
    pub fields: Vec<CsrField>,
}

impl Csr {
    pub fn new(name: impl Into<String>, address: i64, fields: Vec<CsrField>) -> Self {
        Self {
            name: name.into(),
            address,
            fields,
        }
    }

    /// Суммарная ширина полей.
    pub fn width(&self) -> i64 {
        self.fields.iter().map(CsrField::width).sum()
    }
}

impl fmt::Display for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CSR('{}', {:#x}", self.name, self.address)?;
        for field in &self.fields {
            write!(f, ", {}", field)?;
        }
        write!(f, ")")
    }
}

impl DomainObject for Csr {
    fn type_name(&self) -> &'static str {
        "CSR"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Str(self.name.clone())),
            "address" => Some(Value::Int(self.address)),
            "fields" => Some(Value::Tuple(
                self.fields.iter().map(CsrField::to_value).collect(),
            )),
            _ => None,
        }
    }

    fn methods(&self) -> &'static [&'static str] {
        &["width"]
    }

    fn call_method(&self, name: &str, args: &Args) -> SymbResult<Value> {
        match name {
            "width" => {
                args.expect_arity(name, 0, 0)?;
                Ok(Value::Int(self.width()))
            }
            _ => Err(SymbError::UnknownAttribute {
                type_name: "CSR".to_string(),
                attribute: name.to_string(),
            }),
        }
    }
}

/// Поле Write-Invalid Read-Invalid без имени.
pub fn wiri(width: i64) -> SymbResult<Field> {
    Field::new("", width, FieldKind::Wiri)
}

/// Поле Write-Preserve Read-Invalid без имени.
pub fn wpri(width: i64) -> SymbResult<Field> {
    Field::new("", width, FieldKind::Wpri)
}

// === Конструкторы для использования в графе ===

fn int_arg(args: &Args, callee: &str, index: usize, name: &str) -> SymbResult<i64> {
    match args.arg(index, name) {
        Some(value) => value.as_int().ok_or_else(|| {
            SymbError::TypeError(format!(
                "{}() argument '{}' must be int, got {}",
                callee,
                name,
                value.type_name()
            ))
        }),
        None => Err(SymbError::TypeError(format!(
            "{}() missing argument '{}'",
            callee, name
        ))),
    }
}

fn str_arg<'a>(args: &'a Args, callee: &str, index: usize, name: &str) -> SymbResult<&'a str> {
    match args.arg(index, name) {
        Some(value) => value.as_str().ok_or_else(|| {
            SymbError::TypeError(format!(
                "{}() argument '{}' must be str, got {}",
                callee,
                name,
                value.type_name()
            ))
        }),
        None => Err(SymbError::TypeError(format!(
            "{}() missing argument '{}'",
            callee, name
        ))),
    }
}

/// `Field(name, width, kind=None)`.
pub fn field_constructor() -> Callable {
    Callable::new("Field", |args| {
        args.expect_arity("Field", 2, 3)?;
        let name = str_arg(args, "Field", 0, "name")?;
        let width = int_arg(args, "Field", 1, "width")?;
        let kind = match args.arg(2, "kind") {
            None | Some(Value::None) => FieldKind::None,
            Some(value) => *value.downcast_ref::<FieldKind>().ok_or_else(|| {
                SymbError::TypeError(format!(
                    "Field() argument 'kind' must be FieldKind, got {}",
                    value.type_name()
                ))
            })?,
        };
        Ok(Value::object(Field::new(name, width, kind)?))
    })
}

/// `ReadOnly(field)`.
pub fn read_only_constructor() -> Callable {
    Callable::new("ReadOnly", |args| {
        args.expect_arity("ReadOnly", 1, 1)?;
        match args.arg(0, "field").map(CsrField::from_value) {
            Some(Ok(CsrField::Field(field))) => Ok(Value::object(ReadOnly(field))),
            Some(Ok(CsrField::ReadOnly(field))) => Ok(Value::object(ReadOnly(field))),
            Some(Err(err)) => Err(err),
            None => Err(SymbError::TypeError(
                "ReadOnly() missing argument 'field'".to_string(),
            )),
        }
    })
}

/// `WIRI(width)`.
pub fn wiri_constructor() -> Callable {
    Callable::new("WIRI", |args| {
        args.expect_arity("WIRI", 1, 1)?;
        Ok(Value::object(wiri(int_arg(args, "WIRI", 0, "width")?)?))
    })
}

/// `WPRI(width)`.
pub fn wpri_constructor() -> Callable {
    Callable::new("WPRI", |args| {
        args.expect_arity("WPRI", 1, 1)?;
        Ok(Value::object(wpri(int_arg(args, "WPRI", 0, "width")?)?))
    })
}

/// `CSR(name, address, *fields)`.
///
/// Единственный аргумент-кортеж после адреса считается полным списком
/// полей: так передаётся результат выбора раскладки по условию.
pub fn csr_constructor() -> Callable {
    Callable::new("CSR", |args| {
        let name = str_arg(args, "CSR", 0, "name")?;
        let address = int_arg(args, "CSR", 1, "address")?;
        let rest = args.positional.get(2..).unwrap_or_default();
        let values = match rest {
            [Value::Tuple(items)] => items.as_slice(),
            _ => rest,
        };
        let fields = values
            .iter()
            .map(CsrField::from_value)
            .collect::<SymbResult<Vec<_>>>()?;
        Ok(Value::object(Csr::new(name, address, fields)))
    })
}
