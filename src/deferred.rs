//! Слой построения отложенных выражений.
//!
//! Операции над [`Deferred`] не вычисляются, а порождают новые узлы графа.
//! Арифметика и побитовые операции доступны через стандартные трейты
//! операторов (`x + 1`, `1 + x`, `!x`, ...). Сравнения оформлены именованными
//! методами (`x.ne(32)`), так как `PartialEq`/`PartialOrd` обязаны
//! возвращать `bool`.
//!
//! ```
//! use symcsr::{cond, symbol, Context, Evaluator, Value};
//!
//! let xlen = symbol("xlen");
//! let width = cond(xlen.ne(32), 4, 1);
//! assert_eq!(width.to_string(), "((xlen != 32) ? 4 : 1)");
//!
//! let mut evaluator = Evaluator::new();
//! let rv64 = Context::new().with("xlen", 64);
//! assert_eq!(evaluator.evaluate(&width, &rv64).unwrap(), Value::Int(4));
//! ```

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

use crate::error::{SymbError, SymbResult};
use crate::node::{Node, Operand};
use crate::ops::Operator;
use crate::value::{Callable, Value};

/// Отложенное значение: узел графа или конкретный операнд.
///
/// Намеренно не реализует `PartialEq`, `IntoIterator` и `Index`: ни
/// сравнение в `bool`, ни обход, ни индексирование нельзя отложить.
#[derive(Debug, Clone)]
pub struct Deferred(Operand);

/// Несвязанный именованный параметр.
pub fn symbol(name: impl Into<String>) -> Deferred {
    Deferred::from(Node::Symbol(name.into()))
}

/// Тернарный выбор `(condition ? then : else)`.
pub fn cond(
    condition: impl Into<Operand>,
    then_branch: impl Into<Operand>,
    else_branch: impl Into<Operand>,
) -> Deferred {
    Deferred::from(Node::Conditional {
        condition: condition.into(),
        then_branch: then_branch.into(),
        else_branch: else_branch.into(),
    })
}

/// Отложенное значение, которое уже известно.
pub fn constant(value: impl Into<Value>) -> Deferred {
    Deferred(Operand::Value(value.into()))
}

#[allow(clippy::should_implement_trait)]
impl Deferred {
    pub fn operand(&self) -> &Operand {
        &self.0
    }

    /// Кортеж операндов; вычисляется поэлементно.
    pub fn tuple(items: Vec<Operand>) -> Self {
        Deferred(Operand::Tuple(items))
    }

    /// Список операндов; вычисляется поэлементно.
    pub fn list(items: Vec<Operand>) -> Self {
        Deferred(Operand::List(items))
    }

    /// Унарная операция.
    pub fn unary(op: Operator, operand: impl Into<Operand>) -> Self {
        Self::operation(op, vec![operand.into()])
    }

    /// Бинарная операция с операндами в порядке записи.
    ///
    /// Подходит и для отражённого применения, когда отложенное значение
    /// стоит справа: `Deferred::binary(Operator::Lt, 3, x)`.
    pub fn binary(op: Operator, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::operation(op, vec![left.into(), right.into()])
    }

    fn operation(op: Operator, operands: Vec<Operand>) -> Self {
        Deferred::from(Node::Operation { op, operands })
    }

    // === Сравнения ===

    pub fn lt(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Lt, self, other)
    }

    pub fn le(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Le, self, other)
    }

    pub fn eq(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Eq, self, other)
    }

    pub fn ne(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Ne, self, other)
    }

    pub fn ge(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Ge, self, other)
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::Gt, self, other)
    }

    // === Арифметика без подходящего трейта ===

    /// Целочисленное деление с округлением вниз (`//`).
    pub fn floor_div(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::FloorDiv, self, other)
    }

    /// Пара (частное, остаток).
    pub fn divmod(&self, other: impl Into<Operand>) -> Self {
        Self::binary(Operator::DivMod, self, other)
    }

    /// Возведение в степень; место модуля занято `None`.
    pub fn pow(&self, exp: impl Into<Operand>) -> Self {
        self.pow_mod(exp, Value::None)
    }

    /// Возведение в степень по модулю.
    pub fn pow_mod(&self, exp: impl Into<Operand>, modulus: impl Into<Operand>) -> Self {
        Self::operation(Operator::Pow, vec![self.into(), exp.into(), modulus.into()])
    }

    pub fn abs(&self) -> Self {
        Self::unary(Operator::Abs, self)
    }

    pub fn pos(&self) -> Self {
        Self::unary(Operator::Pos, self)
    }

    /// Побитовая инверсия (`~`); то же, что `!x`.
    pub fn invert(&self) -> Self {
        Self::unary(Operator::Invert, self)
    }

    // === Атрибуты и вызовы ===

    /// Отложенное обращение к атрибуту.
    pub fn attr(&self, attribute: impl Into<String>) -> Self {
        Deferred::from(Node::AttributeAccess {
            target: self.into(),
            attribute: attribute.into(),
        })
    }

    /// Отложенный вызов самого значения.
    pub fn call(&self, args: Vec<Operand>) -> Self {
        self.call_with(args, Vec::new())
    }

    /// Отложенный вызов с именованными аргументами.
    pub fn call_with(&self, args: Vec<Operand>, kwargs: Vec<(String, Operand)>) -> Self {
        Deferred::from(Node::Call {
            target: self.into(),
            args,
            kwargs,
        })
    }

    /// Отложенный вызов метода: `x.attr(name).call(args)`.
    pub fn method(&self, name: impl Into<String>, args: Vec<Operand>) -> Self {
        self.attr(name).call(args)
    }

    // === Неоткладываемые операции ===

    /// Истинность отложенного значения неизвестна до вычисления.
    pub fn as_bool(&self) -> SymbResult<bool> {
        Err(SymbError::unsupported("bool()"))
    }

    pub fn len(&self) -> SymbResult<usize> {
        Err(SymbError::unsupported("len()"))
    }

    pub fn is_empty(&self) -> SymbResult<bool> {
        Err(SymbError::unsupported("len()"))
    }

    pub fn iter(&self) -> SymbResult<std::vec::IntoIter<Deferred>> {
        Err(SymbError::unsupported("iteration"))
    }

    pub fn index(&self, _index: impl Into<Operand>) -> SymbResult<Deferred> {
        Err(SymbError::unsupported("indexing"))
    }
}

impl Callable {
    /// Отложенный вызов: тело не выполняется до вычисления.
    pub fn defer(&self, args: Vec<Operand>) -> Deferred {
        self.defer_with(args, Vec::new())
    }

    pub fn defer_with(&self, args: Vec<Operand>, kwargs: Vec<(String, Operand)>) -> Deferred {
        Deferred::from(Node::Call {
            target: Operand::Value(Value::Callable(self.clone())),
            args,
            kwargs,
        })
    }
}

impl fmt::Display for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<Operand> for Deferred {
    fn as_ref(&self) -> &Operand {
        &self.0
    }
}

impl From<Deferred> for Operand {
    fn from(d: Deferred) -> Self {
        d.0
    }
}

impl From<&Deferred> for Operand {
    fn from(d: &Deferred) -> Self {
        d.0.clone()
    }
}

impl From<Node> for Deferred {
    fn from(node: Node) -> Self {
        Deferred(Operand::from(node))
    }
}

impl From<Operand> for Deferred {
    fn from(operand: Operand) -> Self {
        Deferred(operand)
    }
}

macro_rules! deferred_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Deferred {
                fn from(v: $t) -> Self {
                    constant(v)
                }
            }
        )*
    };
}

deferred_from_value!(Value, i64, i32, u32, bool, f64, &str, String);

// === Трейты операторов ===

// Конкретное значение слева: операнды сохраняют порядок записи.
macro_rules! reflected_operator {
    ($trait:ident :: $method:ident => $op:expr; $($lhs:ty),*) => {
        $(
            impl $trait<Deferred> for $lhs {
                type Output = Deferred;

                fn $method(self, rhs: Deferred) -> Deferred {
                    Deferred::binary($op, self, rhs)
                }
            }

            impl $trait<&Deferred> for $lhs {
                type Output = Deferred;

                fn $method(self, rhs: &Deferred) -> Deferred {
                    Deferred::binary($op, self, rhs)
                }
            }
        )*
    };
}

macro_rules! binary_operator {
    ($($trait:ident :: $method:ident => $op:expr),* $(,)?) => {
        $(
            impl<T: Into<Operand>> $trait<T> for Deferred {
                type Output = Deferred;

                fn $method(self, rhs: T) -> Deferred {
                    Deferred::binary($op, self, rhs)
                }
            }

            impl<T: Into<Operand>> $trait<T> for &Deferred {
                type Output = Deferred;

                fn $method(self, rhs: T) -> Deferred {
                    Deferred::binary($op, self, rhs)
                }
            }

            reflected_operator!($trait :: $method => $op; i64, f64, bool);
        )*
    };
}

binary_operator! {
    Add::add => Operator::Add,
    Sub::sub => Operator::Sub,
    Mul::mul => Operator::Mul,
    Div::div => Operator::TrueDiv,
    Rem::rem => Operator::Mod,
    BitAnd::bitand => Operator::BitAnd,
    BitOr::bitor => Operator::BitOr,
    BitXor::bitxor => Operator::BitXor,
    Shl::shl => Operator::Shl,
    Shr::shr => Operator::Shr,
}

impl Neg for Deferred {
    type Output = Deferred;

    fn neg(self) -> Deferred {
        Deferred::unary(Operator::Neg, self)
    }
}

impl Neg for &Deferred {
    type Output = Deferred;

    fn neg(self) -> Deferred {
        Deferred::unary(Operator::Neg, self)
    }
}

impl Not for Deferred {
    type Output = Deferred;

    fn not(self) -> Deferred {
        Deferred::unary(Operator::Invert, self)
    }
}

impl Not for &Deferred {
    type Output = Deferred;

    fn not(self) -> Deferred {
        Deferred::unary(Operator::Invert, self)
    }
}
