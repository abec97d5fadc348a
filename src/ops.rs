//! Операторы отложенных выражений и их конкретные реализации.
//!
//! Набор операторов закрыт: каждый оператор знает своё имя, символ для
//! инфиксной/префиксной записи, допустимую арность и умеет применяться к
//! уже вычисленным операндам.

use std::cmp::Ordering;

use crate::error::{SymbError, SymbResult};
use crate::value::Value;

/// Оператор узла `Operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // === Арифметика ===
    Add,
    Sub,
    Mul,
    /// Деление (`/`), результат всегда float
    TrueDiv,
    /// Целочисленное деление (`//`) с округлением вниз
    FloorDiv,
    /// Остаток (`%`) со знаком делителя
    Mod,
    /// Пара (частное, остаток)
    DivMod,
    /// Возведение в степень, опционально по модулю
    Pow,

    // === Побитовые ===
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // === Сравнения ===
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,

    // === Унарные ===
    Neg,
    Pos,
    Abs,
    Invert,
}

impl Operator {
    /// Имя оператора (используется при записи без символа).
    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Sub => "sub",
            Operator::Mul => "mul",
            Operator::TrueDiv => "truediv",
            Operator::FloorDiv => "floordiv",
            Operator::Mod => "mod",
            Operator::DivMod => "divmod",
            Operator::Pow => "pow",
            Operator::BitAnd => "and",
            Operator::BitOr => "or",
            Operator::BitXor => "xor",
            Operator::Shl => "lshift",
            Operator::Shr => "rshift",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Ge => "ge",
            Operator::Gt => "gt",
            Operator::Neg => "neg",
            Operator::Pos => "pos",
            Operator::Abs => "abs",
            Operator::Invert => "invert",
        }
    }

    /// Символ для инфиксной или префиксной записи.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Operator::Add | Operator::Pos => Some("+"),
            Operator::Sub | Operator::Neg => Some("-"),
            Operator::Mul => Some("*"),
            Operator::TrueDiv => Some("/"),
            Operator::FloorDiv => Some("//"),
            Operator::Mod => Some("%"),
            Operator::BitAnd => Some("&"),
            Operator::BitOr => Some("|"),
            Operator::BitXor => Some("^"),
            Operator::Shl => Some("<<"),
            Operator::Shr => Some(">>"),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            Operator::Eq => Some("=="),
            Operator::Ne => Some("!="),
            Operator::Ge => Some(">="),
            Operator::Gt => Some(">"),
            Operator::Invert => Some("~"),
            Operator::DivMod | Operator::Pow | Operator::Abs => None,
        }
    }

    /// Допустимое количество операндов (min, max).
    pub fn arity(self) -> (usize, usize) {
        match self {
            Operator::Neg | Operator::Pos | Operator::Abs | Operator::Invert => (1, 1),
            Operator::Pow => (2, 3),
            _ => (2, 2),
        }
    }

    /// Применить оператор к вычисленным операндам.
    pub fn apply(self, operands: &[Value]) -> SymbResult<Value> {
        let (min, max) = self.arity();
        if operands.len() < min || operands.len() > max {
            // Построитель никогда не создаёт таких узлов.
            return Err(SymbError::InternalConsistency(format!(
                "operator '{}' applied to {} operands",
                self.name(),
                operands.len()
            )));
        }

        match self {
            Operator::Neg => negate(&operands[0]),
            Operator::Pos => numeric(self, &operands[0]).map(Num::into_value),
            Operator::Abs => abs(&operands[0]),
            Operator::Invert => invert(&operands[0]),
            Operator::Pow => pow(&operands[0], &operands[1], operands.get(2)),
            _ => self.apply_binary(&operands[0], &operands[1]),
        }
    }

    fn apply_binary(self, a: &Value, b: &Value) -> SymbResult<Value> {
        match self {
            Operator::Add => add(a, b),
            Operator::Sub => arith(self, a, b, i64::checked_sub, |x, y| x - y),
            Operator::Mul => arith(self, a, b, i64::checked_mul, |x, y| x * y),
            Operator::TrueDiv => {
                let (x, y) = (numeric(self, a)?.as_f64(), numeric(self, b)?.as_f64());
                if y == 0.0 {
                    return Err(division_by_zero());
                }
                Ok(Value::Float(x / y))
            }
            Operator::FloorDiv => floor_div(a, b),
            Operator::Mod => modulo(a, b),
            Operator::DivMod => Ok(Value::Tuple(vec![floor_div(a, b)?, modulo(a, b)?])),
            Operator::BitAnd | Operator::BitOr | Operator::BitXor => bitwise(self, a, b),
            Operator::Shl | Operator::Shr => shift(self, a, b),
            Operator::Eq => Ok(Value::Bool(loosely_equal(a, b))),
            Operator::Ne => Ok(Value::Bool(!loosely_equal(a, b))),
            Operator::Lt | Operator::Le | Operator::Ge | Operator::Gt => {
                let ordering = compare(self, a, b)?;
                let result = match self {
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                    Operator::Ge => ordering != Ordering::Less,
                    _ => ordering == Ordering::Greater,
                };
                Ok(Value::Bool(result))
            }
            _ => Err(SymbError::InternalConsistency(format!(
                "'{}' is not a binary operator",
                self.name()
            ))),
        }
    }
}

/// Числовой операнд; bool участвует в арифметике как 0/1.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(v) => Value::Int(v),
            Num::Float(f) => Value::Float(f),
        }
    }
}

fn numeric(op: Operator, value: &Value) -> SymbResult<Num> {
    match value {
        Value::Int(v) => Ok(Num::Int(*v)),
        Value::Bool(b) => Ok(Num::Int(*b as i64)),
        Value::Float(f) => Ok(Num::Float(*f)),
        other => Err(SymbError::TypeError(format!(
            "unsupported operand type for {}: '{}'",
            op.name(),
            other.type_name()
        ))),
    }
}

fn integer(op: Operator, value: &Value) -> SymbResult<i64> {
    match numeric(op, value)? {
        Num::Int(v) => Ok(v),
        Num::Float(_) => Err(SymbError::TypeError(format!(
            "unsupported operand type for {}: 'float'",
            op.name()
        ))),
    }
}

fn overflow(op: Operator) -> SymbError {
    SymbError::InvalidOperation(format!("integer overflow in {}", op.name()))
}

fn division_by_zero() -> SymbError {
    SymbError::InvalidOperation("Division by zero".to_string())
}

fn arith(
    op: Operator,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> SymbResult<Value> {
    match (numeric(op, a)?, numeric(op, b)?) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y).map(Value::Int).ok_or_else(|| overflow(op)),
        (x, y) => Ok(Value::Float(float_op(x.as_f64(), y.as_f64()))),
    }
}

fn add(a: &Value, b: &Value) -> SymbResult<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
        (Value::List(x), Value::List(y)) => Ok(Value::List([x.as_slice(), y.as_slice()].concat())),
        (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::Tuple([x.as_slice(), y.as_slice()].concat())),
        _ => arith(Operator::Add, a, b, i64::checked_add, |x, y| x + y),
    }
}

fn floor_div(a: &Value, b: &Value) -> SymbResult<Value> {
    let op = Operator::FloorDiv;
    match (numeric(op, a)?, numeric(op, b)?) {
        (_, Num::Int(0)) => Err(division_by_zero()),
        (Num::Int(x), Num::Int(y)) => {
            let q = x.checked_div(y).ok_or_else(|| overflow(op))?;
            // Округление вниз, а не к нулю.
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        (x, y) => {
            if y.as_f64() == 0.0 {
                return Err(division_by_zero());
            }
            Ok(Value::Float((x.as_f64() / y.as_f64()).floor()))
        }
    }
}

fn modulo(a: &Value, b: &Value) -> SymbResult<Value> {
    let op = Operator::Mod;
    match (numeric(op, a)?, numeric(op, b)?) {
        (_, Num::Int(0)) => Err(division_by_zero()),
        (Num::Int(x), Num::Int(y)) => {
            let r = x.checked_rem(y).ok_or_else(|| overflow(op))?;
            // Знак остатка совпадает со знаком делителя.
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        (x, y) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            if y == 0.0 {
                return Err(division_by_zero());
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                Ok(Value::Float(r + y))
            } else {
                Ok(Value::Float(r))
            }
        }
    }
}

fn pow(base: &Value, exp: &Value, modulus: Option<&Value>) -> SymbResult<Value> {
    let op = Operator::Pow;
    if let Some(modulus) = modulus.filter(|m| !matches!(m, Value::None)) {
        let (b, e, m) = (integer(op, base)?, integer(op, exp)?, integer(op, modulus)?);
        if m == 0 {
            return Err(SymbError::InvalidOperation(
                "pow() 3rd argument cannot be 0".to_string(),
            ));
        }
        if e < 0 {
            return Err(SymbError::InvalidOperation(
                "pow() 2nd argument cannot be negative when 3rd argument specified".to_string(),
            ));
        }
        return Ok(Value::Int(mod_pow(b, e, m)));
    }

    match (numeric(op, base)?, numeric(op, exp)?) {
        (Num::Int(b), Num::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| overflow(op))?;
            b.checked_pow(e).map(Value::Int).ok_or_else(|| overflow(op))
        }
        (b, e) => Ok(Value::Float(b.as_f64().powf(e.as_f64()))),
    }
}

fn mod_pow(base: i64, mut exp: i64, modulus: i64) -> i64 {
    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m);
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        exp >>= 1;
    }
    // Результат имеет знак модуля.
    let r = result.rem_euclid(m);
    if m < 0 && r != 0 {
        (r + m) as i64
    } else {
        r as i64
    }
}

fn bitwise(op: Operator, a: &Value, b: &Value) -> SymbResult<Value> {
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        let result = match op {
            Operator::BitAnd => x & y,
            Operator::BitOr => x | y,
            _ => x ^ y,
        };
        return Ok(Value::Bool(result));
    }
    let (x, y) = (integer(op, a)?, integer(op, b)?);
    let result = match op {
        Operator::BitAnd => x & y,
        Operator::BitOr => x | y,
        _ => x ^ y,
    };
    Ok(Value::Int(result))
}

fn shift(op: Operator, a: &Value, b: &Value) -> SymbResult<Value> {
    let (x, n) = (integer(op, a)?, integer(op, b)?);
    if n < 0 {
        return Err(SymbError::InvalidOperation("negative shift count".to_string()));
    }
    if op == Operator::Shr {
        // Арифметический сдвиг; сдвиг за пределы разрядности даёт 0 или -1.
        return Ok(Value::Int(if n >= 64 { x >> 63 } else { x >> n }));
    }
    if x == 0 {
        return Ok(Value::Int(0));
    }
    let shifted = if n >= 64 { None } else { x.checked_shl(n as u32) };
    match shifted {
        Some(v) if v >> n == x => Ok(Value::Int(v)),
        _ => Err(overflow(op)),
    }
}

fn negate(value: &Value) -> SymbResult<Value> {
    let op = Operator::Neg;
    match numeric(op, value)? {
        Num::Int(v) => v.checked_neg().map(Value::Int).ok_or_else(|| overflow(op)),
        Num::Float(f) => Ok(Value::Float(-f)),
    }
}

fn abs(value: &Value) -> SymbResult<Value> {
    let op = Operator::Abs;
    match numeric(op, value)? {
        Num::Int(v) => v.checked_abs().map(Value::Int).ok_or_else(|| overflow(op)),
        Num::Float(f) => Ok(Value::Float(f.abs())),
    }
}

fn invert(value: &Value) -> SymbResult<Value> {
    Ok(Value::Int(!integer(Operator::Invert, value)?))
}

/// Равенство для оператора `==`: числа сравниваются по значению
/// независимо от представления (1 == 1.0 == True).
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Bool(_) | Value::Float(_), Value::Int(_) | Value::Bool(_) | Value::Float(_)) => {
            match (numeric(Operator::Eq, a), numeric(Operator::Eq, b)) {
                (Ok(Num::Int(x)), Ok(Num::Int(y))) => x == y,
                (Ok(x), Ok(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            }
        }
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| loosely_equal(a, b))
        }
        _ => a == b,
    }
}

fn compare(op: Operator, a: &Value, b: &Value) -> SymbResult<Ordering> {
    let incomparable = || {
        SymbError::TypeError(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol().unwrap_or(op.name()),
            a.type_name(),
            b.type_name()
        ))
    };
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            for (left, right) in x.iter().zip(y) {
                if !loosely_equal(left, right) {
                    return compare(op, left, right);
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (numeric(op, a), numeric(op, b)) {
            (Ok(Num::Int(x)), Ok(Num::Int(y))) => Ok(x.cmp(&y)),
            (Ok(x), Ok(y)) => x.as_f64().partial_cmp(&y.as_f64()).ok_or_else(incomparable),
            _ => Err(incomparable()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(Operator::Add.apply(&[int(40), int(2)]).unwrap(), int(42));
        assert_eq!(Operator::Sub.apply(&[int(2), int(40)]).unwrap(), int(-38));
        assert_eq!(Operator::Mul.apply(&[int(-6), int(7)]).unwrap(), int(-42));
        assert_eq!(Operator::BitAnd.apply(&[int(12), int(10)]).unwrap(), int(8));
        assert_eq!(Operator::BitOr.apply(&[int(12), int(10)]).unwrap(), int(14));
        assert_eq!(Operator::BitXor.apply(&[int(12), int(10)]).unwrap(), int(6));
        assert_eq!(
            Operator::Add.apply(&[Value::Bool(true), Value::Float(0.5)]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(Operator::FloorDiv.apply(&[int(7), int(2)]).unwrap(), int(3));
        assert_eq!(Operator::FloorDiv.apply(&[int(-7), int(2)]).unwrap(), int(-4));
        assert_eq!(Operator::Mod.apply(&[int(-7), int(2)]).unwrap(), int(1));
        assert_eq!(Operator::Mod.apply(&[int(7), int(-2)]).unwrap(), int(-1));
        assert_eq!(
            Operator::DivMod.apply(&[int(-7), int(2)]).unwrap(),
            Value::Tuple(vec![int(-4), int(1)])
        );
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(
            Operator::TrueDiv.apply(&[int(7), int(2)]).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            Operator::TrueDiv.apply(&[int(6), int(2)]).unwrap(),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_division_by_zero() {
        for op in [Operator::TrueDiv, Operator::FloorDiv, Operator::Mod] {
            assert!(matches!(
                op.apply(&[int(1), int(0)]),
                Err(SymbError::InvalidOperation(_))
            ));
        }
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(Operator::Add.apply(&[int(i64::MAX), int(1)]).is_err());
        assert!(Operator::Neg.apply(&[int(i64::MIN)]).is_err());
        assert!(Operator::Shl.apply(&[int(1), int(64)]).is_err());
        assert_eq!(Operator::Shl.apply(&[int(0), int(100)]).unwrap(), int(0));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(Operator::Shl.apply(&[int(3), int(4)]).unwrap(), int(48));
        assert_eq!(Operator::Shr.apply(&[int(-16), int(2)]).unwrap(), int(-4));
        assert_eq!(Operator::Shr.apply(&[int(-1), int(200)]).unwrap(), int(-1));
        assert!(Operator::Shr.apply(&[int(1), int(-1)]).is_err());
    }

    #[test]
    fn test_pow() {
        assert_eq!(Operator::Pow.apply(&[int(2), int(10)]).unwrap(), int(1024));
        assert_eq!(
            Operator::Pow.apply(&[int(2), int(10), int(1000)]).unwrap(),
            int(24)
        );
        assert_eq!(
            Operator::Pow.apply(&[int(2), int(-1)]).unwrap(),
            Value::Float(0.5)
        );
        assert_eq!(
            Operator::Pow.apply(&[int(3), int(2), Value::None]).unwrap(),
            int(9)
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(Operator::Invert.apply(&[int(5)]).unwrap(), int(-6));
        assert_eq!(Operator::Abs.apply(&[int(-5)]).unwrap(), int(5));
        assert_eq!(Operator::Pos.apply(&[Value::Bool(true)]).unwrap(), int(1));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            Operator::Eq.apply(&[int(1), Value::Float(1.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Operator::Lt.apply(&[Value::Str("a".into()), Value::Str("b".into())]).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            Operator::Lt.apply(&[int(1), Value::Str("b".into())]),
            Err(SymbError::TypeError(_))
        ));
        assert_eq!(
            Operator::Ne.apply(&[int(1), Value::Str("1".into())]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_wrong_arity_is_internal() {
        assert!(matches!(
            Operator::Add.apply(&[int(1)]),
            Err(SymbError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_bool_bitwise() {
        assert_eq!(
            Operator::BitXor.apply(&[Value::Bool(true), Value::Bool(true)]).unwrap(),
            Value::Bool(false)
        );
    }
}
