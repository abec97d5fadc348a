//! Конкретные значения, в которые разрешаются отложенные выражения.
//!
//! Помимо чисел, строк и последовательностей значение может содержать
//! объект предметной области ([`Object`]) или вызываемую сущность
//! ([`Callable`]). Все значения сравниваются и хешируются структурно:
//! это нужно ключу мемоизации вычислителя.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{SymbError, SymbResult};

/// Конкретное значение.
#[derive(Debug, Clone)]
pub enum Value {
    /// Отсутствие значения
    None,
    /// Булево значение
    Bool(bool),
    /// Целое число
    Int(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Строка
    Str(String),
    /// Упорядоченная последовательность
    List(Vec<Value>),
    /// Кортеж фиксированной длины
    Tuple(Vec<Value>),
    /// Объект предметной области (поле, регистр, ...)
    Object(Object),
    /// Функция или конструктор
    Callable(Callable),
}

impl Value {
    /// Обернуть объект предметной области.
    pub fn object<T: DomainObject>(obj: T) -> Self {
        Value::Object(Object::new(obj))
    }

    /// Имя типа для сообщений об ошибках.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Object(obj) => obj.type_name(),
            Value::Callable(_) => "callable",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Истинность значения при выборе ветви условия.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Object(_) | Value::Callable(_) => true,
        }
    }

    /// Получить объект предметной области конкретного типа.
    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Разрешить обращение к атрибуту.
    pub fn attribute(&self, name: &str) -> SymbResult<Value> {
        match self {
            Value::Object(obj) => obj.attribute(name),
            Value::Callable(callable) if name == "__name__" => {
                Ok(Value::Str(callable.name().to_string()))
            }
            other => Err(SymbError::UnknownAttribute {
                type_name: other.type_name().to_string(),
                attribute: name.to_string(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Побитовое сравнение: NaN равен самому себе, 0.0 и -0.0 различаются.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::List(items) | Value::Tuple(items) => items.hash(state),
            Value::Object(obj) => obj.hash(state),
            Value::Callable(callable) => callable.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "[{}]", join(items)),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => write!(f, "({})", join(items)),
            Value::Object(obj) => write!(f, "{}", obj),
            Value::Callable(callable) => write!(f, "{}", callable.name()),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Callable> for Value {
    fn from(v: Callable) -> Self {
        Value::Callable(v)
    }
}

// === Объекты предметной области ===

/// Структурное сравнение и хеширование через `dyn`.
///
/// Реализуется автоматически для любого `T: Eq + Hash + 'static`.
pub trait DynKey: Any {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: Any + Eq + Hash> DynKey for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Значение предметной области, которое может пройти через вычислитель.
///
/// Атрибуты и методы перечисляются явно: произвольные имена не
/// перехватываются.
pub trait DomainObject: DynKey + fmt::Debug + fmt::Display + Send + Sync {
    /// Имя типа (`Field`, `CSR`, ...).
    fn type_name(&self) -> &'static str;

    /// Значение атрибута или `None`, если такого атрибута нет.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Имена методов, доступных через обращение к атрибуту.
    fn methods(&self) -> &'static [&'static str] {
        &[]
    }

    /// Вызвать метод по имени.
    fn call_method(&self, name: &str, _args: &Args) -> SymbResult<Value> {
        Err(SymbError::UnknownAttribute {
            type_name: self.type_name().to_string(),
            attribute: name.to_string(),
        })
    }
}

/// Разделяемая ссылка на объект предметной области.
#[derive(Debug, Clone)]
pub struct Object(Arc<dyn DomainObject>);

impl Object {
    pub fn new<T: DomainObject>(obj: T) -> Self {
        Self(Arc::new(obj))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Атрибут объекта; имя метода даёт связанный вызываемый объект.
    pub fn attribute(&self, name: &str) -> SymbResult<Value> {
        if let Some(value) = self.0.attribute(name) {
            return Ok(value);
        }
        if self.0.methods().contains(&name) {
            let receiver = self.clone();
            let method = name.to_string();
            let bound = Callable::new(format!("{}.{}", self.type_name(), name), move |args| {
                receiver.0.call_method(&method, args)
            });
            return Ok(Value::Callable(bound));
        }
        Err(SymbError::UnknownAttribute {
            type_name: self.type_name().to_string(),
            attribute: name.to_string(),
        })
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.dyn_eq(other.0.as_any())
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// === Вызываемые сущности ===

type CallableFn = dyn Fn(&Args) -> SymbResult<Value> + Send + Sync;

/// Функция или конструктор, пригодные для отложенного вызова.
///
/// Идентичность определяется именем и разделяемой реализацией (`Arc`):
/// клоны одной обёртки равны, а обёртки, созданные отдельно, различны.
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<CallableFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Args) -> SymbResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Выполнить реализацию с конкретными аргументами.
    pub fn invoke(&self, args: &Args) -> SymbResult<Value> {
        (self.func)(args)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.func) as *const ()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.addr() == other.addr()
    }
}

impl Eq for Callable {}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.addr().hash(state);
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<callable {}>", self.name)
    }
}

/// Вычисленные аргументы вызова: позиционные и именованные.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }

    pub fn with_named(positional: Vec<Value>, named: Vec<(String, Value)>) -> Self {
        Self { positional, named }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Именованный аргумент по имени.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Позиционный аргумент или одноимённый именованный.
    pub fn arg(&self, index: usize, name: &str) -> Option<&Value> {
        self.get(index).or_else(|| self.named(name))
    }

    /// Проверить количество позиционных аргументов.
    pub fn expect_arity(&self, callee: &str, min: usize, max: usize) -> SymbResult<()> {
        let got = self.positional.len() + self.named.len();
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}..={}", min, max)
            };
            return Err(SymbError::wrong_arity(callee, expected, got));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Counter(i64);

    impl fmt::Display for Counter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Counter({})", self.0)
        }
    }

    impl DomainObject for Counter {
        fn type_name(&self) -> &'static str {
            "Counter"
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "count" => Some(Value::Int(self.0)),
                _ => None,
            }
        }

        fn methods(&self) -> &'static [&'static str] {
            &["plus"]
        }

        fn call_method(&self, name: &str, args: &Args) -> SymbResult<Value> {
            match name {
                "plus" => {
                    let step = args.get(0).and_then(Value::as_int).unwrap_or(1);
                    Ok(Value::Int(self.0 + step))
                }
                _ => Err(SymbError::UnknownAttribute {
                    type_name: "Counter".to_string(),
                    attribute: name.to_string(),
                }),
            }
        }
    }

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            "(1, a)"
        );
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::List(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_structural_object_equality() {
        let a = Value::object(Counter(5));
        let b = Value::object(Counter(5));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, Value::object(Counter(6)));
    }

    #[test]
    fn test_object_attribute_and_method() {
        let counter = Value::object(Counter(41));
        assert_eq!(counter.attribute("count").unwrap(), Value::Int(41));

        let plus = counter.attribute("plus").unwrap();
        match plus {
            Value::Callable(method) => {
                assert_eq!(method.name(), "Counter.plus");
                let result = method.invoke(&Args::new(vec![Value::Int(1)])).unwrap();
                assert_eq!(result, Value::Int(42));
            }
            other => panic!("Expected bound method, got {:?}", other),
        }

        assert!(matches!(
            counter.attribute("missing"),
            Err(SymbError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_callable_identity() {
        let f = Callable::new("f", |_| Ok(Value::None));
        let g = Callable::new("f", |_| Ok(Value::None));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::None.truthy());
        assert!(Value::Tuple(vec![Value::None]).truthy());
    }

    #[test]
    fn test_expect_arity() {
        let args = Args::new(vec![Value::Int(1), Value::Int(2)]);
        assert!(args.expect_arity("f", 1, 3).is_ok());
        assert!(matches!(
            args.expect_arity("f", 3, 3),
            Err(SymbError::WrongArity { got: 2, .. })
        ));
    }
}
