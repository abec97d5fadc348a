//! Макросы для построения списков операндов.

/// Собрать `Vec<Operand>` из выражений разных типов.
///
/// ```
/// use symcsr::{operands, symbol, Deferred};
///
/// let x = symbol("x");
/// let t = Deferred::tuple(operands![&x, 1, "a"]);
/// assert_eq!(t.to_string(), "(x, 1, a)");
/// ```
#[macro_export]
macro_rules! operands {
    () => {
        ::std::vec::Vec::<$crate::Operand>::new()
    };
    ($($item:expr),+ $(,)?) => {
        ::std::vec![$($crate::Operand::from($item)),+]
    };
}
