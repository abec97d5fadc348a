//! Вычислитель отложенных выражений.
//!
//! Обходит граф в глубину (post-order): сначала операнды, затем
//! сохранённая реализация узла. Результаты мемоизируются по
//! структурному ключу (узел, контекст). Кэш живёт столько же, сколько
//! экземпляр [`Evaluator`], и никогда не инвалидируется: узлы неизменяемы.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, trace};

use crate::error::{SymbError, SymbResult};
use crate::node::{with_stack, Node, NodeRef, Operand};
use crate::value::{Args, Value};

/// Связывание имён символов с конкретными значениями.
///
/// Ключи хранятся упорядоченно, поэтому два контекста с одинаковыми
/// связываниями равны и имеют одинаковый хеш независимо от порядка
/// добавления.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Context {
    bindings: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить связывание (builder-стиль).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        for (name, value) in iter {
            ctx.insert(name, value);
        }
        ctx
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Счётчики кэша мемоизации.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Узлы, взятые из кэша
    pub hits: u64,
    /// Узлы, вычисленные заново
    pub misses: u64,
}

/// Вычислитель с кэшем, разделённым по контекстам.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Контекст -> (узел -> значение)
    memo: HashMap<Context, HashMap<NodeRef, Value>>,
    stats: EvalStats,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вычислить выражение в заданном контексте.
    ///
    /// Неудачные вычисления в кэш не попадают.
    pub fn evaluate<E>(&mut self, expr: &E, ctx: &Context) -> SymbResult<Value>
    where
        E: AsRef<Operand> + ?Sized,
    {
        let operand = expr.as_ref();
        debug!("evaluating {} under {}", operand, ctx);

        let mut memo = self.memo.remove(ctx).unwrap_or_default();
        let result = Resolver {
            ctx,
            memo: &mut memo,
            stats: &mut self.stats,
        }
        .resolve(operand);
        self.memo.insert(ctx.clone(), memo);

        if let Err(err) = &result {
            debug!("evaluation of {} failed: {}", operand, err);
        }
        result
    }

    /// Количество закэшированных значений во всех контекстах.
    pub fn cache_len(&self) -> usize {
        self.memo.values().map(HashMap::len).sum()
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }
}

/// Один проход вычисления в фиксированном контексте.
struct Resolver<'a> {
    ctx: &'a Context,
    memo: &'a mut HashMap<NodeRef, Value>,
    stats: &'a mut EvalStats,
}

impl Resolver<'_> {
    fn resolve(&mut self, operand: &Operand) -> SymbResult<Value> {
        match operand {
            Operand::Value(value) => Ok(value.clone()),
            Operand::List(items) => Ok(Value::List(self.resolve_all(items)?)),
            Operand::Tuple(items) => Ok(Value::Tuple(self.resolve_all(items)?)),
            Operand::Node(node) => self.resolve_node(node),
        }
    }

    fn resolve_all(&mut self, operands: &[Operand]) -> SymbResult<Vec<Value>> {
        operands.iter().map(|operand| self.resolve(operand)).collect()
    }

    fn resolve_node(&mut self, node: &NodeRef) -> SymbResult<Value> {
        if let Some(value) = self.memo.get(node) {
            self.stats.hits += 1;
            trace!("memo hit: {}", node);
            return Ok(value.clone());
        }

        let value = with_stack(|| self.compute(node))?;

        self.stats.misses += 1;
        trace!("memo miss: {} = {}", node, value);
        self.memo.insert(node.clone(), value.clone());
        Ok(value)
    }

    fn compute(&mut self, node: &Node) -> SymbResult<Value> {
        match node {
            Node::Symbol(name) => self
                .ctx
                .get(name)
                .cloned()
                .ok_or_else(|| SymbError::UnresolvedSymbol(name.clone())),

            Node::Operation { op, operands } => {
                let values = self.resolve_all(operands)?;
                op.apply(&values)
            }

            Node::Call {
                target,
                args,
                kwargs,
            } => {
                let callable = match self.resolve(target)? {
                    Value::Callable(callable) => callable,
                    other => {
                        return Err(SymbError::InternalConsistency(format!(
                            "'{}' object is not callable",
                            other.type_name()
                        )))
                    }
                };
                let positional = self.resolve_all(args)?;
                let named = kwargs
                    .iter()
                    .map(|(name, operand)| Ok((name.clone(), self.resolve(operand)?)))
                    .collect::<SymbResult<Vec<_>>>()?;
                callable.invoke(&Args::with_named(positional, named))
            }

            Node::AttributeAccess { target, attribute } => self.resolve(target)?.attribute(attribute),

            // Невыбранная ветвь не вычисляется вовсе.
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.resolve(condition)?.truthy() {
                    self.resolve(then_branch)
                } else {
                    self.resolve(else_branch)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::{cond, constant, symbol, Deferred};
    use crate::operands;
    use crate::ops::Operator;
    use crate::value::Callable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(name: &str) -> (Callable, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callable = Callable::new(name, move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(args.get(0).cloned().unwrap_or(Value::None))
        });
        (callable, calls)
    }

    fn failing(name: &str) -> (Callable, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callable = Callable::new(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SymbError::InvalidOperation("must not be evaluated".to_string()))
        });
        (callable, calls)
    }

    #[test]
    fn test_memoization() {
        let (identity, calls) = counting("identity");
        let expr = identity.defer(operands![symbol("x") + 1]);
        let ctx = Context::new().with("x", 41);

        let mut evaluator = Evaluator::new();
        let first = evaluator.evaluate(&expr, &ctx).unwrap();
        let second = evaluator.evaluate(&expr, &ctx).unwrap();
        assert_eq!(first, Value::Int(42));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(evaluator.stats().hits >= 1);

        // Другой контекст, другой ключ.
        let other = evaluator.evaluate(&expr, &Context::new().with("x", 1)).unwrap();
        assert_eq!(other, Value::Int(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_memo_key_is_structural() {
        let (identity, calls) = counting("identity");
        let a = identity.defer(operands![symbol("x") * 2]);
        let b = identity.defer(operands![symbol("x") * 2]);

        let ctx1: Context = vec![("x", 3), ("y", 4)].into_iter().collect();
        let ctx2: Context = vec![("y", 4), ("x", 3)].into_iter().collect();
        assert_eq!(ctx1, ctx2);

        let mut evaluator = Evaluator::new();
        assert_eq!(evaluator.evaluate(&a, &ctx1).unwrap(), Value::Int(6));
        assert_eq!(evaluator.evaluate(&b, &ctx2).unwrap(), Value::Int(6));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_subexpression_computed_once() {
        let (identity, calls) = counting("identity");
        let shared = identity.defer(operands![symbol("xlen") - 2]);
        let total = &shared + &shared + &shared;

        let mut evaluator = Evaluator::new();
        let result = evaluator
            .evaluate(&total, &Context::new().with("xlen", 64))
            .unwrap();
        assert_eq!(result, Value::Int(186));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    macro_rules! check_binary {
        ($evaluator:expr, $a:expr, $b:expr, $($op:tt),+ $(,)?) => {
            $(
                let expected = Value::Int($a $op $b);
                let left = constant($a) $op $b;
                let right = $a $op constant($b);
                assert_eq!($evaluator.evaluate(&left, &Context::new()).unwrap(), expected);
                assert_eq!($evaluator.evaluate(&right, &Context::new()).unwrap(), expected);
            )+
        };
    }

    #[test]
    fn test_operators_both_orders() {
        let mut evaluator = Evaluator::new();
        for (a, b) in [(17i64, 5i64), (-17, 5), (6, -4), (3, 3)] {
            check_binary!(evaluator, a, b, +, -, *, &, |, ^);
        }
        for (a, b) in [(17i64, 5i64), (-17, 3), (1, 0)] {
            check_binary!(evaluator, a, b, <<, >>);
        }
    }

    #[test]
    fn test_division_both_orders() {
        // (a, b, a // b, a % b, a / b)
        let table = [
            (17i64, 5i64, 3i64, 2i64, 3.4),
            (-17, 5, -4, 3, -3.4),
            (17, -4, -5, -3, -4.25),
            (7, 2, 3, 1, 3.5),
        ];
        let mut evaluator = Evaluator::new();
        let ctx = Context::new();
        for (a, b, quotient, remainder, ratio) in table {
            let cases = [
                (
                    constant(a).floor_div(b),
                    Deferred::binary(Operator::FloorDiv, a, constant(b)),
                    Value::Int(quotient),
                ),
                (constant(a) % b, a % constant(b), Value::Int(remainder)),
                (constant(a) / b, a / constant(b), Value::Float(ratio)),
            ];
            for (left, right, expected) in cases {
                assert_eq!(evaluator.evaluate(&left, &ctx).unwrap(), expected);
                assert_eq!(evaluator.evaluate(&right, &ctx).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_comparisons_both_orders() {
        let mut evaluator = Evaluator::new();
        for (a, b) in [(17i64, 5i64), (-17, 5), (5, 5), (2, 9)] {
            let cases = [
                (Operator::Lt, a < b),
                (Operator::Le, a <= b),
                (Operator::Eq, a == b),
                (Operator::Ne, a != b),
                (Operator::Ge, a >= b),
                (Operator::Gt, a > b),
            ];
            for (op, expected) in cases {
                let left = Deferred::binary(op, constant(a), b);
                let right = Deferred::binary(op, a, constant(b));
                let expected = Value::Bool(expected);
                assert_eq!(evaluator.evaluate(&left, &Context::new()).unwrap(), expected);
                assert_eq!(evaluator.evaluate(&right, &Context::new()).unwrap(), expected);
            }
        }

        let x = constant(7);
        assert_eq!(
            evaluator.evaluate(&x.le(7), &Context::new()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_conditional_short_circuit() {
        let (boom, calls) = failing("boom");
        let mut evaluator = Evaluator::new();

        let taken_then = cond(true, 1, boom.defer(operands![]));
        assert_eq!(
            evaluator.evaluate(&taken_then, &Context::new()).unwrap(),
            Value::Int(1)
        );

        let taken_else = cond(false, boom.defer(operands![]), 2);
        assert_eq!(
            evaluator.evaluate(&taken_else, &Context::new()).unwrap(),
            Value::Int(2)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Несвязанный символ в невыбранной ветви тоже допустим.
        let partial = cond(symbol("xlen").ne(32), 4, symbol("unbound"));
        assert_eq!(
            evaluator
                .evaluate(&partial, &Context::new().with("xlen", 64))
                .unwrap(),
            Value::Int(4)
        );
    }

    #[test]
    fn test_unresolved_symbol() {
        let mut evaluator = Evaluator::new();
        let err = evaluator.evaluate(&symbol("y"), &Context::new()).unwrap_err();
        assert_eq!(err, SymbError::UnresolvedSymbol("y".to_string()));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let expr = symbol("x") + 1;
        let mut evaluator = Evaluator::new();
        assert!(evaluator.evaluate(&expr, &Context::new()).is_err());
        assert_eq!(evaluator.cache_len(), 0);

        let ctx = Context::new().with("x", 1);
        assert_eq!(evaluator.evaluate(&expr, &ctx).unwrap(), Value::Int(2));
        assert_eq!(evaluator.cache_len(), 2);
    }

    #[test]
    fn test_parametric_width() {
        let word_width = symbol("wordWidth");
        let width = cond(word_width.ne(32), 4, 1);

        let mut evaluator = Evaluator::new();
        let rv64 = Context::new().with("wordWidth", 64);
        let rv32 = Context::new().with("wordWidth", 32);
        assert_eq!(evaluator.evaluate(&width, &rv64).unwrap(), Value::Int(4));
        assert_eq!(evaluator.evaluate(&width, &rv32).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_containers_resolve_structurally() {
        let x = symbol("x");
        let expr = Deferred::tuple(operands![&x, Deferred::list(operands![&x + 1, "s"])]);
        let value = Evaluator::new()
            .evaluate(&expr, &Context::new().with("x", 1))
            .unwrap();
        assert_eq!(
            value,
            Value::Tuple(vec![
                Value::Int(1),
                Value::List(vec![Value::Int(2), Value::Str("s".to_string())]),
            ])
        );
    }

    #[test]
    fn test_not_callable_is_internal_error() {
        let expr = constant(5).call(operands![1]);
        let err = Evaluator::new().evaluate(&expr, &Context::new()).unwrap_err();
        assert!(matches!(err, SymbError::InternalConsistency(_)));
    }

    fn chain(depth: i64) -> Deferred {
        let mut expr = symbol("x");
        for _ in 0..depth {
            expr = expr + 1;
        }
        expr
    }

    #[test]
    fn test_deep_graph() {
        let ctx = Context::new().with("x", 0);
        let mut evaluator = Evaluator::new();

        let first = chain(100_000);
        assert_eq!(evaluator.evaluate(&first, &ctx).unwrap(), Value::Int(100_000));

        // Отдельно построенная копия находится в кэше глубоким сравнением.
        let second = chain(100_000);
        assert_eq!(evaluator.evaluate(&second, &ctx).unwrap(), Value::Int(100_000));
        assert_eq!(evaluator.stats().hits, 1);

        drop(first);
        drop(evaluator);
        drop(second);
    }

    #[test]
    fn test_context_display() {
        let ctx = Context::new().with("xlen", 64).with("a", true);
        assert_eq!(ctx.to_string(), "{a: True, xlen: 64}");
    }
}
