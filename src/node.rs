//! Узлы графа отложенных вычислений.
//!
//! Граф неизменяем: узел создаётся один раз и разделяется через
//! [`NodeRef`]. Поскольку узел может ссылаться только на уже созданные
//! узлы, граф всегда конечен и ацикличен.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use crate::ops::Operator;
use crate::value::Value;

/// Узел графа.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Несвязанный именованный параметр
    Symbol(String),
    /// Применение оператора
    Operation {
        op: Operator,
        operands: Vec<Operand>,
    },
    /// Отложенный вызов функции или конструктора
    Call {
        target: Operand,
        args: Vec<Operand>,
        kwargs: Vec<(String, Operand)>,
    },
    /// Отложенное обращение к атрибуту
    AttributeAccess { target: Operand, attribute: String },
    /// Тернарный выбор; вычисляется только выбранная ветвь
    Conditional {
        condition: Operand,
        then_branch: Operand,
        else_branch: Operand,
    },
}

/// Разделяемая ссылка на узел с заранее вычисленным структурным хешем.
///
/// Хеш поддерева считается один раз при создании, поэтому поиск в кэше
/// мемоизации не обходит дерево заново.
#[derive(Debug, Clone)]
pub struct NodeRef {
    node: Arc<Node>,
    hash: u64,
}

impl NodeRef {
    pub fn new(node: Node) -> Self {
        let mut hasher = DefaultHasher::new();
        node.hash(&mut hasher);
        Self {
            node: Arc::new(node),
            hash: hasher.finish(),
        }
    }

    pub fn structural_hash(&self) -> u64 {
        self.hash
    }
}

impl Deref for NodeRef {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
            || (self.hash == other.hash && with_stack(|| self.node == other.node))
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_stack(|| write!(f, "{}", self.node))
    }
}

/// Освобождение без рекурсии: дети единственного владельца уходят в
/// рабочий список, поэтому цепочка любой глубины не растит стек.
impl Drop for NodeRef {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(&mut self.node, &mut pending);
        while let Some(mut child) = pending.pop() {
            detach_children(&mut child.node, &mut pending);
        }
    }
}

fn detach_children(node: &mut Arc<Node>, pending: &mut Vec<NodeRef>) {
    let Some(node) = Arc::get_mut(node) else {
        return;
    };
    let mut operands = match node {
        Node::Symbol(_) => return,
        Node::Operation { operands, .. } => mem::take(operands),
        Node::Call {
            target,
            args,
            kwargs,
        } => {
            let mut taken = mem::take(args);
            taken.extend(mem::take(kwargs).into_iter().map(|(_, operand)| operand));
            taken.push(mem::replace(target, Operand::Value(Value::None)));
            taken
        }
        Node::AttributeAccess { target, .. } => {
            vec![mem::replace(target, Operand::Value(Value::None))]
        }
        Node::Conditional {
            condition,
            then_branch,
            else_branch,
        } => [condition, then_branch, else_branch]
            .into_iter()
            .map(|operand| mem::replace(operand, Operand::Value(Value::None)))
            .collect(),
    };
    while let Some(operand) = operands.pop() {
        match operand {
            Operand::Node(node) => pending.push(node),
            Operand::Value(_) => {}
            Operand::List(items) | Operand::Tuple(items) => operands.extend(items),
        }
    }
}

// 256KB red zone, 8MB stack growth
pub(crate) const RED_ZONE: usize = 256 * 1024;
pub(crate) const STACK_GROWTH: usize = 8 * 1024 * 1024;

/// Рекурсия по глубокому графу с подращиванием стека.
pub(crate) fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_GROWTH, f)
}

/// Операнд: узел, конкретное значение или контейнер операндов.
///
/// Списки и кортежи не являются узлами, но при вычислении обходятся
/// структурно.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Node(NodeRef),
    Value(Value),
    List(Vec<Operand>),
    Tuple(Vec<Operand>),
}

impl Operand {
    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Operand::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Содержит ли операнд хотя бы один узел.
    pub fn is_deferred(&self) -> bool {
        match self {
            Operand::Node(_) => true,
            Operand::Value(_) => false,
            Operand::List(items) | Operand::Tuple(items) => items.iter().any(Operand::is_deferred),
        }
    }
}

impl AsRef<Operand> for Operand {
    fn as_ref(&self) -> &Operand {
        self
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        Operand::Node(NodeRef::new(node))
    }
}

impl From<NodeRef> for Operand {
    fn from(node: NodeRef) -> Self {
        Operand::Node(node)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

macro_rules! operand_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_value!(i64, i32, u32, bool, f64, &str, String, crate::value::Callable);

// === Текстовое представление ===

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Operand]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_call_args(
    f: &mut fmt::Formatter<'_>,
    args: &[Operand],
    kwargs: &[(String, Operand)],
) -> fmt::Result {
    write_joined(f, args)?;
    for (i, (name, value)) in kwargs.iter().enumerate() {
        if i > 0 || !args.is_empty() {
            write!(f, ", ")?;
        }
        write!(f, "{}={}", name, value)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Symbol(name) => write!(f, "{}", name),
            Node::Operation { op, operands } => match (op.symbol(), operands.as_slice()) {
                (Some(symbol), [operand]) => write!(f, "({}{})", symbol, operand),
                (Some(symbol), [left, right]) => write!(f, "({} {} {})", left, symbol, right),
                _ => {
                    write!(f, "{}(", op.name())?;
                    write_joined(f, operands)?;
                    write!(f, ")")
                }
            },
            Node::Call {
                target,
                args,
                kwargs,
            } => {
                write!(f, "{}(", target)?;
                write_call_args(f, args, kwargs)?;
                write!(f, ")")
            }
            Node::AttributeAccess { target, attribute } => write!(f, "{}.{}", target, attribute),
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({} ? {} : {})", condition, then_branch, else_branch),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Node(node) => write!(f, "{}", node),
            Operand::Value(value) => write!(f, "{}", value),
            Operand::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Operand::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Operand::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;

    fn symbol(name: &str) -> Operand {
        Node::Symbol(name.to_string()).into()
    }

    #[test]
    fn test_structural_equality() {
        let a = NodeRef::new(Node::Operation {
            op: Operator::Add,
            operands: vec![symbol("x"), Operand::from(1)],
        });
        let b = NodeRef::new(Node::Operation {
            op: Operator::Add,
            operands: vec![symbol("x"), Operand::from(1)],
        });
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());

        let c = NodeRef::new(Node::Operation {
            op: Operator::Sub,
            operands: vec![symbol("x"), Operand::from(1)],
        });
        assert_ne!(a, c);
    }

    fn deep_chain(depth: usize) -> NodeRef {
        let mut node = Node::Symbol("x".to_string());
        for _ in 0..depth {
            node = Node::Operation {
                op: Operator::Neg,
                operands: vec![node.into()],
            };
        }
        NodeRef::new(node)
    }

    #[test]
    fn test_deep_chain_compare_render_drop() {
        let a = deep_chain(100_000);
        let b = deep_chain(100_000);
        assert_eq!(a, b);
        assert_ne!(a, deep_chain(99_999));

        let text = a.to_string();
        assert!(text.starts_with("(-(-(-"));
        assert_eq!(text.len(), 100_000 * 3 + 1);

        // Общий хвост переживает освобождение одной из ссылок.
        let shared = a.clone();
        drop(a);
        assert_eq!(shared, b);
    }

    #[test]
    fn test_render_operations() {
        let add = Node::Operation {
            op: Operator::Add,
            operands: vec![symbol("x"), Operand::from(1)],
        };
        assert_eq!(add.to_string(), "(x + 1)");

        let neg = Node::Operation {
            op: Operator::Neg,
            operands: vec![symbol("x")],
        };
        assert_eq!(neg.to_string(), "(-x)");

        let abs = Node::Operation {
            op: Operator::Abs,
            operands: vec![symbol("x")],
        };
        assert_eq!(abs.to_string(), "abs(x)");

        let divmod = Node::Operation {
            op: Operator::DivMod,
            operands: vec![Operand::from(7), symbol("x")],
        };
        assert_eq!(divmod.to_string(), "divmod(7, x)");
    }

    #[test]
    fn test_render_call_attribute_conditional() {
        let f = Callable::new("kw_test", |_| Ok(Value::None));
        let call = Node::Call {
            target: f.into(),
            args: vec![Operand::from(1), Operand::from(2)],
            kwargs: vec![("z".to_string(), Operand::from(3))],
        };
        assert_eq!(call.to_string(), "kw_test(1, 2, z=3)");

        let attr = Node::AttributeAccess {
            target: symbol("y"),
            attribute: "plusone".to_string(),
        };
        let method_call = Node::Call {
            target: attr.into(),
            args: vec![],
            kwargs: vec![],
        };
        assert_eq!(method_call.to_string(), "y.plusone()");

        let cond = Node::Conditional {
            condition: Node::Operation {
                op: Operator::Ne,
                operands: vec![symbol("xlen"), Operand::from(32)],
            }
            .into(),
            then_branch: Operand::from(4),
            else_branch: Operand::from(1),
        };
        assert_eq!(cond.to_string(), "((xlen != 32) ? 4 : 1)");
    }

    #[test]
    fn test_render_containers() {
        let tuple = Operand::Tuple(vec![symbol("a")]);
        assert_eq!(tuple.to_string(), "(a,)");
        let list = Operand::List(vec![symbol("a"), Operand::from("b")]);
        assert_eq!(list.to_string(), "[a, b]");
        assert!(list.is_deferred());
        assert!(!Operand::List(vec![Operand::from(1)]).is_deferred());
    }
}
