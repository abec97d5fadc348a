//! Режимы построения: символический и энергичный.
//!
//! Один и тот же код построителя (например, каталог CSR) пишется против
//! трейта [`Mode`] и выбирается один раз при конфигурации:
//!
//! - [`Symbolic`] строит граф: символы остаются символами, вызовы
//!   конструкторов становятся узлами `Call`, условия становятся узлами
//!   `Conditional`. Отслеживаемые создания попадают в отложенный реестр
//!   вместе с условиями объемлющих ветвей.
//! - [`Eager`] вычисляет всё сразу в фиксированном контексте: выполняется
//!   только выбранная ветвь, отслеживаемые создания сразу пополняют
//!   конкретный реестр.

use std::cell::RefCell;

use log::trace;

use crate::deferred::{self, constant, Deferred};
use crate::error::{SymbError, SymbResult};
use crate::evaluator::{Context, Evaluator};
use crate::node::Operand;
use crate::registry::{Construction, Constructor, Guard};
use crate::value::{Args, Value};

/// Стратегия построения.
pub trait Mode {
    /// Название режима для журналов и отчётов.
    fn name(&self) -> &'static str;

    /// Именованный параметр.
    fn symbol(&self, name: &str) -> SymbResult<Deferred>;

    /// Вызов конструктора с позиционными и именованными аргументами.
    fn call_with(
        &self,
        ctor: &Constructor,
        args: Vec<Operand>,
        kwargs: Vec<(String, Operand)>,
    ) -> SymbResult<Deferred>;

    /// Вызов конструктора с позиционными аргументами.
    fn call(&self, ctor: &Constructor, args: Vec<Operand>) -> SymbResult<Deferred> {
        self.call_with(ctor, args, Vec::new())
    }

    /// Выбор по условию. Ветви строятся замыканиями, чтобы создания внутри
    /// них были привязаны к своей ветви.
    fn cond<T, E>(&self, condition: Deferred, then_branch: T, else_branch: E) -> SymbResult<Deferred>
    where
        T: FnOnce() -> SymbResult<Deferred>,
        E: FnOnce() -> SymbResult<Deferred>;
}

/// Построение графа без вычислений.
#[derive(Debug, Default)]
pub struct Symbolic {
    guards: RefCell<Vec<Guard>>,
}

impl Symbolic {
    pub fn new() -> Self {
        Self::default()
    }

    fn within<F>(&self, guard: Guard, branch: F) -> SymbResult<Deferred>
    where
        F: FnOnce() -> SymbResult<Deferred>,
    {
        self.guards.borrow_mut().push(guard);
        let result = branch();
        self.guards.borrow_mut().pop();
        result
    }
}

impl Mode for Symbolic {
    fn name(&self) -> &'static str {
        "symbolic"
    }

    fn symbol(&self, name: &str) -> SymbResult<Deferred> {
        Ok(deferred::symbol(name))
    }

    fn call_with(
        &self,
        ctor: &Constructor,
        args: Vec<Operand>,
        kwargs: Vec<(String, Operand)>,
    ) -> SymbResult<Deferred> {
        let node = ctor.callable().defer_with(args, kwargs);
        if let Some(tracker) = ctor.tracker() {
            let guards = self.guards.borrow().clone();
            trace!("deferred {} under {} guard(s)", node, guards.len());
            tracker.deferred.push(Construction::new(node.clone(), guards));
        }
        Ok(node)
    }

    fn cond<T, E>(&self, condition: Deferred, then_branch: T, else_branch: E) -> SymbResult<Deferred>
    where
        T: FnOnce() -> SymbResult<Deferred>,
        E: FnOnce() -> SymbResult<Deferred>,
    {
        let on = |expected| Guard {
            condition: condition.operand().clone(),
            expected,
        };
        let then_value = self.within(on(true), then_branch)?;
        let else_value = self.within(on(false), else_branch)?;
        Ok(deferred::cond(condition, then_value, else_value))
    }
}

/// Немедленные вычисления в фиксированном контексте.
#[derive(Debug)]
pub struct Eager {
    context: Context,
    evaluator: RefCell<Evaluator>,
}

impl Eager {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            evaluator: RefCell::new(Evaluator::new()),
        }
    }

    fn resolve(&self, operand: &Operand) -> SymbResult<Value> {
        self.evaluator.borrow_mut().evaluate(operand, &self.context)
    }
}

impl Mode for Eager {
    fn name(&self) -> &'static str {
        "eager"
    }

    fn symbol(&self, name: &str) -> SymbResult<Deferred> {
        self.context
            .get(name)
            .cloned()
            .map(constant)
            .ok_or_else(|| SymbError::UnresolvedSymbol(name.to_string()))
    }

    fn call_with(
        &self,
        ctor: &Constructor,
        args: Vec<Operand>,
        kwargs: Vec<(String, Operand)>,
    ) -> SymbResult<Deferred> {
        let positional = args
            .iter()
            .map(|arg| self.resolve(arg))
            .collect::<SymbResult<Vec<_>>>()?;
        let named = kwargs
            .iter()
            .map(|(name, arg)| Ok((name.clone(), self.resolve(arg)?)))
            .collect::<SymbResult<Vec<_>>>()?;
        let value = ctor.recording().invoke(&Args::with_named(positional, named))?;
        Ok(constant(value))
    }

    fn cond<T, E>(&self, condition: Deferred, then_branch: T, else_branch: E) -> SymbResult<Deferred>
    where
        T: FnOnce() -> SymbResult<Deferred>,
        E: FnOnce() -> SymbResult<Deferred>,
    {
        if self.resolve(condition.operand())?.truthy() {
            then_branch()
        } else {
            else_branch()
        }
    }
}
