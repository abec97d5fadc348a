//! Реестры созданных экземпляров.
//!
//! Реестр только пополняется: записи не удаляются, не переупорядочиваются
//! и не дедуплицируются. Порядок записей совпадает с порядком создания.
//!
//! Поддерживаются два уровня:
//! - отложенный реестр ([`Construction`]) заполняется при построении графа;
//! - конкретный реестр ([`Value`]) заполняется либо сразу при энергичном
//!   создании, либо при реализации отложенного реестра в контексте
//!   ([`Tracker::realize`]).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::deferred::Deferred;
use crate::error::SymbResult;
use crate::evaluator::{Context, Evaluator};
use crate::node::Operand;
use crate::value::{Callable, Value};

/// Упорядоченный реестр с разделяемым доступом.
#[derive(Debug)]
pub struct Registry<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить запись в конец.
    pub fn push(&self, entry: T) {
        self.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // Запись в Vec не оставляет его в несогласованном состоянии.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Registry<T> {
    /// Снимок записей в порядке добавления.
    pub fn entries(&self) -> Vec<T> {
        self.lock().clone()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.lock().get(index).cloned()
    }
}

/// Обернуть конструктор так, чтобы каждое возвращённое значение
/// добавлялось в реестр.
pub fn collect(callable: &Callable, registry: &Registry<Value>) -> Callable {
    let inner = callable.clone();
    let registry = registry.clone();
    Callable::new(callable.name(), move |args| {
        let value = inner.invoke(args)?;
        registry.push(value.clone());
        Ok(value)
    })
}

/// Условие ветви, внутри которой была сделана запись.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub condition: Operand,
    pub expected: bool,
}

impl Guard {
    /// Выполняется ли условие в данном контексте.
    pub fn holds(&self, evaluator: &mut Evaluator, ctx: &Context) -> SymbResult<bool> {
        Ok(evaluator.evaluate(&self.condition, ctx)?.truthy() == self.expected)
    }
}

/// Отложенное создание экземпляра.
#[derive(Debug, Clone)]
pub struct Construction {
    /// Узел `Call`, ещё не вычисленный
    pub node: Deferred,
    /// Условия всех объемлющих ветвей на момент создания
    pub guards: Vec<Guard>,
}

impl Construction {
    pub fn new(node: Deferred, guards: Vec<Guard>) -> Self {
        Self { node, guards }
    }

    /// Лежит ли создание на выбранном пути вычисления.
    pub fn is_taken(&self, evaluator: &mut Evaluator, ctx: &Context) -> SymbResult<bool> {
        for guard in &self.guards {
            if !guard.holds(evaluator, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Пара реестров одного отслеживаемого конструктора.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    pub deferred: Registry<Construction>,
    pub concrete: Registry<Value>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вычислить все отложенные создания на выбранном пути и перенести
    /// результаты в конкретный реестр.
    ///
    /// Возвращает значения этого вызова в порядке создания.
    pub fn realize(&self, evaluator: &mut Evaluator, ctx: &Context) -> SymbResult<Vec<Value>> {
        let constructions = self.deferred.entries();
        let mut realized = Vec::with_capacity(constructions.len());
        for construction in &constructions {
            if !construction.is_taken(evaluator, ctx)? {
                continue;
            }
            let value = evaluator.evaluate(&construction.node, ctx)?;
            self.concrete.push(value.clone());
            realized.push(value);
        }
        debug!(
            "realized {} of {} constructions under {}",
            realized.len(),
            constructions.len(),
            ctx
        );
        Ok(realized)
    }
}

/// Конструктор для использования в графе, опционально отслеживаемый.
#[derive(Debug, Clone)]
pub struct Constructor {
    callable: Callable,
    /// Реализация, пополняющая конкретный реестр при непосредственном вызове
    recording: Callable,
    tracker: Option<Tracker>,
}

impl Constructor {
    pub fn new(callable: Callable) -> Self {
        Self {
            recording: callable.clone(),
            callable,
            tracker: None,
        }
    }

    /// Конструктор, чьи создания попадают в реестры `tracker`.
    pub fn tracked(callable: Callable, tracker: &Tracker) -> Self {
        Self {
            recording: collect(&callable, &tracker.concrete),
            callable,
            tracker: Some(tracker.clone()),
        }
    }

    pub fn name(&self) -> &str {
        self.callable.name()
    }

    /// Исходная реализация; используется в узлах `Call`.
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Реализация для энергичного вызова.
    pub fn recording(&self) -> &Callable {
        &self.recording
    }

    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }
}
