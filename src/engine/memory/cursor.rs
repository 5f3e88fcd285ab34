use std::any::Any;
use std::collections::{BTreeSet, VecDeque};

use super::Bindings;
use crate::engine::{EngineCursor, EnginePlan, EngineResult, EngineSummary, RawValue};

/// Fully materialized outcome of one statement.
#[derive(Debug, Default)]
pub(crate) struct MemorySet {
    pub(crate) error: Option<String>,
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<RawValue>>,
    pub(crate) summary: EngineSummary,
}

impl MemorySet {
    pub(crate) fn failure(message: String, summary: EngineSummary) -> Self {
        Self {
            error: Some(message),
            summary,
            ..Self::default()
        }
    }
}

/// Cursor over one set that owns the sets still to come.
pub(crate) struct MemoryCursor {
    set: MemorySet,
    position: usize,
    rest: VecDeque<MemorySet>,
}

impl MemoryCursor {
    pub(crate) fn chain(mut sets: VecDeque<MemorySet>) -> Box<dyn EngineCursor> {
        let set = sets.pop_front().unwrap_or_default();
        Box::new(MemoryCursor {
            set,
            position: 0,
            rest: sets,
        })
    }
}

impl EngineCursor for MemoryCursor {
    fn is_success(&self) -> bool {
        self.set.error.is_none()
    }

    fn error_message(&self) -> Option<String> {
        self.set.error.clone()
    }

    fn column_names(&self) -> Vec<String> {
        self.set.columns.clone()
    }

    fn num_tuples(&self) -> u64 {
        self.set.rows.len() as u64
    }

    fn has_next(&self) -> bool {
        self.position < self.set.rows.len()
    }

    fn next_row(&mut self) -> EngineResult<Option<Vec<RawValue>>> {
        let Some(row) = self.set.rows.get_mut(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(std::mem::take(row)))
    }

    fn has_next_set(&self) -> bool {
        !self.rest.is_empty()
    }

    fn next_set(&mut self) -> Option<Box<dyn EngineCursor>> {
        let set = self.rest.pop_front()?;
        Some(Box::new(MemoryCursor {
            set,
            position: 0,
            rest: std::mem::take(&mut self.rest),
        }))
    }

    fn summary(&self) -> EngineSummary {
        self.set.summary
    }
}

/// Compiled single statement plus its bound parameters.
pub(crate) struct MemoryPlan {
    pub(crate) statement: String,
    pub(crate) error: Option<String>,
    pub(crate) parameters: BTreeSet<String>,
    pub(crate) bindings: Bindings,
}

impl MemoryPlan {
    pub(crate) fn failed(statement: String, message: String) -> Self {
        Self {
            statement,
            error: Some(message),
            parameters: BTreeSet::new(),
            bindings: Bindings::new(),
        }
    }
}

impl EnginePlan for MemoryPlan {
    fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn error_message(&self) -> Option<String> {
        self.error.clone()
    }

    fn bind(&mut self, name: &str, value: RawValue) -> EngineResult<()> {
        if self.error.is_some() {
            // execution reports the compile error
            return Ok(());
        }
        if !self.parameters.contains(name) {
            return Err(format!("Parameter {name} not found."));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(value: i64) -> MemorySet {
        MemorySet {
            columns: vec![value.to_string()],
            rows: vec![vec![RawValue::Int64(value)]],
            ..MemorySet::default()
        }
    }

    #[test]
    fn successors_carry_the_remaining_sets() {
        let mut first = MemoryCursor::chain(VecDeque::from(vec![set(1), set(2), set(3)]));
        assert!(first.has_next_set());
        let mut second = first.next_set().expect("second set");
        assert!(!first.has_next_set());
        assert_eq!(second.column_names(), vec!["2".to_string()]);
        let third = second.next_set().expect("third set");
        assert!(!third.has_next_set());
        assert_eq!(third.num_tuples(), 1);
    }

    #[test]
    fn rows_are_forward_only() {
        let mut cursor = MemoryCursor::chain(VecDeque::from(vec![set(5)]));
        assert!(cursor.has_next());
        assert_eq!(cursor.next_row(), Ok(Some(vec![RawValue::Int64(5)])));
        assert!(!cursor.has_next());
        assert_eq!(cursor.next_row(), Ok(None));
        assert_eq!(cursor.num_tuples(), 1);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut plan = MemoryPlan {
            statement: "RETURN $a".into(),
            error: None,
            parameters: BTreeSet::from(["a".to_string()]),
            bindings: Bindings::new(),
        };
        assert!(plan.bind("a", RawValue::Int64(1)).is_ok());
        assert_eq!(
            plan.bind("b", RawValue::Int64(1)),
            Err("Parameter b not found.".to_string())
        );
    }
}
