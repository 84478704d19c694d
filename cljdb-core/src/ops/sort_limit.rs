use std::cmp::Ordering;

use crate::error::Result;

use super::{require_input, Environment, IntermediateResult, Operator};

/// Emit at most the first `n` rows.
pub struct Limit {
    n: usize,
}

impl Limit {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl Operator for Limit {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let input = require_input(input, "limit")?;
        let rows = input.rows.take(self.n);
        Ok(IntermediateResult::new(input.columns, Box::new(rows)))
    }
}

/// Ascending sort by the projected key tuple over `fields`, lexicographic
/// component by component. Materializes fully (accumulating), then
/// re-emits in order (emitting), the only two states this operator has.
/// Stability is not guaranteed.
pub struct Sort {
    fields: Vec<String>,
}

impl Sort {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl Operator for Sort {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let input = require_input(input, "sort")?;
        let columns = input.columns.clone();
        let positions = self
            .fields
            .iter()
            .map(|f| columns.position(f))
            .collect::<Result<Vec<_>>>()?;

        let mut buffer = input.materialize()?;
        buffer.sort_by(|a, b| {
            for &p in &positions {
                match a[p].compare(&b[p]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        });

        Ok(IntermediateResult::new(columns, Box::new(buffer.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{ColumnIndex, ScalarType, Value};

    fn ages(values: &[i32]) -> IntermediateResult {
        let columns = ColumnIndex::new(vec!["age".into()], vec![ScalarType::Int]);
        let rows = values.iter().map(|v| vec![Value::Int(*v)]).collect::<Vec<_>>();
        IntermediateResult::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    #[test]
    fn sort_is_ascending_permutation() {
        let mut env = Environment::new();
        let sorted = Box::new(Sort::new(vec!["age".into()]))
            .apply(&mut env, Some(ages(&[80, 50, 30, 60, 40, 70])))
            .unwrap()
            .materialize()
            .unwrap();
        let values: Vec<i32> = sorted
            .iter()
            .map(|r| match r[0] {
                Value::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![30, 40, 50, 60, 70, 80]);
    }

    #[test]
    fn limit_never_exceeds_n_or_input_len() {
        let mut env = Environment::new();
        let rows = Box::new(Limit::new(2))
            .apply(&mut env, Some(ages(&[1, 2, 3])))
            .unwrap()
            .materialize()
            .unwrap();
        assert_eq!(rows.len(), 2);

        let mut env = Environment::new();
        let rows = Box::new(Limit::new(10))
            .apply(&mut env, Some(ages(&[1, 2])))
            .unwrap()
            .materialize()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
