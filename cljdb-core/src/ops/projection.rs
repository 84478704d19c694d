use std::collections::HashSet;

use crate::error::Result;
use crate::tuple::ColumnIndex;

use super::{require_input, Environment, IntermediateResult, Operator};

/// Retain only `cols`, preserving input order and compacting positions to
/// `0..k`. Unknown columns are silently excluded.
pub struct Projection {
    cols: Vec<String>,
}

impl Projection {
    pub fn new(cols: Vec<String>) -> Self {
        Self { cols }
    }
}

impl Operator for Projection {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let input = require_input(input, "projection")?;
        let keep: HashSet<&str> = self.cols.iter().map(|s| s.as_str()).collect();

        let mut names = Vec::new();
        let mut types = Vec::new();
        let mut positions = Vec::new();
        for (i, name) in input.columns.columns().iter().enumerate() {
            if keep.contains(name.as_str()) {
                positions.push(i);
                names.push(name.clone());
                types.push(input.columns.schema()[i]);
            }
        }

        let columns = ColumnIndex::new(names, types);
        let rows = input.rows.map(move |row| {
            let row = row?;
            Ok(positions.iter().map(|&i| row[i].clone()).collect())
        });

        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{ScalarType, Value};

    fn sample() -> IntermediateResult {
        let columns = ColumnIndex::new(
            vec!["name".into(), "age".into(), "city".into()],
            vec![ScalarType::String, ScalarType::Int, ScalarType::String],
        );
        let rows = vec![
            vec![Value::String("Ana".into()), Value::Int(80), Value::String("Athens".into())],
            vec![Value::String("Bob".into()), Value::Int(40), Value::String("Paris".into())],
        ];
        IntermediateResult::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    #[test]
    fn projection_keeps_only_requested_columns_in_input_order() {
        let mut env = Environment::new();
        let proj = Box::new(Projection::new(vec!["age".into(), "name".into()]));
        let out = proj.apply(&mut env, Some(sample())).unwrap();
        assert_eq!(out.columns.columns(), &["name".to_string(), "age".to_string()]);
        let rows = out.materialize().unwrap();
        assert_eq!(rows[0], vec![Value::String("Ana".into()), Value::Int(80)]);
    }

    #[test]
    fn projection_is_idempotent() {
        let mut env = Environment::new();
        let cols = vec!["age".into(), "name".into()];
        let once = Box::new(Projection::new(cols.clone()))
            .apply(&mut env, Some(sample()))
            .unwrap();
        let twice = Box::new(Projection::new(cols)).apply(&mut env, Some(once)).unwrap();
        let rows = twice.materialize().unwrap();
        assert_eq!(rows[0], vec![Value::String("Ana".into()), Value::Int(80)]);
    }
}
