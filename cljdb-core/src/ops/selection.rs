use std::cmp::Ordering;

use crate::error::Result;
use crate::tuple::Value;

use super::{require_input, Environment, IntermediateResult, Operator};

/// A comparison predicates are evaluated against: treated as a tagged
/// enum rather than reflection, per the engine's "no dynamic dispatch on
/// predicates" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Eq,
}

impl CompareOp {
    pub fn eval(self, a: &Value, b: &Value) -> bool {
        let ord = a.compare(b);
        match self {
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Eq => ord == Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub op: CompareOp,
    pub column: String,
    pub literal: Value,
}

impl Predicate {
    pub fn new(op: CompareOp, column: impl Into<String>, literal: Value) -> Self {
        Self {
            op,
            column: column.into(),
            literal,
        }
    }
}

/// Filter rows by one predicate, or two combined with a connector
/// (short-circuiting, as Rust's `&&`/`||` already do).
pub struct Selection {
    first: Predicate,
    rest: Option<(Connector, Predicate)>,
}

impl Selection {
    pub fn single(pred: Predicate) -> Self {
        Self {
            first: pred,
            rest: None,
        }
    }

    pub fn combined(first: Predicate, connector: Connector, second: Predicate) -> Self {
        Self {
            first,
            rest: Some((connector, second)),
        }
    }
}

impl Operator for Selection {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let input = require_input(input, "selection")?;
        let columns = input.columns.clone();

        let pos1 = columns.position(&self.first.column)?;
        let op1 = self.first.op;
        let lit1 = self.first.literal.clone();

        let second = match &self.rest {
            Some((connector, pred)) => {
                Some((*connector, columns.position(&pred.column)?, pred.op, pred.literal.clone()))
            }
            None => None,
        };

        let rows = input.rows.filter_map(move |row_res| {
            let row = match row_res {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            let cond1 = op1.eval(&row[pos1], &lit1);
            let keep = match &second {
                None => cond1,
                Some((Connector::And, pos2, op2, lit2)) => cond1 && op2.eval(&row[*pos2], lit2),
                Some((Connector::Or, pos2, op2, lit2)) => cond1 || op2.eval(&row[*pos2], lit2),
            };
            if keep {
                Some(Ok(row))
            } else {
                None
            }
        });

        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::ColumnIndex;
    use crate::tuple::ScalarType;

    fn sample() -> IntermediateResult {
        let columns = ColumnIndex::new(
            vec!["name".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        );
        let rows = vec![
            vec![Value::String("Ana".into()), Value::Int(80)],
            vec![Value::String("Charlie".into()), Value::Int(50)],
            vec![Value::String("Alice".into()), Value::Int(30)],
            vec![Value::String("David".into()), Value::Int(60)],
            vec![Value::String("Bob".into()), Value::Int(40)],
            vec![Value::String("Eve".into()), Value::Int(70)],
        ];
        IntermediateResult::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    #[test]
    fn and_selection_preserves_order() {
        let mut env = Environment::new();
        let sel = Box::new(Selection::combined(
            Predicate::new(CompareOp::Gt, "age", Value::Int(30)),
            Connector::And,
            Predicate::new(CompareOp::Lt, "age", Value::Int(70)),
        ));
        let rows = sel.apply(&mut env, Some(sample())).unwrap().materialize().unwrap();
        let names: Vec<String> = rows
            .iter()
            .map(|r| match &r[0] {
                Value::String(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["Charlie", "David", "Bob"]);
    }
}
