use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::tuple::{ColumnIndex, Row, ScalarType, Value};

use super::{keys_equal, require_input, Environment, IntermediateResult, Operator, RowIter};

/// A built-in streaming aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Count,
    Average,
}

impl AggFn {
    fn result_type(self) -> ScalarType {
        match self {
            AggFn::Count => ScalarType::Int,
            AggFn::Average => ScalarType::Float,
        }
    }
}

enum Accumulator {
    Count(i64),
    /// `average` is implemented as `f64` arithmetic over the summed
    /// values rather than an exact rational; see the precision note in
    /// the design doc.
    AverageSum { sum: f64, count: i64 },
}

fn value_to_f64(v: &Value) -> Result<f64> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f as f64),
        Value::String(s) => Err(Error::SchemaViolation(format!(
            "cannot average non-numeric value '{s}'"
        ))),
    }
}

impl Accumulator {
    /// `START`: initialize the accumulator from the first value of a
    /// group.
    fn start(f: AggFn, first: &Value) -> Result<Self> {
        Ok(match f {
            AggFn::Count => Accumulator::Count(1),
            AggFn::Average => Accumulator::AverageSum {
                sum: value_to_f64(first)?,
                count: 1,
            },
        })
    }

    fn update(&mut self, v: &Value) -> Result<()> {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::AverageSum { sum, count } => {
                *sum += value_to_f64(v)?;
                *count += 1;
            }
        }
        Ok(())
    }

    /// `END`: finalize the accumulator into its output value.
    fn end(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Int(n as i32),
            Accumulator::AverageSum { sum, count } => Value::Float((sum / count as f64) as f32),
        }
    }
}

struct AggSpec {
    f: AggFn,
    src_pos: usize,
    out_name: String,
}

/// Stream through rows clustered (at least) by `group_cols`; when the
/// group key changes, emit one row: the group key followed by one
/// finalized aggregate value per spec. If `group_cols` is empty, the
/// whole input is a single group.
pub struct Aggregate {
    group_cols: Vec<String>,
    aggs: Vec<(AggFn, String, String)>,
}

impl Aggregate {
    pub fn new(group_cols: Vec<String>, aggs: Vec<(AggFn, String, String)>) -> Self {
        Self { group_cols, aggs }
    }
}

impl Operator for Aggregate {
    fn apply(
        self: Box<Self>,
        _env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let input = require_input(input, "aggregate")?;

        let group_positions = self
            .group_cols
            .iter()
            .map(|c| input.columns.position(c))
            .collect::<Result<Vec<_>>>()?;

        let specs = self
            .aggs
            .into_iter()
            .map(|(f, src, out)| {
                let src_pos = input.columns.position(&src)?;
                Ok(AggSpec { f, src_pos, out_name: out })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut names: Vec<String> = self.group_cols.clone();
        let mut types: Vec<ScalarType> = group_positions
            .iter()
            .map(|&p| input.columns.schema()[p])
            .collect();
        for spec in &specs {
            names.push(spec.out_name.clone());
            types.push(spec.f.result_type());
        }
        let columns = ColumnIndex::new(names, types);

        let iter = AggregateIter {
            inner: input.rows.peekable(),
            group_positions,
            specs,
            done: false,
        };

        Ok(IntermediateResult::new(columns, Box::new(iter)))
    }
}

struct AggregateIter {
    inner: Peekable<RowIter>,
    group_positions: Vec<usize>,
    specs: Vec<AggSpec>,
    done: bool,
}

impl Iterator for AggregateIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        if self.done {
            return None;
        }

        let first = match self.inner.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            Some(Ok(row)) => row,
        };

        let key: Vec<Value> = self.group_positions.iter().map(|&p| first[p].clone()).collect();

        let mut accs = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            match Accumulator::start(spec.f, &first[spec.src_pos]) {
                Ok(acc) => accs.push(acc),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        loop {
            match self.inner.peek() {
                Some(Ok(row)) => {
                    let row_key: Vec<Value> =
                        self.group_positions.iter().map(|&p| row[p].clone()).collect();
                    if !keys_equal(&row_key, &key) {
                        break;
                    }
                    let row = self.inner.next().unwrap().unwrap();
                    for (acc, spec) in accs.iter_mut().zip(self.specs.iter()) {
                        if let Err(e) = acc.update(&row[spec.src_pos]) {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Some(Err(_)) => {
                    let e = self.inner.next().unwrap().unwrap_err();
                    self.done = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }

        if self.inner.peek().is_none() {
            self.done = true;
        }

        let mut out = key;
        out.extend(accs.into_iter().map(Accumulator::end));
        Some(Ok(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{ColumnIndex, ScalarType};

    fn dog_rows() -> IntermediateResult {
        let columns = ColumnIndex::new(
            vec!["owner".into(), "age".into()],
            vec![ScalarType::String, ScalarType::Int],
        );
        // clustered by owner, as aggregate requires
        let rows = vec![
            vec![Value::String("Alice".into()), Value::Int(3)],
            vec![Value::String("Bob".into()), Value::Int(3)],
            vec![Value::String("Eve".into()), Value::Int(6)],
            vec![Value::String("Eve".into()), Value::Int(6)],
        ];
        IntermediateResult::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    #[test]
    fn groups_and_counts() {
        let mut env = Environment::new();
        let agg = Box::new(Aggregate::new(
            vec!["owner".into()],
            vec![(AggFn::Count, "age".into(), "n".into())],
        ));
        let rows = agg.apply(&mut env, Some(dog_rows())).unwrap().materialize().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec![Value::String("Eve".into()), Value::Int(2)]);
    }

    #[test]
    fn average_over_whole_input_when_group_cols_empty() {
        let mut env = Environment::new();
        let agg = Box::new(Aggregate::new(
            Vec::new(),
            vec![(AggFn::Average, "age".into(), "avg_age".into())],
        ));
        let rows = agg.apply(&mut env, Some(dog_rows())).unwrap().materialize().unwrap();
        assert_eq!(rows.len(), 1);
        match rows[0][0] {
            Value::Float(v) => assert!((v - 4.5).abs() < 1e-6),
            _ => panic!("expected float"),
        }
    }
}
