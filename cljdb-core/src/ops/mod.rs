//! Lazy relational operators.
//!
//! Every operator is a pull-based transformer: it consumes (at most) one
//! `IntermediateResult` plus, for joins and merge, a second one pulled out
//! of the shared `Environment` by key, and produces exactly one
//! `IntermediateResult`. Ownership of every upstream iterator, and
//! therefore of any file handles a scan opened, flows forward through
//! the chain, so dropping the terminal iterator closes everything
//! transitively; no separate resource-tracking list is needed.

mod aggregate;
mod join;
mod merge;
mod projection;
mod scan_csv;
mod scan_heap;
mod selection;
mod sort_limit;

pub use aggregate::{AggFn, Aggregate};
pub use join::{HashJoin, NestedLoopsJoin, SortMergeJoin};
pub use merge::Merge;
pub use projection::Projection;
pub use scan_csv::ScanCsv;
pub use scan_heap::ScanHeap;
pub use selection::{CompareOp, Connector, Predicate, Selection};
pub use sort_limit::{Limit, Sort};

use std::collections::HashMap;
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::tuple::{ColumnIndex, Row, Value};

/// A lazy, single-pass sequence of rows, each possibly failing.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>>>;

/// A `(column_index, row_iterator)` pair flowing between operators.
pub struct IntermediateResult {
    pub columns: ColumnIndex,
    pub rows: RowIter,
}

impl IntermediateResult {
    pub fn new(columns: ColumnIndex, rows: RowIter) -> Self {
        Self { columns, rows }
    }

    /// Pull every remaining row, surfacing the first error encountered.
    pub fn materialize(self) -> Result<Vec<Row>> {
        self.rows.collect()
    }
}

/// The result environment: `__result__` is the reserved, explicit
/// "current" set threaded through a chain; every other step key lives in
/// a side map so joins and merges can reference earlier steps.
#[derive(Default)]
pub struct Environment {
    result: Option<IntermediateResult>,
    steps: HashMap<String, IntermediateResult>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_result(&mut self) -> Option<IntermediateResult> {
        self.result.take()
    }

    /// Bind `ir` under `key`, or as the reserved current result if
    /// `key == "__result__"`.
    pub fn bind(&mut self, key: &str, ir: IntermediateResult) {
        if key == "__result__" {
            self.result = Some(ir);
        } else {
            self.steps.insert(key.to_string(), ir);
        }
    }

    /// Remove and return the intermediate result bound under `key`.
    /// Joins and merges consume the other side exactly once.
    pub fn take_step(&mut self, key: &str) -> Result<IntermediateResult> {
        if key == "__result__" {
            self.result
                .take()
                .ok_or_else(|| Error::MissingStep(key.to_string()))
        } else {
            self.steps
                .remove(key)
                .ok_or_else(|| Error::MissingStep(key.to_string()))
        }
    }
}

/// An operator consumes the environment's current `__result__` (if any)
/// and produces the next one. Scans ignore `input` entirely.
pub trait Operator {
    fn apply(
        self: Box<Self>,
        env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult>;
}

/// Run a chain of operators left to right, starting from `env`'s current
/// `__result__`.
pub fn run_chain(chain: Vec<Box<dyn Operator>>, env: &mut Environment) -> Result<IntermediateResult> {
    let mut current = env.take_result();
    let mut result = None;
    for op in chain {
        let next = op.apply(env, current.take())?;
        result = Some(next);
        current = result.take();
    }
    current.ok_or_else(|| Error::MissingStep("empty operator chain".to_string()))
}

fn require_input(input: Option<IntermediateResult>, op_name: &str) -> Result<IntermediateResult> {
    input.ok_or_else(|| {
        Error::MissingStep(format!("{op_name} requires an upstream result but none was bound"))
    })
}

/// Columns of a join result: left columns followed by right columns,
/// renaming any right-side name that collides with *any* left-side name
/// (not only the join key) to `<t_name>/<name>`.
fn joined_columns(left: &ColumnIndex, right: &ColumnIndex, t_name: &str) -> ColumnIndex {
    let mut names: Vec<String> = left.columns().to_vec();
    let mut types = left.schema().to_vec();
    for (name, ty) in right.columns().iter().zip(right.schema().iter()) {
        let final_name = if left.contains(name) {
            format!("{t_name}/{name}")
        } else {
            name.clone()
        };
        names.push(final_name);
        types.push(*ty);
    }
    ColumnIndex::new(names, types)
}

fn concat_rows(left: &Row, right: &Row) -> Row {
    let mut out = left.clone();
    out.extend(right.clone());
    out
}

/// A hashable projection of a `Value`, for hash-join build/probe keys.
/// `f32` has no `Eq`/`Hash`, so floats hash on their bit pattern. Values
/// from the same typed column compare equal under this key iff they were
/// equal as `f32`s to begin with.
#[derive(PartialEq, Eq, Hash)]
enum ValueKey {
    Str(String),
    Int(i32),
    FloatBits(u32),
}

impl From<&Value> for ValueKey {
    fn from(v: &Value) -> Self {
        match v {
            Value::String(s) => ValueKey::Str(s.clone()),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::FloatBits(f.to_bits()),
        }
    }
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compare(y) == Ordering::Equal)
}
