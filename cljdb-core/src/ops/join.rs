use std::cmp::Ordering;
use std::collections::HashMap;
use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::tuple::Value;

use super::{
    concat_rows, joined_columns, require_input, Environment, IntermediateResult, Operator, RowIter,
    ValueKey,
};
use super::selection::CompareOp;

/// Cartesian product of `__result__` with `env[t_name]`, keeping rows for
/// which `op(left[v1], right[v2])` holds. No precondition on `op`: this is
/// the only join strategy that supports non-equality predicates. The
/// right side is materialized so it can be re-scanned per left row; the
/// left side stays lazy.
pub struct NestedLoopsJoin {
    op: CompareOp,
    v1: String,
    v2: String,
    t_name: String,
}

impl NestedLoopsJoin {
    pub fn new(op: CompareOp, v1: impl Into<String>, v2: impl Into<String>, t_name: impl Into<String>) -> Self {
        Self {
            op,
            v1: v1.into(),
            v2: v2.into(),
            t_name: t_name.into(),
        }
    }
}

impl Operator for NestedLoopsJoin {
    fn apply(
        self: Box<Self>,
        env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let left = require_input(input, "nested_loops_join")?;
        let right = env.take_step(&self.t_name)?;

        let pos1 = left.columns.position(&self.v1)?;
        let pos2 = right.columns.position(&self.v2)?;
        let columns = joined_columns(&left.columns, &right.columns, &self.t_name);
        let right_rows = right.rows.collect::<Result<Vec<_>>>()?;
        let op = self.op;

        let rows = left.rows.flat_map(move |left_row_res| {
            let left_row = match left_row_res {
                Ok(r) => r,
                Err(e) => return vec![Err(e)].into_iter(),
            };
            let mut out = Vec::new();
            for right_row in &right_rows {
                if op.eval(&left_row[pos1], &right_row[pos2]) {
                    out.push(Ok(concat_rows(&left_row, right_row)));
                }
            }
            out.into_iter()
        });

        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}

/// Equijoin: build a multimap `left[v1] -> [rows]` from the (materialized)
/// left input, then stream the right input, emitting one joined row per
/// matching left row, in right-side (probe) order.
pub struct HashJoin {
    v1: String,
    v2: String,
    t_name: String,
}

impl HashJoin {
    pub fn new(op: CompareOp, v1: impl Into<String>, v2: impl Into<String>, t_name: impl Into<String>) -> Result<Self> {
        if op != CompareOp::Eq {
            return Err(Error::UnsupportedOp(format!(
                "hash_join requires an equality predicate, got {op:?}"
            )));
        }
        Ok(Self {
            v1: v1.into(),
            v2: v2.into(),
            t_name: t_name.into(),
        })
    }
}

impl Operator for HashJoin {
    fn apply(
        self: Box<Self>,
        env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let left = require_input(input, "hash_join")?;
        let right = env.take_step(&self.t_name)?;

        let pos1 = left.columns.position(&self.v1)?;
        let pos2 = right.columns.position(&self.v2)?;
        let columns = joined_columns(&left.columns, &right.columns, &self.t_name);

        let mut build: HashMap<ValueKey, Vec<_>> = HashMap::new();
        for row_res in left.rows {
            let row = row_res?;
            build.entry(ValueKey::from(&row[pos1])).or_default().push(row);
        }

        let rows = right.rows.flat_map(move |right_row_res| {
            let right_row = match right_row_res {
                Ok(r) => r,
                Err(e) => return vec![Err(e)].into_iter(),
            };
            let mut out = Vec::new();
            if let Some(matches) = build.get(&ValueKey::from(&right_row[pos2])) {
                for left_row in matches {
                    out.push(Ok(concat_rows(left_row, &right_row)));
                }
            }
            out.into_iter()
        });

        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}

/// Equijoin over two inputs already sorted ascending by their join key.
/// Advances the lesser side; on a key match, buffers only the current
/// group from each side (memory proportional to the larger group's
/// cardinality for that key, not the whole input) and lazily emits their
/// cross product.
pub struct SortMergeJoin {
    v1: String,
    v2: String,
    t_name: String,
}

impl SortMergeJoin {
    pub fn new(op: CompareOp, v1: impl Into<String>, v2: impl Into<String>, t_name: impl Into<String>) -> Result<Self> {
        if op != CompareOp::Eq {
            return Err(Error::UnsupportedOp(format!(
                "sort_merge_join requires an equality predicate, got {op:?}"
            )));
        }
        Ok(Self {
            v1: v1.into(),
            v2: v2.into(),
            t_name: t_name.into(),
        })
    }
}

impl Operator for SortMergeJoin {
    fn apply(
        self: Box<Self>,
        env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let left = require_input(input, "sort_merge_join")?;
        let right = env.take_step(&self.t_name)?;

        let pos1 = left.columns.position(&self.v1)?;
        let pos2 = right.columns.position(&self.v2)?;
        let columns = joined_columns(&left.columns, &right.columns, &self.t_name);

        let iter = SortMergeJoinIter {
            left: left.rows.peekable(),
            right: right.rows.peekable(),
            pos1,
            pos2,
            left_group: Vec::new(),
            right_group: Vec::new(),
            i: 0,
            j: 0,
            exhausted: false,
        };

        Ok(IntermediateResult::new(columns, Box::new(iter)))
    }
}

struct SortMergeJoinIter {
    left: Peekable<RowIter>,
    right: Peekable<RowIter>,
    pos1: usize,
    pos2: usize,
    left_group: Vec<crate::tuple::Row>,
    right_group: Vec<crate::tuple::Row>,
    i: usize,
    j: usize,
    exhausted: bool,
}

fn drain_group(iter: &mut Peekable<RowIter>, pos: usize, key: &Value) -> Result<Vec<crate::tuple::Row>> {
    let mut group = Vec::new();
    loop {
        match iter.peek() {
            Some(Ok(row)) if row[pos].compare(key) == Ordering::Equal => {
                group.push(iter.next().unwrap()?);
            }
            Some(Err(_)) => return Err(iter.next().unwrap().unwrap_err()),
            _ => break,
        }
    }
    Ok(group)
}

impl Iterator for SortMergeJoinIter {
    type Item = Result<crate::tuple::Row>;

    fn next(&mut self) -> Option<Result<crate::tuple::Row>> {
        loop {
            if self.i < self.left_group.len() {
                if self.j < self.right_group.len() {
                    let row = concat_rows(&self.left_group[self.i], &self.right_group[self.j]);
                    self.j += 1;
                    return Some(Ok(row));
                }
                self.i += 1;
                self.j = 0;
                continue;
            }

            if self.exhausted {
                return None;
            }

            loop {
                let left_key = match self.left.peek() {
                    Some(Ok(row)) => Some(row[self.pos1].clone()),
                    Some(Err(_)) => return Some(Err(self.left.next().unwrap().unwrap_err())),
                    None => None,
                };
                let right_key = match self.right.peek() {
                    Some(Ok(row)) => Some(row[self.pos2].clone()),
                    Some(Err(_)) => return Some(Err(self.right.next().unwrap().unwrap_err())),
                    None => None,
                };

                match (left_key, right_key) {
                    (Some(lk), Some(rk)) => match lk.compare(&rk) {
                        Ordering::Less => {
                            self.left.next();
                        }
                        Ordering::Greater => {
                            self.right.next();
                        }
                        Ordering::Equal => {
                            self.left_group = match drain_group(&mut self.left, self.pos1, &lk) {
                                Ok(g) => g,
                                Err(e) => return Some(Err(e)),
                            };
                            self.right_group = match drain_group(&mut self.right, self.pos2, &rk) {
                                Ok(g) => g,
                                Err(e) => return Some(Err(e)),
                            };
                            self.i = 0;
                            self.j = 0;
                            break;
                        }
                    },
                    _ => {
                        self.exhausted = true;
                        self.left_group.clear();
                        self.right_group.clear();
                        break;
                    }
                }
            }
        }
    }
}
