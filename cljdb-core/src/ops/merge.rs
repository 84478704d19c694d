use crate::error::Result;

use super::{require_input, Environment, IntermediateResult, Operator};

/// Multiset union (duplicates preserved), left rows then right rows.
/// Uses the left's `column_index`; no renaming is performed here.
pub struct Merge {
    other_key: String,
}

impl Merge {
    pub fn new(other_key: impl Into<String>) -> Self {
        Self {
            other_key: other_key.into(),
        }
    }
}

impl Operator for Merge {
    fn apply(
        self: Box<Self>,
        env: &mut Environment,
        input: Option<IntermediateResult>,
    ) -> Result<IntermediateResult> {
        let left = require_input(input, "merge")?;
        let right = env.take_step(&self.other_key)?;
        let columns = left.columns;
        let rows = left.rows.chain(right.rows);
        Ok(IntermediateResult::new(columns, Box::new(rows)))
    }
}
