//! Plan execution: runs an ordered list of `(step_key, operator_chain)`
//! pairs against a shared [`ops::Environment`] and materializes the
//! terminal `__result__`.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::Result;
use crate::ops::{Environment, Operator};
use crate::tuple::Value;

/// An ordered list of `(step_key, operator chain)` pairs. `__result__` is
/// reserved: an operator chain bound under it both consumes and produces
/// the "current" result threaded through the plan.
pub type Plan = Vec<(String, Vec<Box<dyn Operator>>)>;

/// Run `plan` to completion and return the terminal `__result__`, each row
/// mapped to a `{column_name: value}` dictionary using its final
/// `column_index`.
pub fn execute(plan: Plan) -> Result<Vec<HashMap<String, Value>>> {
    let mut env = Environment::new();

    for (step_key, chain) in plan {
        debug!(step_key = %step_key, ops = chain.len(), "running step");
        let result = crate::ops::run_chain(chain, &mut env)?;
        env.bind(&step_key, result);
    }

    let result = env.take_step("__result__")?;
    let columns = result.columns.clone();
    let rows = result.materialize()?;
    info!(rows = rows.len(), "plan materialized");

    Ok(rows
        .into_iter()
        .map(|row| {
            columns
                .columns()
                .iter()
                .cloned()
                .zip(row)
                .collect::<HashMap<String, Value>>()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::ops::{CompareOp, Connector, Limit, NestedLoopsJoin, Predicate, Projection, ScanCsv, Selection, Sort};
    use crate::tuple::ScalarType;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv_table(dir: &std::path::Path, table: &str, columns: &[&str], schema: &[ScalarType], rows: &[&str]) {
        let catalog = Catalog::new(
            columns.iter().map(|s| s.to_string()).collect(),
            schema.to_vec(),
        );
        crate::catalog::write_catalog(dir, table, &catalog).unwrap();
        let mut text = columns.join(",");
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(dir.join(format!("{table}_table.csv")), text).unwrap();
    }

    #[test]
    fn two_step_plan_with_people_reference_and_join() {
        let tmp = TempDir::new().unwrap();
        write_csv_table(
            tmp.path(),
            "person",
            &["name", "age", "city", "country"],
            &[ScalarType::String, ScalarType::Int, ScalarType::String, ScalarType::String],
            &[
                "Ana,80,Athens,Greece",
                "Charlie,50,Berlin,Germany",
                "Alice,30,London,UK",
                "David,60,Madrid,Spain",
                "Bob,40,Paris,France",
                "Eve,70,Rome,Italy",
            ],
        );
        write_csv_table(
            tmp.path(),
            "dog",
            &["dog_name", "age", "city", "country", "owner"],
            &[
                ScalarType::String,
                ScalarType::Int,
                ScalarType::String,
                ScalarType::String,
                ScalarType::String,
            ],
            &[
                "Rover,7,Berlin,Germany,Charlie",
                "Fido,3,London,UK,Alice",
                "Spot,5,Madrid,Spain,David",
                "Rex,3,Paris,France,Bob",
                "Max,6,Rome,Italy,Eve",
                "Tok,6,Rome,Italy,Eve",
            ],
        );

        let people_chain: Vec<Box<dyn Operator>> = vec![
            Box::new(ScanCsv::new(tmp.path(), "person")),
            Box::new(Projection::new(vec!["name".into(), "age".into(), "city".into()])),
            Box::new(Selection::combined(
                Predicate::new(CompareOp::Gt, "age", Value::Int(30)),
                Connector::And,
                Predicate::new(CompareOp::Lt, "age", Value::Int(70)),
            )),
            Box::new(Sort::new(vec!["age".into()])),
            Box::new(Limit::new(2)),
        ];

        let result_chain: Vec<Box<dyn Operator>> = vec![
            Box::new(ScanCsv::new(tmp.path(), "dog")),
            Box::new(Sort::new(vec!["age".into(), "country".into()])),
            Box::new(Projection::new(vec!["dog_name".into(), "age".into(), "city".into()])),
            Box::new(Selection::single(Predicate::new(CompareOp::Lt, "age", Value::Int(4)))),
            Box::new(NestedLoopsJoin::new(CompareOp::Eq, "city", "city", "people")),
            Box::new(Limit::new(2)),
        ];

        let plan: Plan = vec![
            ("people".to_string(), people_chain),
            ("__result__".to_string(), result_chain),
        ];

        let rows = execute(plan).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("dog_name"), Some(&Value::String("Rex".into())));
        assert_eq!(rows[0].get("age"), Some(&Value::Int(3)));
        assert_eq!(rows[0].get("name"), Some(&Value::String("Bob".into())));
        assert_eq!(rows[0].get("people/age"), Some(&Value::Int(40)));
        assert_eq!(rows[0].get("people/city"), Some(&Value::String("Paris".into())));
    }
}
