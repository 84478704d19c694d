//! JSON plan interpreter for the `run` subcommand.
//!
//! Parses a small JSON document (an ordered list of `{key, ops}` steps)
//! into an `executor::Plan` and builds the operator chain for each step.
//! The library's own plan surface is a
//! `Vec<(String, Vec<Box<dyn Operator>>)>` built directly in Rust; this
//! module is just one way to describe that shape as data.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value as Json;

use cljdb_core::executor::Plan;
use cljdb_core::ops::{
    AggFn, Aggregate, CompareOp, Connector, HashJoin, Limit, Merge, NestedLoopsJoin, Operator,
    Predicate, Projection, ScanCsv, ScanHeap, Selection, Sort, SortMergeJoin,
};
use cljdb_core::tuple::Value;

#[derive(Deserialize)]
struct PlanStep {
    key: String,
    ops: Vec<OpSpec>,
}

#[derive(Deserialize)]
struct PredicateSpec {
    cmp: String,
    col: String,
    lit: Json,
}

#[derive(Deserialize)]
struct AggSpec {
    #[serde(rename = "fn")]
    f: String,
    src: String,
    out: String,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OpSpec {
    ScanCsv {
        table: String,
    },
    ScanHeap {
        table: String,
    },
    Projection {
        cols: Vec<String>,
    },
    Selection {
        first: PredicateSpec,
        #[serde(default)]
        connector: Option<String>,
        #[serde(default)]
        second: Option<PredicateSpec>,
    },
    Limit {
        n: usize,
    },
    Sort {
        fields: Vec<String>,
    },
    Merge {
        other: String,
    },
    NestedLoopsJoin {
        cmp: String,
        left: String,
        right: String,
        table: String,
    },
    HashJoin {
        left: String,
        right: String,
        table: String,
    },
    SortMergeJoin {
        left: String,
        right: String,
        table: String,
    },
    Aggregate {
        group_cols: Vec<String>,
        aggs: Vec<AggSpec>,
    },
}

/// Read a JSON plan file and turn it into an `executor::Plan`, resolving
/// every `scan_csv`/`scan_heap` table reference against `dir`.
pub fn load_plan(dir: &Path, path: &Path) -> Result<Plan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading plan file {}", path.display()))?;
    let steps: Vec<PlanStep> = serde_json::from_str(&text)
        .with_context(|| format!("parsing plan file {}", path.display()))?;

    let mut plan: Plan = Vec::new();
    for step in steps {
        let chain = step
            .ops
            .into_iter()
            .map(|op| build_op(dir, op))
            .collect::<Result<Vec<_>>>()?;
        plan.push((step.key, chain));
    }
    Ok(plan)
}

fn parse_cmp(s: &str) -> Result<CompareOp> {
    Ok(match s {
        "<" => CompareOp::Lt,
        ">" => CompareOp::Gt,
        "=" | "==" => CompareOp::Eq,
        other => bail!("unknown comparison operator '{other}'"),
    })
}

fn parse_connector(s: &str) -> Result<Connector> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "and" => Connector::And,
        "or" => Connector::Or,
        other => bail!("unknown connector '{other}'"),
    })
}

/// A JSON number with no `.`/exponent becomes `INT`; anything else numeric
/// becomes `FLOAT`. Strings become `STRING`. This mirrors how a CSV field
/// gets typed by a catalog's declared schema, just inferred from the
/// literal's own JSON shape instead.
fn parse_literal(v: &Json) -> Result<Value> {
    Ok(match v {
        Json::String(s) => Value::String(s.clone()),
        Json::Number(n) => match n.as_i64() {
            Some(i) if !n.to_string().contains('.') => Value::Int(i as i32),
            _ => Value::Float(n.as_f64().unwrap_or_default() as f32),
        },
        other => bail!("literal {other} is not a STRING/INT/FLOAT value"),
    })
}

fn parse_agg_fn(s: &str) -> Result<AggFn> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "count" => AggFn::Count,
        "average" | "avg" => AggFn::Average,
        other => bail!("unknown aggregate function '{other}'"),
    })
}

fn build_op(dir: &Path, op: OpSpec) -> Result<Box<dyn Operator>> {
    Ok(match op {
        OpSpec::ScanCsv { table } => Box::new(ScanCsv::new(dir, table)),
        OpSpec::ScanHeap { table } => Box::new(ScanHeap::new(dir, table)),
        OpSpec::Projection { cols } => Box::new(Projection::new(cols)),
        OpSpec::Limit { n } => Box::new(Limit::new(n)),
        OpSpec::Sort { fields } => Box::new(Sort::new(fields)),
        OpSpec::Merge { other } => Box::new(Merge::new(other)),
        OpSpec::Selection {
            first,
            connector,
            second,
        } => {
            let first_pred = Predicate::new(parse_cmp(&first.cmp)?, first.col, parse_literal(&first.lit)?);
            match (connector, second) {
                (Some(c), Some(s)) => {
                    let second_pred =
                        Predicate::new(parse_cmp(&s.cmp)?, s.col, parse_literal(&s.lit)?);
                    Box::new(Selection::combined(first_pred, parse_connector(&c)?, second_pred))
                }
                _ => Box::new(Selection::single(first_pred)),
            }
        }
        OpSpec::NestedLoopsJoin {
            cmp,
            left,
            right,
            table,
        } => Box::new(NestedLoopsJoin::new(parse_cmp(&cmp)?, left, right, table)),
        OpSpec::HashJoin { left, right, table } => {
            Box::new(HashJoin::new(CompareOp::Eq, left, right, table)?)
        }
        OpSpec::SortMergeJoin { left, right, table } => {
            Box::new(SortMergeJoin::new(CompareOp::Eq, left, right, table)?)
        }
        OpSpec::Aggregate { group_cols, aggs } => {
            let specs = aggs
                .into_iter()
                .map(|a| Ok((parse_agg_fn(&a.f)?, a.src, a.out)))
                .collect::<Result<Vec<_>>>()?;
            Box::new(Aggregate::new(group_cols, specs))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cljdb_core::catalog::{self, Catalog};
    use cljdb_core::executor;
    use cljdb_core::tuple::ScalarType;
    use tempfile::TempDir;

    fn write_csv_table(dir: &Path, table: &str, columns: &[&str], schema: &[ScalarType], rows: &[&str]) {
        let cat = Catalog::new(
            columns.iter().map(|s| s.to_string()).collect(),
            schema.to_vec(),
        );
        catalog::write_catalog(dir, table, &cat).unwrap();
        let mut text = columns.join(",");
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        std::fs::write(dir.join(format!("{table}_table.csv")), text).unwrap();
    }

    #[test]
    fn json_plan_runs_projection_selection_sort() {
        let tmp = TempDir::new().unwrap();
        write_csv_table(
            tmp.path(),
            "person",
            &["name", "age"],
            &[ScalarType::String, ScalarType::Int],
            &["Ana,80", "Charlie,50", "Alice,30", "Bob,40"],
        );

        let plan_json = r#"[
            {
                "key": "__result__",
                "ops": [
                    {"op": "scan_csv", "table": "person"},
                    {"op": "selection", "first": {"cmp": ">", "col": "age", "lit": 30}},
                    {"op": "sort", "fields": ["age"]}
                ]
            }
        ]"#;
        let plan_path = tmp.path().join("plan.json");
        std::fs::write(&plan_path, plan_json).unwrap();

        let plan = load_plan(tmp.path(), &plan_path).unwrap();
        let rows = executor::execute(plan).unwrap();
        let ages: Vec<i32> = rows
            .iter()
            .map(|r| match r.get("age") {
                Some(Value::Int(v)) => *v,
                _ => panic!("expected INT age"),
            })
            .collect();
        assert_eq!(ages, vec![40, 50, 80]);
    }

    #[test]
    fn unknown_comparison_operator_is_rejected() {
        assert!(parse_cmp("~=").is_err());
    }
}
