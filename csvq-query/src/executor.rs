//! SQL execution against a single loaded table.
//!
//! Every call builds its own DataFusion [`SessionContext`] and registers the table as an
//! in-memory provider named [`SELF_TABLE`]. The context is dropped when the call returns, so
//! the binding is never visible to another call. Statements that would change state (DDL,
//! DML, `SET`, transactions) are refused before planning.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, new_empty_array};
use arrow::compute::concat;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use csvq_csv::Table;
use csvq_result::{Error, Result};
use datafusion::common::ScalarValue;
use datafusion::datasource::MemTable;
use datafusion::error::DataFusionError;
use datafusion::execution::SessionStateBuilder;
use datafusion::execution::context::SQLOptions;
use datafusion::logical_expr::LogicalPlan;
use datafusion::prelude::{SessionConfig, SessionContext};

/// Name under which the loaded table is visible to query text.
pub const SELF_TABLE: &str = "self";

/// One query string to run against the `self` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    sql: String,
}

impl QuerySpec {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl From<&str> for QuerySpec {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for QuerySpec {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Typed answer of one query.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// More than one output column.
    Table {
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    },
    /// Exactly one output column, any number of rows.
    Column { name: String, values: ArrayRef },
    /// A single value from a query that always yields one row, such as a global aggregate.
    Scalar { name: String, value: ScalarValue },
}

impl QueryResult {
    pub fn num_rows(&self) -> usize {
        match self {
            QueryResult::Table { batches, .. } => batches.iter().map(RecordBatch::num_rows).sum(),
            QueryResult::Column { values, .. } => values.len(),
            QueryResult::Scalar { .. } => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    preserve_identifier_case: bool,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self {
            preserve_identifier_case: true,
        }
    }
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `false`, unquoted identifiers are lowercased before resolution (DataFusion's
    /// default). Function names are case-insensitive either way.
    pub fn with_preserve_identifier_case(mut self, preserve: bool) -> Self {
        self.preserve_identifier_case = preserve;
        self
    }

    /// Run `spec` against `table`. The table is only read.
    pub async fn execute(&self, table: &Table, spec: &QuerySpec) -> Result<QueryResult> {
        let ctx = self.session_for(table)?;

        let options = SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false);
        let frame = ctx
            .sql_with_options(spec.sql(), options)
            .await
            .map_err(map_datafusion_error)?;

        let single_row = yields_single_row(frame.logical_plan());
        let schema = Arc::clone(frame.schema().inner());
        let batches = frame.collect().await.map_err(map_datafusion_error)?;

        let result = classify(schema, batches, single_row)?;
        tracing::trace!(sql = spec.sql(), rows = result.num_rows(), "query executed");
        Ok(result)
    }

    fn session_for(&self, table: &Table) -> Result<SessionContext> {
        // One partition keeps output rows in file order when the query has no ORDER BY.
        let mut config = SessionConfig::new().with_target_partitions(1);
        config.options_mut().sql_parser.enable_ident_normalization =
            !self.preserve_identifier_case;
        // No table functions: `self` is the only relation query text can name.
        let state = SessionStateBuilder::new()
            .with_config(config)
            .with_runtime_env(Default::default())
            .with_default_features()
            .with_table_functions(HashMap::new())
            .build();
        let ctx = SessionContext::new_with_state(state);

        let provider = MemTable::try_new(table.schema(), vec![table.batches().to_vec()])
            .map_err(Error::source_malformed)?;
        ctx.register_table(SELF_TABLE, Arc::new(provider))
            .map_err(Error::source_malformed)?;
        Ok(ctx)
    }
}

/// Parser and tokenizer failures are syntax errors; everything else the engine reports is
/// treated as semantic.
fn map_datafusion_error(err: DataFusionError) -> Error {
    match err.find_root() {
        DataFusionError::SQL(..) => Error::QuerySyntaxError(err.to_string()),
        _ => Error::QuerySemanticError(err.to_string()),
    }
}

/// True when the unoptimized plan always produces exactly one row: a global aggregate or a
/// projection without `FROM`, seen through projections, sorts, limits and aliases.
fn yields_single_row(plan: &LogicalPlan) -> bool {
    match plan {
        LogicalPlan::Projection(projection) => yields_single_row(&projection.input),
        LogicalPlan::Sort(sort) => yields_single_row(&sort.input),
        LogicalPlan::SubqueryAlias(alias) => yields_single_row(&alias.input),
        LogicalPlan::Limit(limit) => yields_single_row(&limit.input),
        LogicalPlan::Aggregate(aggregate) => aggregate.group_expr.is_empty(),
        LogicalPlan::EmptyRelation(empty) => empty.produce_one_row,
        _ => false,
    }
}

fn classify(schema: SchemaRef, batches: Vec<RecordBatch>, single_row: bool) -> Result<QueryResult> {
    if schema.fields().len() != 1 {
        return Ok(QueryResult::Table { schema, batches });
    }

    let field = schema.field(0);
    let name = field.name().clone();
    let values = if batches.is_empty() {
        new_empty_array(field.data_type())
    } else {
        let parts: Vec<&dyn Array> = batches.iter().map(|b| b.column(0).as_ref()).collect();
        concat(&parts).map_err(Error::query_semantic)?
    };

    if single_row && values.len() == 1 {
        let value = ScalarValue::try_from_array(&values, 0).map_err(Error::query_semantic)?;
        return Ok(QueryResult::Scalar { name, value });
    }

    Ok(QueryResult::Column { name, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use csvq_result::ErrorKind;

    fn ab_table() -> Table {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["x", "y"])),
            ],
        )
        .expect("batch");
        Table::new(schema, vec![batch])
    }

    #[tokio::test]
    async fn count_star_is_scalar() {
        let result = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT COUNT(*) FROM self".into())
            .await
            .expect("execute");
        match result {
            QueryResult::Scalar { value, .. } => assert_eq!(value, ScalarValue::Int64(Some(2))),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filtered_single_column_stays_a_column() {
        let result = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT a FROM self WHERE b = 'y'".into())
            .await
            .expect("execute");
        match result {
            QueryResult::Column { name, values } => {
                assert_eq!(name, "a");
                assert_eq!(values.len(), 1);
            }
            other => panic!("expected column, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn grouped_aggregate_is_not_scalar() {
        let result = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT COUNT(*) FROM self GROUP BY b".into())
            .await
            .expect("execute");
        assert!(matches!(result, QueryResult::Column { .. }));
    }

    #[tokio::test]
    async fn unparsable_query_is_syntax_error() {
        let err = QueryExecutor::default()
            .execute(&ab_table(), &"SELEC a FROM self".into())
            .await
            .expect_err("syntax");
        assert_eq!(err.kind(), ErrorKind::QuerySyntaxError);
    }

    #[tokio::test]
    async fn unknown_column_is_semantic_error() {
        let err = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT missing FROM self".into())
            .await
            .expect_err("semantic");
        assert_eq!(err.kind(), ErrorKind::QuerySemanticError);
    }

    #[tokio::test]
    async fn other_tables_are_not_resolvable() {
        let err = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT * FROM other".into())
            .await
            .expect_err("unknown table");
        assert_eq!(err.kind(), ErrorKind::QuerySemanticError);
    }

    #[tokio::test]
    async fn ddl_is_refused() {
        let err = QueryExecutor::default()
            .execute(&ab_table(), &"CREATE TABLE t AS SELECT * FROM self".into())
            .await
            .expect_err("ddl");
        assert_eq!(err.kind(), ErrorKind::QuerySemanticError);
    }

    #[tokio::test]
    async fn limit_keeps_a_global_aggregate_scalar() {
        let result = QueryExecutor::default()
            .execute(&ab_table(), &"SELECT COUNT(*) FROM self LIMIT 1".into())
            .await
            .expect("execute");
        match result {
            QueryResult::Scalar { value, .. } => assert_eq!(value, ScalarValue::Int64(Some(2))),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn table_functions_are_not_resolvable() {
        for sql in [
            "SELECT * FROM generate_series(1, 3)",
            "SELECT * FROM range(3)",
        ] {
            let err = QueryExecutor::default()
                .execute(&ab_table(), &sql.into())
                .await
                .expect_err("table function");
            assert_eq!(err.kind(), ErrorKind::QuerySemanticError, "{sql}");
        }
    }

    #[tokio::test]
    async fn lowercased_identifiers_miss_mixed_case_columns() {
        let schema = Arc::new(Schema::new(vec![Field::new("Name", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(StringArray::from(vec!["ann"]))],
        )
        .expect("batch");
        let table = Table::new(schema, vec![batch]);

        let preserved = QueryExecutor::default()
            .execute(&table, &"SELECT Name FROM self".into())
            .await
            .expect("case preserved");
        assert_eq!(preserved.num_rows(), 1);

        let err = QueryExecutor::new()
            .with_preserve_identifier_case(false)
            .execute(&table, &"SELECT Name FROM self".into())
            .await
            .expect_err("lowercased to name");
        assert_eq!(err.kind(), ErrorKind::QuerySemanticError);

        let quoted = QueryExecutor::new()
            .with_preserve_identifier_case(false)
            .execute(&table, &"SELECT \"Name\" FROM self".into())
            .await
            .expect("quoted identifiers keep their case");
        assert_eq!(quoted.num_rows(), 1);
    }
}
