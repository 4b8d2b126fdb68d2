//! The three core operations: describe a file, run a batch of queries, run one query.
//!
//! Every call resolves its reference against the configured [`AccessPolicy`], loads a fresh
//! [`Table`] and drops it on return. Nothing is cached between calls, so edits to a file are
//! visible to the next call.

use std::sync::Arc;

use csvq_csv::{CsvReadOptions, Table, load_table};
use csvq_query::{
    NormalizedPayload, QueryExecutor, QuerySpec, TableDescription, describe, normalize,
};
use csvq_result::{Error, Result};

use crate::policy::AccessPolicy;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub policy: AccessPolicy,
    pub csv: CsvReadOptions,
    /// Match column names exactly as written in the header. On by default.
    pub preserve_identifier_case: bool,
}

impl GatewayConfig {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy,
            csv: CsvReadOptions::default(),
            preserve_identifier_case: true,
        }
    }

    pub fn with_csv_options(mut self, csv: CsvReadOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn with_preserve_identifier_case(mut self, preserve: bool) -> Self {
        self.preserve_identifier_case = preserve;
        self
    }
}

/// Entry point shared by every transport.
///
/// Cloning is cheap; clones share the same immutable configuration.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    executor: QueryExecutor,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        let executor =
            QueryExecutor::new().with_preserve_identifier_case(config.preserve_identifier_case);
        Self {
            config: Arc::new(config),
            executor,
        }
    }

    /// Shape and column types of the file at `reference`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn describe(&self, reference: &str) -> Result<TableDescription> {
        let table = self
            .load(reference)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "describe failed"))?;
        Ok(describe(&table))
    }

    /// Run `queries` in order against one load of `reference`.
    ///
    /// The first failing query aborts the batch; no partial results are returned.
    #[tracing::instrument(level = "debug", skip(self, queries), fields(queries = queries.len()))]
    pub async fn execute_many<Q: AsRef<str>>(
        &self,
        reference: &str,
        queries: &[Q],
    ) -> Result<Vec<NormalizedPayload>> {
        let table = self
            .load(reference)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "execute failed"))?;

        let mut payloads = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().enumerate() {
            let payload = self.run(&table, query.as_ref()).await.inspect_err(|err| {
                tracing::error!(index, error = %err, "query in batch failed");
            })?;
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Single-query form of [`Gateway::execute_many`].
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub async fn execute_one(&self, reference: &str, query: &str) -> Result<NormalizedPayload> {
        let table = self
            .load(reference)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "execute failed"))?;
        self.run(&table, query)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "query failed"))
    }

    async fn run(&self, table: &Table, query: &str) -> Result<NormalizedPayload> {
        let result = self.executor.execute(table, &QuerySpec::new(query)).await?;
        normalize(result)
    }

    async fn load(&self, reference: &str) -> Result<Table> {
        let path = self.config.policy.resolve(reference)?;
        let options = self.config.csv.clone();

        let table = tokio::task::spawn_blocking(move || load_table(path.as_path(), &options))
            .await
            .map_err(|err| Error::SourceUnreadable(format!("load task did not complete: {err}")))??;

        tracing::debug!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "table loaded"
        );
        Ok(table)
    }
}
