//! Connection trait

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE/DDL)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Fetch at most one row.
    ///
    /// The default implementation runs `query` and keeps the first row.
    async fn query_first(&self, sql: &str, params: &[Value]) -> Result<Option<crate::Row>> {
        let result = self.query(sql, params).await?;
        Ok(result.rows.into_iter().next())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
