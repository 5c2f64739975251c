use deadpool_postgres::{ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::{debug, error, info, trace};

/// A table the spider writes to: its name, column order, and the unique key
/// that decides between insert and update.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub keys: &'static [&'static str],
}

impl Table {
    /// Build the `INSERT ... ON CONFLICT ... DO UPDATE` statement for this table.
    ///
    /// ```rust
    /// use smart_trading_spider::db::Table;
    ///
    /// let table = Table { name: "t", columns: &["k", "v"], keys: &["k"] };
    /// assert_eq!(
    ///     table.upsert_statement(),
    ///     "INSERT INTO t (k, v) VALUES ($1, $2) ON CONFLICT (k) DO UPDATE SET v = EXCLUDED.v"
    /// );
    /// ```
    pub fn upsert_statement(&self) -> String {
        let columns = self.columns.join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let keys = self.keys.join(", ");
        let updates = self
            .columns
            .iter()
            .filter(|col| !self.keys.contains(col))
            .map(|col| format!("{col} = EXCLUDED.{col}"))
            .collect::<Vec<_>>();

        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders}) ON CONFLICT ({keys}) {action}",
            self.name
        )
    }
}

/// A value that can be written as one row of a [`Table`]; parameters follow the table's column order.
pub trait Record {
    fn params(&self) -> Vec<&(dyn ToSql + Sync)>;
}

/// Connection pool to the smart-trading database.
///
/// Every call checks a connection out of the pool and returns it when done.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        trace!("creating postgres connection pool config");
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.url = Some(url.to_string());
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|err| {
                error!("failed to create connection pool, error({err})");
                err
            })?;
        debug!("smart-trading connection pool established");

        Ok(Self { pool })
    }

    /// Run a `SELECT` and return its rows.
    pub async fn execute_read_query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> anyhow::Result<Vec<tokio_postgres::Row>> {
        let client = self.pool.get().await?;
        let rows = client.query(query, params).await.map_err(|err| {
            error!("could not read data from postgres, error({err})");
            err
        })?;
        trace!("read {} rows", rows.len());
        Ok(rows)
    }

    /// Upsert `rows` into `table` within a single transaction, returning the number of rows written.
    pub async fn execute_write_query<R: Record>(
        &self,
        table: &Table,
        rows: &[R],
    ) -> anyhow::Result<u64> {
        let time = std::time::Instant::now();
        let mut client = self.pool.get().await?;

        let stmt = client.prepare_cached(&table.upsert_statement()).await?;
        let transaction = client.transaction().await?;

        let mut written = 0;
        for row in rows {
            written += transaction
                .execute(&stmt, &row.params())
                .await
                .map_err(|err| {
                    error!("could not write data to {}, error({err})", table.name);
                    err
                })?;
        }

        transaction.commit().await.map_err(|err| {
            error!("failed to commit transaction for {}, error({err})", table.name);
            err
        })?;

        info!("Successfully inserted {written} rows to {}", table.name);
        debug!("{} upsert {}", table.name, crate::time_elapsed(time));
        Ok(written)
    }

    /// Run statements that return nothing, e.g. DDL.
    pub async fn execute_query(&self, query: &str) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(query).await.map_err(|err| {
            error!("could not execute query, error({err})");
            err
        })?;
        Ok(())
    }

    /// Create the `stock` schema and its tables, when missing.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        self.execute_query(crate::stock::sql::CREATE_SCHEMA).await?;
        info!("database schema is up to date");
        Ok(())
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_updates_non_key_columns() {
        let table = Table {
            name: "stock.daily_prices",
            columns: &["ticker", "dt", "open", "close"],
            keys: &["ticker", "dt"],
        };
        assert_eq!(
            table.upsert_statement(),
            "INSERT INTO stock.daily_prices (ticker, dt, open, close) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (ticker, dt) DO UPDATE SET open = EXCLUDED.open, close = EXCLUDED.close"
        );
    }

    #[test]
    fn upsert_of_key_only_table_does_nothing() {
        let table = Table {
            name: "t",
            columns: &["a", "b"],
            keys: &["a", "b"],
        };
        assert!(table.upsert_statement().ends_with("ON CONFLICT (a, b) DO NOTHING"));
    }
}
