//! `postgres` executor: database and table provisioning.
//!
//! Every call opens its own connections and closes each one before returning,
//! whatever the outcome. Each operation is validated against facts read from
//! the server before its statement is issued; precondition failures surface
//! as `Warning` or `Error` logs for that one action.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use tracing::{debug, info};

use super::{ExecutionLog, Executor, ExecutorError, LogSender, report};
use crate::action::{ActionKind, SqlOperation, SqlSpec};
use crate::mapper::Executable;
use crate::runtime::Runtime;

const KIND: ActionKind = ActionKind::Postgres;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Server state relevant to one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Facts {
  pub database_exists: bool,
  pub table_exists: bool,
  pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
  Proceed,
  Warn(&'static str),
  Fail(&'static str, String),
}

/// Decide whether `spec` may run against the observed `facts`.
pub(crate) fn validate(spec: &SqlSpec, facts: &Facts) -> Verdict {
  let table = spec.table.as_deref().unwrap_or_default();

  match spec.option {
    SqlOperation::CreateDatabase if facts.database_exists => Verdict::Warn("database-exists"),
    SqlOperation::DropDatabase if !facts.database_exists => Verdict::Warn("database-missing"),
    SqlOperation::CreateDatabase | SqlOperation::DropDatabase => Verdict::Proceed,

    SqlOperation::CreateTable | SqlOperation::Insert if spec.table.is_none() => {
      Verdict::Fail("table-missing", format!("{} requires a table name", spec.option.as_str()))
    }
    SqlOperation::CreateTable | SqlOperation::Insert if !facts.database_exists => {
      Verdict::Fail("database-missing", format!("database '{}' does not exist", spec.database))
    }

    SqlOperation::CreateTable if facts.table_exists => Verdict::Warn("table-exists"),
    SqlOperation::CreateTable if spec.columns.is_empty() => {
      Verdict::Fail("missing-columns", format!("table '{table}' declares no columns"))
    }
    SqlOperation::CreateTable => Verdict::Proceed,

    SqlOperation::Insert if !facts.table_exists => {
      Verdict::Fail("table-missing", format!("table '{table}' does not exist"))
    }
    SqlOperation::Insert => {
      let mut unknown: Vec<&str> = spec
        .rows
        .iter()
        .flat_map(|row| row.keys())
        .filter(|column| !facts.columns.contains(column))
        .map(String::as_str)
        .collect();
      unknown.sort_unstable();
      unknown.dedup();

      if unknown.is_empty() {
        Verdict::Proceed
      } else {
        Verdict::Fail(
          "missing-columns",
          format!("table '{table}' has no column(s): {}", unknown.join(", ")),
        )
      }
    }
  }
}

/// Double-quote an identifier, doubling embedded quotes.
pub(crate) fn quote_ident(ident: &str) -> String {
  format!("\"{}\"", ident.replace('"', "\"\""))
}

fn create_table_sql(table: &str, spec: &SqlSpec) -> String {
  let columns: Vec<String> = spec
    .columns
    .iter()
    .map(|column| format!("{} {}", quote_ident(&column.name), column.sql_type))
    .collect();
  format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
}

fn insert_sql(table: &str, columns: &[&String]) -> String {
  let names: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
  let params: Vec<String> = (1..=columns.len()).map(|n| format!("${n}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote_ident(table),
    names.join(", "),
    params.join(", ")
  )
}

#[derive(Debug, Default)]
pub struct PostgresExecutor;

impl PostgresExecutor {
  pub fn new() -> Self {
    Self
  }

  async fn connect(options: &PgConnectOptions) -> Result<PgConnection, ExecutorError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect_with(options)).await {
      Ok(connection) => Ok(connection?),
      Err(_) => Err(ExecutorError::ConnectTimeout(options.get_host().to_string())),
    }
  }

  async fn close(connection: PgConnection) {
    if let Err(err) = connection.close().await {
      debug!(error = %err, "failed to close postgres connection");
    }
  }

  async fn gather(server: &PgConnectOptions, spec: &SqlSpec) -> Result<Facts, ExecutorError> {
    let mut conn = Self::connect(server).await?;
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
      .bind(&spec.database)
      .fetch_one(&mut conn)
      .await;
    Self::close(conn).await;

    let mut facts = Facts {
      database_exists: exists?,
      ..Default::default()
    };

    let table_scoped = matches!(spec.option, SqlOperation::CreateTable | SqlOperation::Insert);
    if let (true, true, Some(table)) = (table_scoped, facts.database_exists, spec.table.as_deref()) {
      let mut conn = Self::connect(&server.clone().database(&spec.database)).await?;
      let columns = sqlx::query_scalar::<_, String>(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position",
      )
      .bind(table)
      .fetch_all(&mut conn)
      .await;
      Self::close(conn).await;

      facts.columns = columns?;
      facts.table_exists = !facts.columns.is_empty();
    }

    Ok(facts)
  }

  async fn apply(server: &PgConnectOptions, spec: &SqlSpec) -> Result<(), ExecutorError> {
    let table = spec.table.as_deref().unwrap_or_default();

    let (options, statement) = match spec.option {
      SqlOperation::CreateDatabase => (server.clone(), format!("CREATE DATABASE {}", quote_ident(&spec.database))),
      SqlOperation::DropDatabase => (server.clone(), format!("DROP DATABASE {}", quote_ident(&spec.database))),
      SqlOperation::CreateTable => (server.clone().database(&spec.database), create_table_sql(table, spec)),
      SqlOperation::Insert => {
        let mut conn = Self::connect(&server.clone().database(&spec.database)).await?;
        let result = Self::insert_rows(&mut conn, table, spec).await;
        Self::close(conn).await;
        return result;
      }
    };

    let mut conn = Self::connect(&options).await?;
    let result = sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&statement)).await;
    Self::close(conn).await;
    result?;
    Ok(())
  }

  /// All rows in one transaction; any failure rolls back the batch.
  async fn insert_rows(conn: &mut PgConnection, table: &str, spec: &SqlSpec) -> Result<(), ExecutorError> {
    let mut tx = conn.begin().await?;
    for row in &spec.rows {
      let columns: Vec<&String> = row.keys().collect();
      let sql = insert_sql(table, &columns);
      let mut query = sqlx::query(&sql);
      for value in row.values() {
        query = bind_json(query, value);
      }
      query.execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
  }

  async fn provision(&self, exe: &Executable, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    let spec = exe.fields.sql.as_ref().ok_or_else(|| ExecutorError::missing(exe, "sql"))?;
    let server = PgConnectOptions::from_str(&spec.connection)?;

    logs.emit(ExecutionLog::started(KIND, "validating"));
    let facts = Self::gather(&server, spec).await?;
    debug!(action = %exe.name, ?facts, "postgres facts gathered");

    match validate(spec, &facts) {
      Verdict::Proceed => {}
      Verdict::Warn(operation) => return Ok(ExecutionLog::warning(KIND, operation)),
      Verdict::Fail(operation, reason) => return Ok(ExecutionLog::error(KIND, operation, reason)),
    }

    logs.emit(ExecutionLog::progress(KIND, spec.option.as_str()));
    Self::apply(&server, spec).await?;

    info!(action = %exe.name, operation = spec.option.as_str(), database = %spec.database, "postgres operation applied");
    Ok(ExecutionLog::success(KIND, spec.option.as_str()))
  }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// Bind a JSON scalar with its natural SQL type; arrays and objects bind as JSON text.
fn bind_json<'q>(query: PgQuery<'q>, value: &'q serde_json::Value) -> PgQuery<'q> {
  use serde_json::Value;

  match value {
    Value::Null => query.bind(None::<String>),
    Value::Bool(flag) => query.bind(*flag),
    Value::Number(number) => match number.as_i64() {
      Some(int) => query.bind(int),
      None => query.bind(number.as_f64()),
    },
    Value::String(text) => query.bind(text.as_str()),
    other => query.bind(other.to_string()),
  }
}

#[async_trait]
impl Executor for PostgresExecutor {
  fn kind(&self) -> ActionKind {
    KIND
  }

  async fn check(&self, executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    let reachable = async {
      let spec = executable
        .fields
        .sql
        .as_ref()
        .ok_or_else(|| ExecutorError::missing(executable, "sql"))?;
      let server = PgConnectOptions::from_str(&spec.connection)?;
      Self::close(Self::connect(&server).await?).await;
      Ok::<(), ExecutorError>(())
    };

    match reachable.await {
      Ok(()) => ExecutionLog::success(KIND, "available"),
      Err(err) => ExecutionLog::failure(KIND, "unavailable", &err),
    }
  }

  async fn handle(&self, executable: &Executable, _runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(KIND, self.provision(executable, logs).await)
  }
}
