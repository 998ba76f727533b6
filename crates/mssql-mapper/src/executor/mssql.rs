//! SQL Server executor.
//!
//! Uses Tiberius with bb8 connection pooling. Commands are rendered to a
//! batch with positional parameters and result cells are converted to
//! [`SqlValue`]s one by one.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{
    AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, QueryItem, ToSql,
};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Executor, RowSink};
use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{MapperError, Result};
use crate::result::{ResultRow, ResultTable};

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum connection lifetime (30 minutes).
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: ConnectionConfig,
}

impl TiberiusConnectionManager {
    fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        config
    }

    async fn open_tcp(addr: String) -> std::result::Result<TcpStream, tiberius::error::Error> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        let std_tcp = match tcp.into_std() {
            Ok(std_tcp) => std_tcp,
            Err(e) => {
                return Err(tiberius::error::Error::Io {
                    kind: e.kind(),
                    message: format!("Failed to detach socket: {}", e),
                })
            }
        };

        let socket = socket2::Socket::from(std_tcp);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(TCP_KEEPALIVE_INTERVAL)
            .with_interval(TCP_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
        }

        let std_tcp: std::net::TcpStream = socket.into();
        std_tcp.set_nonblocking(true).ok();
        TcpStream::from_std(std_tcp).map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: format!("Failed to convert socket: {}", e),
        })
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = Self::open_tcp(config.get_addr()).await?;
        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// [`Executor`] backed by a pool of Tiberius connections.
pub struct MssqlExecutor {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlExecutor {
    /// Connect using the configured pool size and test the connection.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| MapperError::pool(e, "creating MSSQL connection pool"))?;

        let executor = Self { pool };
        executor.ping().await?;

        info!(
            "Connected to MSSQL: {} (pool_size={})",
            config.describe(),
            config.pool_size
        );
        Ok(executor)
    }

    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| MapperError::pool(e, "getting MSSQL connection from pool"))
    }
}

#[async_trait]
impl Executor for MssqlExecutor {
    async fn execute(&self, command: &Command) -> Result<u64> {
        let rendered = command.render()?;
        debug!("Executing: {}", rendered.sql);

        let params: Vec<Box<dyn ToSql>> = rendered.values.iter().map(to_sql_param).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut client = self.get_client().await?;
        let result = client.execute(rendered.sql.as_str(), &param_refs).await?;
        Ok(result.total())
    }

    async fn query(&self, command: &Command) -> Result<ResultTable> {
        let mut rows = Vec::new();
        let (columns, _) = self
            .read_first_result(command, |_, values| {
                rows.push(values);
                Ok(())
            })
            .await?;

        let mut table = ResultTable::new(columns.iter().cloned());
        for values in rows {
            table.push(values);
        }
        Ok(table)
    }

    async fn query_each(&self, command: &Command, sink: &mut RowSink<'_>) -> Result<u64> {
        let (_, count) = self
            .read_first_result(command, |columns, values| {
                sink(ResultRow::new(Arc::clone(columns), values))
            })
            .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let mut client = self.get_client().await?;
        client.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }
}

impl MssqlExecutor {
    /// Stream the first result set of a command through `on_row`.
    ///
    /// Later result sets are drained and discarded.
    async fn read_first_result<F>(
        &self,
        command: &Command,
        mut on_row: F,
    ) -> Result<(Arc<[String]>, u64)>
    where
        F: FnMut(&Arc<[String]>, Vec<SqlValue<'static>>) -> Result<()> + Send,
    {
        let rendered = command.render()?;
        debug!("Querying: {}", rendered.sql);

        let params: Vec<Box<dyn ToSql>> = rendered.values.iter().map(to_sql_param).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut client = self.get_client().await?;
        let mut stream = client.query(rendered.sql.as_str(), &param_refs).await?;

        let mut columns: Arc<[String]> = Arc::from(Vec::<String>::new());
        let mut first_index: Option<usize> = None;
        let mut count = 0u64;

        while let Some(item) = stream.try_next().await? {
            match item {
                QueryItem::Metadata(meta) => {
                    if first_index.is_none() {
                        first_index = Some(meta.result_index());
                        columns = meta.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                }
                QueryItem::Row(row) => {
                    if Some(row.result_index()) != first_index {
                        continue;
                    }
                    let values = row
                        .into_iter()
                        .map(column_to_value)
                        .collect::<Result<Vec<_>>>()?;
                    on_row(&columns, values)?;
                    count += 1;
                }
            }
        }

        debug!("Read {} rows", count);
        Ok((columns, count))
    }
}

/// Box a value for binding. NULLs bind as a NULL of the hinted type.
fn to_sql_param(value: &SqlValue<'_>) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => Box::new(Option::<bool>::None),
            SqlNullType::U8 => Box::new(Option::<u8>::None),
            SqlNullType::I16 => Box::new(Option::<i16>::None),
            SqlNullType::I32 => Box::new(Option::<i32>::None),
            SqlNullType::I64 => Box::new(Option::<i64>::None),
            SqlNullType::F32 => Box::new(Option::<f32>::None),
            SqlNullType::F64 => Box::new(Option::<f64>::None),
            SqlNullType::String => Box::new(Option::<String>::None),
            SqlNullType::Bytes => Box::new(Option::<Vec<u8>>::None),
            SqlNullType::Uuid => Box::new(Option::<Uuid>::None),
            SqlNullType::Decimal => Box::new(Option::<Decimal>::None),
            SqlNullType::DateTime => Box::new(Option::<NaiveDateTime>::None),
            SqlNullType::DateTimeOffset => Box::new(Option::<DateTime<FixedOffset>>::None),
            SqlNullType::Date => Box::new(Option::<NaiveDate>::None),
            SqlNullType::Time => Box::new(Option::<NaiveTime>::None),
        },
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::U8(i) => Box::new(*i),
        SqlValue::I16(i) => Box::new(*i),
        SqlValue::I32(i) => Box::new(*i),
        SqlValue::I64(i) => Box::new(*i),
        SqlValue::F32(f) => Box::new(*f),
        SqlValue::F64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.to_string()),
        SqlValue::Bytes(b) => Box::new(b.to_vec()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::DateTimeOffset(dto) => Box::new(*dto),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Time(t) => Box::new(*t),
    }
}

/// Convert one result cell.
fn column_to_value(data: ColumnData<'static>) -> Result<SqlValue<'static>> {
    let value = match data {
        ColumnData::U8(v) => v.map(SqlValue::U8).unwrap_or(SqlValue::Null(SqlNullType::U8)),
        ColumnData::I16(v) => v.map(SqlValue::I16).unwrap_or(SqlValue::Null(SqlNullType::I16)),
        ColumnData::I32(v) => v.map(SqlValue::I32).unwrap_or(SqlValue::Null(SqlNullType::I32)),
        ColumnData::I64(v) => v.map(SqlValue::I64).unwrap_or(SqlValue::Null(SqlNullType::I64)),
        ColumnData::F32(v) => v.map(SqlValue::F32).unwrap_or(SqlValue::Null(SqlNullType::F32)),
        ColumnData::F64(v) => v.map(SqlValue::F64).unwrap_or(SqlValue::Null(SqlNullType::F64)),
        ColumnData::Bit(v) => v
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        ColumnData::String(v) => v
            .map(|s| SqlValue::Text(Cow::Owned(s.into_owned())))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
        ColumnData::Guid(v) => v
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        ColumnData::Binary(v) => v
            .map(|b| SqlValue::Bytes(Cow::Owned(b.into_owned())))
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        ColumnData::Xml(v) => v
            .map(|x| SqlValue::Text(Cow::Owned(x.into_owned().into_string())))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
        ColumnData::Numeric(_) => Decimal::from_sql(&data)?
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?
                .map(SqlValue::DateTime)
                .unwrap_or(SqlValue::Null(SqlNullType::DateTime))
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Null(SqlNullType::Time)),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)?
            .map(SqlValue::DateTimeOffset)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTimeOffset)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_value_scalars() {
        assert_eq!(column_to_value(ColumnData::I32(Some(42))).unwrap(), SqlValue::I32(42));
        assert_eq!(
            column_to_value(ColumnData::I64(None)).unwrap(),
            SqlValue::Null(SqlNullType::I64)
        );
        assert_eq!(
            column_to_value(ColumnData::Bit(Some(true))).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            column_to_value(ColumnData::String(Some(Cow::Borrowed("Dearborn St")))).unwrap(),
            SqlValue::Text(Cow::Owned("Dearborn St".to_string()))
        );
        assert_eq!(
            column_to_value(ColumnData::Binary(None)).unwrap(),
            SqlValue::Null(SqlNullType::Bytes)
        );
    }

    #[test]
    fn test_column_to_value_temporal_nulls() {
        assert_eq!(
            column_to_value(ColumnData::DateTime2(None)).unwrap(),
            SqlValue::Null(SqlNullType::DateTime)
        );
        assert_eq!(
            column_to_value(ColumnData::Date(None)).unwrap(),
            SqlValue::Null(SqlNullType::Date)
        );
        assert_eq!(
            column_to_value(ColumnData::Numeric(None)).unwrap(),
            SqlValue::Null(SqlNullType::Decimal)
        );
    }

    #[test]
    fn test_build_config_address() {
        let manager = TiberiusConnectionManager::new(ConnectionConfig {
            host: "db.example.com".to_string(),
            port: 14330,
            database: "Divvy".to_string(),
            user: "sa".to_string(),
            password: "secret".to_string(),
            encrypt: false,
            trust_server_cert: false,
            pool_size: 2,
        });
        assert_eq!(manager.build_config().get_addr(), "db.example.com:14330");
    }
}
