//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresReader`]: Source reader for PostgreSQL databases
//! - [`PostgresWriter`]: Target writer for PostgreSQL databases

mod dialect;
mod params;
mod reader;
mod writer;

use std::str::FromStr;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{info, warn};

use crate::drivers::common::{split_sslmode, TlsBuilder};
use crate::error::{CopyError, Result};

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
pub use writer::PostgresWriter;

/// Build a pool for a `postgres://` descriptor and prove it can connect.
///
/// `endpoint` ("source" or "destination") names the side in connection
/// errors.
pub(crate) async fn connect_pool(uri: &str, max_conns: usize, endpoint: &str) -> Result<Pool> {
    let (stripped, ssl_mode) = split_sslmode(uri)?;

    let mut pg_config =
        PgConfig::from_str(&stripped).map_err(|e| CopyError::connection(endpoint, e))?;
    pg_config.ssl_mode(ssl_mode.negotiation());

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let pool = match TlsBuilder::new(ssl_mode).build()? {
        None => {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
            let mgr = Manager::from_config(pg_config.clone(), tokio_postgres::NoTls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_conns)
                .build()
                .map_err(|e| CopyError::pool(e, format!("creating PostgreSQL {} pool", endpoint)))?
        }
        Some(tls_connector) => {
            let mgr = Manager::from_config(pg_config.clone(), tls_connector, mgr_config);
            Pool::builder(mgr)
                .max_size(max_conns)
                .build()
                .map_err(|e| CopyError::pool(e, format!("creating PostgreSQL {} pool", endpoint)))?
        }
    };

    // Test connection
    let client = pool
        .get()
        .await
        .map_err(|e| CopyError::connection(endpoint, e))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| CopyError::connection(endpoint, e))?;

    info!(
        "Connected to PostgreSQL {}: {}/{}",
        endpoint,
        describe_hosts(&pg_config),
        pg_config.get_dbname().unwrap_or("")
    );

    Ok(pool)
}

/// Host list for log lines; never includes credentials.
fn describe_hosts(config: &PgConfig) -> String {
    let ports = config.get_ports();
    config
        .get_hosts()
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let name = match host {
                tokio_postgres::config::Host::Tcp(h) => h.clone(),
                #[cfg(unix)]
                tokio_postgres::config::Host::Unix(p) => p.display().to_string(),
            };
            match ports.get(i).or_else(|| ports.first()) {
                Some(port) => format!("{}:{}", name, port),
                None => name,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
