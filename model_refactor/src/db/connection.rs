//! Database connection handling
//!
//! This module provides functionality to establish and manage database connections.

use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, MySql, Pool,
    Postgres, Sqlite,
};
use std::time::Duration;

use crate::config::{DatabaseConfig, Driver};
use crate::error::{Error, Result};

/// URL schemes accepted for each driver
fn url_schemes(driver: Driver) -> &'static [&'static str] {
    match driver {
        Driver::Postgres => &["postgres:", "postgresql:"],
        Driver::Mysql => &["mysql:", "mariadb:"],
        Driver::Sqlite => &["sqlite:"],
    }
}

/// Enumeration of supported database types
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if !url_schemes(config.driver)
            .iter()
            .any(|scheme| config.url.starts_with(scheme))
        {
            return Err(Error::DatabaseError(format!(
                "Database URL does not match the {} driver",
                config.driver
            )));
        }

        let pool_size = config.pool_size.unwrap_or(5);
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(30));

        tracing::debug!(driver = %config.driver, pool_size, "Connecting to database");

        let connection = match config.driver {
            Driver::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;
                DatabaseConnection::Postgres(pool)
            }
            Driver::Mysql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;
                DatabaseConnection::MySql(pool)
            }
            Driver::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;
                DatabaseConnection::Sqlite(pool)
            }
        };

        Ok(connection)
    }

    pub fn driver(&self) -> Driver {
        match self {
            DatabaseConnection::Postgres(_) => Driver::Postgres,
            DatabaseConnection::MySql(_) => Driver::Mysql,
            DatabaseConnection::Sqlite(_) => Driver::Sqlite,
        }
    }

    /// Execute a SQL statement
    pub async fn execute(&self, sql: &str) -> Result<()> {
        match self {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
            DatabaseConnection::MySql(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
            DatabaseConnection::Sqlite(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        match self {
            DatabaseConnection::Postgres(pool) => pool.close().await,
            DatabaseConnection::MySql(pool) => pool.close().await,
            DatabaseConnection::Sqlite(pool) => pool.close().await,
        }
    }
}
