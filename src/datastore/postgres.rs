mod errors;
mod post_store;
pub mod postgres_client;
use crate::config::Config;
use anyhow::Context;
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, Pool},
};
use prometheus::{
    core::{Collector, Desc},
    proto::MetricFamily,
    IntGauge, Opts,
};
use std::time::Duration;

embed_migrations!("migrations");

/// The microblog's tables in Postgres, behind an r2d2 connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<ConnectionManager<PgConnection>>,
    idle_conns: IntGauge,
    conns: IntGauge,
}

impl PostgresStore {
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let manager = ConnectionManager::<PgConnection>::new(config.db_dsn.as_str());
        let pool = Pool::builder()
            .max_size(config.db_pool_size)
            .connection_timeout(Duration::from_secs(config.db_connection_timeout))
            .build(manager)
            .context("couldn't build the Postgres connection pool")?;
        let idle_conns = IntGauge::with_opts(Opts::new(
            "microblog_db_connections_idle",
            "How many DB connections are currently idle",
        ))?;
        let conns = IntGauge::with_opts(Opts::new(
            "microblog_db_connections",
            "How many DB connections are open",
        ))?;
        Ok(Self {
            pool,
            idle_conns,
            conns,
        })
    }

    /// Bring the schema up to date. Runs synchronously, before the server starts.
    pub fn run_migrations(&self) -> Result<(), anyhow::Error> {
        let conn = self.pool.get()?;
        embedded_migrations::run(&conn).context("couldn't run migrations")?;
        Ok(())
    }
}

/// Pool gauges are refreshed on every scrape.
impl Collector for PostgresStore {
    fn desc(&self) -> Vec<&Desc> {
        [&self.idle_conns, &self.conns]
            .iter()
            .flat_map(|gauge| gauge.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let state = self.pool.state();
        self.idle_conns.set(i64::from(state.idle_connections));
        self.conns.set(i64::from(state.connections));
        [&self.idle_conns, &self.conns]
            .iter()
            .flat_map(|gauge| gauge.collect())
            .collect()
    }
}
