use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempogo::api::DynAPI;
use tempogo::config::{Config, Mode};
use tempogo::db::{self, DynStore};
use tempogo::engine::Engine;
use tempogo::error::{unexpected_error, Error};
use tempogo::server::serve;
use tempogo::simulation::{Settings, Simulation};

async fn run(config: Config, store: DynStore) -> Result<(), Error> {
    let engine = Engine::new(store, config.matching_policy())?;
    let api = Arc::new(engine) as DynAPI;

    match config.mode {
        Mode::Serve => serve(api, config.server_addr()?).await,
        Mode::Simulate => {
            let report = Simulation::new(api, Settings::from_config(&config))
                .run()
                .await?;

            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_consistent() {
                return Err(unexpected_error("simulation ended in an inconsistent state"));
            }

            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempogo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let store = match db::connect(&config).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "failed to open the store");
            std::process::exit(1);
        }
    };

    let result = run(config, store.clone()).await;
    store.close().await;

    if let Err(err) = result {
        tracing::error!(error = %err, code = err.code(), "tempogo stopped");
        std::process::exit(1);
    }
}
