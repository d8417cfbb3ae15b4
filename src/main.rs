use carel_remote_call::{
    config::Config,
    models::{cache_key, CallDescriptor},
    services::{
        CacheStore, ChainReader, ExecutorConfig, FetchCoordinator, FetchOptions, StarknetClient,
        StarknetSigner, TransactionExecutor, ViewCaller,
    },
};
use futures_util::future::join;
use serde_json::json;
use starknet_core::types::Felt;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Internal helper that reads an optional, trimmed variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Internal helper that splits comma separated calldata.
fn calldata(raw: Option<String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn descriptor(target: &str, entrypoint: &str, args: &[String]) -> anyhow::Result<CallDescriptor> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    Ok(CallDescriptor::parse(target, entrypoint, &args)?)
}

fn to_hex(values: &[Felt]) -> Vec<String> {
    values.iter().map(|value| format!("{:#x}", value)).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carel_remote_call=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting CAREL remote-call probe");
    tracing::info!(
        "Chain: {} ({})",
        config.starknet_chain_id,
        if config.is_testnet() { "testnet" } else { "mainnet" }
    );
    tracing::info!("Signer configured: {}", config.has_signer());

    let Some(target) = env_value("VIEW_CONTRACT_ADDRESS") else {
        tracing::info!("VIEW_CONTRACT_ADDRESS not set; nothing to read");
        return Ok(());
    };
    let entrypoint = env_value("VIEW_ENTRYPOINT")
        .ok_or_else(|| anyhow::anyhow!("VIEW_ENTRYPOINT is required with VIEW_CONTRACT_ADDRESS"))?;
    let view_args = calldata(env_value("VIEW_CALLDATA"));
    let view = descriptor(&target, &entrypoint, &view_args)?;

    let client = StarknetClient::from_config(&config)?;
    match client.get_block_number().await {
        Ok(block) => tracing::info!("RPC reachable, latest block {}", block),
        Err(e) => tracing::warn!("RPC head check failed ({}): {}", e.code(), e),
    }
    let reader: Arc<dyn ChainReader> = Arc::new(client);
    let views = Arc::new(ViewCaller::from_config(reader.clone(), &config));
    tracing::info!("View timeout: {:?}", views.timeout());

    let cache = Arc::new(CacheStore::new(config.cache_capacity));
    tracing::info!("Cache capacity: {} entries", cache.capacity());
    let coordinator = FetchCoordinator::new(cache);

    let key = cache_key("view", &[&target, &entrypoint, &view_args.join(",")]);
    let read = {
        let views = views.clone();
        let view = view.clone();
        move || {
            let views = views.clone();
            let view = view.clone();
            async move { views.call(&view).await }
        }
    };
    let options = || FetchOptions::<Vec<Felt>>::from_config(&config);

    let values = coordinator.fetch(&key, read.clone(), options()).await?;
    tracing::info!("{} returned {} values", view.label(), values.len());

    // Both reads are served from cache.
    let (again, concurrent) = join(
        coordinator.fetch(&key, read.clone(), options()),
        coordinator.fetch(&key, read.clone(), options()),
    )
    .await;
    if again? != values || concurrent? != values {
        tracing::warn!("cached read of {} differs from the first read", key);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "key": key,
            "call": view.label(),
            "values": to_hex(&values),
        }))?
    );

    // Optional write through the same contract.
    if let Some(execute_entrypoint) = env_value("EXECUTE_ENTRYPOINT") {
        match StarknetSigner::from_config(&config)? {
            None => tracing::warn!(
                "EXECUTE_ENTRYPOINT set but BACKEND_ACCOUNT_ADDRESS/BACKEND_PRIVATE_KEY are missing; skipping"
            ),
            Some(signer) => {
                let execute_args = calldata(env_value("EXECUTE_CALLDATA"));
                let call = descriptor(&target, &execute_entrypoint, &execute_args)?;
                let executor =
                    TransactionExecutor::new(reader.clone(), ExecutorConfig::from_config(&config));
                tracing::info!(
                    "Executing {} (confirmation timeout {:?})",
                    call.label(),
                    executor.config().confirmation_timeout
                );

                let result = executor.execute(&call, &signer).await;
                println!("{}", serde_json::to_string_pretty(&result)?);

                if result.succeeded() {
                    coordinator.invalidate(&key);
                    tracing::info!("Invalidated {} after confirmed transaction", key);
                }
            }
        }
    }

    coordinator.shutdown();
    Ok(())
}
