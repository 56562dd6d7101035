use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use strand_core::pipeline::{StatusRetrier, XsrfTokenAdapter};
use strand_core::{ManagerConfig, Promise, Queue, RequestManager};
use strand_model::HandlingDirective;
use strand_net::{HttpTransport, TransportOptions};
use strand_observe::{LoggerConfig, init_logger};

/// Path to a JSON `ManagerConfig`; every field is optional.
const ENV_CONFIG: &str = "STRAND_CONFIG";
/// Handling directive for every request: `none`, `browsing` or `ajax`.
const ENV_HANDLING: &str = "STRAND_HANDLING";
/// When set, pipeline decisions (retries, redirects, adapters) are logged at debug.
const ENV_TRACE_PIPELINE: &str = "STRAND_TRACE_PIPELINE";

fn manager_config() -> anyhow::Result<ManagerConfig> {
    match std::env::var(ENV_CONFIG) {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
        }
        Err(_) => Ok(ManagerConfig::default()),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) logger
    let mut logger = LoggerConfig::from_env()?;
    if std::env::var_os(ENV_TRACE_PIPELINE).is_some() {
        logger.level = logger.level.with_directive("strand_core=debug")?;
    }
    init_logger(&logger)?;

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        anyhow::bail!("usage: strand-fetch <url>...");
    }
    let handling: HandlingDirective = match std::env::var(ENV_HANDLING) {
        Ok(raw) => raw.parse()?,
        Err(_) => HandlingDirective::Browsing,
    };

    // 2) manager
    let config = manager_config()?;
    let transport = Arc::new(HttpTransport::new(TransportOptions::from(&config))?);
    let queue = Queue::current("strand-fetch")?;
    let manager = RequestManager::new(transport, queue.clone(), config);
    manager.enqueue_adapter(Arc::new(XsrfTokenAdapter::new()));
    manager.enqueue_retrier(Arc::new(StatusRetrier::default()));
    info!(count = urls.len(), %handling, "fetching");

    // 3) requests, all at once
    let requests = urls
        .iter()
        .map(|url| {
            let url = url.clone();
            manager
                .get(url.clone(), handling)
                .response()
                .then(move |response| Ok::<_, strand_core::Error>((url, response)))
        })
        .collect();

    let responses = Promise::all(&queue, requests).await;
    match responses {
        Ok(responses) => {
            for (requested, response) in responses {
                println!("{} {} ({} bytes) <- {}", response.status, response.url, response.body.len(), requested);
            }
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "fetch failed");
            Err(err.into())
        }
    }
}
