mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use adaptive_core::{
    ChangeWatcher, ContainerQuery, ContainerSize, EngineCfg, IdlePrefetcher, ProfileState,
    class_tokens,
};
use serde_json::json;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use scenario::{Hosts, Scenario};

const DEFAULT_FILTER: &str = "adaptive=info,adaptive_core=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = Arc::new(EngineCfg::from_env());
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        Some("config") => {
            for (key, value, desc) in cfg.to_entries() {
                println!("{key:<24} {value:>8}  {desc}");
            }
            Ok(())
        }
        Some("run") => {
            let scenario = match args.next() {
                Some(path) => Scenario::load(&PathBuf::from(path))?,
                None => Scenario::builtin(),
            };
            run(scenario, cfg).await
        }
        None => run(Scenario::builtin(), cfg).await,
        Some(other) => anyhow::bail!("unknown command `{other}` (expected `run [scenario.json]` or `config`)"),
    }
}

/// Drive the engine through a scenario, printing every published snapshot as a JSON line.
async fn run(scenario: Scenario, cfg: Arc<EngineCfg>) -> anyhow::Result<()> {
    let hosts = Hosts::new(&scenario);

    let watcher = ChangeWatcher::new(Arc::new(hosts.env.clone()), Arc::clone(&cfg));
    let handle = watcher.subscribe();
    tracing::info!(sources = ?handle.active_sources(), "watching device");
    let profile_printer = tokio::spawn(print_profiles(handle.changed()));

    let mut container = ContainerQuery::new(Arc::clone(&cfg));
    let container_printer = match &hosts.region {
        Some(region) => {
            let initial = container.attach(Arc::new(region.clone()));
            print_container(&initial);
            container.changed().map(|rx| tokio::spawn(print_containers(rx)))
        }
        None => None,
    };

    let mut prefetcher = IdlePrefetcher::new(Arc::new(hosts.idle.clone()), &cfg);
    let registered = prefetcher.prefetch(scenario.prefetch.iter().cloned());
    tracing::info!(registered, "prefetch requested");

    for step in &scenario.steps {
        if !hosts.apply(step).await {
            handle.refresh();
        }
    }

    // Let the last debounce windows settle before tearing down.
    let settle = cfg.resize_quiescence().max(cfg.container_quiescence()) * 2;
    tokio::time::sleep(settle).await;

    handle.unsubscribe().await;
    container.detach();
    prefetcher.teardown();
    let _ = profile_printer.await;
    if let Some(printer) = container_printer {
        let _ = printer.await;
    }

    println!(
        "{}",
        json!({ "event": "prefetched", "addresses": hosts.idle.prefetched() })
    );
    Ok(())
}

async fn print_profiles(mut rx: watch::Receiver<ProfileState>) {
    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        println!(
            "{}",
            json!({
                "event": "profile",
                "generation": state.generation,
                "loading": state.loading,
                "classes": class_tokens(&state.profile),
                "profile": state.profile,
            })
        );
    }
}

async fn print_containers(mut rx: watch::Receiver<ContainerSize>) {
    while rx.changed().await.is_ok() {
        let size = *rx.borrow_and_update();
        print_container(&size);
    }
}

fn print_container(size: &ContainerSize) {
    println!("{}", json!({ "event": "container", "size": size }));
}
