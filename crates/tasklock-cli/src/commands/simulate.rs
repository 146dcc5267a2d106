//! Simulate command implementation

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tasklock_client::ClientLockProxy;
use tasklock_core::{LockEvent, RecordId, TasklockConfig};
use tasklock_hub::{BroadcastHub, LocalTransport};
use tokio::sync::{mpsc, watch};

/// How long client views may lag behind the hub once all requests completed
const CONVERGENCE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct ClientStats {
    acked: usize,
    failed: usize,
}

pub fn execute(config: TasklockConfig, clients: usize, records: u64, rounds: usize) -> Result<()> {
    if clients == 0 || records == 0 {
        bail!("--clients and --records must be positive");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(config, clients, records, rounds))
}

async fn run(config: TasklockConfig, clients: usize, records: u64, rounds: usize) -> Result<()> {
    tracing::info!(
        "Simulating {} clients editing {} records for {} rounds",
        clients,
        records,
        rounds
    );

    let hub = Arc::new(BroadcastHub::in_memory(&config.hub));
    let transport = Arc::new(LocalTransport::new(hub));

    let mut proxies = Vec::with_capacity(clients);
    let mut views = Vec::with_capacity(clients);
    for _ in 0..clients {
        let proxy = Arc::new(ClientLockProxy::new(
            transport.clone(),
            config.client.clone(),
        ));
        views.push(track_view(proxy.subscribe()));
        proxy.connect().await.context("Client failed to connect")?;
        proxies.push(proxy);
    }

    let started = Instant::now();
    let workers: Vec<_> = proxies
        .iter()
        .enumerate()
        .map(|(client, proxy)| {
            let proxy = Arc::clone(proxy);
            tokio::spawn(async move { edit_rounds(&proxy, client, clients, records, rounds).await })
        })
        .collect();

    let mut total = ClientStats::default();
    for worker in workers {
        let stats = worker.await.context("Client task panicked")?;
        total.acked += stats.acked;
        total.failed += stats.failed;
    }
    let elapsed = started.elapsed();

    let locked = transport.hub().lock_manager().locked_ids()?;
    let converged = wait_for_views(&views, &locked).await;

    println!("\nSimulation Summary");
    println!("{}", "=".repeat(60));
    println!("Clients: {}", clients);
    println!("Records: {}", records);
    println!("Requests acknowledged: {}", total.acked);
    println!("Requests failed: {}", total.failed);
    println!("Elapsed: {:?}", elapsed);
    println!("Locked records: {:?}", locked.iter().map(|id| id.as_u64()).collect::<Vec<_>>());
    println!("Client views converged: {}/{}", converged, clients);

    for proxy in &proxies {
        proxy.disconnect();
    }

    if converged != clients {
        bail!("{} client view(s) disagree with the hub", clients - converged);
    }
    Ok(())
}

/// Client `client` locks a record each round and releases it again every other
/// round. Clients share records, so one client may release another's lock.
async fn edit_rounds(
    proxy: &ClientLockProxy,
    client: usize,
    clients: usize,
    records: u64,
    rounds: usize,
) -> ClientStats {
    let mut stats = ClientStats::default();

    for round in 0..rounds {
        let record_id = RecordId(((client + round * clients) as u64 % records) + 1);

        let mut outcomes = vec![proxy.request_begin_edit(record_id).await];
        if round % 2 == 1 {
            outcomes.push(proxy.request_cancel_edit(record_id).await);
        }

        for outcome in outcomes {
            match outcome {
                Ok(()) => stats.acked += 1,
                Err(e) => {
                    tracing::warn!("Client {} request failed: {}", client, e);
                    stats.failed += 1;
                }
            }
        }
    }

    stats
}

/// Fold a client's lock events into its view of the locked records.
fn track_view(mut events: mpsc::UnboundedReceiver<LockEvent>) -> watch::Receiver<BTreeSet<RecordId>> {
    let (tx, rx) = watch::channel(BTreeSet::new());
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tx.send_modify(|view| match event {
                LockEvent::LockSnapshotReceived(snapshot) => *view = snapshot,
                LockEvent::TaskLocked(id) => {
                    view.insert(id);
                }
                LockEvent::TaskUnlocked(id) => {
                    view.remove(&id);
                }
            });
        }
    });
    rx
}

/// Number of views equal to `expected` once they settle.
async fn wait_for_views(
    views: &[watch::Receiver<BTreeSet<RecordId>>],
    expected: &BTreeSet<RecordId>,
) -> usize {
    let deadline = Instant::now() + CONVERGENCE_WAIT;
    loop {
        let converged = views.iter().filter(|v| *v.borrow() == *expected).count();
        if converged == views.len() || Instant::now() >= deadline {
            return converged;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
