// concord/node/src/runner.rs

use crate::config::Config;
use anyhow::Context;
use concord_core::{Attempt, ConsensusError, LedgerService};
use concord_p2p::{Discovery, P2pService};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

async fn block_producer_loop(ledger: LedgerService, config: Config) {
    let mut ticker = interval(config.node.producer_interval());
    let producer = config.node.address;
    loop {
        ticker.tick().await;
        match ledger.produce_block(&producer).await {
            Ok(Attempt::Committed(block)) => {
                info!(
                    index = block.index,
                    hash = %block.hash,
                    txs = block.transactions.len(),
                    "produced block"
                );
            }
            Ok(Attempt::Aborted(abort)) => {
                info!(index = abort.index, "a peer produced this block first");
            }
            Ok(Attempt::Idle) => debug!("no pending transactions"),
            Err(
                e @ (ConsensusError::NotElected(_)
                | ConsensusError::Ineligible(_)
                | ConsensusError::QuorumNotReached { .. }),
            ) => debug!(reason = %e, "not our turn"),
            Err(e) => warn!(error = %e, "block production failed"),
        }
    }
}

pub struct Node {
    config: Config,
    ledger: LedgerService,
    p2p: P2pService,
}

impl Node {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let ledger = LedgerService::new(&config.consensus)
            .context("invalid consensus configuration")?
            .allow_empty_blocks(config.node.allow_empty_blocks);
        let p2p = P2pService::new(ledger.clone(), config.network.clone());
        Ok(Self { config, ledger, p2p })
    }

    /// Starts networking and block production, then runs until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            address = %self.config.node.address,
            consensus = self.ledger.engine().kind(),
            "starting node"
        );

        let mut tasks: Vec<JoinHandle<()>> = vec![self.p2p.spawn_event_relay()];

        let (listen_addr, listener) = self
            .p2p
            .listen(&self.config.network.listen_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.network.listen_address))?;
        tasks.push(listener);
        info!(address = %listen_addr, "accepting peers");

        self.p2p.connect_all(&self.config.network.bootstrap_nodes).await;

        if self.config.discovery.enabled {
            let discovery = Arc::new(
                Discovery::bind(&self.config.discovery)
                    .await
                    .context("failed to start node discovery")?,
            );
            tasks.push(discovery.spawn());
        }

        tasks.push(tokio::spawn(block_producer_loop(self.ledger.clone(), self.config.clone())));

        tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
        info!("shutting down");
        for task in tasks {
            task.abort();
        }
        Ok(())
    }
}
