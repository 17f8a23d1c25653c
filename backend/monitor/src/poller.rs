//! Long-running background task that refreshes the owner's jobs and domains.
//!
//! Each tick:
//! 1. read the owner wallet and list its extensions,
//! 2. fetch those accounts and keep the ones running the job code,
//! 3. decode, analyze and classify every job, and mark jobs no longer
//!    registered as destroyed,
//! 4. fetch the owner's DNS items and mark which job renews each.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron_protocol::analyzer::Analyzer;
use cron_protocol::code::job_code_hash_base64;
use cron_protocol::domain::DomainRecord;
use cron_protocol::wallet::WalletState;
use cron_protocol::Address;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::errors::{MonitorError, Result};
use crate::rpc::{AccountState, TonCenterClient};
use crate::snapshot::{DomainSnapshot, JobSnapshot};

pub struct PollerState {
    pub pool: SqlitePool,
    pub config: Config,
    pub rpc: TonCenterClient,
}

/// Poll until `shutdown` is cancelled.
pub async fn run(state: Arc<PollerState>, shutdown: CancellationToken) {
    info!(
        "Poller starting: owner {} on {}",
        state.config.owner.to_friendly(true, state.config.network.is_testnet()),
        state.config.network
    );

    let job_code_hash = match job_code_hash_base64() {
        Ok(hash) => hash,
        Err(e) => {
            error!("Embedded job code is unreadable: {e}");
            return;
        }
    };
    let analyzer = Analyzer::new(state.config.relay);

    loop {
        match poll_once(&state, &job_code_hash, &analyzer).await {
            Ok((jobs, domains)) => info!("Refreshed {jobs} jobs and {domains} domains"),
            Err(e) => error!("Poll error: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Poller stopped");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(state.config.poll_interval_secs)) => {}
        }
    }
}

/// Perform a single refresh; returns `(jobs, domains)` written.
async fn poll_once(
    state: &PollerState,
    job_code_hash: &str,
    analyzer: &Analyzer,
) -> Result<(usize, usize)> {
    let now = Utc::now().timestamp();
    let owner = &state.config.owner;

    let extensions = wallet_extensions(&state.rpc, owner).await?;
    let accounts = index_by_address(state.rpc.fetch_account_states(&extensions).await?);
    let jobs: Vec<JobSnapshot> = extensions
        .iter()
        .filter_map(|ext| {
            JobSnapshot::from_account(ext, owner, accounts.get(ext), job_code_hash, analyzer, now)
        })
        .collect();
    for job in &jobs {
        if job.truncated_branches > 0 {
            warn!("Job {} message exceeds the depth cap; domain list may be partial", job.address);
        }
    }
    let written_jobs = db::upsert_jobs(&state.pool, &jobs).await?;
    let registered: Vec<String> = extensions.iter().map(Address::to_string).collect();
    let dropped =
        db::mark_unregistered_destroyed(&state.pool, &owner.to_string(), &registered, now).await?;
    if dropped > 0 {
        info!("{dropped} jobs left the wallet's extensions; marked destroyed");
    }

    let records = owned_domains(state).await?;
    let domains: Vec<DomainSnapshot> = records
        .iter()
        .map(|r| DomainSnapshot::from_record(r, &jobs, now))
        .collect();
    let written_domains = db::replace_domains(&state.pool, &domains).await?;

    Ok((written_jobs, written_domains))
}

async fn wallet_extensions(rpc: &TonCenterClient, owner: &Address) -> Result<Vec<Address>> {
    let wallet = rpc
        .fetch_account_states(std::slice::from_ref(owner))
        .await?
        .into_iter()
        .find(|a| a.parsed_address().as_ref() == Some(owner) && a.is_active())
        .ok_or_else(|| MonitorError::Api(format!("wallet {owner} is not active")))?;
    let state = wallet
        .data_boc
        .as_deref()
        .and_then(WalletState::try_from_base64)
        .ok_or_else(|| MonitorError::Api(format!("wallet {owner} has unreadable data")))?;
    Ok(state.extension_addresses()?)
}

async fn owned_domains(state: &PollerState) -> Result<Vec<DomainRecord>> {
    let network = state.config.network;
    let items = state
        .rpc
        .fetch_domains_by_owner(&network.dns_collection()?, &state.config.owner)
        .await?;
    let names: HashMap<Address, Option<String>> = items
        .iter()
        .filter_map(|item| {
            let address = item.address.parse().ok()?;
            Some((address, item.domain_name().map(str::to_string)))
        })
        .collect();
    let addresses: Vec<Address> = names.keys().copied().collect();

    let records = state
        .rpc
        .fetch_account_states(&addresses)
        .await?
        .into_iter()
        .filter(|acc| acc.runs_code(network.dns_item_code_hash()))
        .filter_map(|acc| {
            let address = acc.parsed_address()?;
            let name = names.get(&address).cloned().flatten();
            DomainRecord::from_data_boc(address, name.as_deref(), acc.data_boc.as_deref()?)
        })
        .collect();
    Ok(records)
}

fn index_by_address(accounts: Vec<AccountState>) -> HashMap<Address, AccountState> {
    accounts
        .into_iter()
        .filter_map(|acc| Some((acc.parsed_address()?, acc)))
        .collect()
}
