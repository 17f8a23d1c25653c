//! Records the monitor stores and serves.
//!
//! A job snapshot is derived entirely from the job account: its stored data
//! is decoded, the stored message is analyzed for domains and funding mode,
//! and the balance is compared with the cost of one cycle.

use cron_protocol::analyzer::Analyzer;
use cron_protocol::domain::DomainRecord;
use cron_protocol::economics::{cost_per_cycle, runway_cycles, FundingMode};
use cron_protocol::{Address, ContractStateRecord, JobObservation, JobStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rpc::AccountState;

/// Latest observed state of a job, as stored in / read from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobSnapshot {
    pub address: String,
    pub owner: String,
    pub status: String,
    pub mode: Option<String>,
    /// JSON array of raw domain addresses
    pub domains: String,
    pub balance: String,
    pub cost_per_cycle: Option<String>,
    pub runway_cycles: Option<i64>,
    pub next_call_time: Option<i64>,
    pub repeat_every: Option<i64>,
    pub salt: Option<i64>,
    /// Hex representation hash of the stored message
    pub message_hash: Option<String>,
    pub truncated_branches: i64,
    pub updated_at: i64,
}

impl JobSnapshot {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_str_opt(&self.status)
    }

    pub fn domain_addresses(&self) -> Vec<String> {
        serde_json::from_str(&self.domains).unwrap_or_default()
    }

    /// Snapshot of a job account.
    ///
    /// `account` is `None` when the indexer does not know the address; a
    /// registered job without state is reported as destroyed. Returns `None`
    /// when the account runs other code or its data cannot be read, leaving
    /// any stored row as it was.
    pub fn from_account(
        address: &Address,
        owner: &Address,
        account: Option<&AccountState>,
        job_code_hash: &str,
        analyzer: &Analyzer,
        now: i64,
    ) -> Option<Self> {
        let acc = match account {
            Some(acc) if acc.runs_code(job_code_hash) => acc,
            Some(acc) if acc.is_active() => {
                debug!("Extension {address} is not a job");
                return None;
            }
            _ => {
                let balance = account.map(AccountState::balance_nano).unwrap_or(0);
                return Some(Self::destroyed(address, owner, balance, now));
            }
        };
        let balance = acc.balance_nano();
        let Some(record) = acc
            .data_boc
            .as_deref()
            .and_then(ContractStateRecord::try_from_base64)
        else {
            warn!("Job {address} has unreadable data; keeping last snapshot");
            return None;
        };

        let analysis = analyzer.analyze(&record.message);
        let mode = FundingMode::from_relay_seen(analysis.self_funding);
        let n = analysis.domains.len() as u32;
        let cost = cost_per_cycle(n, mode);
        let status = JobStatus::classify(
            Some(&JobObservation {
                initialized: record.initialized,
                balance,
            }),
            cost,
        );
        let domains: Vec<String> = analysis.domains.iter().map(|d| d.to_string()).collect();

        Some(JobSnapshot {
            address: address.to_string(),
            owner: record.owner.to_string(),
            status: status.as_str().to_string(),
            mode: Some(mode.as_str().to_string()),
            domains: serde_json::to_string(&domains).unwrap_or_else(|_| "[]".to_string()),
            balance: balance.to_string(),
            cost_per_cycle: Some(cost.to_string()),
            runway_cycles: Some(runway_cycles(balance, n, mode).min(i64::MAX as u128) as i64),
            next_call_time: Some(record.next_call_time as i64),
            repeat_every: Some(record.repeat_every as i64),
            salt: Some(record.salt as i64),
            message_hash: Some(hex::encode(record.message.hash())),
            truncated_branches: analysis.truncated_branches as i64,
            updated_at: now,
        })
    }

    fn destroyed(address: &Address, owner: &Address, balance: u128, now: i64) -> Self {
        JobSnapshot {
            address: address.to_string(),
            owner: owner.to_string(),
            status: JobStatus::Destroyed.as_str().to_string(),
            mode: None,
            domains: "[]".to_string(),
            balance: balance.to_string(),
            cost_per_cycle: None,
            runway_cycles: None,
            next_call_time: None,
            repeat_every: None,
            salt: None,
            message_hash: None,
            truncated_branches: 0,
            updated_at: now,
        }
    }
}

/// A domain held by the owner, as stored in / read from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DomainSnapshot {
    pub address: String,
    pub name: String,
    pub expires_at: i64,
    /// Job renewing this domain, if any
    pub covered_by: Option<String>,
    pub updated_at: i64,
}

impl DomainSnapshot {
    /// Attach the first live job that lists the domain.
    pub fn from_record(record: &DomainRecord, jobs: &[JobSnapshot], now: i64) -> Self {
        let address = record.address.to_string();
        let covered_by = jobs
            .iter()
            .filter(|j| j.status() != Some(JobStatus::Destroyed))
            .find(|j| j.domain_addresses().contains(&address))
            .map(|j| j.address.clone());
        DomainSnapshot {
            address,
            name: record.name.clone(),
            expires_at: record.expires_at.timestamp(),
            covered_by,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cron_protocol::boc;
    use cron_protocol::code::job_code_hash_base64;
    use cron_protocol::job::{build_job, JobConfig, Schedule};

    fn owner() -> Address {
        Address::new(0, [0x0F; 32])
    }

    fn relay() -> Address {
        Address::new(0, [0xEE; 32])
    }

    fn domains() -> Vec<Address> {
        vec![Address::new(0, [1; 32]), Address::new(0, [2; 32])]
    }

    fn account(address: &Address, code_hash: &str, data_boc: String, balance: u128) -> AccountState {
        AccountState {
            address: address.to_string(),
            balance: Some(balance.to_string()),
            status: Some("active".to_string()),
            code_hash: Some(code_hash.to_string()),
            data_boc: Some(data_boc),
        }
    }

    #[test]
    fn fresh_classic_job() {
        let config = JobConfig::new(owner(), domains(), Schedule::new(10, 20, 30));
        let job = build_job(&config).unwrap();
        let code_hash = job_code_hash_base64().unwrap();
        let acc = account(&job.address, &code_hash, boc::encode_base64(&job.data), u128::MAX >> 8);
        let analyzer = Analyzer::new(relay());

        let snap =
            JobSnapshot::from_account(&job.address, &owner(), Some(&acc), &code_hash, &analyzer, 99)
                .unwrap();
        // Stored data is never initialized before the first run.
        assert_eq!(snap.status(), Some(JobStatus::Uninitialized));
        assert_eq!(snap.mode.as_deref(), Some("classic"));
        assert_eq!(snap.domain_addresses().len(), 2);
        assert_eq!(snap.next_call_time, Some(10));
        assert_eq!(snap.salt, Some(30));
        assert_eq!(snap.updated_at, 99);
    }

    #[test]
    fn self_funding_job_is_detected() {
        let config =
            JobConfig::new(owner(), domains(), Schedule::new(10, 20, 30)).self_funding(relay());
        let job = build_job(&config).unwrap();
        let code_hash = job_code_hash_base64().unwrap();
        let acc = account(&job.address, &code_hash, boc::encode_base64(&job.data), 0);

        let snap = JobSnapshot::from_account(
            &job.address,
            &owner(),
            Some(&acc),
            &code_hash,
            &Analyzer::new(relay()),
            0,
        )
        .unwrap();
        assert_eq!(snap.mode.as_deref(), Some("self_funding"));
        assert_eq!(snap.domain_addresses().len(), 2);
    }

    #[test]
    fn missing_account_is_destroyed() {
        let addr = Address::new(0, [9; 32]);
        let snap =
            JobSnapshot::from_account(&addr, &owner(), None, "x", &Analyzer::new(relay()), 5)
                .unwrap();
        assert_eq!(snap.status(), Some(JobStatus::Destroyed));
        assert!(snap.domain_addresses().is_empty());
    }

    #[test]
    fn unreadable_job_data_is_unknown_not_destroyed() {
        let addr = Address::new(0, [9; 32]);
        let code_hash = job_code_hash_base64().unwrap();
        let acc = account(&addr, &code_hash, "not a boc".to_string(), 1);
        let snap = JobSnapshot::from_account(
            &addr,
            &owner(),
            Some(&acc),
            &code_hash,
            &Analyzer::new(relay()),
            5,
        );
        assert!(snap.is_none());
    }

    #[test]
    fn foreign_extension_is_skipped() {
        let addr = Address::new(0, [9; 32]);
        let acc = account(&addr, "other", "AAAA".to_string(), 1);
        let snap =
            JobSnapshot::from_account(&addr, &owner(), Some(&acc), "x", &Analyzer::new(relay()), 5);
        assert!(snap.is_none());
    }

    #[test]
    fn domain_coverage() {
        let covered = Address::new(0, [1; 32]);
        let record = DomainRecord {
            address: covered,
            name: "a.ton".to_string(),
            expires_at: chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
        };
        let mut job = JobSnapshot::destroyed(&Address::new(0, [7; 32]), &owner(), 0, 0);
        job.domains = serde_json::to_string(&vec![covered.to_string()]).unwrap();

        // destroyed jobs do not cover anything
        assert_eq!(DomainSnapshot::from_record(&record, &[job.clone()], 0).covered_by, None);

        job.status = "active".to_string();
        let snap = DomainSnapshot::from_record(&record, &[job.clone()], 0);
        assert_eq!(snap.covered_by, Some(job.address));
        assert_eq!(snap.expires_at, 1_800_000_000);
    }
}
