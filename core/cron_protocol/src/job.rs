//! # Jobs
//!
//! Assembles a job from its configuration and produces the wallet actions
//! that deploy, fund, replace and destroy it.
//!
//! Each cycle the job sends its stored message to the owner wallet. The
//! message carries an extension request whose action list pays every domain
//! and, for self-funding jobs, finally asks the relay for a top-up:
//!
//! ```text
//! job ──► wallet: 0x10 msg(wallet_call_value)
//!                  └─ ^body: 0x6578746e query_id:64 actions
//!                        ├─ 0x18 msg(domain₁, 0.005) ... 0x18 msg(domainₙ, 0.005)
//!                        └─ 0x18 msg(relay, request)        (self-funding only)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::actions::{
    encode_internal_message_body_ref, store_action_list, ActionList, ExtendedAction, SendPayment,
};
use crate::address::Address;
use crate::cell::{Cell, CellBuilder};
use crate::code::job_code;
use crate::derive::{state_init_cell, JOB_WORKCHAIN};
use crate::domain::{DomainRecord, SECONDS_IN_DAY, SECONDS_IN_YEAR};
use crate::economics::{
    cost_per_cycle, cycle_reserve, top_up_amount, wallet_call_value, FundingMode, JobEconomics,
    RELAY_REQUEST_VALUE, RENEWAL_AMOUNT, REWARD,
};
use crate::errors::{Error, Result};
use crate::state::ContractStateRecord;

/// Days between a renewal and the domain's expiry.
pub const BACKUP_DAYS: i64 = 7;
/// Value of the destroy message; the job returns its remaining balance.
pub const DESTROY_VALUE: u128 = 100_000_000;
/// Extra value attached when replacing a job, on top of the old balance.
pub const REDEPLOY_FEE: u128 = 100_000_000;

const OP_EXTENSION_ACTION: u128 = 0x6578_746e;
const OP_DEPLOY: u128 = 0x2e41_d3ac;
const OP_RELAY_REQUEST: u128 = 0x7266_7570;
const DESTROY_COMMENT: &str = "destroy";

// ─────────────────────────────────────────────────────────
// Schedule
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub next_call_time: u32,
    pub repeat_every: u32,
    /// Creation timestamp, part of the job's identity.
    pub salt: u32,
}

impl Schedule {
    pub fn new(next_call_time: u32, repeat_every: u32, salt: u32) -> Self {
        Schedule {
            next_call_time,
            repeat_every,
            salt,
        }
    }

    /// One year minus the backup window.
    pub fn default_period() -> u32 {
        (SECONDS_IN_YEAR - BACKUP_DAYS * SECONDS_IN_DAY) as u32
    }

    /// First call `BACKUP_DAYS` before the earliest expiry, salted with `now`.
    ///
    /// `None` for an empty domain list or timestamps outside the 32-bit range.
    pub fn for_domains(domains: &[DomainRecord], now: DateTime<Utc>) -> Option<Self> {
        let earliest = domains.iter().map(|d| d.expires_at).min()?;
        let first_call = earliest.timestamp() - BACKUP_DAYS * SECONDS_IN_DAY;
        Some(Schedule {
            next_call_time: u32::try_from(first_call).ok()?,
            repeat_every: Self::default_period(),
            salt: u32::try_from(now.timestamp()).ok()?,
        })
    }

    /// The schedule of an existing job, so a replacement keeps its timing.
    pub fn preserved_from(record: &ContractStateRecord) -> Self {
        Schedule {
            next_call_time: record.next_call_time,
            repeat_every: record.repeat_every,
            salt: record.salt,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// The wallet that registers the job as an extension.
    pub owner: Address,
    pub domains: Vec<Address>,
    pub schedule: Schedule,
    pub reward: u128,
    pub mode: FundingMode,
    /// Prepaid cycles; ignored by self-funding jobs.
    pub cycles: u32,
    pub relay: Option<Address>,
}

impl JobConfig {
    /// A classic job prepaid for one cycle.
    pub fn new(owner: Address, domains: Vec<Address>, schedule: Schedule) -> Self {
        JobConfig {
            owner,
            domains,
            schedule,
            reward: REWARD,
            mode: FundingMode::Classic,
            cycles: 1,
            relay: None,
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn self_funding(mut self, relay: Address) -> Self {
        self.mode = FundingMode::SelfFunding;
        self.relay = Some(relay);
        self
    }

    pub fn domain_count(&self) -> u32 {
        self.domains.len() as u32
    }

    fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::InvalidJob("no domains to renew".into()));
        }
        if u32::try_from(self.domains.len()).is_err() {
            return Err(Error::InvalidJob("too many domains".into()));
        }
        if self.mode == FundingMode::SelfFunding && self.relay.is_none() {
            return Err(Error::InvalidJob("self-funding job without a relay".into()));
        }
        if let Some(relay) = &self.relay {
            if self.domains.contains(relay) {
                return Err(Error::InvalidJob("relay listed as a domain".into()));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────

fn empty_body() -> Result<Arc<Cell>> {
    let mut b = CellBuilder::new();
    b.store_uint(0, 32)?;
    Ok(Arc::new(b.build()?))
}

/// Payment that renews one domain.
pub fn renewal_payment(domain: &Address) -> Result<SendPayment> {
    Ok(SendPayment::new(*domain, RENEWAL_AMOUNT, true, empty_body()?))
}

/// Request asking the relay to send `requested` back to the job.
pub fn relay_request(relay: &Address, requested: u128) -> Result<SendPayment> {
    let mut b = CellBuilder::new();
    b.store_uint(OP_RELAY_REQUEST, 32)?
        .store_uint(0, 64)? // query_id
        .store_coins(requested)?;
    Ok(SendPayment::new(
        *relay,
        RELAY_REQUEST_VALUE,
        true,
        Arc::new(b.build()?),
    ))
}

/// Actions the wallet performs each cycle; the relay request comes last.
pub fn cycle_actions(config: &JobConfig) -> Result<ActionList> {
    let mut actions = ActionList::new();
    for domain in &config.domains {
        actions.primary.push(renewal_payment(domain)?);
    }
    if let (FundingMode::SelfFunding, Some(relay)) = (config.mode, &config.relay) {
        actions
            .primary
            .push(relay_request(relay, cycle_reserve(config.domain_count()))?);
    }
    Ok(actions)
}

/// The message a job sends to its owner wallet every cycle.
pub fn job_message(config: &JobConfig) -> Result<Arc<Cell>> {
    let mut body = CellBuilder::new();
    body.store_uint(OP_EXTENSION_ACTION, 32)?.store_uint(0, 64)?; // query_id
    store_action_list(&mut body, &cycle_actions(config)?)?;
    let body = Arc::new(body.build()?);

    let value = wallet_call_value(config.domain_count(), config.mode);
    Ok(Arc::new(encode_internal_message_body_ref(
        &config.owner,
        value,
        false,
        &body,
    )?))
}

// ─────────────────────────────────────────────────────────
// Deployment
// ─────────────────────────────────────────────────────────

/// Everything needed to deploy a configured job.
#[derive(Debug, Clone)]
pub struct JobDeployment {
    pub address: Address,
    pub state_init: Arc<Cell>,
    pub data: Arc<Cell>,
    pub deploy_body: Arc<Cell>,
    pub deploy_amount: u128,
    pub economics: JobEconomics,
}

pub fn build_job(config: &JobConfig) -> Result<JobDeployment> {
    config.validate()?;

    let record = ContractStateRecord::new(
        config.owner,
        config.schedule.next_call_time,
        config.schedule.repeat_every,
        config.schedule.salt,
        config.reward,
        job_message(config)?,
    );
    let data = Arc::new(record.encode()?);
    let state_init = Arc::new(state_init_cell(&job_code()?, &data)?);
    let address = Address::new(JOB_WORKCHAIN, state_init.hash());

    let mut deploy_body = CellBuilder::new();
    deploy_body.store_uint(OP_DEPLOY, 32)?;

    let economics = JobEconomics::new(config.mode, config.domain_count(), config.cycles);
    debug!(
        %address,
        domains = config.domains.len(),
        mode = %config.mode,
        "built job"
    );

    Ok(JobDeployment {
        address,
        state_init,
        data,
        deploy_body: Arc::new(deploy_body.build()?),
        deploy_amount: economics.initial_funding,
        economics,
    })
}

fn deploy_payment(job: &JobDeployment, amount: u128) -> SendPayment {
    SendPayment::new(job.address, amount, true, job.deploy_body.clone())
        .with_init(job.state_init.clone())
}

fn destroy_payment(job: &Address) -> Result<SendPayment> {
    let mut b = CellBuilder::new();
    b.store_uint(0, 32)?.store_string_tail(DESTROY_COMMENT)?;
    Ok(SendPayment::new(
        *job,
        DESTROY_VALUE,
        false,
        Arc::new(b.build()?),
    ))
}

/// Deploy the job with its initial funding and register it as an extension.
pub fn deploy_actions(job: &JobDeployment) -> ActionList {
    ActionList {
        primary: vec![deploy_payment(job, job.deploy_amount)],
        extended: vec![ExtendedAction::AddExtension(job.address)],
    }
}

/// Destroy the job and revoke its extension.
pub fn destroy_actions(job: &Address) -> Result<ActionList> {
    Ok(ActionList {
        primary: vec![destroy_payment(job)?],
        extended: vec![ExtendedAction::RemoveExtension(*job)],
    })
}

/// Fund `cycles` more cycles of a job renewing `domain_count` domains.
pub fn top_up_actions(
    job: &Address,
    domain_count: u32,
    mode: FundingMode,
    cycles: u32,
) -> Result<ActionList> {
    let amount = top_up_amount(domain_count, mode, cycles);
    Ok(ActionList {
        primary: vec![SendPayment::new(*job, amount, true, empty_body()?)],
        extended: Vec::new(),
    })
}

/// Replace `old` by `new` in one request.
///
/// The old job refunds its balance on destruction, so the new one is funded
/// with that balance plus [`REDEPLOY_FEE`].
pub fn redeploy_actions(
    old: &Address,
    old_balance: u128,
    new: &JobDeployment,
) -> Result<ActionList> {
    Ok(ActionList {
        primary: vec![
            destroy_payment(old)?,
            deploy_payment(new, old_balance + REDEPLOY_FEE),
        ],
        extended: vec![
            ExtendedAction::RemoveExtension(*old),
            ExtendedAction::AddExtension(new.address),
        ],
    })
}

/// Whether a job with `balance` can run its next cycle.
pub fn is_funded(balance: u128, domain_count: u32, mode: FundingMode) -> bool {
    balance >= cost_per_cycle(domain_count, mode)
}
