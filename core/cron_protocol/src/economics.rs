//! # Economics
//!
//! Fee estimates for a job renewing `n` domains. All amounts are nano-units
//! (1 TON = 10⁹). Estimates are fixed upper bounds; live gas prices are not
//! consulted.
//!
//! | Component             | Base        | Per domain |
//! |-----------------------|-------------|------------|
//! | job storage           | 0.005       | 0.0005     |
//! | job compute           | 0.005       | 0.0003     |
//! | wallet compute        | 0.003       | 0.0006     |
//! | job forwarding        | 0.002       | 0.0004     |
//! | wallet forwarding     | 0.002       | 0.0005     |
//! | renewal (fee + value) | 0           | 0.001 + 0.005 |
//!
//! ## Funding modes
//!
//! * [`FundingMode::Classic`] prepays whole cycles:
//!   `cost_per_cycle · cycles + DEPLOYMENT_FEE`.
//! * [`FundingMode::SelfFunding`] keeps one cycle in reserve and asks the
//!   relay for a top-up each cycle. Storage and forwarding are reserved twice
//!   so the job can still afford the request after paying for its own cycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const NANO_PER_TON: u128 = 1_000_000_000;

/// Paid to the executor that triggers the job.
pub const REWARD: u128 = 5_000_000;
/// Value sent to each domain to renew it.
pub const RENEWAL_AMOUNT: u128 = 5_000_000;
/// Per-domain fee headroom the wallet spends relaying a renewal.
pub const RENEWAL_RELAY_FEE: u128 = 1_000_000;
/// One-off cost of deploying a job and registering it as an extension.
pub const DEPLOYMENT_FEE: u128 = 100_000_000;
/// Value attached to the top-up request sent to the relay.
pub const RELAY_REQUEST_VALUE: u128 = 2_000_000;

const STORAGE_BASE: u128 = 5_000_000;
const STORAGE_PER_DOMAIN: u128 = 500_000;
const COMPUTE_BASE: u128 = 5_000_000;
const COMPUTE_PER_DOMAIN: u128 = 300_000;
const WALLET_COMPUTE_BASE: u128 = 3_000_000;
const WALLET_COMPUTE_PER_DOMAIN: u128 = 600_000;
const FORWARD_BASE: u128 = 2_000_000;
const FORWARD_PER_DOMAIN: u128 = 400_000;
const WALLET_FORWARD_BASE: u128 = 2_000_000;
const WALLET_FORWARD_PER_DOMAIN: u128 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    Classic,
    SelfFunding,
}

impl FundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::SelfFunding => "self_funding",
        }
    }

    /// Mode implied by whether the relay appears in a job's message tree.
    pub fn from_relay_seen(self_funding: bool) -> Self {
        if self_funding {
            Self::SelfFunding
        } else {
            Self::Classic
        }
    }
}

impl fmt::Display for FundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "self_funding" | "self-funding" => Ok(Self::SelfFunding),
            other => Err(format!("unknown funding mode: {other}")),
        }
    }
}

fn linear(base: u128, per_domain: u128, n: u32) -> u128 {
    base + per_domain * n as u128
}

pub fn storage_fee(n: u32) -> u128 {
    linear(STORAGE_BASE, STORAGE_PER_DOMAIN, n)
}

pub fn compute_fee(n: u32) -> u128 {
    linear(COMPUTE_BASE, COMPUTE_PER_DOMAIN, n)
}

pub fn wallet_compute_fee(n: u32) -> u128 {
    linear(WALLET_COMPUTE_BASE, WALLET_COMPUTE_PER_DOMAIN, n)
}

/// Forwarding fee of the job's own outgoing message.
pub fn forward_fee(n: u32) -> u128 {
    linear(FORWARD_BASE, FORWARD_PER_DOMAIN, n)
}

pub fn wallet_forward_fee(n: u32) -> u128 {
    linear(WALLET_FORWARD_BASE, WALLET_FORWARD_PER_DOMAIN, n)
}

pub fn forward_fees(n: u32) -> u128 {
    forward_fee(n) + wallet_forward_fee(n)
}

pub fn renewal_budget(n: u32) -> u128 {
    (RENEWAL_RELAY_FEE + RENEWAL_AMOUNT) * n as u128
}

/// Everything one Classic cycle consumes.
pub fn classic_cost_per_cycle(n: u32) -> u128 {
    storage_fee(n)
        + compute_fee(n)
        + wallet_compute_fee(n)
        + forward_fees(n)
        + renewal_budget(n)
        + REWARD
}

/// Balance a self-funding job must hold at the start of every cycle.
pub fn cycle_reserve(n: u32) -> u128 {
    2 * (storage_fee(n) + forward_fee(n)) + compute_fee(n) + REWARD + wallet_compute_fee(n)
}

/// Balance a job of `mode` needs per cycle; below it the job is dormant.
pub fn cost_per_cycle(n: u32, mode: FundingMode) -> u128 {
    match mode {
        FundingMode::Classic => classic_cost_per_cycle(n),
        FundingMode::SelfFunding => cycle_reserve(n),
    }
}

/// Value of the deployment transfer. `cycles` is ignored for self-funding jobs.
pub fn initial_funding(n: u32, mode: FundingMode, cycles: u32) -> u128 {
    let amount = match mode {
        FundingMode::Classic => classic_cost_per_cycle(n) * cycles as u128 + DEPLOYMENT_FEE,
        FundingMode::SelfFunding => cycle_reserve(n) + DEPLOYMENT_FEE,
    };
    debug_assert!(amount >= DEPLOYMENT_FEE, "funding below the deployment fee");
    amount
}

/// Value the job attaches to its message to the wallet each cycle.
///
/// The job has already paid its own storage, compute, forwarding and reward
/// by the time it sends. A self-funding wallet pays renewals from its own
/// balance and additionally forwards the relay request.
pub fn wallet_call_value(n: u32, mode: FundingMode) -> u128 {
    let base = wallet_compute_fee(n) + wallet_forward_fee(n);
    match mode {
        FundingMode::Classic => base + renewal_budget(n),
        FundingMode::SelfFunding => base + RELAY_REQUEST_VALUE,
    }
}

/// Amount to send for `cycles` more cycles of an existing job.
pub fn top_up_amount(n: u32, mode: FundingMode, cycles: u32) -> u128 {
    cost_per_cycle(n, mode) * cycles as u128
}

/// Whole cycles the current balance still covers.
pub fn runway_cycles(balance: u128, n: u32, mode: FundingMode) -> u128 {
    balance / cost_per_cycle(n, mode)
}

/// Render nano-units as a decimal TON amount, e.g. `0.105`.
pub fn format_ton(amount: u128) -> String {
    let whole = amount / NANO_PER_TON;
    let frac = amount % NANO_PER_TON;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:09}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Derived cost summary for a job of `domain_count` domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEconomics {
    pub mode: FundingMode,
    pub domain_count: u32,
    pub cycles: u32,
    #[serde(with = "amount_string")]
    pub cost_per_cycle: u128,
    #[serde(with = "amount_string")]
    pub initial_funding: u128,
    #[serde(with = "amount_string")]
    pub wallet_call_value: u128,
}

impl JobEconomics {
    pub fn new(mode: FundingMode, domain_count: u32, cycles: u32) -> Self {
        JobEconomics {
            mode,
            domain_count,
            cycles,
            cost_per_cycle: cost_per_cycle(domain_count, mode),
            initial_funding: initial_funding(domain_count, mode, cycles),
            wallet_call_value: wallet_call_value(domain_count, mode),
        }
    }
}

/// Amounts travel as decimal strings; JSON numbers cannot hold every `u128`.
pub mod amount_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
