use std::sync::Arc;

use crate::actions::ExtendedAction;
use crate::address::Address;
use crate::boc;
use crate::code::job_code;
use crate::derive::derive_address;
use crate::economics::{FundingMode, DEPLOYMENT_FEE};
use crate::errors::Error;
use crate::job::{
    build_job, deploy_actions, destroy_actions, redeploy_actions, top_up_actions, JobConfig,
    Schedule, REDEPLOY_FEE,
};
use crate::state::ContractStateRecord;
use crate::wallet::{request_body, RequestKind, DEFAULT_WALLET_ID};

fn owner() -> Address {
    Address::new(0, [0x0F; 32])
}

fn domains(n: u8) -> Vec<Address> {
    (1..=n).map(|i| Address::new(0, [i; 32])).collect()
}

fn schedule() -> Schedule {
    Schedule::new(1_750_000_000, Schedule::default_period(), 1_700_000_000)
}

#[test]
fn test_classic_three_domains_one_cycle() {
    let job = build_job(&JobConfig::new(owner(), domains(3), schedule())).unwrap();

    assert_eq!(job.economics.cost_per_cycle, 46_900_000);
    assert_eq!(job.deploy_amount, 146_900_000);
    assert_eq!(job.economics.wallet_call_value, 26_300_000);

    let record = ContractStateRecord::decode(&job.data).unwrap();
    assert!(!record.initialized);
    assert_eq!(record.owner, owner());
    assert_eq!(record.next_call_time, 1_750_000_000);
    assert_eq!(record.salt, 1_700_000_000);

    let mut msg = record.message.parse();
    assert_eq!(msg.load_uint(6).unwrap(), 0x10);
    assert_eq!(msg.load_address().unwrap(), owner());
    assert_eq!(msg.load_coins().unwrap(), 26_300_000);
}

#[test]
fn test_address_matches_state_init() {
    let job = build_job(&JobConfig::new(owner(), domains(2), schedule())).unwrap();
    assert_eq!(job.address, derive_address(&job_code().unwrap(), &job.data).unwrap());
    assert_eq!(job.state_init.refs().len(), 2);
}

#[test]
fn test_constant_salt_gives_same_address() {
    let first = build_job(&JobConfig::new(owner(), domains(2), schedule())).unwrap();
    let again = build_job(&JobConfig::new(owner(), domains(2), schedule())).unwrap();
    assert_eq!(first.address, again.address);

    let mut later = schedule();
    later.salt += 1;
    let other = build_job(&JobConfig::new(owner(), domains(2), later)).unwrap();
    assert_ne!(first.address, other.address);
}

#[test]
fn test_domain_set_changes_address() {
    let two = build_job(&JobConfig::new(owner(), domains(2), schedule())).unwrap();
    let three = build_job(&JobConfig::new(owner(), domains(3), schedule())).unwrap();
    assert_ne!(two.address, three.address);
}

#[test]
fn test_cycles_scale_classic_funding() {
    let one = build_job(&JobConfig::new(owner(), domains(3), schedule())).unwrap();
    let three = build_job(&JobConfig::new(owner(), domains(3), schedule()).with_cycles(3)).unwrap();
    assert_eq!(
        three.deploy_amount - DEPLOYMENT_FEE,
        3 * (one.deploy_amount - DEPLOYMENT_FEE)
    );
    // cycles are not part of the stored data
    assert_eq!(one.address, three.address);
}

#[test]
fn test_invalid_configs() {
    let empty = JobConfig::new(owner(), Vec::new(), schedule());
    assert!(matches!(build_job(&empty), Err(Error::InvalidJob(_))));

    let mut no_relay = JobConfig::new(owner(), domains(1), schedule());
    no_relay.mode = FundingMode::SelfFunding;
    assert!(matches!(build_job(&no_relay), Err(Error::InvalidJob(_))));

    let relay = Address::new(0, [1; 32]);
    let relay_as_domain = JobConfig::new(owner(), domains(1), schedule()).self_funding(relay);
    assert!(matches!(build_job(&relay_as_domain), Err(Error::InvalidJob(_))));
}

#[test]
fn test_deploy_actions_carry_state_init_and_extension() {
    let job = build_job(&JobConfig::new(owner(), domains(1), schedule())).unwrap();
    let actions = deploy_actions(&job);
    assert_eq!(actions.primary.len(), 1);
    let deploy = &actions.primary[0];
    assert_eq!(deploy.dest, job.address);
    assert_eq!(deploy.amount, job.deploy_amount);
    assert_eq!(deploy.init.as_ref().map(|i| i.hash()), Some(job.state_init.hash()));
    assert_eq!(actions.extended, vec![ExtendedAction::AddExtension(job.address)]);

    // The whole request must still fit the wallet's layout.
    let body = request_body(
        RequestKind::ExternalSigned,
        DEFAULT_WALLET_ID,
        1_700_003_600,
        5,
        &actions,
    )
    .unwrap();
    assert!(boc::decode(&boc::encode(&body)).is_ok());
}

#[test]
fn test_destroy_and_top_up() {
    let job = Address::new(0, [0x77; 32]);
    let destroy = destroy_actions(&job).unwrap();
    assert!(!destroy.primary[0].bounce);
    assert_eq!(destroy.extended, vec![ExtendedAction::RemoveExtension(job)]);

    let top_up = top_up_actions(&job, 3, FundingMode::Classic, 2).unwrap();
    assert_eq!(top_up.primary[0].amount, 2 * 46_900_000);
    assert!(top_up.extended.is_empty());
}

#[test]
fn test_redeploy_preserves_schedule() {
    let old = build_job(&JobConfig::new(owner(), domains(2), schedule())).unwrap();
    let old_record = ContractStateRecord::decode(&old.data).unwrap();

    let new_config = JobConfig::new(owner(), domains(3), Schedule::preserved_from(&old_record));
    let new = build_job(&new_config).unwrap();
    let new_record = ContractStateRecord::decode(&new.data).unwrap();
    assert_eq!(new_record.salt, old_record.salt);
    assert_eq!(new_record.next_call_time, old_record.next_call_time);
    assert_eq!(new_record.repeat_every, old_record.repeat_every);

    let actions = redeploy_actions(&old.address, 50_000_000, &new).unwrap();
    assert_eq!(actions.primary[0].dest, old.address);
    assert_eq!(actions.primary[1].dest, new.address);
    assert_eq!(actions.primary[1].amount, 50_000_000 + REDEPLOY_FEE);
    assert_eq!(
        actions.extended,
        vec![
            ExtendedAction::RemoveExtension(old.address),
            ExtendedAction::AddExtension(new.address),
        ]
    );
}

#[test]
fn test_job_data_survives_boc_transport() {
    let job = build_job(&JobConfig::new(owner(), domains(4), schedule())).unwrap();
    let text = boc::encode_base64(&job.data);
    let record = ContractStateRecord::try_from_base64(&text).unwrap();
    assert_eq!(Arc::new(record.encode().unwrap()).hash(), job.data.hash());
}
