use std::sync::Arc;

use crate::actions::{encode_action_list, encode_out_list, ActionList, SendPayment};
use crate::address::Address;
use crate::analyzer::{analyze, analyze_boc, Analysis, Analyzer};
use crate::boc;
use crate::cell::{Cell, CellBuilder};
use crate::job::{job_message, relay_request, renewal_payment, JobConfig, Schedule};

fn a() -> Address {
    Address::new(0, [0xA1; 32])
}

fn b() -> Address {
    Address::new(0, [0xB2; 32])
}

fn c() -> Address {
    Address::new(0, [0xC3; 32])
}

fn relay() -> Address {
    Address::new(0, [0xEE; 32])
}

fn owner() -> Address {
    Address::new(0, [0x0F; 32])
}

fn renewals(domains: &[Address]) -> Vec<SendPayment> {
    domains.iter().map(|d| renewal_payment(d).unwrap()).collect()
}

fn config(domains: Vec<Address>) -> JobConfig {
    JobConfig::new(owner(), domains, Schedule::new(1_000, 2_000, 777))
}

fn wrap(inner: Arc<Cell>) -> Arc<Cell> {
    let mut w = CellBuilder::new();
    w.store_bit(true).unwrap().store_ref(inner).unwrap();
    Arc::new(w.build().unwrap())
}

#[test]
fn test_classic_job_message_lists_domains_in_order() {
    let message = job_message(&config(vec![a(), b(), c()])).unwrap();
    let analysis = analyze(&message, &relay());
    assert_eq!(
        analysis,
        Analysis {
            domains: vec![a(), b(), c()],
            self_funding: false,
            truncated_branches: 0,
        }
    );
}

#[test]
fn test_self_funding_job_flags_relay_and_excludes_it() {
    let message = job_message(&config(vec![a(), b(), c()]).self_funding(relay())).unwrap();
    let analysis = analyze(&message, &relay());
    assert!(analysis.self_funding);
    assert_eq!(analysis.domains, vec![a(), b(), c()]);
}

#[test]
fn test_relay_anywhere_in_the_list_is_detected() {
    let mut list = ActionList::new();
    list.primary = renewals(&[a(), b(), c()]);
    list.primary.insert(1, relay_request(&relay(), 1).unwrap());
    let root = Arc::new(encode_action_list(&list).unwrap());

    let analysis = analyze(&root, &relay());
    assert!(analysis.self_funding);
    assert_eq!(analysis.domains, vec![a(), b(), c()]);
}

#[test]
fn test_duplicate_destination_in_two_subtrees() {
    let first = encode_out_list(&renewals(&[a(), b()])).unwrap();
    let second = encode_out_list(&renewals(&[a(), c()])).unwrap();
    let mut root = CellBuilder::new();
    root.store_ref(first).unwrap().store_ref(second).unwrap();
    let root = Arc::new(root.build().unwrap());

    assert_eq!(analyze(&root, &relay()).domains, vec![a(), b(), c()]);
}

#[test]
fn test_same_destination_twice_in_one_list() {
    let root = encode_out_list(&renewals(&[a(), b(), a()])).unwrap();
    assert_eq!(analyze(&root, &relay()).domains, vec![a(), b()]);
}

#[test]
fn test_empty_action_list() {
    let root = Arc::new(encode_action_list(&ActionList::new()).unwrap());
    assert_eq!(analyze(&root, &relay()), Analysis::default());
}

#[test]
fn test_garbage_bytes_yield_empty_analysis() {
    for input in [&b""[..], &[0xFF; 64][..], &[0xB5, 0xEE, 0x9C, 0x72, 0x01][..]] {
        assert_eq!(analyze_boc(input, &relay()), Analysis::default());
    }
}

#[test]
fn test_non_bounceable_messages_are_opaque() {
    let msg = crate::actions::encode_internal_message(
        &a(),
        1,
        false,
        None,
        &Arc::new(Cell::empty()),
    )
    .unwrap();
    assert!(analyze(&wrap(Arc::new(msg)), &relay()).domains.is_empty());
}

#[test]
fn test_root_message_is_not_a_renewal() {
    let to_owner = crate::actions::encode_internal_message(
        &owner(),
        1,
        true,
        None,
        &Arc::new(Cell::empty()),
    )
    .map(Arc::new)
    .unwrap();
    assert_eq!(analyze(&to_owner, &relay()), Analysis::default());

    // The same message one level down is a renewal.
    assert_eq!(analyze(&wrap(to_owner), &relay()).domains, vec![owner()]);
}

#[test]
fn test_depth_cap_truncates_branch() {
    let mut tree = encode_out_list(&renewals(&[a()])).unwrap();
    for _ in 0..5 {
        tree = wrap(tree);
    }

    let full = Analyzer::new(relay()).analyze(&tree);
    assert_eq!(full.domains, vec![a()]);
    assert_eq!(full.truncated_branches, 0);

    let capped = Analyzer::new(relay()).with_max_depth(2).analyze(&tree);
    assert!(capped.domains.is_empty());
    assert_eq!(capped.truncated_branches, 1);
}

#[test]
fn test_cap_only_stops_the_deep_branch() {
    let mut deep = encode_out_list(&renewals(&[a()])).unwrap();
    for _ in 0..4 {
        deep = wrap(deep);
    }
    let shallow = encode_out_list(&renewals(&[b()])).unwrap();
    let mut root = CellBuilder::new();
    root.store_ref(deep).unwrap().store_ref(shallow).unwrap();
    let root = Arc::new(root.build().unwrap());

    let capped = Analyzer::new(relay()).with_max_depth(3).analyze(&root);
    assert_eq!(capped.domains, vec![b()]);
    assert_eq!(capped.truncated_branches, 1);
}

#[test]
fn test_shared_subtree_behind_the_cap_is_found_on_a_shallow_path() {
    let shared = encode_out_list(&renewals(&[a()])).unwrap();
    let mut root = CellBuilder::new();
    root.store_ref(wrap(wrap(shared.clone())))
        .unwrap()
        .store_ref(shared)
        .unwrap();
    let root = Arc::new(root.build().unwrap());

    let capped = Analyzer::new(relay()).with_max_depth(3).analyze(&root);
    assert_eq!(capped.domains, vec![a()]);
    assert_eq!(capped.truncated_branches, 1);
}

#[test]
fn test_serialized_job_data_round_trip() {
    let job = crate::job::build_job(&config(vec![c(), a()]).self_funding(relay())).unwrap();
    let record = crate::state::ContractStateRecord::decode_boc(&boc::encode(&job.data)).unwrap();
    let analysis = analyze(&record.message, &relay());
    assert_eq!(analysis.domains, vec![c(), a()]);
    assert!(analysis.self_funding);

    let from_bytes = analyze_boc(&boc::encode(&record.message), &relay());
    assert_eq!(from_bytes, analysis);
}
