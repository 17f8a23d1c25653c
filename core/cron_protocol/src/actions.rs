//! # Action lists
//!
//! A wallet request carries two ordered lists:
//!
//! * **primary** actions: outgoing messages, serialized as an out-list:
//!
//!   ```text
//!   out_list_empty$_ = OutList 0;
//!   out_list$_ prev:^(OutList n) action:OutAction = OutList (n + 1);
//!   action_send_msg#0ec3c86d mode:(## 8) out_msg:^(MessageRelaxed Any) = OutAction;
//!   ```
//!
//!   The first action ends up deepest in the chain, which is also the order
//!   the wallet executes them in.
//!
//! * **extended** actions: extension grants and revocations:
//!
//!   ```text
//!   action_add_ext#02 addr:MsgAddressInt = ExtendedAction;
//!   action_delete_ext#03 addr:MsgAddressInt = ExtendedAction;
//!   ```
//!
//! The list itself is `Maybe ^OutList`, a bit flagging extended actions, the
//! first extended action inline and the remaining ones in a reference chain.
//!
//! There is no generic decoder: consumers only need facts recovered by
//! [`crate::analyzer`].

use std::sync::Arc;

use serde::Serialize;

use crate::address::Address;
use crate::cell::{Cell, CellBuilder};
use crate::errors::Result;

const OP_SEND_MSG: u128 = 0x0ec3_c86d;
const OP_ADD_EXTENSION: u128 = 0x02;
const OP_REMOVE_EXTENSION: u128 = 0x03;

/// Sender pays forwarding fees separately from the message value.
pub const SEND_MODE_PAY_GAS_SEPARATELY: u8 = 1;
/// Errors while processing the action do not abort the whole action phase.
pub const SEND_MODE_IGNORE_ERRORS: u8 = 2;
/// Mode used for every outgoing payment.
pub const SEND_MODE: u8 = SEND_MODE_PAY_GAS_SEPARATELY | SEND_MODE_IGNORE_ERRORS;

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

/// An outgoing internal message with a fixed send mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPayment {
    pub dest: Address,
    pub amount: u128,
    pub bounce: bool,
    pub body: Arc<Cell>,
    /// `StateInit` attached to deploy the destination.
    pub init: Option<Arc<Cell>>,
}

impl SendPayment {
    pub fn new(dest: Address, amount: u128, bounce: bool, body: Arc<Cell>) -> Self {
        SendPayment {
            dest,
            amount,
            bounce,
            body,
            init: None,
        }
    }

    pub fn with_init(mut self, init: Arc<Cell>) -> Self {
        self.init = Some(init);
        self
    }

    pub fn mode(&self) -> u8 {
        SEND_MODE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "address", rename_all = "snake_case")]
pub enum ExtendedAction {
    AddExtension(Address),
    RemoveExtension(Address),
}

/// Any action a wallet request can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendPayment(SendPayment),
    Extended(ExtendedAction),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionList {
    pub primary: Vec<SendPayment>,
    pub extended: Vec<ExtendedAction>,
}

impl ActionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        match action {
            Action::SendPayment(p) => self.primary.push(p),
            Action::Extended(e) => self.extended.push(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.extended.is_empty()
    }
}

impl FromIterator<Action> for ActionList {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut list = ActionList::new();
        for action in iter {
            list.push(action);
        }
        list
    }
}

// ─────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────

/// `int_msg_info$0` message with an empty source, zero fees and timestamps.
///
/// The state init and body go inline when they fit in the remaining space and
/// into references otherwise.
pub fn encode_internal_message(
    dest: &Address,
    amount: u128,
    bounce: bool,
    init: Option<&Arc<Cell>>,
    body: &Arc<Cell>,
) -> Result<Cell> {
    encode_message(dest, amount, bounce, init, body, false)
}

/// Like [`encode_internal_message`] without a state init, always placing the
/// body in a reference.
pub fn encode_internal_message_body_ref(
    dest: &Address,
    amount: u128,
    bounce: bool,
    body: &Arc<Cell>,
) -> Result<Cell> {
    encode_message(dest, amount, bounce, None, body, true)
}

fn encode_message(
    dest: &Address,
    amount: u128,
    bounce: bool,
    init: Option<&Arc<Cell>>,
    body: &Arc<Cell>,
    body_ref: bool,
) -> Result<Cell> {
    let mut b = CellBuilder::new();
    b.store_bit(false)? // int_msg_info$0
        .store_bit(true)? // ihr_disabled
        .store_bit(bounce)?
        .store_bit(false)? // bounced
        .store_address_none()? // src
        .store_address(dest)?
        .store_coins(amount)?
        .store_bit(false)? // extra currencies
        .store_coins(0)? // ihr_fee
        .store_coins(0)? // fwd_fee
        .store_uint(0, 64)? // created_lt
        .store_uint(0, 32)?; // created_at

    match init {
        None => {
            b.store_bit(false)?;
        }
        Some(init) => {
            b.store_bit(true)?;
            // Two bits for the init/body either-flags.
            let inline = b.available_bits() >= init.bit_len() + body.bit_len() + 2
                && b.available_refs() >= init.refs().len() + body.refs().len();
            if inline {
                b.store_bit(false)?.store_cell_contents(init)?;
            } else {
                b.store_bit(true)?.store_ref(init.clone())?;
            }
        }
    }

    let inline_body = !body_ref
        && b.available_bits() > body.bit_len()
        && b.available_refs() >= body.refs().len();
    if inline_body {
        b.store_bit(false)?.store_cell_contents(body)?;
    } else {
        b.store_bit(true)?.store_ref(body.clone())?;
    }
    b.build()
}

/// Encode a payment as its relaxed internal message.
pub fn encode_send_payment(payment: &SendPayment) -> Result<Cell> {
    encode_internal_message(
        &payment.dest,
        payment.amount,
        payment.bounce,
        payment.init.as_ref(),
        &payment.body,
    )
}

/// Out-list chain; the first payment is the deepest node.
pub fn encode_out_list(payments: &[SendPayment]) -> Result<Arc<Cell>> {
    let mut list = Arc::new(Cell::empty());
    for payment in payments {
        let message = Arc::new(encode_send_payment(payment)?);
        let mut b = CellBuilder::new();
        b.store_ref(list)?
            .store_uint(OP_SEND_MSG, 32)?
            .store_uint(payment.mode() as u128, 8)?
            .store_ref(message)?;
        list = Arc::new(b.build()?);
    }
    Ok(list)
}

fn store_extended_action(b: &mut CellBuilder, action: &ExtendedAction) -> Result<()> {
    match action {
        ExtendedAction::AddExtension(addr) => {
            b.store_uint(OP_ADD_EXTENSION, 8)?.store_address(addr)?;
        }
        ExtendedAction::RemoveExtension(addr) => {
            b.store_uint(OP_REMOVE_EXTENSION, 8)?.store_address(addr)?;
        }
    }
    Ok(())
}

/// Write the action list into an existing builder (request bodies embed it
/// after their own header fields).
pub fn store_action_list(b: &mut CellBuilder, actions: &ActionList) -> Result<()> {
    let out_list = if actions.primary.is_empty() {
        None
    } else {
        Some(encode_out_list(&actions.primary)?)
    };
    b.store_maybe_ref(out_list)?;

    let Some((first, rest)) = actions.extended.split_first() else {
        b.store_bit(false)?;
        return Ok(());
    };
    b.store_bit(true)?;
    store_extended_action(b, first)?;

    // Build the tail chain back to front so each node can reference the next.
    let mut next: Option<Arc<Cell>> = None;
    for action in rest.iter().rev() {
        let mut node = CellBuilder::new();
        store_extended_action(&mut node, action)?;
        if let Some(cell) = next.take() {
            node.store_ref(cell)?;
        }
        next = Some(Arc::new(node.build()?));
    }
    if let Some(cell) = next {
        b.store_ref(cell)?;
    }
    Ok(())
}

/// Encode the action list as a standalone cell.
pub fn encode_action_list(actions: &ActionList) -> Result<Cell> {
    let mut b = CellBuilder::new();
    store_action_list(&mut b, actions)?;
    b.build()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new(0, [byte; 32])
    }

    fn zero_body() -> Arc<Cell> {
        let mut b = CellBuilder::new();
        b.store_uint(0, 32).unwrap();
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn bounceable_message_starts_with_0x18() {
        let msg = encode_internal_message(&addr(1), 5_000_000, true, None, &zero_body()).unwrap();
        let mut s = msg.parse();
        assert_eq!(s.load_uint(6).unwrap(), 0x18);
        assert_eq!(s.load_address().unwrap(), addr(1));
        assert_eq!(s.load_coins().unwrap(), 5_000_000);
        // body fits inline
        assert!(msg.refs().is_empty());
    }

    #[test]
    fn non_bounceable_message_starts_with_0x10() {
        let msg = encode_internal_message(&addr(1), 1, false, None, &zero_body()).unwrap();
        assert_eq!(msg.parse().load_uint(6).unwrap(), 0x10);
    }

    #[test]
    fn large_body_goes_into_a_ref() {
        let mut body = CellBuilder::new();
        body.store_bytes(&[0u8; 100]).unwrap();
        let body = Arc::new(body.build().unwrap());
        let msg = encode_internal_message(&addr(2), 1, true, None, &body).unwrap();
        assert_eq!(msg.refs().len(), 1);
        assert_eq!(msg.refs()[0].hash(), body.hash());
    }

    #[test]
    fn out_list_preserves_order_deepest_first() {
        let payments: Vec<_> = (1..=3)
            .map(|i| SendPayment::new(addr(i), 1, true, zero_body()))
            .collect();
        let list = encode_out_list(&payments).unwrap();

        // Walk from the top: last action first.
        let mut node = list;
        let mut seen = Vec::new();
        while !node.refs().is_empty() {
            let mut s = node.parse();
            let prev = s.load_ref().unwrap();
            assert_eq!(s.load_uint(32).unwrap(), OP_SEND_MSG);
            assert_eq!(s.load_uint(8).unwrap(), SEND_MODE as u128);
            let msg = s.load_ref().unwrap();
            let mut m = msg.parse();
            m.load_uint(6).unwrap();
            seen.push(m.load_address().unwrap());
            node = prev;
        }
        seen.reverse();
        assert_eq!(seen, vec![addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn empty_list_is_two_zero_bits() {
        let cell = encode_action_list(&ActionList::new()).unwrap();
        assert_eq!(cell.bit_len(), 2);
        assert_eq!(cell.parse().load_uint(2).unwrap(), 0);
        assert!(cell.refs().is_empty());
    }

    #[test]
    fn extended_actions_chain_after_the_first() {
        let actions: ActionList = [
            Action::Extended(ExtendedAction::RemoveExtension(addr(9))),
            Action::Extended(ExtendedAction::AddExtension(addr(8))),
            Action::Extended(ExtendedAction::AddExtension(addr(7))),
        ]
        .into_iter()
        .collect();
        let cell = encode_action_list(&actions).unwrap();
        let mut s = cell.parse();
        assert!(!s.load_bit().unwrap());
        assert!(s.load_bit().unwrap());
        assert_eq!(s.load_uint(8).unwrap(), OP_REMOVE_EXTENSION);
        assert_eq!(s.load_address().unwrap(), addr(9));

        let second = s.load_ref().unwrap();
        let mut s = second.parse();
        assert_eq!(s.load_uint(8).unwrap(), OP_ADD_EXTENSION);
        assert_eq!(s.load_address().unwrap(), addr(8));
        let third = s.load_ref().unwrap();
        let mut s = third.parse();
        assert_eq!(s.load_uint(8).unwrap(), OP_ADD_EXTENSION);
        assert_eq!(s.load_address().unwrap(), addr(7));
        assert!(third.refs().is_empty());
    }

    #[test]
    fn state_init_is_attached() {
        let init = Arc::new(Cell::empty());
        let payment = SendPayment::new(addr(3), 10, true, zero_body()).with_init(init);
        let msg = encode_send_payment(&payment).unwrap();
        let mut s = msg.parse();
        s.load_uint(6).unwrap();
        s.load_address().unwrap();
        s.load_coins().unwrap();
        s.load_bit().unwrap();
        s.load_coins().unwrap();
        s.load_coins().unwrap();
        s.load_uint(96).unwrap();
        assert!(s.load_bit().unwrap(), "init present");
        assert!(!s.load_bit().unwrap(), "init inline");
    }
}
