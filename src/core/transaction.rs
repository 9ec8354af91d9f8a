// A transaction moves `amount` coins from sender to receiver by consuming
// whole UTXOs and emitting exactly two new ones: change back to the sender
// and the payment to the receiver.

use crate::error::{NoobcashError, Result};
use crate::utils::{canonical_hash, ecdsa_p256_sha256_sign_verify, hex_decode};
use crate::wallet::KeyPair;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender address of the genesis transaction.
pub const GENESIS_SENDER: &str = "0";

const CHANGE_OUTPUT: usize = 0;
const PAYMENT_OUTPUT: usize = 1;

/// An unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    pub id: String,
    pub transaction_id: String,
    pub recipient: String,
    pub value: u64,
}

impl Utxo {
    pub fn new(transaction_id: &str, recipient: &str, value: u64) -> Utxo {
        Utxo {
            id: Uuid::new_v4().simple().to_string(),
            transaction_id: transaction_id.to_string(),
            recipient: recipient.to_string(),
            value,
        }
    }

    /// The reference a spending transaction stores for this output.
    pub fn as_input(&self) -> TxInput {
        TxInput {
            id: self.id.clone(),
            transaction_id: self.transaction_id.clone(),
            value: self.value,
        }
    }
}

/// Reference to the UTXO being spent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxInput {
    pub id: String,
    pub transaction_id: String,
    pub value: u64,
}

// The signed part of a transaction. Outputs are excluded because their ids
// are generated after the transaction id is known.
#[derive(Serialize)]
struct TransactionContent<'a> {
    sender_address: &'a str,
    receiver_address: &'a str,
    amount: u64,
    inputs: &'a [TxInput],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender_address: String,
    receiver_address: String,
    amount: u64,
    inputs: Vec<TxInput>,
    id: String,
    outputs: Vec<Utxo>,
    signature: String,
}

impl Transaction {
    /// Build and sign a transfer. `inputs` must already cover `amount`.
    pub fn create(
        sender: &KeyPair,
        receiver_address: &str,
        amount: u64,
        inputs: &[Utxo],
    ) -> Result<Transaction> {
        let available = inputs
            .iter()
            .try_fold(0u64, |sum, utxo| sum.checked_add(utxo.value))
            .ok_or_else(|| NoobcashError::InvalidTransaction("Input value overflow".to_string()))?;
        if available < amount {
            return Err(NoobcashError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let mut tx = Transaction::unsigned(
            sender.public_key(),
            receiver_address,
            amount,
            inputs.iter().map(Utxo::as_input).collect(),
            available - amount,
        )?;
        tx.signature = sender.sign(tx.id.as_bytes())?;
        Ok(tx)
    }

    /// The unsigned transaction minting `amount` coins for `receiver_address`.
    pub fn genesis(receiver_address: &str, amount: u64) -> Result<Transaction> {
        Transaction::unsigned(GENESIS_SENDER, receiver_address, amount, vec![], 0)
    }

    fn unsigned(
        sender_address: &str,
        receiver_address: &str,
        amount: u64,
        inputs: Vec<TxInput>,
        change: u64,
    ) -> Result<Transaction> {
        let id = Self::calculate_id(sender_address, receiver_address, amount, &inputs)?;
        let outputs = vec![
            Utxo::new(&id, sender_address, change),
            Utxo::new(&id, receiver_address, amount),
        ];
        Ok(Transaction {
            sender_address: sender_address.to_string(),
            receiver_address: receiver_address.to_string(),
            amount,
            inputs,
            id,
            outputs,
            signature: String::new(),
        })
    }

    fn calculate_id(
        sender_address: &str,
        receiver_address: &str,
        amount: u64,
        inputs: &[TxInput],
    ) -> Result<String> {
        canonical_hash(&TransactionContent {
            sender_address,
            receiver_address,
            amount,
            inputs,
        })
    }

    /// Recompute the id and check the sender's signature over it.
    ///
    /// Any decoding or crypto failure counts as an invalid signature.
    pub fn verify_signature(&self) -> bool {
        let expected_id = match Self::calculate_id(
            &self.sender_address,
            &self.receiver_address,
            self.amount,
            &self.inputs,
        ) {
            Ok(id) => id,
            Err(e) => {
                log::debug!("Could not hash transaction {}: {e}", self.id);
                return false;
            }
        };
        if expected_id != self.id {
            return false;
        }

        let (public_key, signature) =
            match (hex_decode(&self.sender_address), hex_decode(&self.signature)) {
                (Ok(public_key), Ok(signature)) => (public_key, signature),
                _ => return false,
            };
        ecdsa_p256_sha256_sign_verify(&public_key, &signature, self.id.as_bytes())
    }

    /// Check that the outputs are exactly what the signed fields imply:
    /// change of `inputs - amount` back to the sender, then `amount` to the
    /// receiver, both tagged with this transaction's id.
    ///
    /// Outputs are not covered by the signature, so this is the only guard
    /// against a relayed transaction crediting arbitrary values.
    pub fn verify_outputs(&self) -> Result<()> {
        let invalid = |msg: String| Err(NoobcashError::InvalidTransaction(msg));
        let (change, payment) = match self.outputs.as_slice() {
            [change, payment] => (change, payment),
            outputs => return invalid(format!("expected 2 outputs, got {}", outputs.len())),
        };
        if change.transaction_id != self.id || payment.transaction_id != self.id {
            return invalid("output does not belong to this transaction".to_string());
        }
        if change.recipient != self.sender_address {
            return invalid("change is not paid to the sender".to_string());
        }
        if payment.recipient != self.receiver_address || payment.value != self.amount {
            return invalid(format!(
                "payment of {} does not match amount {}",
                payment.value, self.amount
            ));
        }
        if self.is_genesis() {
            return Ok(());
        }
        let expected_change = self
            .checked_input_value()
            .and_then(|total| total.checked_sub(self.amount))
            .ok_or_else(|| {
                NoobcashError::InvalidTransaction("inputs do not cover the amount".to_string())
            })?;
        if change.value != expected_change {
            return invalid(format!(
                "change of {} should be {expected_change}",
                change.value
            ));
        }
        Ok(())
    }

    fn checked_input_value(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |sum, input| sum.checked_add(input.value))
    }

    pub fn is_genesis(&self) -> bool {
        self.sender_address == GENESIS_SENDER && self.inputs.is_empty()
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_sender_address(&self) -> &str {
        self.sender_address.as_str()
    }

    pub fn get_receiver_address(&self) -> &str {
        self.receiver_address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_inputs(&self) -> &[TxInput] {
        self.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[Utxo] {
        self.outputs.as_slice()
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    /// Output returning the leftover input value to the sender.
    pub fn change(&self) -> Option<&Utxo> {
        self.outputs.get(CHANGE_OUTPUT)
    }

    /// Output paying `amount` to the receiver.
    pub fn payment(&self) -> Option<&Utxo> {
        self.outputs.get(PAYMENT_OUTPUT)
    }

    /// Total value consumed, saturating on overflow.
    pub fn input_value(&self) -> u64 {
        self.checked_input_value().unwrap_or(u64::MAX)
    }
}
