use crate::core::{TxInput, Utxo};
use crate::error::{NoobcashError, Result};
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, hex_encode, new_key_pair, public_key_from_pkcs8,
};
use std::collections::HashSet;
use zeroize::Zeroizing;

/// ECDSA P-256 key pair. The hex encoded public key doubles as the address.
#[derive(Clone)]
pub struct KeyPair {
    pkcs8: Zeroizing<Vec<u8>>,
    public_key: String,
}

impl KeyPair {
    pub fn generate() -> Result<KeyPair> {
        let pkcs8 = new_key_pair()?;
        let public_key = hex_encode(&public_key_from_pkcs8(&pkcs8)?);
        Ok(KeyPair {
            pkcs8: Zeroizing::new(pkcs8),
            public_key,
        })
    }

    pub fn public_key(&self) -> &str {
        self.public_key.as_str()
    }

    /// Hex encoded signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        let signature = ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)?;
        Ok(hex_encode(&signature))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// The node's keys plus the outputs it currently owns.
#[derive(Debug, Clone)]
pub struct Wallet {
    key_pair: KeyPair,
    utxos: Vec<Utxo>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        Ok(Wallet {
            key_pair: KeyPair::generate()?,
            utxos: Vec::new(),
        })
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> &str {
        self.key_pair.public_key()
    }

    pub fn utxos(&self) -> &[Utxo] {
        self.utxos.as_slice()
    }

    /// Sum of owned outputs. Recomputed on every call.
    pub fn balance(&self) -> u64 {
        self.utxos.iter().map(|utxo| utxo.value).sum()
    }

    /// Take outputs until their sum covers `amount`.
    ///
    /// Leaves the wallet untouched when the balance is too low.
    pub fn select_inputs(&mut self, amount: u64) -> Result<Vec<Utxo>> {
        let available = self.balance();
        if available < amount {
            return Err(NoobcashError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let mut selected = Vec::new();
        let mut covered = 0u64;
        while covered < amount {
            match self.utxos.pop() {
                Some(utxo) => {
                    covered += utxo.value;
                    selected.push(utxo);
                }
                None => break,
            }
        }
        Ok(selected)
    }

    /// Give back outputs taken by `select_inputs`.
    pub fn restore(&mut self, utxos: Vec<Utxo>) {
        for utxo in utxos {
            self.receive(utxo);
        }
    }

    /// Add an output unless it is already held or worthless.
    pub fn receive(&mut self, utxo: Utxo) {
        if utxo.value == 0 || self.utxos.iter().any(|owned| owned.id == utxo.id) {
            return;
        }
        self.utxos.push(utxo);
    }

    /// Drop every owned output that `inputs` consumes.
    pub fn spend(&mut self, inputs: &[TxInput]) {
        let consumed: HashSet<&str> = inputs.iter().map(|input| input.id.as_str()).collect();
        self.utxos.retain(|utxo| !consumed.contains(utxo.id.as_str()));
    }

    /// Replace the owned set wholesale, as after adopting a foreign ring.
    pub fn replace_utxos(&mut self, utxos: Vec<Utxo>) {
        self.utxos = utxos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with(values: &[u64]) -> Wallet {
        let mut wallet = Wallet::new().unwrap();
        let owner = wallet.public_key().to_string();
        for value in values {
            wallet.receive(Utxo::new("funding", &owner, *value));
        }
        wallet
    }

    #[test]
    fn test_balance_sums_outputs() {
        let wallet = wallet_with(&[10, 20, 30]);
        assert_eq!(wallet.balance(), 60);
    }

    #[test]
    fn test_select_inputs_covers_amount() {
        let mut wallet = wallet_with(&[10, 20, 30]);
        let selected = wallet.select_inputs(35).unwrap();
        let covered: u64 = selected.iter().map(|u| u.value).sum();

        assert!(covered >= 35);
        assert_eq!(wallet.balance() + covered, 60);
    }

    #[test]
    fn test_select_inputs_insufficient_leaves_wallet_alone() {
        let mut wallet = wallet_with(&[10, 20]);
        let before = wallet.utxos().to_vec();

        let err = wallet.select_inputs(31).unwrap_err();
        assert_eq!(
            err,
            NoobcashError::InsufficientFunds {
                required: 31,
                available: 30
            }
        );
        assert_eq!(wallet.utxos(), before.as_slice());
    }

    #[test]
    fn test_restore_rolls_back_selection() {
        let mut wallet = wallet_with(&[10, 20]);
        let selected = wallet.select_inputs(25).unwrap();
        assert_eq!(wallet.balance(), 0);

        wallet.restore(selected);
        assert_eq!(wallet.balance(), 30);
    }

    #[test]
    fn test_spend_is_set_difference() {
        let mut wallet = wallet_with(&[10, 20, 30]);
        let inputs: Vec<TxInput> = wallet.utxos()[..2].iter().map(Utxo::as_input).collect();

        wallet.spend(&inputs);
        wallet.spend(&inputs);
        assert_eq!(wallet.balance(), 30);
    }

    #[test]
    fn test_receive_ignores_duplicates_and_zero() {
        let mut wallet = wallet_with(&[10]);
        let existing = wallet.utxos()[0].clone();

        wallet.receive(existing);
        wallet.receive(Utxo::new("t", wallet.public_key().to_string().as_str(), 0));
        assert_eq!(wallet.utxos().len(), 1);
    }
}
