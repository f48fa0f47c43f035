//! Keys - mnemonic generation and BIP44 derivation for TRON. Secrets never reach the logs.

pub mod address;

use crate::error::{Error, Result};
use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use address::{abi_address_word, decode_address, looks_like_address};

/// BIP44 path for the first TRON account (coin type 195).
pub const TRON_DERIVATION_PATH: &str = "m/44'/195'/0'/0/0";
pub const MNEMONIC_WORDS: usize = 12;

/// Mnemonic owned by the ledger. Redacted in `Debug`, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretPhrase(String);

impl SecretPhrase {
    pub fn new(phrase: impl Into<String>) -> Self { Self(phrase.into()) }
    pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("SecretPhrase(<redacted>)") }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

    fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_slice(&self.0).map_err(|e| Error::Key(e.to_string()))
    }

    pub fn address(&self) -> Result<String> {
        let point = self.signing_key()?.verifying_key().to_encoded_point(false);
        address::address_from_public_key(point.as_bytes())
    }

    /// Recoverable secp256k1 signature over a 32-byte digest: `r || s || v`, v in {0, 1}.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65]> {
        let (signature, recovery_id) = self
            .signing_key()?
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Key(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("PrivateKey(<redacted>)") }
}

/// Fresh wallet material.
#[derive(Debug, Clone)]
pub struct GeneratedWallet {
    pub mnemonic: SecretPhrase,
    pub address: String,
    pub private_key: PrivateKey,
}

/// Standard HD derivation for the target chain.
pub trait KeyDerivation: Send + Sync {
    fn generate(&self) -> Result<GeneratedWallet>;
    fn derive(&self, mnemonic: &SecretPhrase) -> Result<PrivateKey>;
}

/// BIP39 (12 words, empty passphrase) + BIP44 m/44'/195'/0'/0/0.
#[derive(Debug, Clone, Default)]
pub struct TronKeychain;

impl TronKeychain {
    pub fn new() -> Self { Self }
}

impl KeyDerivation for TronKeychain {
    fn generate(&self) -> Result<GeneratedWallet> {
        let mut entropy = [0u8; MNEMONIC_WORDS / 3 * 4];
        rand::thread_rng().fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy(&entropy).map_err(|e| Error::Key(e.to_string()));
        entropy.zeroize();

        let mnemonic = SecretPhrase::new(mnemonic?.to_string());
        let private_key = self.derive(&mnemonic)?;
        let address = private_key.address()?;
        Ok(GeneratedWallet { mnemonic, address, private_key })
    }

    fn derive(&self, mnemonic: &SecretPhrase) -> Result<PrivateKey> {
        let parsed = Mnemonic::parse_normalized(mnemonic.expose())
            .map_err(|e| Error::Key(format!("invalid mnemonic: {e}")))?;
        let seed = parsed.to_seed("");

        let secp = Secp256k1::new();
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &seed)
            .map_err(|e| Error::Key(e.to_string()))?;
        let path = DerivationPath::from_str(TRON_DERIVATION_PATH)
            .map_err(|e| Error::Key(e.to_string()))?;
        let child = master
            .derive_priv(&secp, &path)
            .map_err(|e| Error::Key(e.to_string()))?;

        Ok(PrivateKey(child.private_key.secret_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_produces_valid_wallet() {
        let keychain = TronKeychain::new();
        let wallet = keychain.generate().expect("should generate");

        assert_eq!(wallet.mnemonic.expose().split_whitespace().count(), MNEMONIC_WORDS);
        assert!(looks_like_address(&wallet.address));
        assert!(decode_address(&wallet.address).is_ok());

        // Re-deriving from the phrase gives the same key
        let again = keychain.derive(&wallet.mnemonic).expect("should derive");
        assert_eq!(again.as_bytes(), wallet.private_key.as_bytes());
    }

    #[test]
    fn test_derivation_deterministic() {
        let keychain = TronKeychain::new();
        let phrase = SecretPhrase::new(TEST_MNEMONIC);
        let a = keychain.derive(&phrase).unwrap();
        let b = keychain.derive(&phrase).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.address().unwrap(), b.address().unwrap());
    }

    #[test]
    fn test_known_vector_m44_195() {
        // m/44'/195'/0'/0/0 of the all-"abandon" test phrase
        let key = TronKeychain::new().derive(&SecretPhrase::new(TEST_MNEMONIC)).unwrap();
        assert_eq!(key.address().unwrap(), "TUEZSdKsoDHQMeZwihtdoBiN46zxhGWYdH");
    }

    #[test]
    fn test_generated_wallets_differ() {
        let keychain = TronKeychain::new();
        let a = keychain.generate().unwrap();
        let b = keychain.generate().unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        let keychain = TronKeychain::new();
        let err = keychain.derive(&SecretPhrase::new("not a mnemonic")).unwrap_err();
        assert!(matches!(err, Error::Key(_)));
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let keychain = TronKeychain::new();
        let wallet = keychain.generate().unwrap();
        let rendered = format!("{:?}", wallet);
        assert!(!rendered.contains(wallet.mnemonic.expose()));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        let key = TronKeychain::new().derive(&SecretPhrase::new(TEST_MNEMONIC)).unwrap();
        let digest = [7u8; 32];
        let sig = key.sign_digest(&digest).unwrap();
        assert!(sig[64] <= 1);

        let signature = Signature::from_slice(&sig[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(sig[64]).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).unwrap();
        let expected = SigningKey::from_slice(key.as_bytes()).unwrap();
        assert_eq!(&recovered, expected.verifying_key());
    }
}
