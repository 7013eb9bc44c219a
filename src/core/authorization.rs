//! PIN-based authorization gate
//!
//! `PinGate` verifies a presented 4-digit PIN against the Argon2id hash
//! stored on the account, and refuses further attempts for an account once
//! too many recent attempts have failed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use dashmap::DashMap;
use tracing::warn;

use super::account_store::AccountStore;
use super::traits::AuthorizationGate;
use crate::types::{AccountId, Authorization, Credential, LedgerError, SecretHash};

/// Required PIN length
pub const PIN_LENGTH: usize = 4;

/// Argon2id cost parameters for new credential hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Configuration for [`PinGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Cost of hashes produced by [`PinGate::hash_credential`]
    pub hash: HashParams,
    /// Failed attempts tolerated per account within `window`; 0 disables the limit
    pub max_failed_attempts: u32,
    /// Sliding window for counting failed attempts
    pub window: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hash: HashParams::default(),
            max_failed_attempts: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Sliding-window counter of failed authorization attempts per account
#[derive(Debug)]
struct AttemptLimiter {
    max_failed_attempts: u32,
    window: Duration,
    failures: DashMap<AccountId, VecDeque<Instant>>,
}

impl AttemptLimiter {
    fn new(max_failed_attempts: u32, window: Duration) -> Self {
        Self {
            max_failed_attempts,
            window,
            failures: DashMap::new(),
        }
    }

    /// Count an attempt against `account` before its PIN is checked
    ///
    /// Returns `None` if the account already has `max_failed_attempts`
    /// failures inside the window. Otherwise records a provisional failure
    /// and returns its timestamp; the failure stands unless the attempt is
    /// later cleared or released.
    fn reserve(&self, account: AccountId) -> Option<Instant> {
        let now = Instant::now();
        if self.max_failed_attempts == 0 {
            return Some(now);
        }
        let mut failures = self.failures.entry(account).or_default();
        Self::prune(&mut failures, self.window);
        if failures.len() >= self.max_failed_attempts as usize {
            return None;
        }
        failures.push_back(now);
        Some(now)
    }

    /// Withdraw a reservation that turned out not to be a PIN check
    fn release(&self, account: AccountId, stamp: Instant) {
        if let Some(mut failures) = self.failures.get_mut(&account) {
            if let Some(pos) = failures.iter().rposition(|at| *at == stamp) {
                failures.remove(pos);
            }
        }
    }

    fn clear(&self, account: AccountId) {
        self.failures.remove(&account);
    }

    fn prune(failures: &mut VecDeque<Instant>, window: Duration) {
        while let Some(oldest) = failures.front() {
            if oldest.elapsed() < window {
                break;
            }
            failures.pop_front();
        }
    }
}

/// Authorization gate verifying PINs against stored Argon2id hashes
pub struct PinGate {
    accounts: Arc<AccountStore>,
    hasher: Argon2<'static>,
    limiter: AttemptLimiter,
}

impl PinGate {
    /// Create a gate reading secret hashes from `accounts`
    ///
    /// # Errors
    ///
    /// Returns `CredentialHashing` if the hash parameters are out of range.
    pub fn new(accounts: Arc<AccountStore>, config: GateConfig) -> Result<Self, LedgerError> {
        let params = Params::new(
            config.hash.memory_kib,
            config.hash.iterations,
            config.hash.parallelism,
            None,
        )
        .map_err(|e| LedgerError::credential_hashing(format!("invalid Argon2 parameters: {e}")))?;

        Ok(Self {
            accounts,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            limiter: AttemptLimiter::new(config.max_failed_attempts, config.window),
        })
    }

    /// Hash a PIN for storage on a newly provisioned account
    ///
    /// # Errors
    ///
    /// - `MalformedCredential` unless the PIN is exactly 4 ASCII digits
    /// - `CredentialHashing` if Argon2 fails
    pub fn hash_credential(&self, credential: &Credential) -> Result<SecretHash, LedgerError> {
        let pin = credential.expose();
        if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::MalformedCredential);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| LedgerError::credential_hashing(e.to_string()))?;

        Ok(SecretHash::new(hash.to_string()))
    }

    fn verify(&self, credential: &Credential, stored: &SecretHash) -> bool {
        match PasswordHash::new(stored.as_str()) {
            Ok(parsed) => self
                .hasher
                .verify_password(credential.expose().as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl AuthorizationGate for PinGate {
    fn authorize(&self, account: AccountId, credential: &Credential) -> Authorization {
        let Some(stamp) = self.limiter.reserve(account) else {
            warn!(account, "authorization refused: too many failed attempts");
            return Authorization::RateLimited;
        };

        let stored = match self.accounts.get(account) {
            Ok(found) => found.secret_hash,
            Err(_) => {
                self.limiter.release(account, stamp);
                warn!(account, "authorization denied: unknown account");
                return Authorization::Denied;
            }
        };

        if self.verify(credential, &stored) {
            self.limiter.clear(account);
            Authorization::Authorized
        } else {
            warn!(account, "authorization denied");
            Authorization::Denied
        }
    }
}
