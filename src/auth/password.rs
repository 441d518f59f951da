use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, Rng};
use tracing::{error, warn};

use crate::config::HashCost;

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Hash of a random secret made with the same cost as real hashes.
    /// Verified against when the account does not exist so that both
    /// failure paths cost the same Argon2 run.
    absent_user_hash: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> anyhow::Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid password hash cost: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let secret: [u8; 32] = OsRng.gen();
        let salt = SaltString::generate(&mut OsRng);
        let absent_user_hash = argon2
            .hash_password(&secret, &salt)
            .map_err(|e| anyhow::anyhow!("hash placeholder password: {e}"))?
            .to_string();

        Ok(Self {
            argon2,
            absent_user_hash: absent_user_hash.into(),
        })
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check of `plain` against a stored PHC string. A stored
    /// hash that does not parse never matches.
    pub fn verify(&self, hash: &str, plain: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        self.argon2.verify_password(plain.as_bytes(), &parsed).is_ok()
    }

    pub fn verify_absent(&self, plain: &str) -> bool {
        self.verify(&self.absent_user_hash, plain)
    }
}
