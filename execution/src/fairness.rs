//! Fairness tokens attached to every resolution.
//!
//! Each round draws two independent seeds and publishes a combined proof:
//!
//! ```text
//! final_hash = hex(sha256(server_seed || client_seed || round_id))
//! ```
//!
//! The tokens are opaque to the payout engine. They exist so that a finished
//! round can be audited later by recomputing `final_hash` from the record.

use commonware_cryptography::sha256::Sha256;
use commonware_cryptography::Hasher;
use commonware_utils::hex;
use rand::RngCore;
use timevault_types::{FairnessData, RoundId};

/// Length of each seed in bytes (rendered as 32 hex characters).
pub const SEED_LEN: usize = 16;

/// Draw a fresh pair of seeds and derive the combined proof.
pub fn generate_fairness(round_id: &RoundId, rng: &mut impl RngCore) -> FairnessData {
    let server_seed = random_seed(rng);
    let client_seed = random_seed(rng);
    let final_hash = compute_final_hash(&server_seed, &client_seed, round_id);
    FairnessData {
        server_seed,
        client_seed,
        final_hash,
    }
}

fn random_seed(rng: &mut impl RngCore) -> String {
    let mut bytes = [0u8; SEED_LEN];
    rng.fill_bytes(&mut bytes);
    hex(&bytes)
}

/// Combine both seeds with the round id.
pub fn compute_final_hash(server_seed: &str, client_seed: &str, round_id: &RoundId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(client_seed.as_bytes());
    hasher.update(round_id.as_str().as_bytes());
    hex(&hasher.finalize().0)
}
