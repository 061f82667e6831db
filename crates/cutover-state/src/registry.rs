// Migration registry: fingerprint → registered PQ key.
//
// SAFETY INVARIANTS:
// 1. The registry is a deterministic state machine over an ordered log of
//    registration events: replaying the same log on two independent nodes
//    yields identical accepted sets, including identical rejections.
// 2. A record is accepted only with a proof signature by the legacy key the
//    fingerprint identifies, over a domain-separated binding of
//    {fingerprint, PQ key} — nobody can register someone else's
//    fingerprint.
// 3. Writes are staged per block and only committed at block boundaries;
//    readers get frozen point-in-time views, so mid-block validation never
//    observes a partial registry.
// 4. First-valid-record-wins. Rotation is a policy parameter, closed by
//    default once the grace phase begins.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use cutover_crypto::{LegacyFingerprint, LegacyVerifier, PqPublicKey};

/// Domain-separation tag for registration proof signatures.
pub const MIGRATION_DOMAIN_TAG: &[u8] = b"cutover/migration/v1";

/// An accepted fingerprint → PQ key mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub fingerprint: LegacyFingerprint,
    pub pq_public_key: PqPublicKey,
    pub registration_height: u64,
    /// The legacy public key the fingerprint identifies. Kept so reclaim
    /// proofs can be checked without a separate key index.
    pub legacy_pubkey: Vec<u8>,
    /// Compact legacy signature proving ownership of the fingerprint.
    pub proof_sig: Vec<u8>,
}

/// A registration event as it appears on the ordered log (for example, an
/// OP_RETURN-style record observed on the legacy network). The registry
/// consumes this feed idempotently; it never initiates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub fingerprint: LegacyFingerprint,
    pub pq_public_key: PqPublicKey,
    pub legacy_pubkey: Vec<u8>,
    pub proof_sig: Vec<u8>,
    pub height: u64,
}

impl RegistrationEvent {
    /// The 32-byte digest the proof signature must cover: a domain tag
    /// binding the fingerprint to the exact serialized PQ key.
    pub fn proof_digest(fingerprint: &LegacyFingerprint, pq_public_key: &PqPublicKey) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(MIGRATION_DOMAIN_TAG);
        hasher.update(fingerprint.as_bytes());
        hasher.update(pq_public_key.serialize());
        let first = hasher.finalize();
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        out
    }
}

/// Why a registration event was rejected. Rejections are part of the
/// deterministic outcome: every node rejects the same events for the same
/// reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryReject {
    /// The claimed fingerprint is not the fingerprint of the supplied
    /// legacy key.
    FingerprintMismatch,
    /// The proof signature does not verify against the legacy key.
    BadProof,
    /// A valid record already exists and rotation policy forbids overwrite.
    RotationClosed,
    /// Rotation is open but the event does not carry a strictly later
    /// height than the existing record.
    StaleRotation,
    /// Byte-identical to an already-accepted record.
    Duplicate,
}

/// Outcome of applying one registration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationOutcome {
    Accepted,
    Rejected(RegistryReject),
}

/// Answer to a fingerprint lookup. `Indeterminate` appears only while an
/// incremental sync is in progress — absence cannot be proven against a
/// partial log. Committed views never produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAnswer {
    Mapped(PqPublicKey),
    Unmapped,
    Indeterminate,
}

/// Conflict-resolution policy for late migration records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationPolicy {
    /// First valid record wins, forever. The default once grace begins.
    Closed,
    /// A later valid record may supersede strictly-earlier ones while the
    /// event height is below this bound.
    OpenUntil(u64),
}

impl RotationPolicy {
    fn allows_rotation_at(&self, height: u64) -> bool {
        match self {
            RotationPolicy::Closed => false,
            RotationPolicy::OpenUntil(bound) => height < *bound,
        }
    }
}

/// Frozen point-in-time view of the accepted set. Cheap to clone and safe
/// to share across validation threads.
#[derive(Clone)]
pub struct RegistryView {
    accepted: Arc<BTreeMap<LegacyFingerprint, MigrationRecord>>,
}

impl RegistryView {
    pub fn lookup(&self, fingerprint: &LegacyFingerprint) -> Option<&PqPublicKey> {
        self.accepted.get(fingerprint).map(|r| &r.pq_public_key)
    }

    pub fn record(&self, fingerprint: &LegacyFingerprint) -> Option<&MigrationRecord> {
        self.accepted.get(fingerprint)
    }

    pub fn is_registered(&self, fingerprint: &LegacyFingerprint) -> bool {
        self.accepted.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LegacyFingerprint, &MigrationRecord)> {
        self.accepted.iter()
    }
}

struct Inner {
    /// Committed as of the last block boundary.
    committed: Arc<BTreeMap<LegacyFingerprint, MigrationRecord>>,
    /// Staged mutations for the block being processed.
    staged: BTreeMap<LegacyFingerprint, MigrationRecord>,
    /// Full ordered log of every event seen, accepted or not; the sync and
    /// persistence unit.
    log: Vec<RegistrationEvent>,
    syncing: bool,
}

/// The registry state machine.
pub struct MigrationRegistry<V: LegacyVerifier> {
    inner: RwLock<Inner>,
    verifier: V,
    policy: RotationPolicy,
}

impl<V: LegacyVerifier> MigrationRegistry<V> {
    pub fn new(verifier: V, policy: RotationPolicy) -> Self {
        MigrationRegistry {
            inner: RwLock::new(Inner {
                committed: Arc::new(BTreeMap::new()),
                staged: BTreeMap::new(),
                log: Vec::new(),
                syncing: false,
            }),
            verifier,
            policy,
        }
    }

    /// Validate and stage one registration event. The decision is a pure
    /// function of (event, accepted-so-far, policy): same log, same
    /// outcomes, on every node.
    pub fn register(&self, event: RegistrationEvent) -> RegistrationOutcome {
        let mut inner = self.inner.write();
        let outcome = Self::decide(&self.verifier, self.policy, &inner, &event);
        if let RegistrationOutcome::Accepted = outcome {
            debug!(
                "staging migration record for {} at height {}",
                event.fingerprint, event.height
            );
            inner.staged.insert(
                event.fingerprint,
                MigrationRecord {
                    fingerprint: event.fingerprint,
                    pq_public_key: event.pq_public_key.clone(),
                    registration_height: event.height,
                    legacy_pubkey: event.legacy_pubkey.clone(),
                    proof_sig: event.proof_sig.clone(),
                },
            );
        }
        inner.log.push(event);
        outcome
    }

    fn decide(
        verifier: &V,
        policy: RotationPolicy,
        inner: &Inner,
        event: &RegistrationEvent,
    ) -> RegistrationOutcome {
        if LegacyFingerprint::of_pubkey(&event.legacy_pubkey) != event.fingerprint {
            return RegistrationOutcome::Rejected(RegistryReject::FingerprintMismatch);
        }
        let digest = RegistrationEvent::proof_digest(&event.fingerprint, &event.pq_public_key);
        if !verifier.verify(&event.proof_sig, &digest, &event.legacy_pubkey) {
            return RegistrationOutcome::Rejected(RegistryReject::BadProof);
        }
        // The accepted-so-far set is committed ∪ staged (staged shadows).
        let existing = inner
            .staged
            .get(&event.fingerprint)
            .or_else(|| inner.committed.get(&event.fingerprint));
        match existing {
            None => RegistrationOutcome::Accepted,
            Some(prev) => {
                if prev.pq_public_key == event.pq_public_key
                    && prev.registration_height == event.height
                {
                    return RegistrationOutcome::Rejected(RegistryReject::Duplicate);
                }
                if !policy.allows_rotation_at(event.height) {
                    return RegistrationOutcome::Rejected(RegistryReject::RotationClosed);
                }
                if event.height <= prev.registration_height {
                    return RegistrationOutcome::Rejected(RegistryReject::StaleRotation);
                }
                RegistrationOutcome::Accepted
            }
        }
    }

    /// Commit staged records at a block boundary. Only call for finalized
    /// blocks: acceptance must never depend on not-yet-final chain data.
    pub fn commit_block(&self, height: u64) {
        let mut inner = self.inner.write();
        if inner.staged.is_empty() {
            return;
        }
        let mut next = (*inner.committed).clone();
        let staged = std::mem::take(&mut inner.staged);
        let count = staged.len();
        next.extend(staged);
        inner.committed = Arc::new(next);
        info!("committed {count} migration records at height {height}");
    }

    /// Discard staged records, e.g. when the containing block is abandoned.
    pub fn discard_staged(&self) {
        self.inner.write().staged.clear();
    }

    /// Frozen point-in-time view of the committed set.
    pub fn view(&self) -> RegistryView {
        RegistryView {
            accepted: Arc::clone(&self.inner.read().committed),
        }
    }

    /// Tri-state lookup honouring sync status. During a partial sync the
    /// absence of a record is Indeterminate rather than Unmapped.
    pub fn lookup(&self, fingerprint: &LegacyFingerprint) -> RegistryAnswer {
        let inner = self.inner.read();
        match inner.committed.get(fingerprint) {
            Some(record) => RegistryAnswer::Mapped(record.pq_public_key.clone()),
            None if inner.syncing => RegistryAnswer::Indeterminate,
            None => RegistryAnswer::Unmapped,
        }
    }

    pub fn begin_sync(&self) {
        self.inner.write().syncing = true;
    }

    pub fn finish_sync(&self) {
        self.inner.write().syncing = false;
    }

    /// The full ordered event log, for persistence or serving sync peers.
    pub fn log(&self) -> Vec<RegistrationEvent> {
        self.inner.read().log.clone()
    }

    /// Replay an ordered log into a fresh registry, committing after each
    /// height. Returns the per-event outcomes for convergence checks.
    pub fn replay(
        verifier: V,
        policy: RotationPolicy,
        events: Vec<RegistrationEvent>,
    ) -> (Self, Vec<RegistrationOutcome>) {
        let registry = MigrationRegistry::new(verifier, policy);
        registry.begin_sync();
        let mut outcomes = Vec::with_capacity(events.len());
        let mut last_height: Option<u64> = None;
        for event in events {
            if let Some(h) = last_height {
                if event.height != h {
                    registry.commit_block(h);
                }
            }
            last_height = Some(event.height);
            outcomes.push(registry.register(event));
        }
        if let Some(h) = last_height {
            registry.commit_block(h);
        }
        registry.finish_sync();
        (registry, outcomes)
    }
}
