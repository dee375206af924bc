//! Convergence simulator
//!
//! Generates a seeded workload of claims from several writers against one
//! permanode, then feeds it to independent replicas. Each replica receives
//! the claims in its own shuffled order from concurrent tasks, with some
//! claims submitted twice. Every replica must end up with the same index
//! contents and the same view, and that view must equal a pure replay of
//! the generated claims.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use perma_blob::{BlobRef, BlobStore, MemoryBlobStore, SharedBlobStore};
use perma_claim::{Claim, ClaimDraft, ClaimType, Signer};
use perma_core::{PermanodeError, PermanodeService, ServiceConfig};
use perma_resolve::{fold_claims, sort_for_replay, OwnerPolicy, PermanodeView, ResolveOptions};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ATTRIBUTES: [&str; 3] = ["title", "tag", "status"];
const VALUES: [&str; 5] = ["", "alpha", "beta", "gamma", "delta"];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Concurrent writers (signers)
    pub writers: usize,
    /// Claims generated per writer
    pub claims_per_writer: usize,
    /// Independent replicas fed the same claims
    pub replicas: usize,
    /// Service configuration for every replica
    pub service: ServiceConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            writers: 4,
            claims_per_writer: 50,
            replicas: 3,
            service: ServiceConfig::default(),
        }
    }
}

/// A convergence failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Replica indexed a different claim set than replica 0
    IndexDivergence { replica: usize },
    /// Replica's view differs from replica 0's
    ViewDivergence { replica: usize },
    /// Replica 0's view differs from a pure replay of the workload
    ReferenceMismatch,
    /// Replica failed to describe the permanode
    DescribeFailed { replica: usize, message: String },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub claims_generated: usize,
    pub distinct_claims: usize,
    pub submissions: usize,
    pub duplicate_submissions: usize,
    pub unauthorized_claims: usize,
    pub timestamp_collisions: usize,
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
    pub final_view: PermanodeView,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Permanode Convergence Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Writers: {}\n", self.config.writers));
        report.push_str(&format!("Replicas: {}\n", self.config.replicas));
        report.push_str(&format!("Claims Generated: {}\n", self.stats.claims_generated));
        report.push_str(&format!("Distinct Claims: {}\n", self.stats.distinct_claims));
        report.push_str(&format!("Submissions: {}\n", self.stats.submissions));
        report.push_str(&format!("Duplicate Submissions: {}\n", self.stats.duplicate_submissions));
        report.push_str(&format!("Unauthorized Claims: {}\n", self.stats.unauthorized_claims));
        report.push_str(&format!("Timestamp Collisions: {}\n", self.stats.timestamp_collisions));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        report.push_str("\n=== Final View ===\n");
        for (attribute, values) in self.final_view.attributes() {
            report.push_str(&format!("{attribute}: {values:?}\n"));
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

struct Workload {
    owner: Signer,
    delegates: Vec<Signer>,
    permanode_bytes: Vec<u8>,
    permanode: BlobRef,
    claims: Vec<Claim>,
}

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_306_886_400, 0).single().unwrap_or_default()
}

/// Writer 0 is the owner; every fourth writer is never granted access
fn is_authorized_writer(writer: usize) -> bool {
    writer % 4 != 3
}

fn generate_workload(config: &SimulatorConfig, rng: &mut StdRng) -> Result<Workload, PermanodeError> {
    let signers: Vec<Signer> = (0..config.writers.max(1))
        .map(|_| Signer::from_seed(rng.gen()))
        .collect();
    let owner = signers[0].clone();
    let permanode = owner.new_permanode_at(base_time(), rng.gen())?;
    let permanode_bytes = permanode.encode()?;
    let permanode_ref = permanode.blob_ref()?;

    // narrow time window so equal timestamps are common
    let window = (config.claims_per_writer * signers.len() / 2).max(1) as i64;
    let mut claims = Vec::with_capacity(signers.len() * config.claims_per_writer);
    for signer in &signers {
        for _ in 0..config.claims_per_writer {
            let claim_type = match rng.gen_range(0..10) {
                0..=3 => ClaimType::SetAttribute,
                4..=7 => ClaimType::AddAttribute,
                _ => ClaimType::DelAttribute,
            };
            let attribute = ATTRIBUTES[rng.gen_range(0..ATTRIBUTES.len())];
            let value = VALUES[rng.gen_range(0..VALUES.len())];
            let at = base_time() + Duration::seconds(rng.gen_range(0..window));
            claims.push(signer.sign_claim(ClaimDraft::new(permanode_ref, claim_type, attribute, value, at))?);
        }
    }

    Ok(Workload {
        owner,
        delegates: signers.into_iter().skip(1).collect(),
        permanode_bytes,
        permanode: permanode_ref,
        claims,
    })
}

fn policy_for(workload: &Workload) -> Arc<OwnerPolicy> {
    let policy = Arc::new(OwnerPolicy::new());
    policy.register_owner(workload.permanode, workload.owner.id());
    for (i, delegate) in workload.delegates.iter().enumerate() {
        if is_authorized_writer(i + 1) {
            policy.grant(workload.permanode, delegate.id());
        }
    }
    policy
}

async fn run_replica(
    workload: &Workload,
    config: &SimulatorConfig,
    rng: &mut StdRng,
    stats: &mut SimulatorStats,
) -> anyhow::Result<(Vec<BlobRef>, Result<PermanodeView, String>)> {
    let store: SharedBlobStore = Arc::new(MemoryBlobStore::new());
    store.put(&workload.permanode_bytes).await?;
    let service = Arc::new(PermanodeService::new(
        store,
        policy_for(workload),
        config.service.clone(),
    ));

    let mut order: Vec<usize> = (0..workload.claims.len()).collect();
    let duplicates = order.len() / 10;
    for _ in 0..duplicates {
        order.push(rng.gen_range(0..workload.claims.len()));
    }
    order.shuffle(rng);
    stats.submissions += order.len();
    stats.duplicate_submissions += duplicates;

    let lanes = config.writers.max(1);
    let chunk = order.len().div_ceil(lanes).max(1);
    let tasks: Vec<_> = order
        .chunks(chunk)
        .map(|lane| {
            let service = Arc::clone(&service);
            let claims: Vec<Claim> = lane.iter().map(|&i| workload.claims[i].clone()).collect();
            tokio::spawn(async move {
                for claim in &claims {
                    service.submit(claim).await?;
                }
                Ok::<_, PermanodeError>(())
            })
        })
        .collect();

    for joined in futures::future::join_all(tasks).await {
        joined??;
    }

    let refs = service.claims_for(&workload.permanode).refs();
    let view = match service.describe(&[workload.permanode]).await {
        Ok(response) => response
            .view(&workload.permanode)
            .cloned()
            .ok_or_else(|| "permanode did not resolve".to_owned()),
        Err(e) => Err(e.to_string()),
    };
    Ok((refs, view))
}

fn reference_view(workload: &Workload, options: &ResolveOptions) -> anyhow::Result<PermanodeView> {
    let mut pairs = workload
        .claims
        .iter()
        .map(|claim| Ok((claim.blob_ref()?, claim.clone())))
        .collect::<Result<Vec<_>, PermanodeError>>()?;
    sort_for_replay(&mut pairs);
    pairs.dedup_by(|a, b| a.0 == b.0);

    let policy = policy_for(workload);
    Ok(fold_claims(
        &workload.permanode,
        pairs.iter().map(|(_, claim)| claim),
        policy.as_ref(),
        options,
    ))
}

/// Run the convergence simulator
///
/// # Errors
/// Returns error if the workload cannot be signed or a replica's store
/// rejects a write. Divergence is reported as a [`Violation`], not an
/// error.
pub async fn run_simulator(config: SimulatorConfig) -> anyhow::Result<SimulatorReport> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let workload = generate_workload(&config, &mut rng)?;

    let mut stats = SimulatorStats {
        claims_generated: workload.claims.len(),
        ..SimulatorStats::default()
    };
    stats.distinct_claims = workload
        .claims
        .iter()
        .map(Claim::blob_ref)
        .collect::<Result<BTreeSet<_>, _>>()?
        .len();
    let distinct_times: BTreeSet<_> = workload.claims.iter().map(Claim::timestamp).collect();
    stats.timestamp_collisions = workload.claims.len() - distinct_times.len();
    stats.unauthorized_claims = workload
        .claims
        .chunks(config.claims_per_writer.max(1))
        .enumerate()
        .filter(|(writer, _)| !is_authorized_writer(*writer))
        .map(|(_, claims)| claims.len())
        .sum();

    tracing::info!(
        seed = config.seed,
        claims = stats.claims_generated,
        replicas = config.replicas,
        "simulation started"
    );

    let mut violations = Vec::new();
    let mut baseline: Option<(Vec<BlobRef>, PermanodeView)> = None;
    for replica in 0..config.replicas.max(1) {
        let (refs, view) = run_replica(&workload, &config, &mut rng, &mut stats).await?;
        let view = match view {
            Ok(view) => view,
            Err(message) => {
                violations.push(Violation::DescribeFailed { replica, message });
                continue;
            }
        };
        match &baseline {
            None => baseline = Some((refs, view)),
            Some((base_refs, base_view)) => {
                if refs != *base_refs {
                    violations.push(Violation::IndexDivergence { replica });
                }
                if view != *base_view {
                    violations.push(Violation::ViewDivergence { replica });
                }
            }
        }
    }

    let final_view = baseline.map(|(_, view)| view).unwrap_or_default();
    if final_view != reference_view(&workload, &config.service.resolve_options())? {
        violations.push(Violation::ReferenceMismatch);
    }

    tracing::info!(violations = violations.len(), "simulation finished");
    Ok(SimulatorReport {
        config,
        stats,
        violations,
        final_view,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use perma_resolve::AddSemantics;
    use proptest::prelude::*;

    fn small(seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            writers: 4,
            claims_per_writer: 15,
            replicas: 3,
            service: ServiceConfig::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn replicas_converge() {
        let report = run_simulator(small(7)).await.unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.claims_generated, 60);
        assert_eq!(report.stats.unauthorized_claims, 15);
        assert_eq!(report.stats.submissions, 3 * (60 + 6));
    }

    #[tokio::test]
    async fn same_seed_same_view() {
        let a = run_simulator(small(11)).await.unwrap();
        let b = run_simulator(small(11)).await.unwrap();
        assert_eq!(a.final_view, b.final_view);
    }

    #[tokio::test]
    async fn set_semantics_also_converge() {
        let mut config = small(3);
        config.service = ServiceConfig::new().with_add_semantics(AddSemantics::Set);
        let report = run_simulator(config).await.unwrap();
        assert!(report.passed(), "{}", report.generate_text());
    }

    #[test]
    fn report_text_mentions_result() {
        let report = SimulatorReport {
            config: SimulatorConfig::default(),
            stats: SimulatorStats::default(),
            violations: vec![Violation::ReferenceMismatch],
            final_view: PermanodeView::default(),
        };
        let text = report.generate_text();
        assert!(text.contains("Result: FAIL"));
        assert!(text.contains("ReferenceMismatch"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_any_seed_converges(seed in any::<u64>(), writers in 1..5usize) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            let config = SimulatorConfig { writers, ..small(seed) };
            let report = rt.block_on(run_simulator(config)).unwrap();
            prop_assert!(report.passed(), "{}", report.generate_text());
        }
    }
}
