use tracing::warn;

use crate::model::{Allocation, CredentialRecord, LinkedRecord, MatchedBuyer, PurchaseTier};
use crate::pool::CredentialPool;

/// Result of allocating one tier group.
#[derive(Debug)]
pub struct TierAllocation {
    pub buyers: Vec<MatchedBuyer>,
    pub allocated: usize,
    pub shortfall: usize,
}

/// Draw `group.len()` credentials from `pool` in a single take and pair
/// them with the group rows by position.
pub fn allocate_tier(
    group: Vec<LinkedRecord>,
    tier: PurchaseTier,
    pool: &mut CredentialPool,
) -> TierAllocation {
    let credentials = pool.take(group.len());
    let allocated = credentials.len();
    let shortfall = group.len() - allocated;
    if shortfall > 0 {
        warn!(
            %tier,
            students = group.len(),
            pool = pool.size(),
            shortfall,
            "insufficient accounts"
        );
    }
    TierAllocation {
        buyers: zip_allocations(group, credentials, tier),
        allocated,
        shortfall,
    }
}

/// Row `i` receives credential `i`. Rows past the end of `credentials` are
/// marked [`Allocation::Insufficient`]. Row order is preserved.
pub fn zip_allocations(
    group: Vec<LinkedRecord>,
    credentials: Vec<CredentialRecord>,
    tier: PurchaseTier,
) -> Vec<MatchedBuyer> {
    let mut credentials = credentials.into_iter();
    group
        .into_iter()
        .map(|linked| MatchedBuyer {
            linked,
            tier,
            allocation: credentials
                .next()
                .map_or(Allocation::Insufficient, Allocation::Credential),
        })
        .collect()
}
