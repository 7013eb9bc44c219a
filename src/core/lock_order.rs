//! Deterministic lock ordering
//!
//! Every multi-account lock acquisition goes through [`lock_order`]. Ranking
//! accounts by ascending id means two callers naming the same accounts always
//! acquire them in the same sequence, so no cycle of waiters can form.

use crate::types::AccountId;

/// Order a set of account ids for lock acquisition
///
/// Returns the distinct ids in ascending order.
pub fn lock_order<I>(ids: I) -> Vec<AccountId>
where
    I: IntoIterator<Item = AccountId>,
{
    let mut ordered: Vec<AccountId> = ids.into_iter().collect();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}
