//! Scoring formulas. Pure functions, no state.

use std::collections::BTreeMap;

use crate::api::types::PlayerId;
use crate::components::puck::PuckBody;
use crate::config::ScoringConfig;
use crate::error::ScoringError;

/// Configured score for bucket `index`.
pub fn score_for_bucket(bucket_scores: &[u32], index: usize) -> Result<u32, ScoringError> {
    bucket_scores
        .get(index)
        .copied()
        .ok_or(ScoringError::BucketOutOfRange {
            index,
            count: bucket_scores.len(),
        })
}

/// `min(rate^bounces, cap)`. Exactly 1.0 with no bounces.
pub fn bounce_multiplier(bounce_count: u32, config: &ScoringConfig) -> f64 {
    let exponent = bounce_count.min(i32::MAX as u32) as i32;
    config
        .bounce_multiplier_rate
        .powi(exponent)
        .min(config.bounce_multiplier_cap)
}

/// `floor(base × multiplier)` for a bucket's base score.
pub fn apply_multiplier(base: u32, multiplier: f64) -> u32 {
    (base as f64 * multiplier).floor() as u32
}

/// Score for landing in `bucket` after `bounce_count` pin contacts.
pub fn round_score(
    bucket_scores: &[u32],
    bucket: usize,
    bounce_count: u32,
    config: &ScoringConfig,
) -> Result<u32, ScoringError> {
    let base = score_for_bucket(bucket_scores, bucket)?;
    Ok(apply_multiplier(base, bounce_multiplier(bounce_count, config)))
}

/// Amount actually subtracted when revoking `amount` from `current`.
/// Never drives a score below zero.
pub fn revoke_score(current: u32, amount: u32) -> u32 {
    amount.min(current)
}

/// Recompute every player's total from the current puck population.
///
/// Settled pucks with a valid bucket contribute
/// `floor(bucket_scores[bucket] × bounce_multiplier)` to their owner;
/// everything else contributes zero. Players with no scoring pucks are absent.
pub fn recalculate_all_scores<'a>(
    pucks: impl IntoIterator<Item = &'a PuckBody>,
    bucket_scores: &[u32],
) -> BTreeMap<PlayerId, u32> {
    let mut totals = BTreeMap::new();
    for puck in pucks {
        if !puck.is_settled {
            continue;
        }
        let Some(base) = puck
            .settled_in_bucket
            .and_then(|b| bucket_scores.get(b).copied())
        else {
            continue;
        };
        *totals.entry(puck.player_id).or_insert(0) += apply_multiplier(base, puck.bounce_multiplier);
    }
    totals
}
