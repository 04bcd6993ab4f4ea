//! # Match Fusion
//!
//! Reduces a raw match list into distinct groups, e.g. recombining words
//! detected one by one into lines of text.
//!
//! Matches are first put in canonical reading order, so the output does not
//! depend on the order the provider returned them in. Fusion passes repeat
//! until a pass merges nothing, so fusing a fused list is a no-op.

use crate::Match;
use crate::Region;
use crate::primitives::MAX_FUSION_PASSES;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How two regions are judged close enough to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FusionMethod {
    /// Never merge.
    #[default]
    None,
    /// Merge when the gaps on both axes are within fixed pixel limits.
    Absolute { max_gap_x: i32, max_gap_y: i32 },
    /// Merge when the gaps are within a percentage of the taller region's height.
    Relative { percent: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MatchFusion {
    pub method: FusionMethod,
}

impl MatchFusion {
    #[must_use]
    pub const fn absolute(max_gap_x: i32, max_gap_y: i32) -> Self {
        Self {
            method: FusionMethod::Absolute {
                max_gap_x,
                max_gap_y,
            },
        }
    }

    #[must_use]
    pub const fn relative(percent: u16) -> Self {
        Self {
            method: FusionMethod::Relative { percent },
        }
    }

    /// Fuse `matches` into groups.
    ///
    /// An empty list stays empty and a single match is returned unchanged.
    #[must_use]
    pub fn fuse(&self, matches: &[Match]) -> Vec<Match> {
        if matches!(self.method, FusionMethod::None) || matches.len() <= 1 {
            return matches.to_vec();
        }

        let mut current = matches.to_vec();
        current.sort_by(canonical_order);
        for _ in 0..MAX_FUSION_PASSES {
            let next = self.pass(&current);
            if next.len() == current.len() {
                return next;
            }
            current = next;
        }
        tracing::warn!(
            remaining = current.len(),
            "match fusion stopped before reaching a fixpoint"
        );
        current
    }

    fn within_gap(&self, acc: &Region, other: &Region) -> bool {
        match self.method {
            FusionMethod::None => false,
            FusionMethod::Absolute {
                max_gap_x,
                max_gap_y,
            } => acc.gap_x(other) <= max_gap_x && acc.gap_y(other) <= max_gap_y,
            FusionMethod::Relative { percent } => {
                let height = i64::from(acc.h.max(other.h));
                let limit = height.saturating_mul(i64::from(percent)) / 100;
                i64::from(acc.gap_x(other)) <= limit && i64::from(acc.gap_y(other)) <= limit
            }
        }
    }

    /// One fusion pass over canonically ordered input.
    fn pass(&self, sorted: &[Match]) -> Vec<Match> {
        let mut used = vec![false; sorted.len()];
        let mut fused = Vec::new();

        for seed in 0..sorted.len() {
            if used[seed] {
                continue;
            }
            used[seed] = true;
            let mut members = vec![seed];
            let mut acc = sorted[seed].region;

            loop {
                let mut absorbed = false;
                for (j, candidate) in sorted.iter().enumerate() {
                    if used[j] || !self.within_gap(&acc, &candidate.region) {
                        continue;
                    }
                    used[j] = true;
                    acc = acc.union(&candidate.region);
                    members.push(j);
                    absorbed = true;
                }
                if !absorbed {
                    break;
                }
            }

            fused.push(combine(sorted, &members, acc));
        }

        fused.sort_by(canonical_order);
        fused
    }
}

/// Reading order, then higher score first, then pattern and text.
fn canonical_order(a: &Match, b: &Match) -> Ordering {
    a.region
        .reading_order(&b.region)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.pattern.cmp(&b.pattern))
        .then_with(|| a.text.cmp(&b.text))
}

fn combine(sorted: &[Match], members: &[usize], region: Region) -> Match {
    if let [only] = members {
        return sorted[*only].clone();
    }

    let mut group: Vec<&Match> = members.iter().map(|&i| &sorted[i]).collect();
    group.sort_by(|a, b| canonical_order(a, b));

    let score = group.iter().map(|m| m.score).max().unwrap_or_default();
    let first_pattern = group.first().and_then(|m| m.pattern.clone());
    let pattern = first_pattern.filter(|name| group.iter().all(|m| m.pattern.as_ref() == Some(name)));
    let words: Vec<&str> = group.iter().filter_map(|m| m.text.as_deref()).collect();

    Match {
        region,
        score,
        pattern,
        text: (!words.is_empty()).then(|| words.join(" ")),
    }
}
