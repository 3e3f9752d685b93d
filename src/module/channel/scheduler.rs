//! Next-channel selection.
//!
//! Channels are ordered by their snapshot count and one of the first
//! `pool_size` candidates is drawn at random, so consecutive runs do not
//! visit channels in the same order at the same time of day.

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::{score::ScoreStore, Channel};

/// Which end of the score ordering is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Min, // Fill the emptiest channels first
    Max, // Finish the nearly complete channels first
}

/// Picks channels until every one reaches the end of the score range.
pub struct ChannelScheduler<'a> {
    channels: &'a [Channel],
}

impl<'a> ChannelScheduler<'a> {
    pub fn new(channels: &'a [Channel]) -> Self {
        Self { channels }
    }

    /// Select the next channel to sample.
    ///
    /// # Arguments
    ///
    /// * `store` - Current scores.
    /// * `priority` - Lowest or highest score first.
    /// * `range` - Eligible scores, upper bound excluded.
    /// * `pool_size` - How many of the best candidates to draw from. 0 is treated as 1.
    /// * `rng` - Random source for the draw.
    ///
    /// # Returns
    ///
    /// `Some((index, score))`, or `None` once no channel is eligible.
    pub fn next_channel_by_score<R: Rng + ?Sized>(
        &self,
        store: &ScoreStore,
        priority: Priority,
        range: Range<u32>,
        pool_size: usize,
        rng: &mut R,
    ) -> Option<(usize, u32)> {
        let mut candidates: Vec<(usize, u32)> = self
            .channels
            .iter()
            .map(|ch| (ch.index, store.score(ch.index)))
            .filter(|(_, score)| range.contains(score))
            .collect();
        // Stable, so equal scores keep channel order before the draw.
        match priority {
            Priority::Min => candidates.sort_by_key(|&(_, score)| score),
            Priority::Max => candidates.sort_by_key(|&(_, score)| std::cmp::Reverse(score)),
        }
        candidates.truncate(pool_size.max(1));
        let picked = candidates.choose(rng).copied();
        log::debug!("Candidates {:?}, picked {:?}", candidates, picked);
        picked
    }
}
