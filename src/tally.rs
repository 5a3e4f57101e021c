//! Point rules and winner selection.

use std::convert::TryFrom;

/// Awarded for the first vote a user casts in a poll
pub const VOTE_POINTS: i32 = 1;
/// Awarded for proposing a place
pub const PLACE_POINTS: i32 = 5;
/// Base bonus for the proposer of a winning place, on top of its vote count
pub const WIN_BASE_POINTS: i32 = 10;

/// Picks the option with the strictly greatest vote count. Ties go to the
/// option seen first, so callers must pass options in stored order.
pub fn pick_winner<T, F>(options: &[T], vote_count: F) -> Option<&T>
where
    F: Fn(&T) -> i64,
{
    let mut winner: Option<(&T, i64)> = None;
    for option in options {
        let votes = vote_count(option);
        match winner {
            Some((_, best)) if votes <= best => {}
            _ => winner = Some((option, votes)),
        }
    }
    winner.map(|(option, _)| option)
}

pub fn winner_bonus(vote_count: i64) -> i32 {
    let votes = i32::try_from(vote_count).unwrap_or(i32::MAX - WIN_BASE_POINTS);
    WIN_BASE_POINTS + votes
}
