//! Album rotation.
//!
//! Albums are indexed by seat: album `i` was seeded by the player sitting
//! at turn-order index `i`. In round `R` (1-indexed, counting drawing and
//! describing rounds only) the player at seat `i` works on album
//! `(i + R) mod N`. For `R` in `1..N` a seat never meets its own album,
//! every album receives exactly one step per round, and after `N - 1`
//! rounds each album has passed through every other seat exactly once.

/// Album index assigned to `seat` in `round`, for a table of `seats` players.
pub fn assignment(seat: usize, round: usize, seats: usize) -> usize {
    debug_assert!(seats > 0, "assignment over an empty table");
    (seat + round) % seats
}

/// Album index for every seat in turn order.
pub fn assignments(seats: usize, round: usize) -> Vec<usize> {
    (0..seats).map(|seat| assignment(seat, round, seats)).collect()
}

/// Number of drawing/describing rounds a table of `seats` plays.
pub fn total_rounds(seats: usize) -> usize {
    seats.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn each_round_is_a_permutation() {
        for n in 2..=9 {
            for round in 1..n {
                let albums: HashSet<usize> = assignments(n, round).into_iter().collect();
                assert_eq!(albums.len(), n, "n={} round={}", n, round);
            }
        }
    }

    #[test]
    fn nobody_receives_their_own_album_before_the_last_round() {
        for n in 2..=9 {
            for round in 1..total_rounds(n) + 1 {
                for seat in 0..n {
                    assert_ne!(assignment(seat, round, n), seat, "n={} round={}", n, round);
                }
            }
        }
    }

    #[test]
    fn consecutive_rounds_hand_every_album_to_a_new_seat() {
        for n in 3..=9 {
            for round in 2..n {
                let prev = assignments(n, round - 1);
                let next = assignments(n, round);
                for seat in 0..n {
                    assert_ne!(prev[seat], next[seat]);
                }
            }
        }
    }

    #[test]
    fn every_album_visits_every_other_seat_once() {
        for n in 2..=9 {
            for album in 0..n {
                let visitors: Vec<usize> = (1..=total_rounds(n))
                    .flat_map(|round| {
                        (0..n).filter(move |seat| assignment(*seat, round, n) == album)
                    })
                    .collect();
                let distinct: HashSet<usize> = visitors.iter().copied().collect();
                assert_eq!(visitors.len(), n - 1);
                assert_eq!(distinct.len(), n - 1);
                assert!(!distinct.contains(&album));
            }
        }
    }

    #[test]
    fn two_players_swap_albums() {
        assert_eq!(assignments(2, 1), vec![1, 0]);
    }
}
