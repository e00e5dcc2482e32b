// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn delays_double_and_cap_at_sixty_seconds() {
    let mut backoff = Backoff::new();
    let mut seen = Vec::new();
    for _ in 0..8 {
        seen.push(backoff.next_delay().as_secs());
    }
    assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 60, 60]);
}

#[test]
fn reset_starts_the_ladder_over() {
    let mut backoff = Backoff::new();
    for _ in 0..5 {
        backoff.next_delay();
    }
    backoff.reset();
    assert_eq!(backoff.next_delay(), MIN_DELAY);
}
