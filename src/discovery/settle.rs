//! Settle-all-then-select combinator
//!
//! Runs every task concurrently, waits for all of them to finish, then picks
//! the first `Some` in submission order. Completion order never affects the
//! choice.

use futures::future::join_all;
use std::future::Future;

/// Await every task and return `(index, value)` of the first `Some` by position
pub async fn settle_all_then_pick_first<I, F, T>(tasks: I) -> Option<(usize, T)>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Option<T>>,
{
    join_all(tasks)
        .await
        .into_iter()
        .enumerate()
        .find_map(|(index, outcome)| outcome.map(|value| (index, value)))
}
