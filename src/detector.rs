use crate::models::{ChangeSemantics, Deal, RunResult};
use std::collections::HashSet;

/// Compares the current scrape with the stored identities.
///
/// `new_deals` keeps the deal records for identities not seen before, in
/// reverse page order so the oldest new deal is announced first.
pub fn detect(current_deals: &[Deal], previous: HashSet<String>, semantics: ChangeSemantics) -> RunResult {
    let current: HashSet<String> = current_deals.iter().map(|d| d.identity.clone()).collect();

    let mut new_deals: Vec<Deal> = current_deals
        .iter()
        .filter(|deal| !previous.contains(&deal.identity))
        .cloned()
        .collect();
    new_deals.reverse();

    let changed = match semantics {
        ChangeSemantics::Asymmetric => !new_deals.is_empty(),
        ChangeSemantics::Symmetric => current != previous,
    };

    RunResult {
        current,
        previous,
        new_deals,
        changed,
    }
}
