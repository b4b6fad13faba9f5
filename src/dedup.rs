use std::collections::HashSet;

use crate::models::Listing;

/// Drops listings whose company+title key was already seen, keeping the first
/// occurrence and the original order. Returns the survivors and how many were removed.
pub fn dedup_listings(listings: Vec<Listing>) -> (Vec<Listing>, usize) {
    let initial = listings.len();
    let mut seen: HashSet<String> = HashSet::new();

    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| seen.insert(listing.dedup_key()))
        .collect();

    let removed = initial - kept.len();
    (kept, removed)
}
