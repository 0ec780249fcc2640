//! Set reconciliation between upstream and local inventories by unit key.

use crate::error::{SyncError, SyncResult};
use nodemirror_types::{Keyed, UnitKey};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use tracing::{debug, warn};

/// Units in `available` whose key is absent from `present`.
///
/// Output keeps first-seen order of `available`. When `available` repeats a
/// key, the last record wins but keeps the position of the first.
pub fn diff<T, P>(
    available: impl IntoIterator<Item = T>,
    present: impl IntoIterator<Item = P>,
) -> Vec<T>
where
    T: Keyed,
    P: Keyed,
{
    match try_diff(available.into_iter().map(Ok::<T, Infallible>), present) {
        Ok(missing) => missing,
        Err(never) => match never {},
    }
}

/// Like [`diff`] over a fallible stream; the first error ends the pass.
///
/// `available` is consumed in one pass. Only the key set of `present` and
/// the missing records are held.
pub fn try_diff<T, P, E>(
    available: impl IntoIterator<Item = Result<T, E>>,
    present: impl IntoIterator<Item = P>,
) -> Result<Vec<T>, E>
where
    T: Keyed,
    P: Keyed,
{
    let present = key_set(present);
    let mut positions: HashMap<UnitKey, usize> = HashMap::new();
    let mut missing: Vec<T> = Vec::new();

    for unit in available {
        let unit = unit?;
        let key = unit.unit_key();
        if present.contains(&key) {
            continue;
        }
        match positions.entry(key) {
            Entry::Occupied(slot) => {
                warn!("Duplicate unit key upstream, keeping last: {}", slot.key());
                missing[*slot.get()] = unit;
            }
            Entry::Vacant(slot) => {
                slot.insert(missing.len());
                missing.push(unit);
            }
        }
    }

    debug!("{} units missing locally", missing.len());
    Ok(missing)
}

/// Like [`diff`], but a repeated key in `available` is an error.
pub fn diff_strict<T, P>(
    available: impl IntoIterator<Item = T>,
    present: impl IntoIterator<Item = P>,
) -> SyncResult<Vec<T>>
where
    T: Keyed,
    P: Keyed,
{
    let present = key_set(present);
    let mut seen: HashSet<UnitKey> = HashSet::new();
    let mut missing = Vec::new();

    for unit in available {
        let key = unit.unit_key();
        if !seen.insert(key.clone()) {
            return Err(SyncError::DuplicateUnitKey(key.to_string()));
        }
        if !present.contains(&key) {
            missing.push(unit);
        }
    }
    Ok(missing)
}

/// Units in `present` whose key no longer appears in `available`.
///
/// Every local copy of an orphaned key is returned.
pub fn orphans<P, A>(
    present: impl IntoIterator<Item = P>,
    available: impl IntoIterator<Item = A>,
) -> Vec<P>
where
    P: Keyed,
    A: Keyed,
{
    match try_orphans(present, available.into_iter().map(Ok::<A, Infallible>)) {
        Ok(gone) => gone,
        Err(never) => match never {},
    }
}

/// Like [`orphans`] over a fallible stream; the first error ends the pass.
///
/// Only the keys of `present` are held while `available` is read.
pub fn try_orphans<P, A, E>(
    present: impl IntoIterator<Item = P>,
    available: impl IntoIterator<Item = Result<A, E>>,
) -> Result<Vec<P>, E>
where
    P: Keyed,
    A: Keyed,
{
    let present: Vec<(UnitKey, P)> = present.into_iter().map(|u| (u.unit_key(), u)).collect();
    let mut unseen: HashSet<UnitKey> = present.iter().map(|(key, _)| key.clone()).collect();
    for unit in available {
        unseen.remove(&unit?.unit_key());
    }
    Ok(present
        .into_iter()
        .filter(|(key, _)| unseen.contains(key))
        .map(|(_, unit)| unit)
        .collect())
}

fn key_set<K: Keyed>(units: impl IntoIterator<Item = K>) -> HashSet<UnitKey> {
    units.into_iter().map(|u| u.unit_key()).collect()
}
