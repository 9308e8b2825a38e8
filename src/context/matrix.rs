//! The `level -> permitted context keys` mapping (spec §6 `loggingMatrix`).

use std::collections::{HashMap, HashSet};

use crate::level::Level;

/// Maps a level to the set of context keys allowed to flow into records
/// emitted at that level. Levels absent from the map impose no restriction.
pub type LoggingMatrix = HashMap<Level, HashSet<String>>;

/// Build a [`LoggingMatrix`] from `(level, keys)` pairs, e.g.
/// `matrix_from([(Level::Info, vec!["userId"])])`.
pub fn matrix_from<I, K>(entries: I) -> LoggingMatrix
where
    I: IntoIterator<Item = (Level, Vec<K>)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(level, keys)| (level, keys.into_iter().map(Into::into).collect()))
        .collect()
}
