use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{Metadata, Resource};
use crate::error::{BuildLensError, Result};
use crate::record::Revision;

/// Format of the git resource's `committer_date` (e.g., "2020-01-02 03:04:05 +0000").
pub const COMMITTER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Pulls the source revision out of the merged metadata.
///
/// The first `git` resource in `resources` decides which name is extracted; other
/// `git` resources stay in the returned map. The extracted name is removed from
/// the map.
///
/// # Errors
///
/// Returns [`BuildLensError::TimestampParse`] when `committer_date` is present but
/// does not match [`COMMITTER_DATE_FORMAT`].
pub fn extract_revision<'a, I>(
    resources: I,
    mut merged: BTreeMap<String, Metadata>,
) -> Result<(Option<Revision>, BTreeMap<String, Metadata>)>
where
    I: IntoIterator<Item = &'a Resource>,
{
    let Some(source) = resources.into_iter().find(|r| r.is_revision_source()) else {
        return Ok((None, merged));
    };

    let Some(git) = merged.remove(&source.name) else {
        return Ok((None, merged));
    };

    let revision = Revision {
        committer: git.get("committer").cloned(),
        branch: git.get("branch").cloned(),
        name: git.get("branch").cloned(),
        message: git.get("message").map(|m| m.trim().to_string()),
        sha: git.get("commit").cloned(),
        timestamp: git
            .get("committer_date")
            .map(|value| parse_committer_date(value))
            .transpose()?,
    };

    Ok((Some(revision), merged))
}

pub fn parse_committer_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, COMMITTER_DATE_FORMAT)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|source| BuildLensError::TimestampParse {
            value: value.to_string(),
            source,
        })
}
