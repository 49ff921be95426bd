//! The aggregated application index.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

use crate::types::{ApplicationId, ProvenanceRecord, VersionKey};

/// Versions of one application, each with the places it was found.
pub type VersionMap = IndexMap<VersionKey, Vec<ProvenanceRecord>>;

/// Mapping of application to version to provenance records.
///
/// Applications, versions and provenance records keep the order they were
/// discovered in: registry order, then listing order. Nothing is sorted.
///
/// An index is built fresh for every aggregation and cannot be modified
/// once handed out; callers wanting newer data run a new build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ApplicationIndex {
    applications: IndexMap<ApplicationId, VersionMap>,
}

impl ApplicationIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a provenance record for an application version.
    ///
    /// Records are appended, never replaced: the same version found in two
    /// repositories yields two records.
    pub(crate) fn record(
        &mut self,
        application: ApplicationId,
        version: VersionKey,
        provenance: ProvenanceRecord,
    ) {
        self.applications
            .entry(application)
            .or_default()
            .entry(version)
            .or_default()
            .push(provenance);
    }

    /// Append every record of `other` after the records already present.
    pub(crate) fn merge(&mut self, other: ApplicationIndex) {
        for (application, versions) in other.applications {
            let target = match self.applications.entry(application) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(VersionMap::new()),
            };
            for (version, records) in versions {
                target.entry(version).or_default().extend(records);
            }
        }
    }

    /// Take one application's versions out of the index, consuming it.
    pub(crate) fn into_application(mut self, application: &str) -> Option<VersionMap> {
        self.applications.swap_remove(application)
    }

    /// Versions of an application, if any server offers it.
    pub fn get(&self, application: &str) -> Option<&VersionMap> {
        self.applications.get(application)
    }

    pub fn contains(&self, application: &str) -> bool {
        self.applications.contains_key(application)
    }

    /// Provenance records for one application version (empty if unknown).
    pub fn provenance(&self, application: &str, version: &str) -> &[ProvenanceRecord] {
        self.applications
            .get(application)
            .and_then(|versions| versions.get(version))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of distinct applications.
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Total number of (application, version) pairs.
    pub fn version_count(&self) -> usize {
        self.applications.values().map(IndexMap::len).sum()
    }

    /// Total number of provenance records.
    pub fn provenance_count(&self) -> usize {
        self.applications
            .values()
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ApplicationId, &VersionMap)> {
        self.applications.iter()
    }

    pub fn applications(&self) -> impl Iterator<Item = &ApplicationId> {
        self.applications.keys()
    }
}

impl<'a> IntoIterator for &'a ApplicationIndex {
    type Item = (&'a ApplicationId, &'a VersionMap);
    type IntoIter = indexmap::map::Iter<'a, ApplicationId, VersionMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.applications.iter()
    }
}
