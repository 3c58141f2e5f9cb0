//! The benchmark history store: named, append-only groups of per-commit
//! benchmark entries, with rerun deduplication.
//!
//! `snapshot` handles the persisted form, `lock` the cross-process exclusive
//! lock around read-modify-write cycles.

use chrono::{DateTime, Utc};

use crate::bench::Entry;
use crate::errors::{Error, Result};

pub mod lock;
pub mod snapshot;

pub use snapshot::Flavor;

/// An ordered sequence of entries sharing one logical suite name. Entries are
/// only ever appended or (for reruns of a non-distinct commit) replaced in
/// place, never removed or reordered.
#[derive(Clone, Debug)]
pub struct BenchmarkGroup {
    pub name: String,
    entries: Vec<Entry>,
}

impl BenchmarkGroup {
    fn new(name: &str) -> Self {
        BenchmarkGroup {
            name: name.to_owned(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

/// What `HistoryStore::append` did with the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was added at the end of the group.
    Appended,
    /// The entry replaced the group's most recent entry, which recorded a
    /// rerun of the same (non-distinct) commit.
    Replaced,
}

/// The full history: repository URL, last-update instant and an
/// insertion-ordered mapping from group name to group.
///
/// Not designed for concurrent mutation; callers needing parallel appends
/// must serialize them, and cross-process writers go through
/// [`lock::StoreLock`].
#[derive(Clone, Debug)]
pub struct HistoryStore {
    pub repo_url: String,
    last_update: DateTime<Utc>,
    groups: Vec<BenchmarkGroup>,
    flavor: Flavor,
}

impl HistoryStore {
    pub fn new(repo_url: &str) -> Self {
        HistoryStore {
            repo_url: repo_url.to_owned(),
            last_update: DateTime::<Utc>::UNIX_EPOCH,
            groups: Vec::new(),
            flavor: Flavor::Json,
        }
    }

    /// Instant of the most recent append across all groups.
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Group names in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn group(&self, name: &str) -> Option<&BenchmarkGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Entries of the named group, oldest first.
    pub fn entries(&self, name: &str) -> Result<&[Entry]> {
        match self.group(name) {
            Some(g) => Ok(&g.entries),
            None => Err(Error::UnknownGroup(name.to_owned())),
        }
    }

    /// Inserts `entry` into the named group, creating the group if absent.
    ///
    /// If the group's most recent entry carries the same commit id and is not
    /// marked distinct, that entry recorded a rerun of the same tree and the
    /// new entry replaces it. Otherwise the entry is appended. All validation
    /// happens before any mutation, so a failed append leaves the store
    /// untouched.
    pub fn append(&mut self, group_name: &str, entry: Entry) -> Result<AppendOutcome> {
        entry.validate()?;

        let pos = match self.groups.iter().position(|g| g.name == group_name) {
            Some(p) => p,
            None => {
                self.groups.push(BenchmarkGroup::new(group_name));
                self.groups.len() - 1
            }
        };

        let date = entry.date;
        let group = &mut self.groups[pos];
        let outcome = match group.entries.last_mut() {
            Some(last) if last.commit.id == entry.commit.id && !last.commit.is_distinct() => {
                *last = entry;
                AppendOutcome::Replaced
            }
            _ => {
                group.entries.push(entry);
                AppendOutcome::Appended
            }
        };

        if date > self.last_update {
            self.last_update = date;
        }
        Ok(outcome)
    }

    /// Structural validation of a freshly deserialized store.
    fn validate(&self) -> Result<()> {
        for group in &self.groups {
            for entry in &group.entries {
                entry
                    .validate()
                    .map_err(|e| Error::CorruptHistory(format!("group '{}': {}", group.name, e)))?;
            }
        }
        Ok(())
    }
}
