//! The persisted snapshot: a single JSON object with `lastUpdate` (epoch
//! millis), `repoUrl` and an `entries` map of group name to entry array.
//!
//! Serialization is deterministic (insertion-ordered group map, fixed key
//! order, stable range formatting) so that re-serializing unchanged state is
//! byte-identical, which keeps CI diffs and idempotent re-writes clean.
//!
//! Two flavors are handled: bare JSON, and the `window.BENCHMARK_DATA = {...}`
//! JavaScript assignment that chart front ends load directly. The flavor seen
//! at load time is reproduced on save.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::TimeZone;
use chrono::Utc;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{BenchmarkGroup, HistoryStore};
use crate::bench::Entry;
use crate::errors::{Error, Result};

/// On-disk framing of the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    /// A bare JSON object.
    Json,
    /// `window.BENCHMARK_DATA = {...}`, ready for a `<script src=...>` tag.
    DataJs,
}

const DATA_JS_PREFIX: &str = "window.BENCHMARK_DATA";
const FIELDS: &[&str] = &["lastUpdate", "repoUrl", "entries"];

impl Serialize for HistoryStore {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("lastUpdate", &self.last_update.timestamp_millis())?;
        map.serialize_entry("repoUrl", &self.repo_url)?;
        map.serialize_entry("entries", &GroupMap(&self.groups))?;
        map.end()
    }
}

/// Serializes the group list as a JSON object, preserving insertion order.
struct GroupMap<'a>(&'a [BenchmarkGroup]);

impl Serialize for GroupMap<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in self.0 {
            map.serialize_entry(&group.name, &group.entries)?;
        }
        map.end()
    }
}

/// Deserializes the `entries` object in document order, rejecting duplicate
/// group keys.
struct GroupsFromMap(Vec<BenchmarkGroup>);

impl<'de> Deserialize<'de> for GroupsFromMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = GroupsFromMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of group name to entry array")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut groups: Vec<BenchmarkGroup> = Vec::new();
                while let Some((name, entries)) = map.next_entry::<String, Vec<Entry>>()? {
                    if groups.iter().any(|g| g.name == name) {
                        return Err(de::Error::custom(format!("duplicate group key '{}'", name)));
                    }
                    groups.push(BenchmarkGroup { name, entries });
                }
                Ok(GroupsFromMap(groups))
            }
        }

        deserializer.deserialize_map(GroupsVisitor)
    }
}

impl<'de> Deserialize<'de> for HistoryStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StoreVisitor;

        impl<'de> Visitor<'de> for StoreVisitor {
            type Value = HistoryStore;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a benchmark history snapshot object")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut last_update: Option<i64> = None;
                let mut repo_url: Option<String> = None;
                let mut groups: Option<Vec<BenchmarkGroup>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "lastUpdate" => {
                            if last_update.is_some() {
                                return Err(de::Error::duplicate_field("lastUpdate"));
                            }
                            last_update = Some(map.next_value()?);
                        }
                        "repoUrl" => {
                            if repo_url.is_some() {
                                return Err(de::Error::duplicate_field("repoUrl"));
                            }
                            repo_url = Some(map.next_value()?);
                        }
                        "entries" => {
                            if groups.is_some() {
                                return Err(de::Error::duplicate_field("entries"));
                            }
                            groups = Some(map.next_value::<GroupsFromMap>()?.0);
                        }
                        other => {
                            return Err(de::Error::unknown_field(other, FIELDS));
                        }
                    }
                }

                let millis =
                    last_update.ok_or_else(|| de::Error::missing_field("lastUpdate"))?;
                let last_update = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| {
                        de::Error::custom(format!("lastUpdate {} out of range", millis))
                    })?;

                Ok(HistoryStore {
                    repo_url: repo_url.ok_or_else(|| de::Error::missing_field("repoUrl"))?,
                    last_update,
                    groups: groups.ok_or_else(|| de::Error::missing_field("entries"))?,
                    flavor: Flavor::Json,
                })
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}

impl FromStr for HistoryStore {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (flavor, body) = if trimmed.starts_with(DATA_JS_PREFIX) {
            let body = trimmed
                .split_once('=')
                .map(|(_, rest)| rest)
                .unwrap_or("")
                .trim()
                .trim_end_matches(';');
            (Flavor::DataJs, body)
        } else {
            (Flavor::Json, trimmed)
        };

        let mut store: HistoryStore =
            serde_json::from_str(body).map_err(|e| Error::CorruptHistory(e.to_string()))?;
        store.flavor = flavor;
        store.validate()?;
        Ok(store)
    }
}

impl HistoryStore {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        raw.parse()
    }

    /// Loads the snapshot at `path`, or starts a fresh store when the file
    /// does not exist yet. Callers hold the store lock, so the check is not
    /// racy in practice.
    pub fn load_or_new(path: &Path, repo_url: &str) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(repo_url))
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn set_flavor(&mut self, flavor: Flavor) {
        self.flavor = flavor;
    }

    /// Deterministic textual snapshot in the store's flavor.
    pub fn serialize_snapshot(&self) -> String {
        let json = serde_json::to_string_pretty(self)
            .expect("snapshot serialization of a validated store cannot fail");
        match self.flavor {
            Flavor::Json => json,
            Flavor::DataJs => format!("{} = {}", DATA_JS_PREFIX, json),
        }
    }

    /// Write-temp-then-rename; a failed save leaves the prior snapshot in
    /// place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        fs::write(tmp, self.serialize_snapshot()).map_err(|e| Error::io(tmp, e))?;
        if let Err(e) = fs::rename(tmp, path) {
            let _ = fs::remove_file(tmp);
            return Err(Error::io(path, e));
        }
        Ok(())
    }
}
