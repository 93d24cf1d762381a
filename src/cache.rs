use crate::{compile::Template, log::Error};
use serde::{Deserialize, Serialize};
use std::{
    collections::hash_map::DefaultHasher,
    fs,
    hash::{Hash, Hasher},
    path::PathBuf,
    process,
    time::SystemTime,
};

/// On-disk storage for compiled [`Template`] instances.
///
/// Entries are serialized to JSON files named by a hash of the template
/// name, and carry the modified time of the source file they were
/// compiled from, so a stale entry is ignored rather than rendered.
#[derive(Debug)]
pub struct Cache {
    /// Directory that entries are stored in.
    ///
    /// A `Cache` without a directory accepts every operation and stores
    /// nothing.
    dir: Option<PathBuf>,
}

/// Borrowed form of a cache entry, used when persisting.
#[derive(Serialize)]
struct Snapshot<'template> {
    modified: SystemTime,
    template: &'template Template,
}

/// Owned form of a cache entry, used when fetching.
#[derive(Deserialize)]
struct Entry {
    modified: SystemTime,
    template: Template,
}

impl Cache {
    /// Create a new [`Cache`] over the given directory.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Fetch the [`Template`] stored under the given name.
    ///
    /// Returns `None` when no entry exists, the entry is older than the
    /// given modified time, or the entry cannot be read or deserialized.
    /// An unreadable entry is treated the same as a missing one, so the
    /// caller falls back to compiling from source.
    pub fn fetch(&self, name: &str, modified: SystemTime) -> Option<Template> {
        let path = self.entry_path(name)?;
        let text = fs::read_to_string(path).ok()?;
        let entry: Entry = serde_json::from_str(&text).ok()?;
        if entry.modified < modified {
            return None;
        }

        Some(entry.template)
    }

    /// Persist the [`Template`] under the given name.
    ///
    /// The entry is written to a staging file first and then renamed
    /// into place, so concurrent writers of the same entry resolve to
    /// whichever finished last, and a reader never observes a partial
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the entry cannot be written.
    pub fn persist(
        &self,
        name: &str,
        modified: SystemTime,
        template: &Template,
    ) -> Result<(), Error> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|_| error_cache("create"))?;

        let snapshot = Snapshot { modified, template };
        let text = serde_json::to_string(&snapshot).map_err(|_| error_cache("serialize"))?;

        let path = dir.join(entry_name(name));
        let staging = path.with_extension(format!("{}.tmp", process::id()));
        fs::write(&staging, text).map_err(|_| error_cache("write"))?;
        fs::rename(&staging, &path).map_err(|_| error_cache("write"))?;

        Ok(())
    }

    /// Remove every entry from the [`Cache`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the directory cannot be read, or an
    /// entry cannot be removed.
    pub fn clear(&self) -> Result<(), Error> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        if !dir.exists() {
            return Ok(());
        }

        for result in fs::read_dir(dir).map_err(|_| error_cache("clear"))? {
            let entry = result.map_err(|_| error_cache("clear"))?;
            let path = entry.path();
            if path.extension().is_some_and(|extension| extension == "json") {
                fs::remove_file(path).map_err(|_| error_cache("clear"))?;
            }
        }

        Ok(())
    }

    /// Return the path of the entry stored under the given name.
    fn entry_path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(entry_name(name)))
    }
}

/// Return the file name of the entry for the given template name.
fn entry_name(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);

    format!("{:016x}.json", hasher.finish())
}

/// Return an [`Error`] describing a failed cache operation.
fn error_cache(action: &str) -> Error {
    Error::build("cache failure").with_help(format!(
        "failed to {action} compilation cache entry, check the cache directory permissions"
    ))
}

#[cfg(test)]
mod tests {
    use super::Cache;
    use crate::compile::Parser;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_persist_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(Some(dir.path().to_owned()));
        let template = Parser::new("hello, {{ name }}!")
            .compile(Some("hello.html"))
            .unwrap();
        let modified = SystemTime::now();
        cache.persist("hello.html", modified, &template).unwrap();

        let fetched = cache.fetch("hello.html", modified).unwrap();
        assert_eq!(fetched.get_source(), template.get_source());
        assert_eq!(fetched.get_name(), Some("hello.html"));
    }

    #[test]
    fn test_fetch_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(Some(dir.path().to_owned()));
        let template = Parser::new("{{ name }}").compile(Some("stale.html")).unwrap();
        let modified = SystemTime::now();
        cache.persist("stale.html", modified, &template).unwrap();

        // The source file changed after the entry was written.
        let newer = modified + Duration::from_secs(10);
        assert!(cache.fetch("stale.html", newer).is_none());
        assert!(cache.fetch("stale.html", modified).is_some());
    }

    #[test]
    fn test_fetch_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(Some(dir.path().to_owned()));

        assert!(cache.fetch("ghost.html", SystemTime::now()).is_none());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(Some(dir.path().to_owned()));
        let template = Parser::new("x").compile(Some("x.html")).unwrap();
        let modified = SystemTime::now();
        cache.persist("x.html", modified, &template).unwrap();

        cache.clear().unwrap();
        assert!(cache.fetch("x.html", modified).is_none());
    }

    #[test]
    fn test_disabled() {
        let cache = Cache::new(None);
        let template = Parser::new("x").compile(None).unwrap();
        let modified = SystemTime::now();

        cache.persist("x.html", modified, &template).unwrap();
        assert!(cache.fetch("x.html", modified).is_none());
        cache.clear().unwrap();
    }
}
