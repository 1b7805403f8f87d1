//! Credential registry over a flat-file store
//!
//! Maps token container ids (and optional, unique aliases) to secrets that
//! are always encrypted at rest. The whole registry is loaded from a
//! `containerId[#alias]=protectedSecret` text file at startup, mutated in
//! memory, and written back wholesale on save.

use crate::args::ArgList;
use crate::error::{ArgsResult, StoreError, StoreResult};
use crate::protect::{decode_protected, encode_protected, Scope, SecretProtector};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// A single registry record, keyed by its container id
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Canonical identifier of the token credential slot (case-insensitive,
    /// unique)
    pub container_id: String,
    /// Optional friendly name (case-insensitive, unique across all records)
    pub alias: Option<String>,
    /// Already-protected secret, base64 text as stored on disk
    pub protected_secret: String,
}

/// Registry of per-container secrets with alias lookup
///
/// Records keep insertion order so saves are deterministic. The alias index
/// is maintained alongside the records: every alias refers to an existing
/// record, and a container has at most one alias.
pub struct CredentialStore {
    entries: Vec<CredentialRecord>,
    /// lower-cased alias -> container id as stored
    aliases: HashMap<String, String>,
}

impl CredentialStore {
    /// Create an empty registry
    pub fn new() -> Self {
        CredentialStore {
            entries: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All records in insertion order
    pub fn entries(&self) -> &[CredentialRecord] {
        &self.entries
    }

    /// Container ids in insertion order
    pub fn container_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.container_id.clone()).collect()
    }

    /// Load a registry from a config file
    ///
    /// A missing file yields an empty registry. Parsing is best-effort per
    /// line: malformed or colliding lines are skipped, never fatal. Secrets
    /// are read verbatim; load never re-encrypts.
    pub fn load(path: &Path) -> StoreResult<CredentialStore> {
        let mut store = CredentialStore::new();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(store),
            Err(e) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        for line in contents.lines() {
            if let Some((container, alias, protected)) = decode_line(line) {
                let _ = store.add_protected_entry(&container, &protected, alias.as_deref());
            }
        }

        Ok(store)
    }

    /// Write the whole registry to a config file, one record per line
    ///
    /// Creates missing parent directories and overwrites the file; record
    /// order matches insertion order.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let mut out = String::new();
        for record in &self.entries {
            out.push_str(&record.container_id);
            if let Some(alias) = &record.alias {
                out.push('#');
                out.push_str(alias);
            }
            out.push('=');
            out.push_str(&record.protected_secret);
            out.push('\n');
        }

        fs::write(path, out).map_err(write_err)
    }

    /// Protect a plaintext secret and register it under `container_id`
    pub fn add_entry(
        &mut self,
        container_id: &str,
        plain_secret: &str,
        alias: Option<&str>,
        protector: &dyn SecretProtector,
        scope: Scope,
    ) -> StoreResult<()> {
        let blob = protector.protect(plain_secret.as_bytes(), scope)?;
        self.add_protected_entry(container_id, &encode_protected(&blob), alias)
    }

    /// Register an already-protected secret verbatim (load path)
    ///
    /// An empty or whitespace-only alias counts as no alias. Fails on a
    /// colliding container id or alias, leaving the registry unchanged.
    pub fn add_protected_entry(
        &mut self,
        container_id: &str,
        protected_secret: &str,
        alias: Option<&str>,
    ) -> StoreResult<()> {
        let alias = alias.map(str::trim).filter(|a| !a.is_empty());

        if self.position_of(container_id).is_some() {
            return Err(StoreError::DuplicateContainer(container_id.to_string()));
        }
        if let Some(alias) = alias {
            if self.aliases.contains_key(&alias.to_lowercase()) {
                return Err(StoreError::DuplicateAlias(alias.to_string()));
            }
            self.aliases
                .insert(alias.to_lowercase(), container_id.to_string());
        }

        self.entries.push(CredentialRecord {
            container_id: container_id.to_string(),
            alias: alias.map(str::to_string),
            protected_secret: protected_secret.to_string(),
        });
        Ok(())
    }

    /// Look up a record by container id or alias (case-insensitive)
    ///
    /// Returns the canonical container id and the protected secret; absence
    /// is a routine miss, not an error.
    pub fn get_entry(&self, id_or_alias: &str) -> Option<(&str, &str)> {
        let target = self
            .aliases
            .get(&id_or_alias.to_lowercase())
            .map(String::as_str)
            .unwrap_or(id_or_alias);

        let record = &self.entries[self.position_of(target)?];
        Some((record.container_id.as_str(), record.protected_secret.as_str()))
    }

    /// Reverse lookup: the alias registered for a container, if any
    pub fn get_alias_for(&self, container_id: &str) -> Option<&str> {
        self.entries[self.position_of(container_id)?].alias.as_deref()
    }

    /// Remove a record by container id or alias
    ///
    /// The record and its alias mapping go together; neither is ever left
    /// dangling. Returns false when nothing matched.
    pub fn remove_entry(&mut self, id_or_alias: &str) -> bool {
        let target = self
            .aliases
            .get(&id_or_alias.to_lowercase())
            .cloned()
            .unwrap_or_else(|| id_or_alias.to_string());

        match self.position_of(&target) {
            Some(index) => {
                let record = self.entries.remove(index);
                if let Some(alias) = record.alias {
                    self.aliases.remove(&alias.to_lowercase());
                }
                true
            }
            None => false,
        }
    }

    /// Recover the plaintext for a stored protected secret
    ///
    /// The returned buffer zeroes itself on drop; use it and let it go.
    pub fn decrypt_secret(
        &self,
        protected_secret: &str,
        protector: &dyn SecretProtector,
    ) -> StoreResult<Zeroizing<Vec<u8>>> {
        let blob = decode_protected(protected_secret)?;
        Ok(protector.unprotect(&blob)?)
    }

    fn position_of(&self, container_id: &str) -> Option<usize> {
        let wanted = container_id.to_lowercase();
        self.entries
            .iter()
            .position(|r| r.container_id.to_lowercase() == wanted)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one config line into (container id, alias, protected secret)
///
/// The first `=` splits key from value; a line without one, or with it in
/// the leading position, is skipped. The first `#` inside the key portion
/// splits container id from alias. `#` and `=` are reserved delimiters and
/// cannot appear inside ids or aliases.
fn decode_line(line: &str) -> Option<(String, Option<String>, String)> {
    let eq = line.find('=')?;
    if eq == 0 {
        return None;
    }

    let key = &line[..eq];
    let value = line[eq + 1..].trim();

    let (container, alias) = match key.find('#') {
        Some(hash) => {
            let alias = key[hash + 1..].trim();
            (
                key[..hash].trim(),
                (!alias.is_empty()).then(|| alias.to_string()),
            )
        }
        None => (key.trim(), None),
    };

    if container.is_empty() {
        return None;
    }
    Some((container.to_string(), alias, value.to_string()))
}

/// Default config file location in the platform config directory
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("", "", "tokpin")
        .map(|dirs| dirs.config_dir().join("tokpin.cfg"))
        .unwrap_or_else(|| PathBuf::from("tokpin.cfg"))
}

/// Resolve the config path from the `-config` switch, or fall back to the
/// default location
pub fn resolve_config_path(args: &ArgList) -> ArgsResult<PathBuf> {
    Ok(args
        .switch_value("config")?
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::ScopedProtector;
    use tempfile::TempDir;

    fn protector() -> ScopedProtector {
        ScopedProtector::with_identity(b"machine-a", b"machine-a\0alice")
    }

    #[test]
    fn test_decode_line_with_alias() {
        assert_eq!(
            decode_line("c1#aliasX=ZZZ"),
            Some(("c1".to_string(), Some("aliasX".to_string()), "ZZZ".to_string()))
        );
    }

    #[test]
    fn test_decode_line_without_alias() {
        assert_eq!(
            decode_line("c1=ZZZ"),
            Some(("c1".to_string(), None, "ZZZ".to_string()))
        );
    }

    #[test]
    fn test_decode_line_malformed() {
        assert_eq!(decode_line("no separator"), None);
        assert_eq!(decode_line("=value"), None);
        assert_eq!(decode_line(""), None);
    }

    #[test]
    fn test_decode_line_empty_alias_dropped() {
        assert_eq!(
            decode_line("c1#  =ZZZ"),
            Some(("c1".to_string(), None, "ZZZ".to_string()))
        );
    }

    #[test]
    fn test_add_and_get_by_id_and_alias() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "ZZZ", Some("A")).unwrap();

        assert_eq!(store.get_entry("tok1"), Some(("tok1", "ZZZ")));
        assert_eq!(store.get_entry("TOK1"), Some(("tok1", "ZZZ")));
        assert_eq!(store.get_entry("a"), Some(("tok1", "ZZZ")));
        assert_eq!(store.get_alias_for("tok1"), Some("A"));
        assert_eq!(store.get_entry("unknown"), None);
    }

    #[test]
    fn test_duplicate_container_rejected() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "first", None).unwrap();

        let result = store.add_protected_entry("TOK1", "second", None);
        assert!(matches!(result, Err(StoreError::DuplicateContainer(_))));

        // first entry untouched
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_entry("tok1"), Some(("tok1", "first")));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "x", Some("A")).unwrap();

        let result = store.add_protected_entry("tok2", "y", Some("a"));
        assert!(matches!(result, Err(StoreError::DuplicateAlias(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_blank_alias_means_no_alias() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "x", Some("   ")).unwrap();
        assert_eq!(store.get_alias_for("tok1"), None);
    }

    #[test]
    fn test_remove_by_alias_removes_both() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "x", Some("A")).unwrap();

        assert!(store.remove_entry("A"));
        assert_eq!(store.get_entry("A"), None);
        assert_eq!(store.get_entry("tok1"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_by_container_removes_alias() {
        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "x", Some("A")).unwrap();

        assert!(store.remove_entry("tok1"));
        // alias may be reused afterwards
        store.add_protected_entry("tok2", "y", Some("A")).unwrap();
        assert_eq!(store.get_entry("A"), Some(("tok2", "y")));
    }

    #[test]
    fn test_remove_miss_returns_false() {
        let mut store = CredentialStore::new();
        assert!(!store.remove_entry("nothing"));
    }

    #[test]
    fn test_load_missing_file_is_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::load(&temp_dir.path().join("absent.cfg")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tokpin.cfg");
        std::fs::write(&path, "tok1#A=ZZZ\ngarbage line\n=orphan\ntok2=YYY\n").unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_entry("A"), Some(("tok1", "ZZZ")));
        assert_eq!(store.get_entry("tok2"), Some(("tok2", "YYY")));
    }

    #[test]
    fn test_save_load_round_trip_preserves_protected_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tokpin.cfg");

        let mut store = CredentialStore::new();
        store.add_protected_entry("tok1", "ZZZ", Some("A")).unwrap();
        store.add_protected_entry("tok2", "YYY", None).unwrap();
        store.save(&path).unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        assert_eq!(reloaded.get_entry("A"), Some(("tok1", "ZZZ")));
        assert_eq!(reloaded.get_alias_for("tok1"), Some("A"));
        assert_eq!(reloaded.get_entry("tok2"), Some(("tok2", "YYY")));
    }

    #[test]
    fn test_save_preserves_insertion_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tokpin.cfg");

        let mut store = CredentialStore::new();
        store.add_protected_entry("tok2", "b", None).unwrap();
        store.add_protected_entry("tok1", "a", Some("A")).unwrap();
        store.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "tok2=b\ntok1#A=a\n");
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("tokpin.cfg");

        let store = CredentialStore::new();
        store.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_protect_then_decrypt_round_trip() {
        let protector = protector();
        let mut store = CredentialStore::new();
        store
            .add_entry("tok1", "secret1", Some("A"), &protector, Scope::User)
            .unwrap();

        let (_, protected) = store.get_entry("A").unwrap();
        let plain = store.decrypt_secret(protected, &protector).unwrap();
        assert_eq!(plain.as_slice(), b"secret1");
    }

    #[test]
    fn test_decrypt_corrupt_secret_fails() {
        let protector = protector();
        let store = CredentialStore::new();
        assert!(store.decrypt_secret("!!not base64!!", &protector).is_err());
        assert!(store.decrypt_secret("AAAA", &protector).is_err());
    }

    #[test]
    fn test_resolve_config_path_from_switch() {
        let args = ArgList::from_tokens(
            vec!["add".into(), "-config".into(), "custom.cfg".into()],
            false,
        );
        assert_eq!(
            resolve_config_path(&args).unwrap(),
            PathBuf::from("custom.cfg")
        );
    }

    #[test]
    fn test_resolve_config_path_default() {
        let args = ArgList::from_tokens(vec!["list".into()], false);
        let path = resolve_config_path(&args).unwrap();
        assert!(path.to_string_lossy().ends_with("tokpin.cfg"));
    }
}
