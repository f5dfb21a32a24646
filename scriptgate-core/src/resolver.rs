//! Reference resolution - which libraries a script may see.
//!
//! Each manifest entry either names a library the engine ships (a builtin)
//! or is a path to a module file. Relative paths are taken from the script's
//! directory.
//!
//! - Unsandboxed: engine ambient set, then every manifest entry
//! - Sandboxed: manifest entries only
//!
//! An entry that cannot be loaded fails the whole resolution. Entries are
//! never dropped, so two libraries may not share a name and a module may not
//! take a name the engine injects itself.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::engine::LibraryCatalog;
use crate::trust::sidecar::LibraryManifest;

/// A manifest entry that could not be turned into a library reference
#[derive(Error, Debug)]
#[error("Failed to resolve library '{entry}': {reason}")]
pub struct ResolutionError {
    pub entry: String,
    pub reason: String,
}

/// One library visible to a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryReference {
    /// A library shipped with the engine, by name
    Builtin(String),
    /// A module file, exposed to the script under its file stem
    Module {
        name: String,
        path: PathBuf,
        source: String,
    },
}

impl LibraryReference {
    /// Name under which the library is visible to the script
    pub fn name(&self) -> &str {
        match self {
            LibraryReference::Builtin(name) => name,
            LibraryReference::Module { name, .. } => name,
        }
    }

    fn same_library(&self, other: &LibraryReference) -> bool {
        match (self, other) {
            (LibraryReference::Builtin(a), LibraryReference::Builtin(b)) => a == b,
            (
                LibraryReference::Module { path: a, .. },
                LibraryReference::Module { path: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

/// Ordered, duplicate-free set of library references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    references: Vec<LibraryReference>,
}

impl ReferenceSet {
    /// Add a reference unless the same library is already present
    pub fn insert(&mut self, reference: LibraryReference) -> bool {
        if self.references.iter().any(|r| r.same_library(&reference)) {
            return false;
        }
        self.references.push(reference);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryReference> {
        self.references.iter()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Names of all references, in order
    pub fn names(&self) -> Vec<&str> {
        self.references.iter().map(LibraryReference::name).collect()
    }

    /// A different library already present under the same name
    pub fn conflicting(&self, reference: &LibraryReference) -> Option<&LibraryReference> {
        self.references
            .iter()
            .find(|r| r.name() == reference.name() && !r.same_library(reference))
    }

    pub fn contains_builtin(&self, name: &str) -> bool {
        self.references
            .iter()
            .any(|r| matches!(r, LibraryReference::Builtin(n) if n == name))
    }
}

/// Turns a library manifest into the reference set for one script
pub struct ReferenceResolver<'a, C: LibraryCatalog + ?Sized> {
    catalog: &'a C,
    base_dir: &'a Path,
}

impl<'a, C: LibraryCatalog + ?Sized> ReferenceResolver<'a, C> {
    pub fn new(catalog: &'a C, base_dir: &'a Path) -> Self {
        Self { catalog, base_dir }
    }

    /// Build the reference set for `manifest` under the given sandbox flag
    #[instrument(skip(self, manifest), fields(entries = manifest.entries().len()))]
    pub fn resolve(
        &self,
        manifest: &LibraryManifest,
        sandbox: bool,
    ) -> Result<ReferenceSet, ResolutionError> {
        let mut references = ReferenceSet::default();

        if sandbox {
            debug!("Sandbox mode - ambient libraries excluded");
        } else {
            for name in self.catalog.ambient() {
                references.insert(LibraryReference::Builtin(name));
            }
        }

        for entry in manifest.entries() {
            let reference = self.resolve_entry(entry)?;
            self.check_name(entry, &reference, &references)?;
            debug!("Resolved '{}' -> {}", entry, reference.name());
            references.insert(reference);
        }

        debug!("Reference set: {:?}", references.names());
        Ok(references)
    }

    /// Every reference must stay reachable under its own name
    fn check_name(
        &self,
        entry: &str,
        reference: &LibraryReference,
        references: &ReferenceSet,
    ) -> Result<(), ResolutionError> {
        let name = reference.name();

        if self.catalog.reserved_names().contains(&name) {
            return Err(ResolutionError {
                entry: entry.to_string(),
                reason: format!("module name '{name}' is reserved by the engine"),
            });
        }

        if let Some(existing) = references.conflicting(reference) {
            let taken_by = match existing {
                LibraryReference::Builtin(builtin) => format!("library '{builtin}'"),
                LibraryReference::Module { path, .. } => format!("module {}", path.display()),
            };
            return Err(ResolutionError {
                entry: entry.to_string(),
                reason: format!("name '{name}' is already taken by {taken_by}"),
            });
        }

        Ok(())
    }

    fn resolve_entry(&self, entry: &str) -> Result<LibraryReference, ResolutionError> {
        if self.catalog.is_builtin(entry) {
            return Ok(LibraryReference::Builtin(entry.to_string()));
        }

        let fail = |reason: String| ResolutionError {
            entry: entry.to_string(),
            reason,
        };

        let candidate = Path::new(entry);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        };

        if !path.is_file() {
            return Err(fail(format!(
                "not a known library and no module file at {}",
                path.display()
            )));
        }

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
            .ok_or_else(|| fail(format!("cannot derive a module name from {}", path.display())))?;

        let source = std::fs::read_to_string(&path)
            .map_err(|e| fail(format!("failed to read {}: {e}", path.display())))?;

        Ok(LibraryReference::Module { name, path, source })
    }
}
