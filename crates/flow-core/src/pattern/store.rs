//! Pattern Store: patterns cargados desde un directorio de documentos JSON.
//!
//! Cada entrada es un `Arc<PatternSpec>` inmutable. `reload_dir` reemplaza
//! cada entrada de forma atómica (una ejecución en curso conserva el `Arc`
//! que ya resolvió).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info};

use super::PatternSpec;
use crate::errors::StoreError;

#[derive(Debug, Default)]
pub struct PatternStore {
    patterns: DashMap<String, Arc<PatternSpec>>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store nuevo con todos los `*.json` de `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load_dir(dir)?;
        Ok(store)
    }

    /// Carga (o reemplaza) los patterns de `dir`. Si algún archivo falla no se
    /// aplica ningún cambio. Devuelve los ids cargados.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
        let parsed = read_dir_specs(dir.as_ref())?;
        let ids: Vec<String> = parsed.iter().map(|(_, spec)| spec.id.clone()).collect();
        for (_, spec) in parsed {
            self.insert(spec);
        }
        info!("[store] loaded {} pattern(s) from {}", ids.len(), dir.as_ref().display());
        Ok(ids)
    }

    /// Como `load_dir`, pero además elimina los ids cuyo archivo desapareció.
    pub fn reload_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
        let ids = self.load_dir(dir)?;
        let keep: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.patterns.retain(|id, _| {
                         let kept = keep.contains(id.as_str());
                         if !kept {
                             debug!("[store] dropping pattern '{id}'");
                         }
                         kept
                     });
        Ok(ids)
    }

    /// Inserta o reemplaza un pattern.
    pub fn insert(&self, spec: PatternSpec) -> Option<Arc<PatternSpec>> {
        self.patterns.insert(spec.id.clone(), Arc::new(spec))
    }

    pub fn get(&self, id: &str) -> Option<Arc<PatternSpec>> {
        self.patterns.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<PatternSpec>> {
        self.patterns.remove(id).map(|(_, spec)| spec)
    }

    /// Ids ordenados alfabéticamente.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.patterns.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn read_dir_specs(dir: &Path) -> Result<Vec<(PathBuf, PatternSpec)>, StoreError> {
    let io_err = |source| StoreError::Io { path: dir.to_path_buf(),
                                           source };
    let mut files: Vec<PathBuf> = fs::read_dir(dir).map_err(io_err)?
                                                   .filter_map(Result::ok)
                                                   .map(|e| e.path())
                                                   .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                                                   .collect();
    files.sort();

    let mut parsed: Vec<(PathBuf, PatternSpec)> = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io { path: path.clone(),
                                                                              source })?;
        let spec = PatternSpec::from_json_str(&raw).map_err(|source| StoreError::Parse { path: path.clone(),
                                                                                         source })?;
        if parsed.iter().any(|(_, seen)| seen.id == spec.id) {
            return Err(StoreError::DuplicateId { id: spec.id,
                                                 path });
        }
        debug!("[store] parsed '{}' from {}", spec.id, path.display());
        parsed.push((path, spec));
    }
    Ok(parsed)
}
