//! Class table loading.
//!
//! Two sources are supported:
//!
//! ```text
//! classes.txt          data.yaml
//! -----------          ---------
//! person               names: [person, bicycle]
//! bicycle              # or
//!                      names:
//!                        0: person
//!                        1: bicycle
//! ```
//!
//! The line index (or the ascending key order) is the class id.

use crate::error::ClassTableError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ordered class names; the index is the class id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassConfig {
    #[serde(default)]
    names: Option<ClassNames>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassNames {
    Sequence(Vec<serde_yaml::Value>),
    Mapping(BTreeMap<i64, serde_yaml::Value>),
}

fn scalar_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl ClassTable {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                log::warn!("Duplicate class name '{}' at id {}", name, i);
            }
        }
        Self { names }
    }

    /// Flat newline separated list. Blank lines are ignored.
    pub fn from_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    /// Structured config with a `names` list or integer-keyed mapping.
    ///
    /// Returns `Ok(None)` when the document parses but has no `names` field.
    pub fn from_yaml(text: &str) -> Result<Option<Self>, ClassTableError> {
        let config: ClassConfig = serde_yaml::from_str(text)?;
        let names = match config.names {
            None => return Ok(None),
            Some(ClassNames::Sequence(values)) => {
                values.into_iter().map(scalar_to_string).collect::<Vec<_>>()
            }
            // BTreeMap iterates keys in ascending order
            Some(ClassNames::Mapping(map)) => map.into_values().map(scalar_to_string).collect(),
        };
        Ok(Some(Self::new(names)))
    }

    /// Load a class file, choosing the parser from the extension.
    pub fn load(path: &Path) -> Result<Self, ClassTableError> {
        let text = std::fs::read_to_string(path)?;
        let table = if is_yaml(path) {
            Self::from_yaml(&text)?.ok_or_else(|| ClassTableError::MissingNames {
                path: path.to_path_buf(),
            })?
        } else {
            Self::from_lines(&text)
        };
        if table.is_empty() {
            return Err(ClassTableError::Empty {
                path: path.to_path_buf(),
            });
        }
        log::info!("Loaded {} classes from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Class name for `id`, or the id itself when it is outside the table.
    pub fn name_for(&self, id: usize) -> String {
        self.get(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Find the first YAML file under `root` that declares class `names`.
pub fn discover_class_file(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_yaml(entry.path()))
        .find(|entry| {
            std::fs::read_to_string(entry.path())
                .ok()
                .and_then(|text| ClassTable::from_yaml(&text).ok().flatten())
                .is_some()
        })
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_list_skips_blank_lines() {
        let table = ClassTable::from_lines("person\n\n  car \nbike\n");
        assert_eq!(table.names(), &["person", "car", "bike"]);
        assert_eq!(table.get(1), Some("car"));
    }

    #[test]
    fn yaml_sequence_names() {
        let table = ClassTable::from_yaml("nc: 2\nnames: [cat, dog]\n")
            .unwrap()
            .unwrap();
        assert_eq!(table.names(), &["cat", "dog"]);
    }

    #[test]
    fn yaml_mapping_sorted_by_key() {
        let table = ClassTable::from_yaml("names:\n  2: c\n  0: a\n  1: b\n")
            .unwrap()
            .unwrap();
        assert_eq!(table.names(), &["a", "b", "c"]);
    }

    #[test]
    fn yaml_numeric_names_become_strings() {
        let table = ClassTable::from_yaml("names: [1, two]\n").unwrap().unwrap();
        assert_eq!(table.names(), &["1", "two"]);
    }

    #[test]
    fn yaml_without_names_is_none() {
        assert!(ClassTable::from_yaml("train: images/train\n").unwrap().is_none());
    }

    #[test]
    fn out_of_range_id_falls_back_to_number() {
        let table = ClassTable::new(["a", "b"]);
        assert_eq!(table.name_for(1), "b");
        assert_eq!(table.name_for(7), "7");
    }

    #[test]
    fn load_dispatches_on_extension() {
        let temp = tempfile::tempdir().unwrap();
        let txt = temp.path().join("classes.txt");
        std::fs::write(&txt, "x\ny\n").unwrap();
        assert_eq!(ClassTable::load(&txt).unwrap().len(), 2);

        let yaml = temp.path().join("data.yml");
        std::fs::write(&yaml, "path: .\n").unwrap();
        assert!(matches!(
            ClassTable::load(&yaml),
            Err(ClassTableError::MissingNames { .. })
        ));
    }

    #[test]
    fn load_rejects_empty_tables() {
        let temp = tempfile::tempdir().unwrap();
        let txt = temp.path().join("classes.txt");
        std::fs::write(&txt, "\n  \n").unwrap();
        assert!(matches!(
            ClassTable::load(&txt),
            Err(ClassTableError::Empty { .. })
        ));

        let yaml = temp.path().join("data.yaml");
        std::fs::write(&yaml, "names: []\n").unwrap();
        assert!(matches!(
            ClassTable::load(&yaml),
            Err(ClassTableError::Empty { .. })
        ));
    }

    #[test]
    fn discover_finds_yaml_with_names() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.yaml"), "train: x\n").unwrap();
        std::fs::create_dir_all(temp.path().join("cfg")).unwrap();
        std::fs::write(temp.path().join("cfg/data.yaml"), "names: [a]\n").unwrap();

        let found = discover_class_file(temp.path()).unwrap();
        assert_eq!(found, temp.path().join("cfg/data.yaml"));
    }
}
