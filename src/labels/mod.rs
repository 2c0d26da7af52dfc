//! Class id to display name resolution.
//!
//! Labels come from a JSON file or the built-in COCO table. A `LabelCache`
//! loads its table at most once through a `OnceLock`, so concurrent frames
//! share one read-only table. Load failures never reach the caller: the
//! cache logs them and falls back to the built-in table.

mod coco;
mod schema;

pub use coco::COCO_LABELS;

use crate::trace::trace_warn;
use crate::util::{DetDecodeError, DetDecodeResult};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// How table names are rendered for output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelNaming {
    /// Spaces and underscores become dots (`"traffic light"` -> `"traffic.light"`).
    #[default]
    Dotted,
    /// Names are returned unchanged.
    Raw,
}

/// Ordered class names indexed by class id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    /// Creates a table from names in class-id order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the built-in 80-class COCO table.
    pub fn coco() -> Self {
        Self::new(COCO_LABELS)
    }

    /// Loads a table from a JSON label file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> DetDecodeResult<Self> {
        let path = path.as_ref();
        let load_err = |reason: String| DetDecodeError::LabelLoad {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| load_err(err.to_string()))?;
        let names = schema::parse_labels(&text).map_err(load_err)?;
        Ok(Self { names })
    }

    /// Returns the number of classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when the table holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the stored name for `class_id`, if any.
    pub fn get(&self, class_id: u32) -> Option<&str> {
        self.names.get(class_id as usize).map(String::as_str)
    }

    /// Resolves a display name; ids past the table become `"class.<id>"`.
    pub fn resolve(&self, class_id: u32, naming: LabelNaming) -> Cow<'_, str> {
        match self.get(class_id) {
            Some(name) => match naming {
                LabelNaming::Raw => Cow::Borrowed(name),
                LabelNaming::Dotted if name.contains([' ', '_']) => {
                    Cow::Owned(name.replace([' ', '_'], "."))
                }
                LabelNaming::Dotted => Cow::Borrowed(name),
            },
            None => Cow::Owned(format!("class.{class_id}")),
        }
    }

    /// Returns the first class id whose stored name equals `name`.
    pub fn class_id(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }
}

/// Where label names come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelSource {
    /// The built-in COCO table.
    #[default]
    BuiltIn,
    /// A JSON label file.
    Path(PathBuf),
}

/// Where the cached table actually came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelOrigin {
    /// Parsed from the configured file.
    File,
    /// The built-in table was requested.
    BuiltIn,
    /// The configured file failed to load; built-in table in use.
    Fallback,
    /// Supplied directly by the caller.
    Fixture,
}

#[derive(Debug)]
struct Loaded {
    table: LabelTable,
    origin: LabelOrigin,
}

/// Caller-owned, load-once label cache.
#[derive(Debug)]
pub struct LabelCache {
    source: LabelSource,
    slot: OnceLock<Loaded>,
}

impl LabelCache {
    /// Creates an empty cache for `source`; nothing is read until first use.
    pub fn new(source: LabelSource) -> Self {
        Self {
            source,
            slot: OnceLock::new(),
        }
    }

    /// Creates a cache pre-filled with a fixture table.
    pub fn with_table(table: LabelTable) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Loaded {
            table,
            origin: LabelOrigin::Fixture,
        });
        Self {
            source: LabelSource::BuiltIn,
            slot,
        }
    }

    /// Returns the configured source.
    pub fn source(&self) -> &LabelSource {
        &self.source
    }

    /// Returns the table, loading it on first call.
    pub fn table(&self) -> &LabelTable {
        &self.loaded().table
    }

    /// Returns where the table came from, loading it on first call.
    pub fn origin(&self) -> LabelOrigin {
        self.loaded().origin
    }

    /// Returns true once a table has been loaded or injected.
    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Resolves `class_id` against the cached table.
    pub fn resolve(&self, class_id: u32, naming: LabelNaming) -> Cow<'_, str> {
        self.table().resolve(class_id, naming)
    }

    /// Drops the cached table so the next access reloads from the source.
    ///
    /// Exclusive access guarantees no frame is reading the old table.
    pub fn invalidate(&mut self) {
        self.slot.take();
    }

    fn loaded(&self) -> &Loaded {
        self.slot.get_or_init(|| load(&self.source))
    }
}

fn load(source: &LabelSource) -> Loaded {
    match source {
        LabelSource::BuiltIn => Loaded {
            table: LabelTable::coco(),
            origin: LabelOrigin::BuiltIn,
        },
        LabelSource::Path(path) => match LabelTable::from_json_file(path) {
            Ok(table) => Loaded {
                table,
                origin: LabelOrigin::File,
            },
            Err(err) => {
                trace_warn!("label_fallback", error = err);
                Loaded {
                    table: LabelTable::coco(),
                    origin: LabelOrigin::Fallback,
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_table_has_eighty_classes() {
        let table = LabelTable::coco();
        assert_eq!(table.len(), 80);
        assert_eq!(table.get(0), Some("person"));
        assert_eq!(table.get(79), Some("toothbrush"));
    }

    #[test]
    fn out_of_range_ids_get_synthetic_names() {
        let table = LabelTable::new(["cat"]);
        assert_eq!(table.resolve(1, LabelNaming::Dotted), "class.1");
        assert_eq!(table.resolve(500, LabelNaming::Raw), "class.500");
    }

    #[test]
    fn dotted_naming_replaces_separators() {
        let table = LabelTable::coco();
        assert_eq!(table.resolve(9, LabelNaming::Dotted), "traffic.light");
        assert_eq!(table.resolve(9, LabelNaming::Raw), "traffic light");
        let table = LabelTable::new(["hair_drier x"]);
        assert_eq!(table.resolve(0, LabelNaming::Dotted), "hair.drier.x");
    }

    #[test]
    fn missing_file_falls_back_to_coco() {
        let cache = LabelCache::new(LabelSource::Path(PathBuf::from(
            "/nonexistent/detdecode/labels.json",
        )));
        assert!(!cache.is_loaded());
        assert_eq!(cache.origin(), LabelOrigin::Fallback);
        assert_eq!(cache.table().len(), 80);
        assert!(cache.is_loaded());
    }

    #[test]
    fn fixture_tables_bypass_loading() {
        let mut cache = LabelCache::with_table(LabelTable::new(["widget"]));
        assert_eq!(cache.origin(), LabelOrigin::Fixture);
        assert_eq!(cache.resolve(0, LabelNaming::Raw), "widget");
        cache.invalidate();
        assert!(!cache.is_loaded());
        assert_eq!(cache.origin(), LabelOrigin::BuiltIn);
    }

    #[test]
    fn class_id_lookup() {
        assert_eq!(LabelTable::coco().class_id("person"), Some(0));
        assert_eq!(LabelTable::coco().class_id("unicorn"), None);
    }
}
