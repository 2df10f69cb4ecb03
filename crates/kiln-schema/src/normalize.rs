use crate::manifest::{ManifestDocument, ManifestError};
use crate::types::{is_valid_module_id, is_valid_segment, Category, ModuleId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Category name reserved for the aggregate installer artifact.
pub const RESERVED_CATEGORY: &str = "all";

const DEFAULT_PHASE: u32 = 1;

/// Validated, typed manifest. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub modules: Vec<Module>,
}

impl Manifest {
    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }
}

/// A single installable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    pub description: String,
    pub category: Category,
    pub phase: u32,
    pub dependencies: Vec<ModuleId>,
    pub enabled_by_default: bool,
    pub tags: BTreeSet<String>,
    pub install: Vec<String>,
    pub installed_check: Option<String>,
    pub run_as: RunAs,
    pub verify: Vec<VerifyCheck>,
    /// 0-based position in the source document, used as the ordering tie-break.
    pub position: usize,
}

impl Module {
    pub fn install_function(&self) -> String {
        self.id.install_function()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunAs {
    #[default]
    User,
    Root,
}

impl fmt::Display for RunAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Root => f.write_str("root"),
        }
    }
}

/// One verification command. Multi-line commands are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyCheck {
    pub command: String,
    pub description: Option<String>,
    pub required: bool,
}

impl ManifestDocument {
    /// Validate every module and build the typed model.
    ///
    /// Structural problems are reported with the module position and the
    /// offending field. Graph-level rules (dangling references, cycles,
    /// phase ordering) are left to the resolver.
    pub fn normalize(&self) -> Result<Manifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        let mut modules: Vec<Module> = Vec::with_capacity(self.modules.len());
        let mut ids: HashMap<ModuleId, usize> = HashMap::new();
        let mut functions: HashMap<String, ModuleId> = HashMap::new();

        for (index, value) in self.modules.iter().enumerate() {
            let module = normalize_module(index, value)?;

            if let Some(&first) = ids.get(&module.id) {
                return Err(ManifestError::DuplicateId {
                    id: module.id.into_inner(),
                    first,
                    second: index,
                });
            }
            let function = module.install_function();
            if let Some(first) = functions.get(&function) {
                return Err(ManifestError::DuplicateFunction {
                    first: first.to_string(),
                    second: module.id.into_inner(),
                    function,
                });
            }

            ids.insert(module.id.clone(), index);
            functions.insert(function, module.id.clone());
            modules.push(module);
        }

        Ok(Manifest {
            version: self.manifest_version,
            modules,
        })
    }
}

/// One module entry as written in the manifest. Every field is optional
/// at this layer so a single field can be checked in isolation when the
/// whole entry fails to deserialize.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    phase: Option<u32>,
    #[serde(default)]
    dependencies: Option<Vec<String>>,
    #[serde(default)]
    enabled_by_default: Option<bool>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    install: Option<OneOrMany<String>>,
    #[serde(default)]
    installed_check: Option<String>,
    #[serde(default)]
    run_as: Option<RunAs>,
    #[serde(default)]
    verify: Option<OneOrMany<VerifyEntry>>,
}

/// A single value or a list of them. `Many` is tried first so a list is
/// never read as a positional table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VerifyEntry {
    Command(String),
    Table(VerifyTable),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifyTable {
    run: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    optional: bool,
}

struct FieldContext {
    index: usize,
    id: Option<String>,
}

impl FieldContext {
    fn error(&self, field: &str, reason: impl Into<String>) -> ManifestError {
        ManifestError::Malformed {
            index: self.index,
            id: self.id.clone(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// Single-line human text: newlines and tabs would break generated comments and records.
    fn check_single_line(&self, field: &str, text: &str) -> Result<(), ManifestError> {
        if text.contains(['\n', '\r', '\t']) {
            return Err(self.error(field, "must be a single line without tabs"));
        }
        Ok(())
    }

    /// Turn a deserialization failure of the whole entry into an error that
    /// names the first field that fails on its own.
    fn deserialize_error(&self, table: &Map<String, Value>, err: &serde_json::Error) -> ManifestError {
        for (key, value) in table {
            let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
            if let Err(field_err) = serde_json::from_value::<ModuleEntry>(single) {
                return self.error(key, field_err.to_string());
            }
        }
        self.error("module", err.to_string())
    }
}

fn normalize_module(index: usize, value: &Value) -> Result<Module, ManifestError> {
    let mut cx = FieldContext { index, id: None };
    let Some(table) = value.as_object() else {
        return Err(cx.error("module", format!("expected a table, got {value}")));
    };
    cx.id = table.get("id").and_then(Value::as_str).map(str::to_owned);

    let entry: ModuleEntry = serde_json::from_value(value.clone())
        .map_err(|e| cx.deserialize_error(table, &e))?;

    let id = match entry.id {
        None => return Err(cx.error("id", "missing required field")),
        Some(raw) if is_valid_module_id(&raw) => ModuleId::new(raw),
        Some(raw) => {
            return Err(cx.error(
                "id",
                format!("invalid module id '{raw}', expected dot-separated segments of [A-Za-z0-9_-]"),
            ))
        }
    };

    let description = match entry.description {
        Some(text) => {
            let text = text.trim().to_owned();
            cx.check_single_line("description", &text)?;
            if text.is_empty() {
                id.to_string()
            } else {
                text
            }
        }
        None => id.to_string(),
    };

    let category = match entry.category {
        Some(raw) => {
            if !is_valid_segment(&raw) {
                return Err(cx.error(
                    "category",
                    format!("invalid category '{raw}', expected [A-Za-z0-9_-]"),
                ));
            }
            Category::new(raw)
        }
        None => Category::new(id.category_prefix()),
    };
    if category == RESERVED_CATEGORY {
        return Err(cx.error(
            "category",
            format!("category '{RESERVED_CATEGORY}' is reserved for the aggregate installer"),
        ));
    }

    let mut dependencies: Vec<ModuleId> = Vec::new();
    for dep in entry.dependencies.unwrap_or_default() {
        if !is_valid_module_id(&dep) {
            return Err(cx.error("dependencies", format!("invalid module id '{dep}'")));
        }
        if dep == *id {
            return Err(cx.error("dependencies", "module cannot depend on itself"));
        }
        if dependencies.iter().any(|d| d.as_str() == dep) {
            return Err(cx.error("dependencies", format!("duplicate dependency '{dep}'")));
        }
        dependencies.push(ModuleId::new(dep));
    }

    let mut tags = BTreeSet::new();
    for tag in entry.tags.unwrap_or_default() {
        let tag = tag.trim().to_owned();
        if tag.is_empty() || tag.contains([',', ' ', '\t', '\n']) {
            return Err(cx.error(
                "tags",
                format!("invalid tag '{tag}', tags must be non-empty and contain no commas or whitespace"),
            ));
        }
        tags.insert(tag);
    }

    let install = entry
        .install
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.trim_end().to_owned())
        .filter(|c| !c.trim().is_empty())
        .collect();

    let installed_check = match entry.installed_check {
        Some(cmd) if cmd.trim().is_empty() => {
            return Err(cx.error("installed_check", "must not be empty"))
        }
        Some(cmd) => Some(cmd.trim_end().to_owned()),
        None => None,
    };

    let verify = entry
        .verify
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|check| normalize_verify_entry(&cx, check))
        .collect::<Result<_, _>>()?;

    Ok(Module {
        id,
        description,
        category,
        phase: entry.phase.unwrap_or(DEFAULT_PHASE),
        dependencies,
        enabled_by_default: entry.enabled_by_default.unwrap_or(true),
        tags,
        install,
        installed_check,
        run_as: entry.run_as.unwrap_or_default(),
        verify,
        position: index,
    })
}

fn normalize_verify_entry(cx: &FieldContext, entry: VerifyEntry) -> Result<VerifyCheck, ManifestError> {
    let (command, description, optional) = match entry {
        VerifyEntry::Command(run) => (run, None, false),
        VerifyEntry::Table(table) => (table.run, table.description, table.optional),
    };

    let command = command.trim_end().to_owned();
    if command.trim().is_empty() {
        return Err(cx.error("verify", "verify command must not be empty"));
    }
    if command.contains('\t') {
        return Err(cx.error("verify", "verify command must not contain tab characters"));
    }
    let description = match description {
        Some(text) => {
            let text = text.trim().to_owned();
            cx.check_single_line("verify", &text)?;
            (!text.is_empty()).then_some(text)
        }
        None => None,
    };

    Ok(VerifyCheck {
        command,
        description,
        required: !optional,
    })
}
