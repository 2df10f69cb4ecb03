use crate::resolve::ResolvedManifest;
use kiln_schema::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown module '{0}' in selection")]
    UnknownModule(String),
    #[error("cannot skip '{skipped}': required by selected module '{required_by}'")]
    SkippedDependency {
        skipped: ModuleId,
        required_by: ModuleId,
    },
}

/// Filter describing which modules a run should install.
///
/// With neither `only` nor `tags`, every module enabled by default is
/// selected (every module with `include_disabled`). Dependencies of a
/// selected module are always pulled in, even when disabled by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selection {
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub tags: Vec<String>,
    pub include_disabled: bool,
}

/// A selection resolved against a manifest, in global install order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Plan {
    pub modules: Vec<ModuleId>,
    pub skipped: Vec<ModuleId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.skip.is_empty() && self.tags.is_empty()
    }

    pub fn plan(&self, resolved: &ResolvedManifest) -> Result<Plan, SelectionError> {
        for id in self.only.iter().chain(&self.skip) {
            if resolved.get(id).is_none() {
                return Err(SelectionError::UnknownModule(id.clone()));
            }
        }

        let roots: Vec<ModuleId> = if self.only.is_empty() && self.tags.is_empty() {
            resolved
                .ordered()
                .filter(|m| m.enabled_by_default || self.include_disabled)
                .map(|m| m.id.clone())
                .collect()
        } else {
            resolved
                .ordered()
                .filter(|m| {
                    self.only.iter().any(|id| m.id == id.as_str())
                        || self.tags.iter().any(|t| m.tags.contains(t))
                })
                .map(|m| m.id.clone())
                .collect()
        };

        let skip: HashSet<&str> = self.skip.iter().map(String::as_str).collect();
        let mut selected: HashSet<ModuleId> = HashSet::new();
        for root in roots.iter().filter(|r| !skip.contains(r.as_str())) {
            selected.insert(root.clone());
            // Roots and ids were validated above; lookups cannot fail.
            for dep in resolved
                .transitive_dependencies(root)
                .unwrap_or_default()
            {
                if skip.contains(dep.as_str()) {
                    return Err(SelectionError::SkippedDependency {
                        skipped: dep,
                        required_by: root.clone(),
                    });
                }
                selected.insert(dep);
            }
        }

        let mut plan = Plan {
            modules: Vec::new(),
            skipped: Vec::new(),
        };
        for module in resolved.ordered() {
            if selected.contains(&module.id) {
                plan.modules.push(module.id.clone());
            } else if skip.contains(module.id.as_str()) {
                plan.skipped.push(module.id.clone());
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use kiln_schema::{parse_manifest_str, ManifestFormat};

    fn workstation() -> ResolvedManifest {
        let preset = kiln_schema::get_preset("workstation").unwrap();
        resolve(parse_manifest_str(preset.manifest, ManifestFormat::Toml).unwrap()).unwrap()
    }

    fn ids(plan: &Plan) -> Vec<&str> {
        plan.modules.iter().map(ModuleId::as_str).collect()
    }

    #[test]
    fn default_selection_excludes_disabled_modules() {
        let plan = Selection::default().plan(&workstation()).unwrap();
        assert!(!ids(&plan).contains(&"tools.atuin"));
        assert_eq!(ids(&plan).first(), Some(&"base.system"));
    }

    #[test]
    fn include_disabled_selects_everything() {
        let resolved = workstation();
        let plan = Selection {
            include_disabled: true,
            ..Selection::default()
        }
        .plan(&resolved)
        .unwrap();
        assert_eq!(plan.modules, resolved.install_order());
    }

    #[test]
    fn only_pulls_in_dependencies_in_install_order() {
        let plan = Selection {
            only: vec!["agents.codex".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap();
        assert_eq!(ids(&plan), ["base.system", "lang.bun", "agents.codex"]);
    }

    #[test]
    fn only_selects_disabled_module_explicitly() {
        let plan = Selection {
            only: vec!["tools.atuin".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap();
        assert_eq!(ids(&plan), ["base.system", "tools.atuin"]);
    }

    #[test]
    fn tags_filter_selects_matching_modules() {
        let plan = Selection {
            tags: vec!["python".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap();
        assert_eq!(ids(&plan), ["base.system", "lang.uv"]);
    }

    #[test]
    fn skip_leaf_module() {
        let plan = Selection {
            skip: vec!["agents.codex".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap();
        assert!(!ids(&plan).contains(&"agents.codex"));
        assert_eq!(plan.skipped, vec![ModuleId::from("agents.codex")]);
    }

    #[test]
    fn skipping_a_required_dependency_is_error() {
        let err = Selection {
            only: vec!["agents.codex".to_owned()],
            skip: vec!["lang.bun".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap_err();
        assert_eq!(
            err,
            SelectionError::SkippedDependency {
                skipped: "lang.bun".into(),
                required_by: "agents.codex".into(),
            }
        );
    }

    #[test]
    fn unknown_id_is_error() {
        let err = Selection {
            only: vec!["lang.cobol".to_owned()],
            ..Selection::default()
        }
        .plan(&workstation())
        .unwrap_err();
        assert_eq!(err, SelectionError::UnknownModule("lang.cobol".to_owned()));
    }
}
