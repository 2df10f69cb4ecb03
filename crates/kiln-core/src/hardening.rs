//! Safety rules for modules that touch the shared data tree.
//!
//! Modules in a hardened category get generated guards that refuse to follow
//! symlinks on any sensitive path before anything is created or chowned, and
//! ownership changes are limited to the managed children of the data root.
//! Their own install commands are linted for recursive `chown` calls that
//! would follow symlinks or sweep the whole data root.

use kiln_schema::{Category, Module, ModuleId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardeningError {
    #[error("module '{module}': {reason}: `{command}`")]
    HardeningViolation {
        module: ModuleId,
        command: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HardeningPolicy {
    pub categories: Vec<Category>,
    pub data_root: String,
    pub managed_children: Vec<String>,
    /// Shell variable holding the account that should own the managed children.
    pub owner_var: String,
}

impl Default for HardeningPolicy {
    fn default() -> Self {
        Self {
            categories: vec![Category::new("filesystem")],
            data_root: "/data".to_owned(),
            managed_children: vec!["projects".to_owned(), "cache".to_owned()],
            owner_var: "KILN_TARGET_USER".to_owned(),
        }
    }
}

impl HardeningPolicy {
    pub fn applies_to(&self, module: &Module) -> bool {
        self.categories.contains(&module.category)
    }

    /// Absolute paths of the managed children.
    pub fn managed_paths(&self) -> Vec<String> {
        let root = self.data_root.trim_end_matches('/');
        self.managed_children
            .iter()
            .map(|child| format!("{root}/{child}"))
            .collect()
    }

    /// Data root followed by every managed child.
    pub fn sensitive_paths(&self) -> Vec<String> {
        let mut paths = vec![self.data_root.clone()];
        paths.extend(self.managed_paths());
        paths
    }

    /// Reject install commands of hardened modules that would change
    /// ownership unsafely.
    pub fn lint<'a>(
        &self,
        modules: impl IntoIterator<Item = &'a Module>,
    ) -> Result<(), HardeningError> {
        for module in modules.into_iter().filter(|m| self.applies_to(m)) {
            for command in &module.install {
                for invocation in chown_invocations(command) {
                    if let Some(reason) = self.check_chown(&invocation) {
                        return Err(HardeningError::HardeningViolation {
                            module: module.id.clone(),
                            command: command.trim().to_owned(),
                            reason,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_chown(&self, chown: &Chown) -> Option<String> {
        if !chown.recursive {
            return None;
        }
        if chown.traverses_links {
            return Some("recursive chown with -L or -H follows symlinked directories".to_owned());
        }
        if !chown.no_dereference {
            return Some("recursive chown without -h follows symlinks".to_owned());
        }
        for operand in &chown.operands {
            if let Some(dir) = glob_parent(operand) {
                if self.reaches_data_root(&normalize_path(dir)) {
                    return Some(format!(
                        "recursive chown of glob {operand} covers the data root {}; name {} explicitly",
                        self.data_root,
                        self.managed_paths().join(", ")
                    ));
                }
            } else if self.reaches_data_root(&normalize_path(operand)) {
                return Some(format!(
                    "recursive chown of the data root {}; restrict it to {}",
                    self.data_root,
                    self.managed_paths().join(", ")
                ));
            }
        }
        None
    }

    /// True when a recursive walk from `path` would include the data root.
    fn reaches_data_root(&self, path: &str) -> bool {
        let root = normalize_path(&self.data_root);
        path == "/"
            || path == root
            || root
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Chown {
    recursive: bool,
    /// `-h`: change symlinks themselves, never their targets.
    no_dereference: bool,
    /// The last of `-H`, `-L`, `-P` was `-H` or `-L`, or `find` follows links.
    traverses_links: bool,
    /// Owner argument followed by the target paths.
    operands: Vec<String>,
}

/// Split a shell command into simple commands and pull out every `chown`,
/// including `find ... -exec chown`, which counts as a recursive chown of
/// the search roots.
fn chown_invocations(command: &str) -> Vec<Chown> {
    command
        .split(['\n', ';', '|', '&'])
        .filter_map(|simple| {
            let words: Vec<&str> = simple
                .split_whitespace()
                .map(|w| w.trim_matches(|c| c == '\'' || c == '"'))
                .skip_while(|w| is_command_prefix(w))
                .collect();
            let (&program, args) = words.split_first()?;
            if is_program(program, "chown") {
                Some(parse_chown(args))
            } else if is_program(program, "find") {
                parse_find(args)
            } else {
                None
            }
        })
        .collect()
}

fn is_command_prefix(word: &str) -> bool {
    matches!(word, "sudo" | "doas" | "command" | "env" | "exec" | "nice" | "nohup")
        || (word.contains('=') && !word.starts_with('-'))
}

fn is_program(word: &str, name: &str) -> bool {
    word.rsplit('/').next() == Some(name)
}

fn parse_chown(args: &[&str]) -> Chown {
    let mut chown = Chown::default();
    let mut options_done = false;
    for &word in args {
        if options_done || !word.starts_with('-') || word == "-" {
            chown.operands.push(word.to_owned());
        } else if word == "--" {
            options_done = true;
        } else if let Some(long) = word.strip_prefix("--") {
            match long {
                "recursive" => chown.recursive = true,
                "no-dereference" => chown.no_dereference = true,
                "dereference" => chown.no_dereference = false,
                _ => {}
            }
        } else {
            for flag in word.chars().skip(1) {
                match flag {
                    'R' => chown.recursive = true,
                    'h' => chown.no_dereference = true,
                    'H' | 'L' => chown.traverses_links = true,
                    'P' => chown.traverses_links = false,
                    _ => {}
                }
            }
        }
    }
    chown
}

fn parse_find(args: &[&str]) -> Option<Chown> {
    let mut follows = false;
    let mut rest = args;
    while let Some((&first, tail)) = rest.split_first() {
        match first {
            "-H" | "-L" => follows = true,
            "-P" => follows = false,
            _ => break,
        }
        rest = tail;
    }
    let split = rest
        .iter()
        .position(|w| w.starts_with('-') || matches!(*w, "(" | "!" | "\\(" | "\\!"))
        .unwrap_or(rest.len());
    let (roots, expression) = rest.split_at(split);
    follows |= expression.contains(&"-follow");

    let exec_args = expression.windows(2).enumerate().find_map(|(i, pair)| {
        (matches!(pair[0], "-exec" | "-execdir" | "-ok" | "-okdir") && is_program(pair[1], "chown"))
            .then(|| &expression[i + 2..])
    })?;
    let end = exec_args
        .iter()
        .position(|w| matches!(*w, "{}" | "+" | "\\"))
        .unwrap_or(exec_args.len());

    let exec = parse_chown(&exec_args[..end]);
    Some(Chown {
        recursive: true,
        no_dereference: exec.no_dereference,
        traverses_links: follows,
        operands: if roots.is_empty() {
            vec![".".to_owned()]
        } else {
            roots.iter().map(|r| (*r).to_owned()).collect()
        },
    })
}

/// Directory part before the first glob character, or `None` for a plain path.
fn glob_parent(path: &str) -> Option<&str> {
    let wildcard = path.find(['*', '?', '['])?;
    let dir = &path[..wildcard];
    Some(match dir.rfind('/') {
        Some(0) => "/",
        Some(slash) => &dir[..slash],
        None => "",
    })
}

/// Lexically resolve `.` and `..` components and trailing slashes.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::{parse_manifest_str, ManifestFormat};

    fn module(id: &str, install: &str) -> Module {
        let toml = format!(
            "manifest_version = 1\n[[modules]]\nid = \"{id}\"\ninstall = '''\n{install}\n'''\n"
        );
        parse_manifest_str(&toml, ManifestFormat::Toml)
            .unwrap()
            .modules
            .remove(0)
    }

    fn lint(id: &str, install: &str) -> Result<(), HardeningError> {
        HardeningPolicy::default().lint([&module(id, install)])
    }

    #[test]
    fn default_policy_paths() {
        let policy = HardeningPolicy::default();
        assert_eq!(
            policy.sensitive_paths(),
            ["/data", "/data/projects", "/data/cache"]
        );
        assert_eq!(policy.managed_paths(), ["/data/projects", "/data/cache"]);
    }

    #[test]
    fn only_filesystem_category_is_hardened() {
        let policy = HardeningPolicy::default();
        assert!(policy.applies_to(&module("filesystem.data", "true")));
        assert!(!policy.applies_to(&module("lang.bun", "true")));
    }

    #[test]
    fn dereferencing_recursive_chown_is_rejected() {
        let err = lint("filesystem.data", "chown -R alice /data/projects").unwrap_err();
        let HardeningError::HardeningViolation { module, reason, .. } = err;
        assert_eq!(module, "filesystem.data");
        assert!(reason.contains("without -h"));
    }

    #[test]
    fn recursive_chown_of_data_root_is_rejected() {
        for cmd in [
            "chown -hR alice /data",
            "sudo chown -h -R alice:alice /data/",
            "mkdir -p /data && chown --recursive --no-dereference alice '/data'",
        ] {
            let err = lint("filesystem.data", cmd).unwrap_err();
            let HardeningError::HardeningViolation { reason, .. } = err;
            assert!(reason.contains("data root"), "{cmd}: {reason}");
        }
    }

    #[test]
    fn scoped_chown_of_managed_child_is_allowed() {
        lint("filesystem.data", "chown -hR alice /data/projects /data/cache").unwrap();
        lint("filesystem.data", "chown alice /data").unwrap();
    }

    #[test]
    fn non_hardened_modules_are_not_linted() {
        lint("tools.misc", "chown -R alice /data").unwrap();
    }

    #[test]
    fn link_following_walks_are_rejected() {
        for cmd in [
            "chown -hRL alice /data/projects",
            "chown -hR -H alice /data/projects",
            "chown -hRP -L alice /data/cache",
        ] {
            let err = lint("filesystem.data", cmd).unwrap_err();
            let HardeningError::HardeningViolation { reason, .. } = err;
            assert!(reason.contains("-L or -H"), "{cmd}: {reason}");
        }
        lint("filesystem.data", "chown -hRLP alice /data/projects").unwrap();
    }

    #[test]
    fn path_tricks_reaching_the_data_root_are_rejected() {
        for cmd in [
            "chown -hR alice /data/projects/..",
            "chown -hR alice /data/./",
            "chown -hR alice /",
            "chown -hR alice /data/*",
            "chown -hR alice /dat?",
        ] {
            let err = lint("filesystem.data", cmd).unwrap_err();
            let HardeningError::HardeningViolation { reason, .. } = err;
            assert!(reason.contains("data root"), "{cmd}: {reason}");
        }
        lint("filesystem.data", "chown -hR alice /data/projects/*").unwrap();
        lint("filesystem.data", "chown -hR alice /data/projects/../cache").unwrap();
    }

    #[test]
    fn find_exec_chown_counts_as_recursive() {
        for cmd in [
            "find /data -exec chown alice {} +",
            "find /data -exec chown -h alice {} \\;",
            "find /data/projects -type d -exec chown alice {} +",
            "find -L /data/cache -exec chown -h alice {} +",
        ] {
            assert!(lint("filesystem.data", cmd).is_err(), "{cmd}");
        }
        lint(
            "filesystem.data",
            "find /data/projects -exec chown -h alice {} +",
        )
        .unwrap();
        lint("filesystem.data", "find /data -name '*.tmp' -delete").unwrap();
    }

    #[test]
    fn normalize_path_is_lexical() {
        assert_eq!(normalize_path("/data/projects/.."), "/data");
        assert_eq!(normalize_path("/data//cache/./"), "/data/cache");
        assert_eq!(normalize_path("/.."), "/");
        assert_eq!(glob_parent("/data/*"), Some("/data"));
        assert_eq!(glob_parent("/*"), Some("/"));
        assert_eq!(glob_parent("/data/projects"), None);
    }

    #[test]
    fn chown_detection_ignores_other_programs() {
        assert!(chown_invocations("echo chown -R x /data").is_empty());
        assert_eq!(chown_invocations("ls; /bin/chown -R a /x").len(), 1);
    }
}
