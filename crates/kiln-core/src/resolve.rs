//! Dependency graph resolution.
//!
//! Checks that every dependency exists, that the graph is acyclic, and that
//! no module runs in an earlier phase than something it depends on. The
//! install order sorts modules into ascending phase buckets, then runs a
//! stable topological sort inside each bucket. Ties always go to the module
//! that appears first in the manifest, so the order is fully determined by
//! the manifest content.

use kiln_schema::{Manifest, Module, ModuleId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    DanglingDependency { module: ModuleId, dependency: ModuleId },
    #[error("dependency cycle: {}", format_path(.path))]
    Cycle { path: Vec<ModuleId> },
    #[error(
        "module '{module}' (phase {phase}) depends on '{dependency}' which runs later (phase {dependency_phase})"
    )]
    PhaseInversion {
        module: ModuleId,
        phase: u32,
        dependency: ModuleId,
        dependency_phase: u32,
    },
    #[error("unknown module '{0}'")]
    UnknownModule(String),
}

fn format_path(path: &[ModuleId]) -> String {
    path.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A manifest whose dependency graph has been validated, together with its
/// install order.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    manifest: Manifest,
    /// Indices into `manifest.modules`, in install order.
    order: Vec<usize>,
    index_of: HashMap<ModuleId, usize>,
    dependents: Vec<Vec<usize>>,
}

/// One entry of the adjacency map, for reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Adjacency {
    pub dependencies: Vec<ModuleId>,
    pub dependents: Vec<ModuleId>,
}

/// Validate the dependency graph of `manifest` and compute its install order.
pub fn resolve(manifest: Manifest) -> Result<ResolvedManifest, GraphError> {
    let index_of: HashMap<ModuleId, usize> = manifest
        .modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.clone(), i))
        .collect();

    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(manifest.modules.len());
    for module in &manifest.modules {
        let mut edges = Vec::with_capacity(module.dependencies.len());
        for dep in &module.dependencies {
            let Some(&j) = index_of.get(dep) else {
                return Err(GraphError::DanglingDependency {
                    module: module.id.clone(),
                    dependency: dep.clone(),
                });
            };
            edges.push(j);
        }
        deps.push(edges);
    }

    if let Some(cycle) = find_cycle(&deps) {
        return Err(GraphError::Cycle {
            path: cycle
                .into_iter()
                .map(|i| manifest.modules[i].id.clone())
                .collect(),
        });
    }

    for (i, module) in manifest.modules.iter().enumerate() {
        for &j in &deps[i] {
            let dep = &manifest.modules[j];
            if dep.phase > module.phase {
                return Err(GraphError::PhaseInversion {
                    module: module.id.clone(),
                    phase: module.phase,
                    dependency: dep.id.clone(),
                    dependency_phase: dep.phase,
                });
            }
        }
    }

    let mut dependents = vec![Vec::new(); manifest.modules.len()];
    for (i, edges) in deps.iter().enumerate() {
        for &j in edges {
            dependents[j].push(i);
        }
    }

    let order = phased_order(&manifest.modules, &deps, &dependents);
    debug!(
        "resolved {} modules across {} phases",
        order.len(),
        manifest
            .modules
            .iter()
            .map(|m| m.phase)
            .collect::<BTreeSet<_>>()
            .len()
    );

    Ok(ResolvedManifest {
        manifest,
        order,
        index_of,
        dependents,
    })
}

/// Iterative three-colour DFS over modules in source order. Returns the
/// first cycle found with its starting node repeated at the end.
fn find_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    let mut colour = vec![Colour::White; deps.len()];
    for start in 0..deps.len() {
        if colour[start] != Colour::White {
            continue;
        }
        // (node, index of the next edge to follow)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        colour[start] = Colour::Grey;
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(&dep) = deps[node].get(frame.1) {
                frame.1 += 1;
                match colour[dep] {
                    Colour::White => {
                        colour[dep] = Colour::Grey;
                        stack.push((dep, 0));
                    }
                    Colour::Grey => {
                        let from = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                        let mut path: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                        path.push(dep);
                        return Some(path);
                    }
                    Colour::Black => {}
                }
            } else {
                colour[node] = Colour::Black;
                stack.pop();
            }
        }
    }
    None
}

/// Group modules by phase, then topologically sort each group with Kahn's
/// algorithm, always emitting the ready module that comes first in source.
///
/// Dependencies never point to a later phase, so edges into an earlier
/// bucket are already satisfied when a bucket starts.
fn phased_order(modules: &[Module], deps: &[Vec<usize>], dependents: &[Vec<usize>]) -> Vec<usize> {
    let mut buckets: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, module) in modules.iter().enumerate() {
        buckets.entry(module.phase).or_default().push(i);
    }

    let mut order = Vec::with_capacity(modules.len());
    for (phase, members) in buckets {
        let mut pending: HashMap<usize, usize> = members
            .iter()
            .map(|&i| {
                let same_phase = deps[i]
                    .iter()
                    .filter(|&&j| modules[j].phase == phase)
                    .count();
                (i, same_phase)
            })
            .collect();

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&i, _)| i)
            .collect();

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                if let Some(count) = pending.get_mut(&d) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(d);
                    }
                }
            }
        }
    }
    order
}

impl ResolvedManifest {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.index_of.get(id).map(|&i| &self.manifest.modules[i])
    }

    /// Modules in install order.
    pub fn ordered(&self) -> impl Iterator<Item = &Module> + '_ {
        self.order.iter().map(|&i| &self.manifest.modules[i])
    }

    /// Module ids in install order.
    pub fn install_order(&self) -> Vec<ModuleId> {
        self.ordered().map(|m| m.id.clone()).collect()
    }

    /// 0-based position of `id` in the install order.
    pub fn position_in_order(&self, id: &str) -> Option<usize> {
        let &i = self.index_of.get(id)?;
        self.order.iter().position(|&o| o == i)
    }

    /// Every module `id` depends on, directly or indirectly, in breadth-first
    /// discovery order. Each module appears once even when reachable by
    /// several paths.
    pub fn transitive_dependencies(&self, id: &str) -> Result<Vec<ModuleId>, GraphError> {
        let start = self.lookup(id)?;
        Ok(self.walk(start, |i| {
            self.manifest.modules[i]
                .dependencies
                .iter()
                .filter_map(|d| self.index_of.get(d).copied())
                .collect()
        }))
    }

    /// Every module that depends on `id`, directly or indirectly.
    pub fn transitive_dependents(&self, id: &str) -> Result<Vec<ModuleId>, GraphError> {
        let start = self.lookup(id)?;
        Ok(self.walk(start, |i| self.dependents[i].clone()))
    }

    /// Direct dependencies and dependents of every module, keyed by id.
    pub fn adjacency(&self) -> BTreeMap<ModuleId, Adjacency> {
        self.manifest
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let dependents = self.dependents[i]
                    .iter()
                    .map(|&d| self.manifest.modules[d].id.clone())
                    .collect();
                (
                    m.id.clone(),
                    Adjacency {
                        dependencies: m.dependencies.clone(),
                        dependents,
                    },
                )
            })
            .collect()
    }

    fn lookup(&self, id: &str) -> Result<usize, GraphError> {
        self.index_of
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownModule(id.to_owned()))
    }

    fn walk(&self, start: usize, next: impl Fn(usize) -> Vec<usize>) -> Vec<ModuleId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(i) = queue.pop_front() {
            for n in next(i) {
                if seen.insert(n) {
                    out.push(self.manifest.modules[n].id.clone());
                    queue.push_back(n);
                }
            }
        }
        out
    }
}
