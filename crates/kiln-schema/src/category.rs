use crate::normalize::Module;
use crate::types::{Category, ModuleId};
use serde::Serialize;
use std::collections::HashMap;

/// Partition of modules by category.
///
/// `categories` lists every category once, in the order it is first seen in
/// the input sequence. Each bucket keeps the relative order of its modules.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CategoryIndex {
    pub categories: Vec<Category>,
    pub by_category: HashMap<Category, Vec<ModuleId>>,
}

impl CategoryIndex {
    pub fn modules_in(&self, category: &str) -> &[ModuleId] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Derive the category partition of `modules`, normally given in install order.
pub fn derive_categories<'a>(modules: impl IntoIterator<Item = &'a Module>) -> CategoryIndex {
    let mut index = CategoryIndex::default();
    for module in modules {
        if !index.by_category.contains_key(&module.category) {
            index.categories.push(module.category.clone());
        }
        index
            .by_category
            .entry(module.category.clone())
            .or_default()
            .push(module.id.clone());
    }
    index
}
