use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, TallyError};

/// Category -> strings, applied in document order.
pub type RuleMap = IndexMap<String, Vec<String>>;

/// Group -> supercategory -> categories.
pub type Groups = IndexMap<String, IndexMap<String, Vec<String>>>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategorizationFile {
    categorizers: Categorizers,
    groups: Groups,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Categorizers {
    exact: RuleMap,
    keyword: RuleMap,
}

/// Categorization rules together with the taxonomy their categories live in.
#[derive(Debug, Clone)]
pub struct Categorization {
    pub exact: RuleMap,
    pub keyword: RuleMap,
    pub groups: Groups,
    category_supers: HashMap<String, String>,
    category_groups: HashMap<String, String>,
}

impl Categorization {
    /// Every category named by a rule must appear somewhere in `groups`.
    pub fn new(exact: RuleMap, keyword: RuleMap, groups: Groups) -> Result<Self> {
        let mut category_supers = HashMap::new();
        let mut category_groups = HashMap::new();
        for (group, supercategories) in &groups {
            for (supercategory, categories) in supercategories {
                for category in categories {
                    if let Some(previous) = category_supers.insert(category.clone(), supercategory.clone()) {
                        warn!("Category '{category}' listed under both '{previous}' and '{supercategory}'; using '{supercategory}'");
                    }
                    category_groups.insert(category.clone(), group.clone());
                }
            }
        }

        for (rule, rules) in [("keyword", &keyword), ("exact", &exact)] {
            if let Some(category) = rules.keys().find(|c| !category_supers.contains_key(*c)) {
                return Err(TallyError::UnknownCategory {
                    rule,
                    category: category.clone(),
                });
            }
        }

        Ok(Self {
            exact,
            keyword,
            groups,
            category_supers,
            category_groups,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: CategorizationFile = serde_yaml::from_str(content)?;
        Self::new(file.categorizers.exact, file.categorizers.keyword, file.groups)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TallyError::Config(format!("cannot read categorization file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn supercategory_of(&self, category: &str) -> Option<&str> {
        self.category_supers.get(category).map(String::as_str)
    }

    pub fn group_of(&self, category: &str) -> Option<&str> {
        self.category_groups.get(category).map(String::as_str)
    }
}
