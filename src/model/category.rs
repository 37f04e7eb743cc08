use crate::model::TransactionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// The category index stored at `{base}/category.json`, independent of the
/// month shards. Names are kept sorted alphabetically and deduplicated
/// case-insensitively.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryIndex {
    pub(crate) income: Vec<String>,
    pub(crate) expenses: Vec<String>,
}

impl CategoryIndex {
    pub fn names(&self, kind: TransactionKind) -> &[String] {
        match kind {
            TransactionKind::Income => &self.income,
            TransactionKind::Expense => &self.expenses,
        }
    }

    fn names_mut(&mut self, kind: TransactionKind) -> &mut Vec<String> {
        match kind {
            TransactionKind::Income => &mut self.income,
            TransactionKind::Expense => &mut self.expenses,
        }
    }

    /// Adds a category name to one of the lists and returns the trimmed name.
    ///
    /// Fails with a validation error for empty names and for names that already
    /// exist in the same list under any capitalization.
    pub fn add(&mut self, name: &str, kind: TransactionKind) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("category", "name cannot be empty"));
        }
        let list = self.names_mut(kind);
        if list.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
            return Err(Error::validation(
                "category",
                format!("'{trimmed}' already exists for {kind}"),
            ));
        }
        list.push(trimmed.to_string());
        list.sort();
        Ok(trimmed.to_string())
    }

    /// Removes a name from one of the lists. Used to roll back an `add` whose
    /// remote write failed.
    pub(crate) fn remove(&mut self, name: &str, kind: TransactionKind) {
        self.names_mut(kind).retain(|c| c != name);
    }
}
