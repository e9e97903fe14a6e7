use std::collections::BTreeSet;

/// Category carried by performance experiments, which the regular performance test runs leave out.
pub const EXPERIMENT_CATEGORY: &str = "experiment";

/// Include/exclude filter over test categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn including(mut self, category: impl Into<String>) -> Self {
        self.include.insert(category.into());
        self
    }

    pub fn excluding(mut self, category: impl Into<String>) -> Self {
        self.exclude.insert(category.into());
        self
    }

    /// A test passes when it has one of the included categories (or nothing is included
    /// explicitly) and none of the excluded ones.
    pub fn matches(&self, categories: &BTreeSet<String>) -> bool {
        let included = self.include.is_empty() || !self.include.is_disjoint(categories);
        included && self.exclude.is_disjoint(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(CategoryFilter::all().matches(&categories(&[])));
        assert!(CategoryFilter::all().matches(&categories(&["experiment"])));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = CategoryFilter::all()
            .including("slow")
            .excluding(EXPERIMENT_CATEGORY);
        assert!(filter.matches(&categories(&["slow"])));
        assert!(!filter.matches(&categories(&["slow", "experiment"])));
        assert!(!filter.matches(&categories(&["fast"])));
    }
}
