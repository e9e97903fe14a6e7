use std::collections::{BTreeMap, BTreeSet};

use perf_tunnel_model::Scenario;

use crate::file::validate_field;
use crate::{BaselineRequest, CatalogError, CategoryFilter, TestManifest};

/// Every scenario that can be run, ordered by id, along with the categories of its test class.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl ScenarioCatalog {
    /// Build the catalog for the tests in `manifest`, binding each one to its resolved baselines.
    pub fn build(
        manifest: &TestManifest,
        request: &BaselineRequest,
        channel: &str,
    ) -> Result<Self, CatalogError> {
        validate_field("channel", channel)?;

        let mut scenarios: BTreeMap<String, Scenario> = BTreeMap::new();
        let mut categories: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for test in &manifest.tests {
            validate_field("test class", &test.class)?;
            let baselines = request.resolve(test.baselines.as_deref());

            for id in test.scenario_ids() {
                validate_field("scenario id", &id)?;
                if baselines.is_empty() {
                    return Err(CatalogError::NoBaselines(id));
                }
                for baseline in &baselines {
                    validate_field("baseline", baseline)?;
                }
                if scenarios.contains_key(&id) {
                    return Err(CatalogError::DuplicateScenario(id));
                }

                scenarios.insert(
                    id.clone(),
                    Scenario {
                        id,
                        test_class_name: test.class.clone(),
                        baseline_versions: baselines.clone(),
                        channel: channel.to_string(),
                    },
                );
            }

            categories
                .entry(test.class.clone())
                .or_default()
                .extend(test.categories.iter().cloned());
        }

        log::debug!(
            "Built catalog with {} scenarios from {} tests",
            scenarios.len(),
            manifest.tests.len()
        );

        Ok(Self {
            scenarios: scenarios.into_values().collect(),
            categories,
        })
    }

    /// The scenarios whose test class passes `filter`, ordered by id.
    pub fn list_scenarios(&self, filter: &CategoryFilter) -> Vec<Scenario> {
        let empty = BTreeSet::new();
        self.scenarios
            .iter()
            .filter(|scenario| {
                let categories = self
                    .categories
                    .get(&scenario.test_class_name)
                    .unwrap_or(&empty);
                filter.matches(categories)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
