use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{KpiError, Result};
use crate::period::Scope;

const WEEKLY_METRICS: &[(&str, &str)] = &[
    ("Follower growth", "ig_followers_growth"),
    ("Instagram leads", "ig_leads"),
    ("Campaigns run", "campaigns_count"),
    ("Instagram sales", "ig_sales"),
    ("Offline sales", "offline_sales"),
    ("Page reach", "ig_reach"),
    ("WhatsApp leads", "wa_leads"),
    ("WhatsApp sales", "wa_sales"),
    ("Divar leads", "divar_leads"),
    ("Divar sales", "divar_sales"),
    ("Torob leads", "torob_leads"),
    ("Torob sales", "torob_sales"),
];

const MONTHLY_METRICS: &[(&str, &str)] = &[
    ("Engagement rate", "engagement_rate"),
    ("Follower growth", "ig_followers_growth"),
    ("Campaigns executed", "campaigns_count"),
    ("Instagram sales", "ig_sales"),
    ("Offline sales", "offline_sales"),
    ("Page reach", "ig_reach"),
    ("WhatsApp leads", "wa_leads"),
    ("WhatsApp sales", "wa_sales"),
    ("Divar leads", "divar_leads"),
    ("Divar sales", "divar_sales"),
    ("Torob leads", "torob_leads"),
    ("Torob sales", "torob_sales"),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricDefinition {
    pub scope: Scope,
    pub slug: String,
    pub label: String,
}

/// Registered metrics per scope, in display order.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(definitions: Vec<MetricDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for definition in definitions.iter() {
            if definition.slug.trim().is_empty() {
                return Err(KpiError::InvalidArgument(format!(
                    "empty metric slug in {} catalog",
                    definition.scope
                )));
            }
            if !seen.insert((definition.scope, definition.slug.as_str())) {
                return Err(KpiError::InvalidArgument(format!(
                    "metric {} registered twice for {} scope",
                    definition.slug, definition.scope
                )));
            }
        }

        Ok(Self { definitions })
    }

    /// The agency's standard marketing metrics.
    pub fn builtin() -> Self {
        let definitions = WEEKLY_METRICS
            .iter()
            .map(|entry| (Scope::Weekly, entry))
            .chain(MONTHLY_METRICS.iter().map(|entry| (Scope::Monthly, entry)))
            .map(|(scope, (label, slug))| MetricDefinition {
                scope,
                slug: slug.to_string(),
                label: label.to_string(),
            })
            .collect();

        Self { definitions }
    }

    /// Loads a `scope,slug,label` CSV file.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut definitions = Vec::new();
        for row in reader.deserialize::<MetricDefinition>() {
            definitions.push(row?);
        }

        tracing::debug!(path = %path.display(), count = definitions.len(), "loaded metric catalog");
        Self::new(definitions)
    }

    /// (label, slug) pairs for `scope`.
    pub fn metrics_for(&self, scope: Scope) -> Vec<(&str, &str)> {
        self.definitions
            .iter()
            .filter(|definition| definition.scope == scope)
            .map(|definition| (definition.label.as_str(), definition.slug.as_str()))
            .collect()
    }

    pub fn contains(&self, scope: Scope, slug: &str) -> bool {
        self.find(scope, slug).is_some()
    }

    /// Label of the first entry carrying `slug`, or the slug itself when the
    /// metric is no longer registered.
    pub fn label_for<'a>(&'a self, slug: &'a str) -> &'a str {
        self.definitions
            .iter()
            .find(|definition| definition.slug == slug)
            .map_or(slug, |definition| definition.label.as_str())
    }

    pub fn label_in<'a>(&'a self, scope: Scope, slug: &'a str) -> &'a str {
        match self.find(scope, slug) {
            Some(definition) => definition.label.as_str(),
            None => self.label_for(slug),
        }
    }

    fn find(&self, scope: Scope, slug: &str) -> Option<&MetricDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.scope == scope && definition.slug == slug)
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

pub fn scope_label(scope: Scope) -> &'static str {
    match scope {
        Scope::Weekly => "Weekly",
        Scope::Monthly => "Monthly",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn builtin_scopes_share_slugs_but_not_entries() {
        let catalog = MetricCatalog::builtin();
        let weekly = catalog.metrics_for(Scope::Weekly);
        let monthly = catalog.metrics_for(Scope::Monthly);

        assert_eq!(weekly.len(), 12);
        assert_eq!(monthly.len(), 12);
        assert_eq!(weekly[0], ("Follower growth", "ig_followers_growth"));
        assert_eq!(monthly[0], ("Engagement rate", "engagement_rate"));
        assert!(catalog.contains(Scope::Monthly, "engagement_rate"));
        assert!(!catalog.contains(Scope::Weekly, "engagement_rate"));
    }

    #[test]
    fn labels_fall_back_to_the_slug() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(catalog.label_for("wa_leads"), "WhatsApp leads");
        assert_eq!(catalog.label_for("retired_metric"), "retired_metric");
        assert_eq!(catalog.label_in(Scope::Weekly, "campaigns_count"), "Campaigns run");
        assert_eq!(catalog.label_in(Scope::Monthly, "campaigns_count"), "Campaigns executed");
        assert_eq!(catalog.label_in(Scope::Weekly, "engagement_rate"), "Engagement rate");
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let definition = MetricDefinition {
            scope: Scope::Weekly,
            slug: "ig_leads".to_string(),
            label: "Leads".to_string(),
        };
        let result = MetricCatalog::new(vec![definition.clone(), definition]);
        assert_matches!(result, Err(KpiError::InvalidArgument(_)));
    }

    #[test]
    fn loads_from_csv() {
        let path = std::env::temp_dir().join(format!("catalog-{}.csv", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "scope,slug,label").unwrap();
        writeln!(file, "weekly,tiktok_views,TikTok views").unwrap();
        writeln!(file, "monthly,tiktok_views,TikTok views (month)").unwrap();
        drop(file);

        let catalog = MetricCatalog::from_csv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(catalog.metrics_for(Scope::Weekly), vec![("TikTok views", "tiktok_views")]);
        assert_eq!(catalog.label_in(Scope::Monthly, "tiktok_views"), "TikTok views (month)");
    }
}
