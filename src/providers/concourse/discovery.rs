use indexmap::IndexMap;
use log::{debug, info};
use regex::Regex;

use super::provider::ConcourseProvider;
use super::types::{Resource, REVISION_RESOURCE_TYPE};
use crate::error::{BuildLensError, Result};

/// Decides which resource types contribute metadata to a build.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pattern: Option<Regex>,
}

impl ResourceFilter {
    /// Compiles the filter. The pattern must match the whole resource type.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern
            .map(|p| {
                Regex::new(&format!("^(?:{p})$"))
                    .map_err(|e| BuildLensError::Config(format!("Invalid resource filter regex '{p}': {e}")))
            })
            .transpose()?;

        Ok(Self { pattern })
    }

    /// `git` resources are always included since they carry the build's revision.
    pub fn includes(&self, resource_type: &str) -> bool {
        match &self.pattern {
            None => true,
            Some(pattern) => resource_type == REVISION_RESOURCE_TYPE || pattern.is_match(resource_type),
        }
    }
}

/// Keeps the resources passing `filter`, keyed by ID in plan order.
pub fn filter_resources(resources: Vec<Resource>, filter: &ResourceFilter) -> IndexMap<String, Resource> {
    resources
        .into_iter()
        .filter(|r| filter.includes(&r.resource_type))
        .fold(IndexMap::new(), |mut kept, resource| {
            if kept.contains_key(&resource.id) {
                debug!("Ignoring duplicate plan step {}", resource.id);
            } else {
                kept.insert(resource.id.clone(), resource);
            }
            kept
        })
}

impl ConcourseProvider {
    /// Lists the resources of a build's plan that pass the resource filter.
    pub(super) async fn discover_resources(&self, build_id: &str) -> Result<IndexMap<String, Resource>> {
        let planned = self.client.build_plan(build_id).await?;
        let planned_count = planned.len();
        let resources = filter_resources(planned, &self.filter);

        info!(
            "Build {build_id}: {} of {planned_count} plan resources selected",
            resources.len()
        );

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pattern_includes_everything() {
        let filter = ResourceFilter::new(None).unwrap();
        assert!(filter.includes("registry-image"));
        assert!(filter.includes("git"));
        assert!(filter.includes("time"));
    }

    #[test]
    fn git_is_always_included() {
        let filter = ResourceFilter::new(Some("registry-image")).unwrap();
        assert!(filter.includes("git"));
        assert!(filter.includes("registry-image"));
        assert!(!filter.includes("time"));
    }

    #[test]
    fn pattern_must_match_whole_type() {
        let filter = ResourceFilter::new(Some("image")).unwrap();
        assert!(!filter.includes("registry-image"));

        let filter = ResourceFilter::new(Some(".*image")).unwrap();
        assert!(filter.includes("registry-image"));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let filter = ResourceFilter::new(Some("semver|s3")).unwrap();
        assert!(filter.includes("semver"));
        assert!(filter.includes("s3"));
        assert!(!filter.includes("semver-extra"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let result = ResourceFilter::new(Some("("));
        assert!(matches!(result, Err(BuildLensError::Config(_))));
    }

    #[test]
    fn filter_keeps_plan_order_and_unique_ids() {
        let filter = ResourceFilter::new(Some("registry-image")).unwrap();
        let resources = vec![
            Resource::new("p1", "image", "registry-image"),
            Resource::new("t1", "clock", "time"),
            Resource::new("g1", "source", "git"),
            Resource::new("g2", "image", "registry-image"),
            Resource::new("g1", "source", "git"),
        ];

        let kept = filter_resources(resources, &filter);

        let ids: Vec<&str> = kept.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["p1", "g1", "g2"]);
    }

    #[test]
    fn nothing_passing_the_filter_is_empty() {
        let filter = ResourceFilter::new(Some("semver")).unwrap();
        let kept = filter_resources(vec![Resource::new("t1", "clock", "time")], &filter);
        assert!(kept.is_empty());
    }
}
