use std::collections::BTreeMap;

use super::types::{Metadata, Resource};

/// Merges the metadata of resources sharing a name into one map per name.
///
/// Resources are folded in iteration order, so on a key collision the value of
/// the later resource wins. Names whose merged metadata is empty are left out.
pub fn merge_metadata<'a, I>(resources: I) -> BTreeMap<String, Metadata>
where
    I: IntoIterator<Item = &'a Resource>,
{
    let mut merged = resources
        .into_iter()
        .fold(BTreeMap::<String, Metadata>::new(), |mut merged, resource| {
            merged
                .entry(resource.name.clone())
                .or_default()
                .extend(resource.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        });

    merged.retain(|_, metadata| !metadata.is_empty());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, name: &str, pairs: &[(&str, &str)]) -> Resource {
        let mut resource = Resource::new(id, name, "registry-image");
        resource.metadata = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        resource
    }

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn later_resource_wins_on_collision() {
        let first = resource("1", "R", &[("a", "1")]);
        let second = resource("2", "R", &[("a", "2"), ("b", "3")]);

        let merged = merge_metadata([&first, &second]);

        assert_eq!(merged["R"], metadata(&[("a", "2"), ("b", "3")]));
    }

    #[test]
    fn result_depends_on_order_for_colliding_keys() {
        let first = resource("1", "R", &[("a", "1")]);
        let second = resource("2", "R", &[("a", "2"), ("b", "3")]);

        let merged = merge_metadata([&second, &first]);

        assert_eq!(merged["R"], metadata(&[("a", "1"), ("b", "3")]));
    }

    #[test]
    fn keeps_distinct_names_apart() {
        let image = resource("1", "image", &[("digest", "sha256:1")]);
        let chart = resource("2", "chart", &[("version", "1.2.0")]);

        let merged = merge_metadata([&image, &chart]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged["image"], metadata(&[("digest", "sha256:1")]));
        assert_eq!(merged["chart"], metadata(&[("version", "1.2.0")]));
    }

    #[test]
    fn empty_metadata_is_identity() {
        let empty = resource("1", "R", &[]);
        let full = resource("2", "R", &[("a", "1")]);
        let trailing_empty = resource("3", "R", &[]);

        let merged = merge_metadata([&empty, &full, &trailing_empty]);

        assert_eq!(merged["R"], metadata(&[("a", "1")]));
    }

    #[test]
    fn drops_names_without_metadata() {
        let silent = resource("1", "silent", &[]);
        let silent_again = resource("2", "silent", &[]);
        let image = resource("3", "image", &[("digest", "sha256:1")]);

        let merged = merge_metadata([&silent, &silent_again, &image]);

        assert!(!merged.contains_key("silent"));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn no_resources_merge_to_nothing() {
        let merged = merge_metadata(std::iter::empty());
        assert!(merged.is_empty());
    }
}
