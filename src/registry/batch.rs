//! Batch planning: registry-homogeneous, size-bounded sub-groups
//!
//! Images are partitioned by resolved registry (first-seen order), each
//! partition is cut into consecutive chunks of at most `group_size`, and every
//! chunk with more than one member may receive a single multi-scope token.
//! Token failures only leave a group tokenless; members then authenticate
//! individually.

use crate::image::ImageSpec;
use crate::logging::Logger;
use crate::registry::auth::{Auth, BearerToken};
use crate::registry::resolver::{RegistryTarget, Resolver};
use std::collections::HashMap;

/// An image together with its position in the caller's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub index: usize,
    pub spec: ImageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubGroup {
    pub target: RegistryTarget,
    pub members: Vec<GroupMember>,
    pub token: Option<BearerToken>,
}

impl SubGroup {
    pub fn registry_key(&self) -> String {
        self.target.group_key()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|member| member.index)
    }
}

#[derive(Debug, Clone)]
pub struct BatchPlanner {
    resolver: Resolver,
    output: Logger,
}

impl BatchPlanner {
    pub fn new(resolver: Resolver, output: Logger) -> Self {
        Self { resolver, output }
    }

    /// Partition `specs` into sub-groups of at most `group_size` (minimum 1)
    pub fn plan(&self, specs: &[ImageSpec], group_size: usize) -> Vec<SubGroup> {
        let group_size = group_size.max(1);

        let mut partitions: Vec<(RegistryTarget, Vec<GroupMember>)> = Vec::new();
        let mut positions: HashMap<RegistryTarget, usize> = HashMap::new();

        for (index, spec) in specs.iter().enumerate() {
            let target = self.resolver.resolve(&spec.image);
            let position = *positions.entry(target.clone()).or_insert_with(|| {
                partitions.push((target, Vec::new()));
                partitions.len() - 1
            });
            partitions[position].1.push(GroupMember {
                index,
                spec: spec.clone(),
            });
        }

        let mut groups = Vec::new();
        for (target, members) in &partitions {
            if members.len() > group_size {
                self.output.warning(&format!(
                    "{} images for {} exceed the batch limit of {}; splitting into {} batches",
                    members.len(),
                    target.group_key(),
                    group_size,
                    members.len().div_ceil(group_size)
                ));
            }

            groups.extend(members.chunks(group_size).map(|chunk| SubGroup {
                target: target.clone(),
                members: chunk.to_vec(),
                token: None,
            }));
        }

        self.log_plan(partitions.len(), &groups);
        groups
    }

    fn log_plan(&self, registry_count: usize, groups: &[SubGroup]) {
        if registry_count > 1 {
            self.output.info(&format!(
                "Detected {} registries, {} batches in total",
                registry_count,
                groups.len()
            ));
        } else if groups.len() > 1 {
            self.output
                .info(&format!("Processing in {} batches", groups.len()));
        }

        for (i, group) in groups.iter().enumerate() {
            let registry_name = match &group.target {
                RegistryTarget::Registered(key) => self
                    .resolver
                    .directory()
                    .lookup(key)
                    .map(|endpoint| endpoint.name)
                    .unwrap_or_else(|_| key.clone()),
                RegistryTarget::Unregistered { domain } => domain.clone(),
            };
            self.output.info(&format!(
                "Batch {}: {} ({} images)",
                i + 1,
                registry_name,
                group.len()
            ));
        }
    }

    /// Attach one multi-scope token to every registered group with more than one member
    pub async fn acquire_batch_tokens(&self, groups: &mut [SubGroup], auth: &Auth) {
        for group in groups.iter_mut() {
            if group.len() <= 1 {
                continue;
            }

            let RegistryTarget::Registered(key) = &group.target else {
                self.output.debug(&format!(
                    "No batch token for unregistered {}; images authenticate individually",
                    group.registry_key()
                ));
                continue;
            };

            let images: Vec<&str> = group
                .members
                .iter()
                .map(|member| member.spec.image.as_str())
                .collect();

            match auth.token_for_images(&images, key).await {
                Ok(token) => {
                    self.output.info(&format!(
                        "Acquired batch token for {} images",
                        group.len()
                    ));
                    group.token = Some(token);
                }
                Err(e) => {
                    self.output.warning(&format!(
                        "Batch authentication failed for {} images, falling back to per-image auth: {}",
                        group.len(),
                        e
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::directory::{RegistryDirectory, RegistryEndpoint};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn planner() -> BatchPlanner {
        let directory = Arc::new(RegistryDirectory::new());
        directory
            .register(
                "corp",
                RegistryEndpoint::new(
                    "Corp",
                    "https://registry.corp.example.com",
                    "https://registry.corp.example.com/auth",
                    "corp",
                ),
            )
            .unwrap();
        BatchPlanner::new(Resolver::new(directory), Logger::new_quiet())
    }

    fn mixed_specs(n: usize) -> Vec<ImageSpec> {
        (0..n)
            .map(|i| match i % 4 {
                0 => ImageSpec::new(format!("app-{}", i), "latest"),
                1 => ImageSpec::new(format!("ghcr.io/org/app-{}", i), "v1"),
                2 => ImageSpec::new(format!("registry.corp.example.com/team/app-{}", i), "1.0"),
                _ => ImageSpec::new(format!("quay.io/org/app-{}", i), "latest"),
            })
            .collect()
    }

    #[test]
    fn test_every_index_scheduled_exactly_once() {
        let planner = planner();
        for n in [0, 1, 7, 30, 31, 95] {
            for size in [1, 3, 30] {
                let groups = planner.plan(&mixed_specs(n), size);
                let mut seen: Vec<usize> = groups.iter().flat_map(|g| g.indices()).collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..n).collect::<Vec<_>>(), "n={n} size={size}");
                assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= size));
            }
        }
    }

    #[test]
    fn test_groups_are_registry_homogeneous() {
        let planner = planner();
        let specs = mixed_specs(40);
        for group in planner.plan(&specs, 4) {
            let targets: BTreeSet<String> = group
                .members
                .iter()
                .map(|m| planner.resolver.resolve(&m.spec.image).group_key())
                .collect();
            assert_eq!(targets.len(), 1);
            assert_eq!(targets.into_iter().next().unwrap(), group.registry_key());
        }
    }

    #[test]
    fn test_large_partition_is_chunked_in_order() {
        let planner = planner();
        let specs: Vec<ImageSpec> = (0..65)
            .map(|i| ImageSpec::new(format!("image-{}", i), "latest"))
            .collect();
        let groups = planner.plan(&specs, 30);

        assert_eq!(groups.iter().map(SubGroup::len).collect::<Vec<_>>(), vec![30, 30, 5]);
        assert_eq!(groups[1].members[0].index, 30);
        assert!(groups.iter().all(|g| g.registry_key() == "dockerhub"));
    }

    #[test]
    fn test_partitions_follow_first_appearance() {
        let planner = planner();
        let specs = vec![
            ImageSpec::new("ghcr.io/o/a", "latest"),
            ImageSpec::new("nginx", "latest"),
            ImageSpec::new("ghcr.io/o/b", "latest"),
        ];
        let groups = planner.plan(&specs, 30);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].registry_key(), "ghcr");
        assert_eq!(groups[0].indices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(groups[1].registry_key(), "dockerhub");
    }

    #[test]
    fn test_zero_group_size_is_treated_as_one() {
        let planner = planner();
        let groups = planner.plan(&mixed_specs(3), 0);
        assert!(groups.iter().all(|g| g.len() == 1));
    }
}
