//! Fetch dispatch for planned sub-groups
//!
//! Sequential mode walks groups in order; concurrent mode spawns one task per
//! image and bounds in-flight requests with a semaphore. Each task reports its
//! own input index, so the output order never depends on completion order.

use crate::error::RegistryError;
use crate::image::ImageSpec;
use crate::registry::batch::SubGroup;
use crate::registry::client::RegistryClient;
use crate::registry::manifest::ManifestResult;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct FetchDispatcher {
    client: RegistryClient,
}

impl FetchDispatcher {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }

    /// Fetch every member of `groups`; `concurrency` 0 means sequential
    pub async fn dispatch(
        &self,
        specs: &[ImageSpec],
        groups: Vec<SubGroup>,
        concurrency: usize,
    ) -> Vec<ManifestResult> {
        let mut slots: Vec<Option<ManifestResult>> = (0..specs.len()).map(|_| None).collect();

        if concurrency == 0 {
            self.fetch_sequentially(&groups, &mut slots).await;
        } else {
            self.fetch_concurrently(groups, &mut slots, concurrency).await;
        }

        slots
            .into_iter()
            .zip(specs)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    ManifestResult::failed(
                        spec,
                        RegistryError::Configuration("image was not scheduled for retrieval".to_string()),
                    )
                })
            })
            .collect()
    }

    async fn fetch_sequentially(&self, groups: &[SubGroup], slots: &mut [Option<ManifestResult>]) {
        for group in groups {
            for member in &group.members {
                let result = self
                    .client
                    .fetch_in_group(&group.target, group.token.as_ref(), &member.spec)
                    .await;
                slots[member.index] = Some(result);
            }
        }
    }

    async fn fetch_concurrently(
        &self,
        groups: Vec<SubGroup>,
        slots: &mut [Option<ManifestResult>],
        concurrency: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut scheduled = Vec::new();
        let mut tasks = Vec::new();

        for group in groups {
            for member in group.members {
                let client = self.client.clone();
                let semaphore = Arc::clone(&semaphore);
                let target = group.target.clone();
                let token = group.token.clone();
                let spec = member.spec.clone();

                tasks.push(tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return ManifestResult::failed(
                                &spec,
                                RegistryError::Network(format!("Failed to acquire fetch permit: {}", e)),
                            );
                        }
                    };
                    client.fetch_in_group(&target, token.as_ref(), &spec).await
                }));
                scheduled.push(member);
            }
        }

        let outcomes = join_all(tasks).await;
        for (member, outcome) in scheduled.into_iter().zip(outcomes) {
            let result = outcome.unwrap_or_else(|e| {
                ManifestResult::failed(
                    &member.spec,
                    RegistryError::Network(format!("Fetch task failed: {}", e)),
                )
            });
            slots[member.index] = Some(result);
        }
    }
}
