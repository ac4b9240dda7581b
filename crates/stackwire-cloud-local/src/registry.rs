//! Container image registry the local provider resolves images against

use stackwire_cloud::{CloudError, Result};
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_TAG: &str = "latest";

/// Published tags per repository
#[derive(Debug, Clone, Default)]
pub struct ImageRegistry {
    repositories: BTreeMap<String, BTreeSet<String>>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish<I, T>(&mut self, repository: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.repositories
            .entry(repository.into())
            .or_default()
            .extend(tags.into_iter().map(Into::into));
    }

    pub fn contains(&self, repository: &str, tag: &str) -> bool {
        self.repositories
            .get(repository)
            .is_some_and(|tags| tags.contains(tag))
    }

    /// Resolve `repository[:tag]`, failing if the tag was never published
    pub fn resolve(&self, image: &str) -> Result<()> {
        let (repository, tag) = split_image(image);
        if self.contains(repository, tag) {
            Ok(())
        } else {
            Err(CloudError::ImageNotFound {
                repository: repository.to_string(),
                tag: tag.to_string(),
            })
        }
    }
}

/// Split an image reference into repository and tag
///
/// A colon followed by a path segment belongs to a registry host port, not
/// a tag.
fn split_image(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, tag),
        _ => (image, DEFAULT_TAG),
    }
}
