use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TAG: &str = "latest";

/// An image name paired with the tag (or digest) whose manifest is wanted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSpec {
    pub image: String,
    pub tag: String,
}

impl ImageSpec {
    pub fn new(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
        }
    }

    /// Split a reference into image and tag.
    ///
    /// `nginx:1.25` -> (`nginx`, `1.25`); `host:5000/app` keeps its port and
    /// takes `default_tag`; `app@sha256:...` uses the digest as the reference,
    /// dropping any tag written before the `@`.
    pub fn parse(reference: &str, default_tag: &str) -> Self {
        let reference = reference.trim();

        if let Some((name, digest)) = reference.split_once('@') {
            let (image, _) = split_tag(name);
            return Self::new(image, digest);
        }

        match split_tag(reference) {
            (image, Some(tag)) if !tag.is_empty() => Self::new(image, tag),
            (image, _) => Self::new(image, default_tag),
        }
    }
}

/// Split `name[:tag]`; a colon before the last `/` belongs to a registry port
fn split_tag(reference: &str) -> (&str, Option<&str>) {
    let last_slash = reference.rfind('/');
    match reference.rfind(':') {
        Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
            (&reference[..colon], Some(&reference[colon + 1..]))
        }
        _ => (reference, None),
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.contains(':') {
            write!(f, "{}@{}", self.image, self.tag)
        } else {
            write!(f, "{}:{}", self.image, self.tag)
        }
    }
}

/// Parse a comma-separated list of image references
pub fn parse_image_list(list: &str, default_tag: &str) -> Result<Vec<ImageSpec>> {
    let specs: Vec<ImageSpec> = list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| ImageSpec::parse(item, default_tag))
        .collect();

    if specs.is_empty() {
        return Err(RegistryError::Configuration(
            "No valid image names were provided".to_string(),
        ));
    }

    Ok(specs)
}
