use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maps short language keys (`python`, `node`, ...) to Docker images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCatalog {
    images: BTreeMap<String, String>,
    default_key: String,
}

impl Default for ImageCatalog {
    fn default() -> Self {
        let images = [
            ("python", "python:3.9-slim"),
            ("java", "openjdk:11-jre-slim"),
            ("node", "node:14-slim"),
            ("reactpython", "react-python:latest"),
            ("ubuntu", "ubuntu:20.04"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            images,
            default_key: "node".to_string(),
        }
    }
}

impl ImageCatalog {
    /// Add or replace an entry. Keys are case-insensitive.
    pub fn insert(&mut self, key: impl Into<String>, image: impl Into<String>) {
        self.images.insert(key.into().to_lowercase(), image.into());
    }

    pub fn set_default_key(&mut self, key: impl Into<String>) {
        self.default_key = key.into().to_lowercase();
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.images.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Resolve an image reference.
    ///
    /// A catalog key wins. Otherwise `tag` is appended when given and the
    /// reference has no tag of its own; anything else is used verbatim.
    pub fn resolve(&self, key: &str, tag: Option<&str>) -> String {
        if let Some(image) = self.get(key) {
            return image.to_string();
        }
        match tag {
            Some(tag) if !key.contains(':') => format!("{}:{}", key, tag),
            _ => key.to_string(),
        }
    }

    /// Image for the default key, falling back to `node:14-slim`.
    pub fn default_image(&self) -> String {
        self.get(&self.default_key)
            .map(str::to_string)
            .unwrap_or_else(|| "node:14-slim".to_string())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Split `repo[:tag]` into repository and tag, defaulting to `latest`.
///
/// A colon that belongs to a registry port (`localhost:5000/app`) is not a
/// tag separator.
pub fn split_image_tag(image: &str) -> (&str, &str) {
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], &image[idx + 1..]),
        _ => (image, "latest"),
    }
}
