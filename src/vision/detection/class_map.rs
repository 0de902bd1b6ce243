// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Label -> species name lookup built from a COCO annotations file

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ClassMapError {
    #[error("Annotations file not found: {0}")]
    NotFound(String),

    #[error("Failed to read annotations file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed annotations JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Annotations file defines no categories")]
    NoCategories,
}

/// Only the `categories` section of a COCO file matters here
#[derive(Debug, Deserialize)]
struct CocoAnnotations {
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Deserialize)]
struct CocoCategory {
    id: i64,
    name: String,
}

/// Immutable mapping from detector label to class name
#[derive(Debug, Clone, Default)]
pub struct ClassMap {
    names: HashMap<i64, String>,
    /// Number of category entries (not the largest id)
    num_classes: usize,
}

impl ClassMap {
    /// Load the class map from a COCO annotations file on disk
    pub fn from_coco_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassMapError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassMapError::NotFound(path.display().to_string()));
        }

        let json = std::fs::read_to_string(path).map_err(|source| ClassMapError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let map = Self::from_coco_json(&json)?;
        info!(
            "Loaded {} categories from {}",
            map.num_classes,
            path.display()
        );
        Ok(map)
    }

    /// Parse the `categories` array of a COCO annotations document
    pub fn from_coco_json(json: &str) -> Result<Self, ClassMapError> {
        let annotations: CocoAnnotations = serde_json::from_str(json)?;
        if annotations.categories.is_empty() {
            return Err(ClassMapError::NoCategories);
        }

        let num_classes = annotations.categories.len();
        let names: HashMap<i64, String> = annotations
            .categories
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();

        if names.len() != num_classes {
            debug!(
                "Annotations contain duplicate category ids ({} entries, {} unique)",
                num_classes,
                names.len()
            );
        }

        Ok(Self { names, num_classes })
    }

    /// Build a class map directly from (label, name) pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        let entries: Vec<(i64, String)> = pairs
            .into_iter()
            .map(|(id, name)| (id, name.into()))
            .collect();
        let num_classes = entries.len();
        Self {
            names: entries.into_iter().collect(),
            num_classes,
        }
    }

    pub fn get(&self, label: i64) -> Option<&str> {
        self.names.get(&label).map(String::as_str)
    }

    /// Class name for a label, or `ID:<label>` when the label is unmapped
    pub fn resolve(&self, label: i64) -> String {
        match self.get(label) {
            Some(name) => name.to_string(),
            None => format!("ID:{}", label),
        }
    }

    /// Number of foreground classes the detector was trained on
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Classification head width: foreground classes plus background
    pub fn num_labels(&self) -> usize {
        self.num_classes + 1
    }

    /// Number of distinct labels that resolve to a name
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_classes == 0
    }
}
