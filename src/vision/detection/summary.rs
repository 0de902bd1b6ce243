// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-species counts over the accepted detections

use serde::{Deserialize, Serialize};

use super::annotate::Detection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCount {
    pub species: String,
    pub count: usize,
    /// Share of all detections, rounded to one decimal place (ties to even)
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSummary {
    pub total_count: usize,
    pub unique_species: usize,
    /// Sorted by count, descending; ties keep first-seen order
    pub species: Vec<SpeciesCount>,
}

impl SpeciesSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        Self::from_class_names(detections.iter().map(|d| d.class_name.as_str()))
    }

    pub fn from_class_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        // Vec keeps first-seen order for the stable sort below
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut total = 0usize;

        for name in names {
            total += 1;
            match counts.iter_mut().find(|(species, _)| species == name) {
                Some((_, count)) => *count += 1,
                None => counts.push((name.to_string(), 1)),
            }
        }

        if total == 0 {
            return Self::default();
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let species: Vec<SpeciesCount> = counts
            .into_iter()
            .map(|(species, count)| SpeciesCount {
                species,
                count,
                percentage: round_one_decimal(count as f64 / total as f64 * 100.0),
            })
            .collect();

        Self {
            total_count: total,
            unique_species: species.len(),
            species,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
