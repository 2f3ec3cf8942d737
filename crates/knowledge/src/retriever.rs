//! Retrieval policies over the vector index and context rendering.

use crate::types::RetrievableUnit;
use crate::vector_index::VectorIndex;
use ragchat_core::config::RetrievalSettings;
use ragchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How units are selected for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPolicy {
    /// Plain top-k by distance
    #[default]
    Basic,
    /// Top-k, then only units within the similarity threshold
    Threshold,
    /// Maximal marginal relevance over a wider candidate pool
    Diverse,
}

impl fmt::Display for RetrievalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalPolicy::Basic => "basic",
            RetrievalPolicy::Threshold => "threshold",
            RetrievalPolicy::Diverse => "diverse",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RetrievalPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" | "similarity" => Ok(Self::Basic),
            "threshold" => Ok(Self::Threshold),
            "diverse" | "mmr" => Ok(Self::Diverse),
            other => Err(AppError::Config(format!(
                "Unknown retrieval policy '{}'. Expected basic, threshold or diverse",
                other
            ))),
        }
    }
}

/// A retrieved unit with its distance, when the policy has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedUnit {
    pub unit: RetrievableUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Ordered output of one retrieval call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub units: Vec<RetrievedUnit>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Render the units as a prompt context block.
    pub fn context(&self) -> String {
        format_context(&self.units)
    }
}

/// Applies a [`RetrievalPolicy`] to the shared index.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    score_threshold: f32,
    fetch_k_multiplier: usize,
    mmr_lambda: f32,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, settings: &RetrievalSettings) -> Self {
        Self {
            index,
            score_threshold: settings.score_threshold,
            fetch_k_multiplier: settings.fetch_k_multiplier,
            mmr_lambda: settings.mmr_lambda,
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Largest distance the threshold policy keeps.
    pub fn distance_cutoff(&self) -> f32 {
        1.0 - self.score_threshold
    }

    /// Retrieve up to `k` units for `query`.
    ///
    /// # Errors
    /// [`AppError::IndexEmpty`] if the index holds no records.
    pub async fn retrieve(
        &self,
        policy: RetrievalPolicy,
        query: &str,
        k: usize,
    ) -> AppResult<RetrievalResult> {
        let units = match policy {
            RetrievalPolicy::Basic => scored(self.index.query(query, k).await?),
            RetrievalPolicy::Threshold => {
                let cutoff = self.distance_cutoff();
                let all = self.index.query(query, k).await?;
                let before = all.len();
                let kept: Vec<_> = all.into_iter().filter(|(_, d)| *d <= cutoff).collect();
                tracing::debug!(
                    "Threshold {:.2} kept {} of {} units",
                    cutoff,
                    kept.len(),
                    before
                );
                scored(kept)
            }
            RetrievalPolicy::Diverse => self
                .index
                .query_diverse(query, k, k * self.fetch_k_multiplier, self.mmr_lambda)
                .await?
                .into_iter()
                .map(|unit| RetrievedUnit {
                    unit,
                    distance: None,
                })
                .collect(),
        };

        tracing::info!("Retrieved {} units with {} policy", units.len(), policy);
        Ok(RetrievalResult { units })
    }

    /// Top-k retrieval restricted to units of `source_ids`.
    ///
    /// # Errors
    /// [`AppError::IndexEmpty`] if the index holds no records.
    pub async fn retrieve_from_sources(
        &self,
        query: &str,
        k: usize,
        source_ids: &[String],
    ) -> AppResult<RetrievalResult> {
        let units = scored(self.index.query_filtered(query, k, source_ids).await?);
        tracing::info!(
            "Retrieved {} units from {} selected sources",
            units.len(),
            source_ids.len()
        );
        Ok(RetrievalResult { units })
    }
}

fn scored(pairs: Vec<(RetrievableUnit, f32)>) -> Vec<RetrievedUnit> {
    pairs
        .into_iter()
        .map(|(unit, distance)| RetrievedUnit {
            unit,
            distance: Some(distance),
        })
        .collect()
}

/// Render units in order, numbered from 1, separated by `---` lines.
pub fn format_context(units: &[RetrievedUnit]) -> String {
    units
        .iter()
        .enumerate()
        .map(|(i, retrieved)| {
            format!(
                "[Document {}] (Source: {}, Page: {})\n{}\n",
                i + 1,
                retrieved.unit.source_id,
                retrieved.unit.location.as_deref().unwrap_or("N/A"),
                retrieved.unit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}
