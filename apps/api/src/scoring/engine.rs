//! Scoring engine: one scoring call per module, dimension scores averaged
//! into the module score.
//!
//! Returned dimensions are identified by their position in the response:
//! `dimension target id = module id * 100 + index + 1`. The label stored with
//! each row is whatever rule name the scorer echoed back.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use super::rules::ScoringRules;
use crate::generation_client::types::{DimensionScore, ScoreRequest};
use crate::generation_client::{GenerationError, GenerationService};
use crate::ids::IdAllocator;
use crate::models::content::{ModuleData, ModuleKind, ModuleSection};
use crate::models::resume::{NewScore, TargetType};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring service failed: {0}")]
    Service(#[from] GenerationError),

    #[error("module payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleScore {
    pub kind: ModuleKind,
    /// Unweighted mean of the dimension scores.
    pub score: f64,
    pub dimensions: Vec<DimensionScore>,
}

impl ModuleScore {
    /// `None` when the scorer returned no dimensions.
    pub fn from_dimensions(kind: ModuleKind, dimensions: Vec<DimensionScore>) -> Option<Self> {
        if dimensions.is_empty() {
            return None;
        }
        let score = dimensions.iter().map(|d| d.score).sum::<f64>() / dimensions.len() as f64;
        Some(Self {
            kind,
            score,
            dimensions,
        })
    }

    pub fn dimension_target_id(kind: ModuleKind, index: usize) -> i64 {
        kind.id() * 100 + index as i64 + 1
    }

    /// Module row followed by one row per dimension.
    pub fn rows(&self, resume_id: i64, ids: &IdAllocator) -> Vec<NewScore> {
        let weight = 1.0 / self.dimensions.len() as f64;
        let module_row = NewScore {
            id: ids.next_id(),
            resume_id,
            target_id: self.kind.id(),
            target_type: TargetType::Module,
            label: self.kind.title().to_string(),
            score: self.score,
            weight: 1.0,
        };
        std::iter::once(module_row)
            .chain(self.dimensions.iter().enumerate().map(|(i, d)| NewScore {
                id: ids.next_id(),
                resume_id,
                target_id: Self::dimension_target_id(self.kind, i),
                target_type: TargetType::Dimension,
                label: d.rule.clone(),
                score: d.score,
                weight,
            }))
            .collect()
    }
}

pub struct ScoringEngine {
    generation: Arc<dyn GenerationService>,
    rules: Arc<ScoringRules>,
}

impl ScoringEngine {
    pub fn new(generation: Arc<dyn GenerationService>, rules: Arc<ScoringRules>) -> Self {
        Self { generation, rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub async fn score(&self, data: &ModuleData) -> Result<Option<ModuleScore>, ScoringError> {
        let kind = data.kind();
        let request = ScoreRequest {
            section: BTreeMap::from([(kind.title().to_string(), data.scoring_payload()?)]),
            rules: self.rules.rule_set(kind),
        };

        let dimensions = self.generation.score_section(&request).await?;
        let score = ModuleScore::from_dimensions(kind, dimensions);
        match &score {
            Some(s) => info!(
                module = kind.title(),
                score = s.score,
                dimensions = s.dimensions.len(),
                "Module scored"
            ),
            None => info!(module = kind.title(), "Scorer returned no dimensions"),
        }
        Ok(score)
    }

    /// Scores every section concurrently. Each module's outcome is independent.
    pub async fn score_all(
        &self,
        sections: &[ModuleSection],
    ) -> Vec<(ModuleKind, Result<Option<ModuleScore>, ScoringError>)> {
        let results = join_all(sections.iter().map(|s| self.score(&s.data))).await;
        sections
            .iter()
            .map(ModuleSection::kind)
            .zip(results)
            .inspect(|(kind, result)| {
                if let Err(e) = result {
                    warn!(module = kind.title(), "Module scoring failed: {e}");
                }
            })
            .collect()
    }
}
