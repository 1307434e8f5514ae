//! Per-module scoring rubrics.
//!
//! Rubrics are read once at startup from a JSON file keyed by module kind:
//!
//! ```json
//! { "education": [ { "title": "时间完整", "description": "入学与毕业时间齐全",
//!                    "bands": [ { "judgment_detail": "齐全", "judgment_score": 100 } ] } ] }
//! ```
//!
//! A module with no usable dimension falls back to the generic
//! completeness/professionalism rubric.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::generation_client::types::{RuleBand, RuleSet};
use crate::models::content::ModuleKind;

/// Writing requirement used when a module has no dimension descriptions.
pub const FALLBACK_REQUIREMENT: &str = "时间、职务、活动名称、经历完整清晰";

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionRule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bands: Vec<RuleBand>,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringRules {
    modules: HashMap<ModuleKind, Vec<DimensionRule>>,
}

impl ScoringRules {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let modules: HashMap<ModuleKind, Vec<DimensionRule>> = serde_json::from_str(raw)?;
        Ok(Self { modules })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scoring rules from {}", path.display()))?;
        let rules = Self::from_json(&raw)
            .with_context(|| format!("invalid scoring rules in {}", path.display()))?;
        info!(
            "Loaded scoring rules for {} module(s) from {}",
            rules.modules.len(),
            path.display()
        );
        Ok(rules)
    }

    /// The rubric sent with a module's scoring request.
    pub fn rule_set(&self, kind: ModuleKind) -> RuleSet {
        let configured: RuleSet = self
            .modules
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|d| !d.bands.is_empty())
            .map(|d| (d.title.clone(), d.bands.clone()))
            .collect();
        if configured.is_empty() {
            fallback_rule_set()
        } else {
            configured
        }
    }

    /// Writing requirement for streamed assistance on this module: the
    /// dimension names, each followed by its description when it has one.
    pub fn requirement(&self, kind: ModuleKind) -> String {
        let parts: Vec<String> = self
            .modules
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|d| !d.title.is_empty())
            .map(|d| match d.description.as_str() {
                "" => d.title.clone(),
                description => format!("{}：{description}", d.title),
            })
            .collect();
        if parts.is_empty() {
            FALLBACK_REQUIREMENT.to_string()
        } else {
            parts.join("；")
        }
    }
}

pub fn fallback_rule_set() -> RuleSet {
    RuleSet::from([
        (
            "内容完整性".to_string(),
            vec![
                RuleBand::new("内容完整详细", 100.0),
                RuleBand::new("内容基本完整", 80.0),
                RuleBand::new("内容不够完整", 60.0),
            ],
        ),
        (
            "内容专业性".to_string(),
            vec![
                RuleBand::new("专业术语准确，表述规范", 100.0),
                RuleBand::new("表述基本专业", 80.0),
                RuleBand::new("表述不够专业", 60.0),
            ],
        ),
    ])
}
