//! Multi-factor file scoring and budget-constrained selection.
//!
//! Every eligible file receives an additive score from independent signals:
//!
//! | Signal | Default weight |
//! |--------|----------------|
//! | Priority file (README, LICENSE, manifests) | +100 |
//! | Entry point (`index.*`, `main.*`, `app.*`, `server.*`, `lib.rs`) | +80 |
//! | Config file | +50 |
//! | Depth bonus, divided by the number of path segments | 20 |
//! | Under a conventional source directory | +15 |
//! | Size band, proportional to size | up to +10 |
//! | Primary language (top 3 by bytes) | +10 |
//! | Conventional filename stem | +10 |
//! | Touched by a recent commit | +15 |
//! | Test path | −30 |
//! | Generated or minified path | −50 |
//!
//! Scores are floored at zero. Selection is a stable score-descending sort
//! followed by a greedy pass that skips (not stops at) any file breaching
//! the file-count or byte budget.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::conventions::{
    has_conventional_name, in_source_dir, is_config_file, is_entry_point, is_generated_path,
    is_priority_file, is_test_path,
};
use crate::language::is_source_language;
use crate::models::{FileCategory, FileNode, ScoredFile, SelectionResult, SelectionSummary};
use crate::rules::PathRules;

/// Weights of each scoring signal. Penalties are given as positive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub priority_file: f64,
    pub entry_point: f64,
    pub config_file: f64,
    pub depth_bonus: f64,
    pub source_dir: f64,
    pub size_bonus_max: f64,
    pub size_band_min_bytes: u64,
    pub size_band_max_bytes: u64,
    pub primary_language: f64,
    pub conventional_name: f64,
    pub recently_modified: f64,
    pub test_penalty: f64,
    pub generated_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            priority_file: 100.0,
            entry_point: 80.0,
            config_file: 50.0,
            depth_bonus: 20.0,
            source_dir: 15.0,
            size_bonus_max: 10.0,
            size_band_min_bytes: 500,
            size_band_max_bytes: 50_000,
            primary_language: 10.0,
            conventional_name: 10.0,
            recently_modified: 15.0,
            test_penalty: 30.0,
            generated_penalty: 50.0,
        }
    }
}

/// Hard ceilings on a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionBudget {
    pub max_files: usize,
    pub max_total_bytes: u64,
    pub max_file_bytes: u64,
}

impl Default for SelectionBudget {
    fn default() -> Self {
        Self {
            max_files: 50,
            max_total_bytes: 1024 * 1024,
            max_file_bytes: 100 * 1024,
        }
    }
}

/// Repository-wide facts that feed per-file signals.
#[derive(Debug, Clone, Default)]
pub struct RepoStats {
    /// Bytes per language tag across the whole listing.
    pub language_bytes: BTreeMap<String, u64>,
    /// Paths touched by recent commits.
    pub recent_paths: HashSet<String>,
}

impl RepoStats {
    /// The `n` languages with the most bytes. Ties break by name.
    pub fn primary_languages(&self, n: usize) -> Vec<String> {
        let mut langs: Vec<(&String, &u64)> = self.language_bytes.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        langs
            .into_iter()
            .take(n)
            .map(|(lang, _)| lang.to_ascii_lowercase())
            .collect()
    }

    /// Tally language bytes from a listing.
    pub fn from_listing(files: &[FileNode]) -> Self {
        let mut language_bytes = BTreeMap::new();
        for node in files.iter().filter(|n| n.is_file()) {
            if let Some(lang) = &node.language {
                *language_bytes.entry(lang.clone()).or_insert(0) += node.size.unwrap_or(0);
            }
        }
        Self {
            language_bytes,
            recent_paths: HashSet::new(),
        }
    }
}

/// Scores and selects files from a repository listing.
#[derive(Debug, Clone)]
pub struct FileSelector {
    weights: ScoringWeights,
    budget: SelectionBudget,
    rules: PathRules,
    top_languages: usize,
    high_complexity_bytes: u64,
}

impl FileSelector {
    pub fn new(weights: ScoringWeights, budget: SelectionBudget) -> Self {
        Self {
            weights,
            budget,
            rules: PathRules::defaults(),
            top_languages: 3,
            high_complexity_bytes: 20_000,
        }
    }

    /// Replace the default path rules with user include/exclude rules.
    pub fn with_rules(mut self, rules: PathRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_top_languages(mut self, n: usize) -> Self {
        self.top_languages = n;
        self
    }

    pub fn with_high_complexity_bytes(mut self, bytes: u64) -> Self {
        self.high_complexity_bytes = bytes;
        self
    }

    pub fn budget(&self) -> &SelectionBudget {
        &self.budget
    }

    /// Whether a listing entry may be selected at all.
    pub fn is_eligible(&self, node: &FileNode) -> bool {
        node.is_file()
            && self.rules.allows_file(&node.path)
            && node.size.unwrap_or(0) <= self.budget.max_file_bytes
    }

    /// Score a single node against precomputed primary languages.
    ///
    /// Returns `None` for ineligible entries.
    pub fn score(&self, node: &FileNode, primary: &[String], stats: &RepoStats) -> Option<ScoredFile> {
        if !self.is_eligible(node) {
            return None;
        }
        let w = &self.weights;
        let path = node.path.as_str();
        let size = node.size.unwrap_or(0);

        let priority = is_priority_file(path);
        let entry = is_entry_point(path);
        let config = !priority && is_config_file(path);
        let recent = stats.recent_paths.contains(path);
        let primary_lang = node
            .language
            .as_deref()
            .map(|l| primary.iter().any(|p| p == l))
            .unwrap_or(false);

        let mut score = 0.0;
        if priority {
            score += w.priority_file;
        }
        if entry {
            score += w.entry_point;
        }
        if config {
            score += w.config_file;
        }

        let segments = path.split('/').filter(|s| !s.is_empty()).count().max(1);
        score += w.depth_bonus / segments as f64;

        if in_source_dir(path) {
            score += w.source_dir;
        }
        if w.size_band_max_bytes > 0 && size >= w.size_band_min_bytes && size <= w.size_band_max_bytes {
            let ratio = size as f64 / w.size_band_max_bytes as f64;
            score += (ratio * w.size_bonus_max).min(w.size_bonus_max);
        }
        if primary_lang {
            score += w.primary_language;
        }
        if has_conventional_name(path) {
            score += w.conventional_name;
        }
        if recent {
            score += w.recently_modified;
        }
        if is_test_path(path) {
            score -= w.test_penalty;
        }
        if is_generated_path(path) {
            score -= w.generated_penalty;
        }
        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };

        let category = if priority {
            FileCategory::Critical
        } else if entry {
            FileCategory::EntryPoint
        } else if config {
            FileCategory::Config
        } else if primary_lang
            && is_source_language(node.language.as_deref())
            && size >= self.high_complexity_bytes
        {
            FileCategory::HighComplexity
        } else if recent {
            FileCategory::RecentlyModified
        } else {
            FileCategory::Standard
        };

        Some(ScoredFile::new(node.clone(), score, category))
    }

    /// Score every eligible file and greedily pick the best within budget.
    pub fn select(&self, listing: &[FileNode], stats: &RepoStats) -> SelectionResult {
        let primary = stats.primary_languages(self.top_languages);

        let mut scored: Vec<ScoredFile> = listing
            .iter()
            .filter_map(|node| self.score(node, &primary, stats))
            .collect();

        let mut summary = SelectionSummary {
            total_considered: listing.len(),
            total_eligible: scored.len(),
            ..Default::default()
        };
        for file in &scored {
            match file.category {
                FileCategory::Critical => summary.priority_files.push(file.path().to_string()),
                FileCategory::EntryPoint => summary.entry_points.push(file.path().to_string()),
                _ => {}
            }
        }

        // sort_by is stable, so equal scores keep listing order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut files = Vec::new();
        let mut total_size = 0u64;
        for file in scored {
            if files.len() >= self.budget.max_files {
                break;
            }
            let size = file.size();
            match total_size.checked_add(size) {
                Some(total) if total <= self.budget.max_total_bytes => total_size = total,
                _ => continue,
            }
            *summary.by_category.entry(file.category).or_insert(0) += 1;
            files.push(file);
        }

        summary.selected_count = files.len();
        summary.total_size = total_size;
        SelectionResult { files, summary }
    }
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), SelectionBudget::default())
    }
}
