//! Property tests for file selection budgets and determinism.

use proptest::prelude::*;
use repo_intake_core::models::FileNode;
use repo_intake_core::select::{FileSelector, RepoStats, ScoringWeights, SelectionBudget};

fn arb_path() -> impl Strategy<Value = String> {
    let dirs = prop::sample::select(vec!["", "src/", "lib/", "tests/", "dist/", "docs/", "src/components/"]);
    let stems = prop::sample::select(vec![
        "index", "main", "app", "README", "userService", "router", "widget", "helper", "bundle.min",
    ]);
    let exts = prop::sample::select(vec!["ts", "tsx", "rs", "py", "go", "md", "json", "js", "txt"]);
    (dirs, stems, exts, 0u32..1000).prop_map(|(d, s, e, n)| format!("{}{}{}.{}", d, s, n, e))
}

fn arb_listing() -> impl Strategy<Value = Vec<FileNode>> {
    prop::collection::vec((arb_path(), 0u64..200_000), 0..80)
        .prop_map(|entries| entries.into_iter().map(|(p, s)| FileNode::file(p, s)).collect())
}

fn arb_budget() -> impl Strategy<Value = SelectionBudget> {
    (0usize..40, 0u64..500_000, 1u64..150_000).prop_map(|(max_files, max_total_bytes, max_file_bytes)| {
        SelectionBudget {
            max_files,
            max_total_bytes,
            max_file_bytes,
        }
    })
}

proptest! {
    #[test]
    fn selection_respects_budgets(listing in arb_listing(), budget in arb_budget()) {
        let selector = FileSelector::new(ScoringWeights::default(), budget);
        let result = selector.select(&listing, &RepoStats::from_listing(&listing));

        prop_assert!(result.files.len() <= budget.max_files);
        let total: u64 = result.files.iter().map(|f| f.size()).sum();
        prop_assert!(total <= budget.max_total_bytes);
        prop_assert_eq!(total, result.summary.total_size);
        prop_assert_eq!(result.files.len(), result.summary.selected_count);
        for file in &result.files {
            prop_assert!(file.size() <= budget.max_file_bytes);
        }
    }

    #[test]
    fn scores_are_non_negative_and_descending(listing in arb_listing()) {
        let result = FileSelector::default().select(&listing, &RepoStats::from_listing(&listing));
        for file in &result.files {
            prop_assert!(file.score >= 0.0);
        }
        for pair in result.files.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn selection_is_deterministic(listing in arb_listing(), budget in arb_budget()) {
        let selector = FileSelector::new(ScoringWeights::default(), budget);
        let stats = RepoStats::from_listing(&listing);
        let a = selector.select(&listing, &stats);
        let b = selector.select(&listing, &stats);
        prop_assert_eq!(a, b);
    }
}
