//! Layer fixture tests using datatest-stable for test data discovery
//!
//! Every JSON feature file below `tests/testdata` is built through the whole
//! engine. The name of the directory holding a fixture is the expected
//! outcome: `valid` fixtures must produce a plan, any other directory names
//! the error category the layer must be rejected with.

use layer_depgraph::error::ErrorCategory;
use layer_depgraph::phases::orchestrator::{build_layer, check_layer, EngineConfig, LayerInput};
use std::path::Path;

fn expected_category(name: &str) -> Option<ErrorCategory> {
    match name {
        "conflict" => Some(ErrorCategory::Conflict),
        "cycle" => Some(ErrorCategory::Cycle),
        "missing_requirement" => Some(ErrorCategory::MissingRequirement),
        "validation" => Some(ErrorCategory::Validation),
        "input" => Some(ErrorCategory::Input),
        _ => None,
    }
}

/// Build one fixture and compare the outcome with its directory.
fn test_layer_fixture(path: &Path) -> datatest_stable::Result<()> {
    let outcome = path
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("Fixture {} is not in an outcome directory", path.display()))?;
    let config = EngineConfig::default();

    if outcome == "valid" {
        let input = LayerInput::load(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
        let output = build_layer(&input, &config)
            .map_err(|e| format!("Failed to build {}: {}", path.display(), e))?;

        assert_eq!(
            output.plan.len(),
            output.graph.features().len(),
            "Every feature of {} should be planned exactly once",
            path.display()
        );
        let facts = output.facts.to_facts();
        assert!(
            facts.entries.iter().any(|entry| entry.path.is_root()),
            "Facts of {} should contain /",
            path.display()
        );
        return Ok(());
    }

    let expected = expected_category(outcome)
        .ok_or_else(|| format!("Unknown outcome directory '{}'", outcome))?;
    let categories = match LayerInput::load(path) {
        Err(e) => vec![e.category()],
        Ok(input) => match check_layer(&input, &config) {
            Ok(output) => {
                return Err(format!(
                    "{} should fail with {} but planned {} steps",
                    path.display(),
                    expected,
                    output.plan.len()
                )
                .into())
            }
            Err(failures) => failures.iter().map(|e| e.category()).collect(),
        },
    };
    assert!(
        categories.contains(&expected),
        "{} should fail with {}, got {:?}",
        path.display(),
        expected,
        categories
    );
    Ok(())
}

datatest_stable::harness!(test_layer_fixture, "tests/testdata", r".*\.json$");
