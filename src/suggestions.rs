//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Errors should tell users what went
//! wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Features file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::features_not_found(path));
//! ```

use crate::config::FEATURE_KINDS;
use crate::error::{Error, ErrorCategory};
use std::path::Path;

/// Generate an error for when the features file is not found.
pub fn features_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Features file not found: {path}\n\n\
         hint: Use -f/--features to point at a JSON or YAML feature list\n\
         hint: Set the LAYER_DEPGRAPH_FEATURES environment variable",
        path = path.display()
    )
}

/// Generate an error for a parent or auxiliary snapshot that does not exist.
pub fn facts_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Facts snapshot not found: {path}\n\n\
         hint: Snapshots are written by 'layer-depgraph plan --facts-out FILE'",
        path = path.display()
    )
}

/// Generate an error for a malformed `--layer` argument.
pub fn invalid_layer_arg(arg: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid layer argument: {arg}\n\n\
         hint: Use --layer LABEL=FACTS, e.g. --layer base=out/base.facts.json"
    )
}

/// Generate an error for an invalid glob pattern.
pub fn invalid_glob(pattern: &str, error: &glob::PatternError) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid glob pattern: {pattern}\n\
         error: {error}\n\n\
         hint: Use * for single path component, ** for recursive matching\n\
         hint: Use [abc] for character classes, [!abc] to negate"
    )
}

/// Generic hint for an engine failure, shown under the error message.
pub fn hint_for(error: &Error) -> Option<&'static str> {
    match error.category() {
        ErrorCategory::Cycle => {
            Some("break the cycle by changing the owner or location of one of the features")
        }
        ErrorCategory::Conflict => {
            Some("remove one of the declarations, or make them identical")
        }
        ErrorCategory::MissingRequirement => {
            Some("declare a feature providing it, or build on a parent layer that has it")
        }
        ErrorCategory::Validation => None,
        ErrorCategory::UnresolvableSymlink => Some("check the symlink targets for loops"),
        ErrorCategory::Input => None,
    }
}

/// Hint for a feature file parse error that names an unknown kind.
///
/// Looks for the `unknown variant `...`` fragment serde produces.
pub fn feature_kind_hint(message: &str) -> Option<String> {
    let rest = message.split("unknown variant `").nth(1)?;
    let kind = rest.split('`').next()?;
    Some(match find_similar(kind, FEATURE_KINDS) {
        Some(similar) => format!("did you mean '{}'?", similar),
        None => format!("valid kinds are: {}", FEATURE_KINDS.join(", ")),
    })
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a_chars.iter().enumerate() {
        let mut current = vec![i + 1; b_chars.len() + 1];
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }

    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_not_found_includes_hints() {
        let error = features_not_found(Path::new("/work/features.json"));
        let message = error.to_string();

        assert!(message.contains("Features file not found"));
        assert!(message.contains("/work/features.json"));
        assert!(message.contains("-f/--features"));
        assert!(message.contains("LAYER_DEPGRAPH_FEATURES"));
    }

    #[test]
    fn test_invalid_layer_arg_shows_format() {
        let message = invalid_layer_arg("base").to_string();
        assert!(message.contains("Invalid layer argument: base"));
        assert!(message.contains("LABEL=FACTS"));
    }

    #[test]
    fn test_feature_kind_hint_suggests_similar() {
        let message = "unknown variant `ensure_dir_exist`, expected one of `install`";
        assert_eq!(
            feature_kind_hint(message).as_deref(),
            Some("did you mean 'ensure_dirs_exist'?")
        );
    }

    #[test]
    fn test_feature_kind_hint_lists_kinds_for_very_different() {
        let hint = feature_kind_hint("unknown variant `frobnicate`, expected ...").unwrap();
        assert!(hint.starts_with("valid kinds are: install"));
    }

    #[test]
    fn test_feature_kind_hint_ignores_other_errors() {
        assert_eq!(feature_kind_hint("missing field `dst`"), None);
    }

    #[test]
    fn test_hint_for_categories() {
        let error = Error::Conflict {
            item: "/foo".to_string(),
            providers: Vec::new(),
        };
        assert!(hint_for(&error).unwrap().contains("identical"));
        let error = Error::InvalidConfig {
            message: "threads".to_string(),
        };
        assert_eq!(hint_for(&error), None);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("install", "install"), 0);
        assert_eq!(edit_distance("instal", "install"), 1);
        assert_eq!(edit_distance("remove", "removes"), 1);
        assert_eq!(edit_distance("", "clone"), 5);
    }

    #[test]
    fn test_find_similar() {
        assert_eq!(find_similar("clon", FEATURE_KINDS), Some("clone"));
        assert_eq!(find_similar("usermod", FEATURE_KINDS), Some("user_mod"));
        assert_eq!(find_similar("foobar", FEATURE_KINDS), None);
    }
}
