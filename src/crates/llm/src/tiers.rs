//! The compiled-in model tier table and its reverse index.
//!
//! Operators who need a different catalog fork this table; it is not reloaded
//! from configuration.

use std::collections::HashMap;
use std::sync::OnceLock;

pub const FLAGSHIP: &[&str] = &[
    "openai/gpt-4-turbo",
    "anthropic/claude-3-opus",
    "google/gemini-pro-1.5",
    "openai/gpt-4o",
    "anthropic/claude-3.5-sonnet",
];

pub const MID_TIER: &[&str] = &[
    "openai/gpt-3.5-turbo",
    "anthropic/claude-3-sonnet",
    "google/gemini-pro",
    "mistralai/mistral-medium",
    "meta-llama/llama-3-70b-instruct",
];

pub const BUDGET: &[&str] = &[
    "anthropic/claude-3-haiku",
    "google/gemini-flash-1.5",
    "mistralai/mistral-small",
    "meta-llama/llama-3-8b-instruct",
    "openai/gpt-3.5-turbo-0125",
];

pub const CODING: &[&str] = &[
    "deepseek/deepseek-coder",
    "codellama/codellama-70b-instruct",
    "openai/gpt-4-turbo",
    "anthropic/claude-3-sonnet",
    "mistralai/codestral",
];

const TIERS: &[&[&str]] = &[FLAGSHIP, MID_TIER, BUDGET, CODING];

fn reverse_index() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static INDEX: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for tier in TIERS {
            for model in *tier {
                index.insert(*model, *tier);
            }
        }
        index
    })
}

/// Up to `max_retries` model ids to try, in order, starting with `model` itself.
///
/// If `model` belongs to a known tier, the remaining slots are filled from the
/// other members of that tier (in the tier's preference order, skipping
/// `model` itself). If `model` is unrecognized, the list has length 1 — no
/// substitution, every retry targets the same id.
pub fn fallback_list(model: &str, max_retries: u32) -> Vec<String> {
    let max_retries = max_retries.max(1) as usize;
    let mut list = vec![model.to_string()];

    if let Some(tier) = reverse_index().get(model) {
        for candidate in *tier {
            if list.len() >= max_retries {
                break;
            }
            if *candidate != model {
                list.push(candidate.to_string());
            }
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_pulls_siblings_from_its_tier() {
        let list = fallback_list("anthropic/claude-3-haiku", 3);
        assert_eq!(list[0], "anthropic/claude-3-haiku");
        assert_eq!(list.len(), 3);
        assert!(list[1..].iter().all(|m| BUDGET.contains(&m.as_str())));
    }

    #[test]
    fn unknown_model_has_no_substitutes() {
        let list = fallback_list("some/unlisted-model", 3);
        assert_eq!(list, vec!["some/unlisted-model".to_string()]);
    }

    #[test]
    fn max_retries_bounds_list_length() {
        let list = fallback_list("openai/gpt-4-turbo", 2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn every_tier_member_resolves_to_its_own_tier() {
        for tier in TIERS {
            for model in *tier {
                let tier_lookup = reverse_index().get(model).unwrap();
                assert!(std::ptr::eq(*tier_lookup, *tier));
            }
        }
    }
}
