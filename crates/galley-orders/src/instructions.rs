//! Removal requests hidden in free-text special instructions.

use galley_core::IngredientId;
use galley_menu::CompositionEntry;
use once_cell::sync::Lazy;
use regex::Regex;

static EXCLUSION_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:without|no|hold)\s+").expect("valid keyword pattern"));

static PHRASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z\s,'-]+").expect("valid phrase pattern"));

static PHRASE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\band\b|\bplease\b|\bwith\b|\bthanks\b|[.,!]").expect("valid phrase end pattern")
});

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z']+").expect("valid token pattern"));

/// Phrases following "without", "no" or "hold", cut at the first
/// conjunction, courtesy word or punctuation mark.
fn exclusion_phrases(instructions: &str) -> Vec<String> {
    let text = instructions.to_lowercase();
    EXCLUSION_KEYWORD
        .find_iter(&text)
        .filter_map(|keyword| {
            let rest = &text[keyword.end()..];
            let phrase = PHRASE.find(rest)?.as_str();
            let phrase = match PHRASE_END.find(phrase) {
                Some(end) => &phrase[..end.start()],
                None => phrase,
            };
            let phrase = phrase.trim();
            (!phrase.is_empty()).then(|| phrase.to_string())
        })
        .collect()
}

fn tokens(value: &str) -> Vec<String> {
    TOKEN
        .find_iter(&value.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Removable ingredients that the instructions ask to leave out.
///
/// An ingredient matches when any word of its name appears in an exclusion
/// phrase. Mandatory ingredients never match. The result follows
/// composition order without duplicates.
pub fn infer_removals(composition: &[CompositionEntry], instructions: &str) -> Vec<IngredientId> {
    let phrases: Vec<Vec<String>> = exclusion_phrases(instructions)
        .iter()
        .map(|p| tokens(p))
        .filter(|t| !t.is_empty())
        .collect();
    if phrases.is_empty() {
        return Vec::new();
    }

    let mut removals = Vec::new();
    for entry in composition.iter().filter(|e| e.is_removable) {
        let name_tokens = tokens(&entry.ingredient.name);
        let mentioned = phrases
            .iter()
            .any(|phrase| phrase.iter().any(|t| name_tokens.contains(t)));
        if mentioned && !removals.contains(&entry.ingredient.id) {
            removals.push(entry.ingredient.id);
        }
    }
    removals
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_core::Ingredient;

    fn entry(id: u64, name: &str, is_removable: bool) -> CompositionEntry {
        CompositionEntry {
            ingredient: Ingredient {
                id: IngredientId(id),
                name: name.to_string(),
            },
            is_removable,
        }
    }

    fn composition() -> Vec<CompositionEntry> {
        vec![
            entry(1, "Burrata", false),
            entry(2, "Prosciutto", false),
            entry(3, "Arugula", true),
            entry(4, "Balsamic Glaze", true),
        ]
    }

    #[test]
    fn test_phrases_are_truncated() {
        assert_eq!(
            exclusion_phrases("No arugula please, extra bread"),
            vec!["arugula".to_string()]
        );
        assert_eq!(
            exclusion_phrases("hold the glaze and no onions!"),
            vec!["the glaze".to_string(), "onions".to_string()]
        );
    }

    #[test]
    fn test_infers_removable_ingredients() {
        let removals = infer_removals(&composition(), "Without glaze and no arugula, thanks");
        assert_eq!(removals, vec![IngredientId(3), IngredientId(4)]);
    }

    #[test]
    fn test_mandatory_ingredients_never_inferred() {
        let removals = infer_removals(&composition(), "no prosciutto");
        assert!(removals.is_empty());
    }

    #[test]
    fn test_no_keyword_no_removals() {
        assert!(infer_removals(&composition(), "extra arugula please").is_empty());
        assert!(infer_removals(&composition(), "").is_empty());
    }

    #[test]
    fn test_keyword_inside_word_is_ignored() {
        assert!(infer_removals(&composition(), "piano arugula").is_empty());
    }
}
