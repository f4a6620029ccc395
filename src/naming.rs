//! Naming conventions used to fill in relation defaults.
//!
//! A relation only needs its name to work: the target model, the through table
//! and the through-table foreign keys are all derived from model names with
//! the conventions below unless configured explicitly.

/// Naming conventions consumed by relation construction
pub trait Naming: Send + Sync {
    /// Default target model name for relation `relation` declared on `from`
    fn model_name(&self, from: &str, relation: &str) -> String;

    /// Default foreign key column referencing `model`
    fn foreign_key(&self, model: &str) -> String;

    /// Default table name for `model`
    fn table_name(&self, model: &str) -> String;
}

/// Built-in conventions: `tags` on `blog::Post` → `blog::Tag`,
/// `blog::Post` → `post_id`, `blog::Post` → `posts`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl Naming for DefaultNaming {
    fn model_name(&self, from: &str, relation: &str) -> String {
        format!("{}{}", namespace(from), classify(relation))
    }

    fn foreign_key(&self, model: &str) -> String {
        format!("{}_id", snake_case(demodulize(model)))
    }

    fn table_name(&self, model: &str) -> String {
        pluralize(&snake_case(demodulize(model)))
    }
}

/// Namespace prefix of a model path, including the trailing `::`
pub fn namespace(model: &str) -> &str {
    match model.rfind("::") {
        Some(idx) => &model[..idx + 2],
        None => "",
    }
}

/// Model name without its namespace
pub fn demodulize(model: &str) -> &str {
    match model.rfind("::") {
        Some(idx) => &model[idx + 2..],
        None => model,
    }
}

/// Singular PascalCase model name for a (usually plural) relation name
pub fn classify(name: &str) -> String {
    pascal_case(&singularize(&snake_case(name)))
}

/// Convert string to snake_case
pub fn snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i > 0 && !result.ends_with('_') {
            result.push('_');
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// Convert string to PascalCase
pub fn pascal_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize = true;
    for c in s.chars() {
        if c == '_' {
            capitalize = true;
        } else if capitalize {
            result.extend(c.to_uppercase());
            capitalize = false;
        } else {
            result.push(c);
        }
    }
    result
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// English plural of a snake_case word (last segment only)
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !is_vowel(c)) {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// English singular of a snake_case word (last segment only)
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
