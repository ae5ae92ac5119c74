//! Style-contrast adapter: dangerous UI class combinations
//!
//! Scans every source line for a fixed table of class-combination rules:
//! a themed button carrying an explicit text color, unreadable
//! light-on-light / dark-on-dark pairs, and a bare button with no padding
//! utility. No subprocess involved; this is the one fully in-process
//! analyzer.

use crate::adapters::{collect_source_files, relative_display};
use crate::config::ValidatorConfig;
use crate::model::{ErrorKind, ValidationError, ValidationResult, ValidationWarning};
use anyhow::Result;
use regex::Regex;
use std::path::Path;

pub const LIGHT_BACKGROUNDS: &[&str] = &[
    "bg-white",
    "bg-gray-50",
    "bg-gray-100",
    "bg-slate-50",
    "bg-slate-100",
    "bg-yellow-50",
    "bg-yellow-100",
];

pub const LIGHT_TEXTS: &[&str] = &[
    "text-white",
    "text-gray-50",
    "text-gray-100",
    "text-slate-100",
    "text-yellow-100",
];

pub const DARK_BACKGROUNDS: &[&str] = &[
    "bg-black",
    "bg-gray-900",
    "bg-slate-900",
    "bg-zinc-900",
    "bg-neutral-900",
];

pub const DARK_TEXTS: &[&str] = &[
    "text-black",
    "text-gray-900",
    "text-slate-900",
    "text-zinc-900",
    "text-neutral-900",
];

/// One entry in the contrast rule table. Predicates operate on the
/// space-separated class tokens of a single attribute so each rule is
/// independently testable.
pub struct ContrastRule {
    pub name: &'static str,
    pub message: &'static str,
    pub is_error: bool,
    pub fixable: bool,
    pub matches: fn(&[&str]) -> bool,
}

/// Ordered table of dangerous patterns.
pub fn contrast_rules() -> Vec<ContrastRule> {
    vec![
        ContrastRule {
            name: "contrast/button-text-override",
            message: "Themed button combines an explicit text color; remove the text-* utility and let the theme control contrast",
            is_error: true,
            fixable: true,
            matches: |tokens| has_themed_button(tokens) && tokens.iter().any(|t| is_text_color(t)),
        },
        ContrastRule {
            name: "contrast/light-on-light",
            message: "Light background with light text is unreadable",
            is_error: true,
            fixable: true,
            matches: |tokens| {
                tokens.iter().any(|t| LIGHT_BACKGROUNDS.contains(t))
                    && tokens.iter().any(|t| LIGHT_TEXTS.contains(t))
            },
        },
        ContrastRule {
            name: "contrast/dark-on-dark",
            message: "Dark background with dark text is unreadable",
            is_error: true,
            fixable: true,
            matches: |tokens| {
                tokens.iter().any(|t| DARK_BACKGROUNDS.contains(t))
                    && tokens.iter().any(|t| DARK_TEXTS.contains(t))
            },
        },
        ContrastRule {
            name: "contrast/button-padding",
            message: "Button has no padding utility",
            is_error: false,
            fixable: false,
            matches: |tokens| {
                tokens.contains(&"btn") && !tokens.iter().any(|t| is_padding_utility(t))
            },
        },
    ]
}

pub fn has_themed_button(tokens: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| *t == "btn-primary" || *t == "btn-secondary")
}

/// An explicit foreground color utility like `text-white` or
/// `text-red-500` (but not `text-lg`, `text-center`, ...).
pub fn is_text_color(token: &str) -> bool {
    let Some(rest) = token.strip_prefix("text-") else {
        return false;
    };
    if rest == "white" || rest == "black" {
        return true;
    }
    match rest.rsplit_once('-') {
        Some((color, shade)) => {
            !color.is_empty()
                && color.chars().all(|c| c.is_ascii_alphabetic())
                && shade.len() >= 2
                && shade.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn is_padding_utility(token: &str) -> bool {
    for prefix in ["p-", "px-", "py-", "pt-", "pb-", "pl-", "pr-"] {
        if let Some(rest) = token.strip_prefix(prefix) {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return true;
            }
        }
    }
    false
}

pub fn validate_contrast(dir: &Path, config: &ValidatorConfig) -> Result<ValidationResult> {
    let class_attr = Regex::new(r#"class(?:Name)?=["']([^"']*)["']"#).expect("class attr regex");
    let rules = contrast_rules();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for path in collect_source_files(dir, config) {
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let display = relative_display(dir, &path);
        for (line_idx, line) in content.lines().enumerate() {
            let line_no = (line_idx + 1) as u32;
            for caps in class_attr.captures_iter(line) {
                let tokens: Vec<&str> = caps[1].split_whitespace().collect();
                for rule in &rules {
                    if !(rule.matches)(&tokens) {
                        continue;
                    }
                    if rule.is_error {
                        let mut error =
                            ValidationError::new(ErrorKind::Syntax, display.clone(), rule.message)
                                .with_line(line_no)
                                .with_rule(rule.name);
                        if rule.fixable {
                            error = error.fixable();
                        }
                        errors.push(error);
                    } else {
                        warnings.push(
                            ValidationWarning::new(ErrorKind::Syntax, display.clone(), rule.message)
                                .with_rule(rule.name),
                        );
                    }
                }
            }
        }
    }
    Ok(ValidationResult::from_parts(errors, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scan(content: &str) -> ValidationResult {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/page.tsx"), content).unwrap();
        validate_contrast(dir.path(), &ValidatorConfig::default()).unwrap()
    }

    #[test]
    fn test_themed_button_with_text_color_is_fixable_error() {
        let result = scan(r#"<button className="btn-primary text-red-500">Go</button>"#);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].fixable);
        assert_eq!(
            result.errors[0].rule.as_deref(),
            Some("contrast/button-text-override")
        );
        assert_eq!(result.errors[0].line, Some(1));
    }

    #[test]
    fn test_light_on_light_detected() {
        let result = scan(r#"<div className="bg-white text-white">ghost</div>"#);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].rule.as_deref(),
            Some("contrast/light-on-light")
        );
    }

    #[test]
    fn test_dark_on_dark_detected() {
        let result = scan(r#"<div className="bg-black text-gray-900">void</div>"#);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].rule.as_deref(),
            Some("contrast/dark-on-dark")
        );
    }

    #[test]
    fn test_bare_button_without_padding_warns_only() {
        let result = scan(r#"<button className="btn">tiny</button>"#);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].rule.as_deref(),
            Some("contrast/button-padding")
        );
    }

    #[test]
    fn test_padded_button_is_clean() {
        let result = scan(r#"<button className="btn px-4 py-2">ok</button>"#);
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_safe_combinations_pass() {
        let result = scan(
            r#"<div className="bg-white text-gray-900"><button className="btn-primary">ok</button></div>"#,
        );
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_text_color_classifier() {
        assert!(is_text_color("text-white"));
        assert!(is_text_color("text-red-500"));
        assert!(!is_text_color("text-lg"));
        assert!(!is_text_color("text-center"));
        assert!(!is_text_color("bg-red-500"));
    }
}
