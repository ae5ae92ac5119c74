//! Pluggable edit-scope analysis
//!
//! Given a diagnostic and the file it points into, recommend how large an
//! edit the repair agent should attempt and with which primitive. The
//! trait is deliberately one method so callers can inject a smarter
//! analyzer (or a mock) without touching the report generator.

use crate::model::ValidationError;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditGranularity {
    Line,
    Expression,
    Block,
}

impl EditGranularity {
    pub fn label(&self) -> &'static str {
        match self {
            EditGranularity::Line => "line",
            EditGranularity::Expression => "expression",
            EditGranularity::Block => "block",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeRecommendation {
    pub granularity: EditGranularity,
    /// Edit primitive the repair agent should reach for.
    pub primitive: &'static str,
}

pub trait ScopeAnalyzer: Send + Sync {
    fn recommend(
        &self,
        error: &ValidationError,
        content: &str,
        path: &Path,
    ) -> ScopeRecommendation;
}

/// Default when no analyzer is injected: structural messages get a block
/// edit, located single-line problems a line edit, everything else an
/// expression edit.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScopeAnalyzer;

impl ScopeAnalyzer for DefaultScopeAnalyzer {
    fn recommend(
        &self,
        error: &ValidationError,
        _content: &str,
        _path: &Path,
    ) -> ScopeRecommendation {
        let message = &error.message;
        if message.contains("JSX") || message.contains("'}' expected") {
            return ScopeRecommendation {
                granularity: EditGranularity::Block,
                primitive: "replace_block",
            };
        }
        if error.line.is_some() {
            return ScopeRecommendation {
                granularity: EditGranularity::Line,
                primitive: "replace_line",
            };
        }
        ScopeRecommendation {
            granularity: EditGranularity::Expression,
            primitive: "replace_expression",
        }
    }
}
