//! Keyword coverage: which SQL features a query uses that the visualizer only
//! shows as a placeholder.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverageStatus {
    Supported,
    Placeholder,
}

#[derive(Clone, Copy, Debug)]
pub struct KeywordDefinition {
    pub keyword: &'static str,
    pub status: CoverageStatus,
    pub visualization: &'static str,
    /// Case-insensitive pattern matched against the raw SQL text.
    pub pattern: &'static str,
}

/// A recognized keyword without a dedicated visual.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverageGap {
    pub keyword: &'static str,
    pub visualization: &'static str,
}

impl CoverageGap {
    pub fn note(&self) -> String {
        format!("{}: {}", self.keyword, self.visualization)
    }
}

use CoverageStatus::{Placeholder, Supported};

const KEYWORDS: &[KeywordDefinition] = &[
    KeywordDefinition {
        keyword: "SELECT",
        status: Supported,
        visualization: "Projection step with highlighted output columns.",
        pattern: r"\bselect\b",
    },
    KeywordDefinition {
        keyword: "DISTINCT",
        status: Placeholder,
        visualization: "Placeholder callout (results are not yet de-duplicated).",
        pattern: r"\bdistinct\b",
    },
    KeywordDefinition {
        keyword: "FROM",
        status: Supported,
        visualization: "Source table loading step.",
        pattern: r"\bfrom\b",
    },
    KeywordDefinition {
        keyword: "INNER JOIN",
        status: Supported,
        visualization: "Join pairing animation for matching rows.",
        pattern: r"\binner\s+join\b",
    },
    KeywordDefinition {
        keyword: "LEFT JOIN",
        status: Supported,
        visualization: "Join pairing animation with unmatched left rows.",
        pattern: r"\bleft\s+(outer\s+)?join\b",
    },
    KeywordDefinition {
        keyword: "RIGHT JOIN",
        status: Supported,
        visualization: "Join pairing animation with unmatched right rows.",
        pattern: r"\bright\s+(outer\s+)?join\b",
    },
    KeywordDefinition {
        keyword: "FULL JOIN",
        status: Supported,
        visualization: "Join pairing animation with unmatched rows on both sides.",
        pattern: r"\bfull\s+(outer\s+)?join\b",
    },
    KeywordDefinition {
        keyword: "CROSS JOIN",
        status: Supported,
        visualization: "Cartesian pairing visualization.",
        pattern: r"\bcross\s+join\b",
    },
    KeywordDefinition {
        keyword: "ON",
        status: Supported,
        visualization: "Join condition summary in the pairing step.",
        pattern: r"\bon\b",
    },
    KeywordDefinition {
        keyword: "WHERE",
        status: Supported,
        visualization: "Row filter step with kept/filtered states.",
        pattern: r"\bwhere\b",
    },
    KeywordDefinition {
        keyword: "GROUP BY",
        status: Supported,
        visualization: "Grouped row clusters and aggregate output.",
        pattern: r"\bgroup\s+by\b",
    },
    KeywordDefinition {
        keyword: "HAVING",
        status: Supported,
        visualization: "Post-aggregation filter step.",
        pattern: r"\bhaving\b",
    },
    KeywordDefinition {
        keyword: "ORDER BY",
        status: Supported,
        visualization: "Sorted output table.",
        pattern: r"\border\s+by\b",
    },
    KeywordDefinition {
        keyword: "LIMIT",
        status: Supported,
        visualization: "Trimmed output rows.",
        pattern: r"\blimit\b",
    },
    KeywordDefinition {
        keyword: "OFFSET",
        status: Placeholder,
        visualization: "Placeholder callout (offset pagination not visualized).",
        pattern: r"\boffset\b",
    },
    KeywordDefinition {
        keyword: "FETCH",
        status: Placeholder,
        visualization: "Placeholder callout (fetch-first pagination not visualized).",
        pattern: r"\bfetch\b",
    },
    KeywordDefinition {
        keyword: "UNION",
        status: Supported,
        visualization: "Set operation comparison with merged rows.",
        pattern: r"\bunion\b",
    },
    KeywordDefinition {
        keyword: "INTERSECT",
        status: Supported,
        visualization: "Set operation comparison with shared rows.",
        pattern: r"\bintersect\b",
    },
    KeywordDefinition {
        keyword: "EXCEPT",
        status: Supported,
        visualization: "Set operation comparison with left-only rows.",
        pattern: r"\bexcept\b",
    },
    KeywordDefinition {
        keyword: "WITH",
        status: Supported,
        visualization: "CTE build step before the main query.",
        pattern: r"\bwith\b",
    },
    KeywordDefinition {
        keyword: "SUBQUERY",
        status: Supported,
        visualization: "Nested SELECT resolved into a subquery node.",
        pattern: r"\bselect\b(?s:.)*\bselect\b",
    },
    KeywordDefinition {
        keyword: "INSERT",
        status: Supported,
        visualization: "Mutation preview with inserted rows highlighted.",
        pattern: r"\binsert\b",
    },
    KeywordDefinition {
        keyword: "UPDATE",
        status: Supported,
        visualization: "Mutation preview with updated rows highlighted.",
        pattern: r"\bupdate\b",
    },
    KeywordDefinition {
        keyword: "DELETE",
        status: Supported,
        visualization: "Mutation preview with deleted rows highlighted.",
        pattern: r"\bdelete\b",
    },
    KeywordDefinition {
        keyword: "VALUES",
        status: Placeholder,
        visualization: "Placeholder callout (explicit VALUES list not visualized).",
        pattern: r"\bvalues\b",
    },
    KeywordDefinition {
        keyword: "CASE",
        status: Placeholder,
        visualization: "Placeholder callout (conditional expressions not visualized).",
        pattern: r"\bcase\b",
    },
    KeywordDefinition {
        keyword: "CAST",
        status: Placeholder,
        visualization: "Placeholder callout (data type casting not visualized).",
        pattern: r"\bcast\b",
    },
    KeywordDefinition {
        keyword: "COALESCE",
        status: Placeholder,
        visualization: "Placeholder callout (null-coalescing not visualized).",
        pattern: r"\bcoalesce\b",
    },
    KeywordDefinition {
        keyword: "LIKE",
        status: Placeholder,
        visualization: "Placeholder callout (pattern matching not visualized).",
        pattern: r"\blike\b",
    },
    KeywordDefinition {
        keyword: "IN",
        status: Placeholder,
        visualization: "Placeholder callout (set membership not visualized).",
        pattern: r"\bin\b",
    },
    KeywordDefinition {
        keyword: "EXISTS",
        status: Placeholder,
        visualization: "Placeholder callout (existence checks not visualized).",
        pattern: r"\bexists\b",
    },
    KeywordDefinition {
        keyword: "BETWEEN",
        status: Placeholder,
        visualization: "Placeholder callout (range filtering not visualized).",
        pattern: r"\bbetween\b",
    },
    KeywordDefinition {
        keyword: "WINDOW",
        status: Placeholder,
        visualization: "Placeholder callout (window functions not visualized).",
        pattern: r"\bover\b|\bwindow\b",
    },
    KeywordDefinition {
        keyword: "CREATE",
        status: Placeholder,
        visualization: "Placeholder callout (DDL statements not visualized).",
        pattern: r"\bcreate\b",
    },
    KeywordDefinition {
        keyword: "ALTER",
        status: Placeholder,
        visualization: "Placeholder callout (DDL statements not visualized).",
        pattern: r"\balter\b",
    },
    KeywordDefinition {
        keyword: "DROP",
        status: Placeholder,
        visualization: "Placeholder callout (DDL statements not visualized).",
        pattern: r"\bdrop\b",
    },
];

static DETECTORS: Lazy<Vec<(&'static KeywordDefinition, Regex)>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .filter_map(|def| match Regex::new(&format!("(?i){}", def.pattern)) {
            Ok(re) => Some((def, re)),
            Err(err) => {
                log::warn!("coverage pattern for {} does not compile: {}", def.keyword, err);
                None
            }
        })
        .collect()
});

pub fn keyword_definitions() -> &'static [KeywordDefinition] {
    KEYWORDS
}

/// Keywords present in `sql`, in table order.
pub fn detect_keywords(sql: &str) -> Vec<&'static KeywordDefinition> {
    DETECTORS
        .iter()
        .filter(|(_, re)| re.is_match(sql))
        .map(|(def, _)| *def)
        .collect()
}

/// Placeholder keywords used by `sql`, each reported once.
pub fn find_coverage_gaps(sql: &str) -> Vec<CoverageGap> {
    let mut gaps: Vec<CoverageGap> = Vec::new();
    for def in detect_keywords(sql) {
        if def.status == Placeholder && !gaps.iter().any(|g| g.keyword == def.keyword) {
            gaps.push(CoverageGap { keyword: def.keyword, visualization: def.visualization });
        }
    }
    if !gaps.is_empty() {
        log::info!(
            "coverage gaps: {}",
            gaps.iter().map(|g| g.keyword).collect::<Vec<_>>().join(", ")
        );
    }
    gaps
}
