use serde::Deserialize;
use similar::{DiffOp, TextDiff};

// ---------------------------------------------------------------------------
// Alias classes
// ---------------------------------------------------------------------------

/// One alias equivalence class: a canonical plan name plus the raw spellings
/// that mean the same thing.
#[derive(Debug, Clone, Deserialize)]
pub struct AliasClass {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AliasClass {
    fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Built-in classes covering the common benefits plan vocabulary.
    pub fn default_classes() -> Vec<AliasClass> {
        vec![
            AliasClass::new("medical", &["health", "med", "medical plan", "health plan"]),
            AliasClass::new("dental", &["dent", "dntl"]),
            AliasClass::new("vision", &["vis", "vba"]),
            AliasClass::new(
                "short term disability",
                &["std", "short-term disability", "short term dis", "short term"],
            ),
            AliasClass::new(
                "long term disability",
                &["ltd", "long-term disability", "long term dis", "long term"],
            ),
            AliasClass::new("life", &["basic life", "group life", "life insurance"]),
            AliasClass::new("hsa", &["health savings account", "hsa plan"]),
            AliasClass::new("fsa", &["flexible spending account", "medical fsa", "fsa medical"]),
        ]
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Outcome of resolving one raw plan name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub canonical: String,
    pub matched: bool,
    pub similarity: f64,
}

struct AliasEntry {
    /// Normalized alias or canonical spelling.
    name: String,
    /// Canonical name this entry resolves to.
    canonical: String,
}

/// Read-only lookup table built once per run from the configured equivalence
/// classes. Entries keep insertion order: ties among equal fuzzy scores
/// resolve to the earliest entry.
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn from_classes(classes: &[AliasClass]) -> Self {
        let mut entries: Vec<AliasEntry> = Vec::new();
        for class in classes {
            let canonical = normalize_plan_name(&class.canonical);
            if canonical.is_empty() {
                continue;
            }
            for name in std::iter::once(&class.canonical).chain(class.aliases.iter()) {
                let name = normalize_plan_name(name);
                if name.is_empty() || entries.iter().any(|e| e.name == name) {
                    continue;
                }
                entries.push(AliasEntry {
                    name,
                    canonical: canonical.clone(),
                });
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonicalize a raw plan name.
    ///
    /// Exact (case-insensitive, whitespace-normalized) lookup wins before any
    /// fuzzy scoring, so known aliases never fall to threshold false
    /// negatives. Fuzzy matching is a full scan over the table; a best score
    /// of at least `threshold` (strict ≥) accepts that entry's canonical
    /// name, otherwise the raw name comes back unchanged.
    pub fn resolve(&self, raw: &str, threshold: f64) -> Resolution {
        let needle = normalize_plan_name(raw);
        if needle.is_empty() {
            return Resolution {
                canonical: raw.to_string(),
                matched: false,
                similarity: 0.0,
            };
        }

        if let Some(entry) = self.entries.iter().find(|e| e.name == needle) {
            return Resolution {
                canonical: entry.canonical.clone(),
                matched: true,
                similarity: 1.0,
            };
        }

        let mut best: Option<(&AliasEntry, f64)> = None;
        for entry in &self.entries {
            let score = similarity(&needle, &entry.name);
            // Strictly-greater keeps the earliest entry on ties.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }

        match best {
            Some((entry, score)) if score >= threshold => Resolution {
                canonical: entry.canonical.clone(),
                matched: true,
                similarity: score,
            },
            Some((_, score)) => Resolution {
                canonical: raw.to_string(),
                matched: false,
                similarity: score,
            },
            None => Resolution {
                canonical: raw.to_string(),
                matched: false,
                similarity: 0.0,
            },
        }
    }
}

/// Lowercase, strip punctuation, collapse whitespace. Comparison key for all
/// plan-name equality in the engine.
pub fn normalize_plan_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalized difflib-style ratio in 0.0–1.0. Deterministic and symmetric.
///
/// Computed in `f64` from the diff ops rather than via `TextDiff::ratio`,
/// whose `f32` result can land just under a threshold the true ratio meets
/// exactly (2 * 9 / 20 must score 0.90, not 0.89999997).
fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let diff = TextDiff::from_chars(a, b);
    let matches: usize = diff
        .ops()
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();
    2.0 * matches as f64 / total as f64
}
