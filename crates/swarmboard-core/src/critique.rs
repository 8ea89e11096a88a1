//! Structured critique produced by a reviewer worker against a task result
//! (§3.2). Scoring is data-driven: five weighted integer dimensions combine
//! into a composite that, together with a floor rule, determines the
//! [`Verdict`].

use serde::{Deserialize, Serialize};

/// `LGTM` completes the task; `NeedsWork` drives one revision round (capped
/// by `critique_round` on the task itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Lgtm,
    NeedsWork,
}

/// One actionable fix item attached to a critique dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueItem {
    pub dimension: String,
    pub note: String,
}

/// The five scored dimensions, each an integer in `[1, 10]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dimensions {
    pub accuracy: u8,
    pub completeness: u8,
    pub technical: u8,
    pub calibration: u8,
    pub efficiency: u8,
}

impl Dimensions {
    const WEIGHTS: [(&'static str, f64); 5] = [
        ("accuracy", 0.30),
        ("completeness", 0.20),
        ("technical", 0.20),
        ("calibration", 0.20),
        ("efficiency", 0.10),
    ];

    fn scores(&self) -> [(&'static str, u8); 5] {
        [
            ("accuracy", self.accuracy),
            ("completeness", self.completeness),
            ("technical", self.technical),
            ("calibration", self.calibration),
            ("efficiency", self.efficiency),
        ]
    }

    /// Weighted sum of the five dimensions, in `[1, 10]`.
    pub fn composite(&self) -> f64 {
        let scores = self.scores();
        Self::WEIGHTS
            .iter()
            .zip(scores.iter())
            .map(|((_, w), (_, s))| w * f64::from(*s))
            .sum()
    }

    /// Dimension names scoring below 5, the threshold that forces
    /// `NEEDS_WORK`.
    pub fn below_floor(&self) -> Vec<&'static str> {
        self.scores()
            .into_iter()
            .filter(|(_, s)| *s < 5)
            .map(|(name, _)| name)
            .collect()
    }

    fn all_at_least(&self, floor: u8) -> bool {
        self.scores().iter().all(|(_, s)| *s >= floor)
    }
}

/// The full critique: scored dimensions, derived verdict, and up to three
/// actionable items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueSpec {
    pub dimensions: Dimensions,
    pub verdict: Verdict,
    pub items: Vec<CritiqueItem>,
    pub confidence: f64,
}

impl CritiqueSpec {
    /// Builds a [`CritiqueSpec`] from scored dimensions and a candidate item
    /// list, applying §3.2's verdict rules: all dims ≥ 8 forces `LGTM` with
    /// no items; any dim < 5 forces `NEEDS_WORK` with at least one item
    /// covering that dimension. The caller-supplied `items` are truncated to
    /// three and, for the floor case, backfilled with a placeholder note for
    /// any uncovered failing dimension so the invariant always holds.
    pub fn derive(dimensions: Dimensions, mut items: Vec<CritiqueItem>, confidence: f64) -> Self {
        items.truncate(3);

        if dimensions.all_at_least(8) {
            return Self {
                dimensions,
                verdict: Verdict::Lgtm,
                items: Vec::new(),
                confidence,
            };
        }

        let floor_dims = dimensions.below_floor();
        if !floor_dims.is_empty() {
            for dim in &floor_dims {
                if !items.iter().any(|i| &i.dimension == dim) {
                    items.push(CritiqueItem {
                        dimension: (*dim).to_string(),
                        note: format!("{dim} scored below floor and needs rework"),
                    });
                }
            }
            items.truncate(3);
            return Self {
                dimensions,
                verdict: Verdict::NeedsWork,
                items,
                confidence,
            };
        }

        let verdict = if items.is_empty() {
            Verdict::Lgtm
        } else {
            Verdict::NeedsWork
        };
        Self {
            dimensions,
            verdict,
            items,
            confidence,
        }
    }
}
