use std::sync::Arc;

/// Tolerance for the weight-sum invariant; covers accumulated float drift
/// in hand-written tables.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ScenarioKind {
    SendMessage,
    ListMessages,
    ListConversations,
    GetConversation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioWeight {
    pub kind: ScenarioKind,
    pub weight: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("scenario weight table is empty")]
    Empty,

    #[error("weight for `{kind}` must be a finite value in (0, 1], got {weight}")]
    OutOfRange { kind: ScenarioKind, weight: f64 },

    #[error("scenario weights must sum to 1.0 within {WEIGHT_SUM_EPSILON}, got {sum}")]
    BadSum { sum: f64 },
}

/// Ordered scenario weights, validated at construction so selection can
/// never observe a malformed table.
#[derive(Debug, Clone)]
pub struct WeightTable {
    entries: Arc<[ScenarioWeight]>,
}

impl WeightTable {
    pub fn new(entries: Vec<ScenarioWeight>) -> std::result::Result<Self, WeightError> {
        if entries.is_empty() {
            return Err(WeightError::Empty);
        }
        for entry in &entries {
            if !entry.weight.is_finite() || entry.weight <= 0.0 || entry.weight > 1.0 {
                return Err(WeightError::OutOfRange {
                    kind: entry.kind,
                    weight: entry.weight,
                });
            }
        }
        let sum: f64 = entries.iter().map(|entry| entry.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(WeightError::BadSum { sum });
        }
        Ok(Self {
            entries: Arc::from(entries.into_boxed_slice()),
        })
    }

    /// Picks the first entry whose cumulative weight reaches `draw`.
    ///
    /// `draw` is expected in [0, 1). A cumulative boundary belongs to the
    /// earlier entry; if drift leaves the total fractionally below `draw`,
    /// the last entry is the defined fallback.
    pub fn select(&self, draw: f64) -> ScenarioKind {
        let mut cumulative = 0.0f64;
        for entry in self.entries.iter() {
            cumulative += entry.weight;
            if cumulative >= draw {
                return entry.kind;
            }
        }
        match self.entries.last() {
            Some(entry) => entry.kind,
            None => unreachable!("weight table is validated non-empty"),
        }
    }

    pub fn entries(&self) -> &[ScenarioWeight] {
        &self.entries
    }
}

impl Default for WeightTable {
    /// The production mix: 80% writes, 20% reads split across the three
    /// read scenarios.
    fn default() -> Self {
        let entries = vec![
            ScenarioWeight {
                kind: ScenarioKind::SendMessage,
                weight: 0.80,
            },
            ScenarioWeight {
                kind: ScenarioKind::ListMessages,
                weight: 0.10,
            },
            ScenarioWeight {
                kind: ScenarioKind::ListConversations,
                weight: 0.05,
            },
            ScenarioWeight {
                kind: ScenarioKind::GetConversation,
                weight: 0.05,
            },
        ];
        Self::new(entries).unwrap_or_else(|err| panic!("default weight table invalid: {err}"))
    }
}
