//! Token accounting for the context header.

use pilot_mem_core::Observation;

/// Savings figure shown in the context header: what the recorded
/// observations would cost to re-discover cold, versus what they cost to
/// read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEconomics {
    /// Sum of `discovery_tokens` across the selected observations.
    pub recorded_tokens: i64,
    /// Baseline cost of re-discovering the same knowledge.
    pub baseline_tokens: i64,
}

impl TokenEconomics {
    /// Computes savings over `observations` against a per-observation
    /// baseline.
    #[must_use]
    pub fn compute(observations: &[Observation], baseline_per_observation: i64) -> Self {
        let recorded_tokens = observations.iter().map(|o| o.discovery_tokens).sum();
        let baseline_tokens = baseline_per_observation * observations.len() as i64;
        Self { recorded_tokens, baseline_tokens }
    }

    /// Net tokens saved; never negative.
    #[must_use]
    pub const fn saved(&self) -> i64 {
        let saved = self.baseline_tokens - self.recorded_tokens;
        if saved > 0 {
            saved
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_mem_core::ObservationType;

    fn obs(tokens: i64) -> Observation {
        Observation {
            id: 0,
            memory_session_id: "mem".to_owned(),
            project: "pilot".to_owned(),
            observation_type: ObservationType::Discovery,
            title: "t".to_owned(),
            subtitle: None,
            narrative: None,
            facts: vec![],
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            discovery_tokens: tokens,
            created_at_epoch: 0,
        }
    }

    #[test]
    fn savings_against_baseline() {
        let economics = TokenEconomics::compute(&[obs(100), obs(300)], 1_000);
        assert_eq!(economics.recorded_tokens, 400);
        assert_eq!(economics.baseline_tokens, 2_000);
        assert_eq!(economics.saved(), 1_600);
    }

    #[test]
    fn savings_never_go_negative() {
        let economics = TokenEconomics::compute(&[obs(5_000)], 1_000);
        assert_eq!(economics.saved(), 0);
    }
}
