//! Chronological merge of observations and summaries.

use pilot_mem_core::{Observation, SessionSummary};

/// One entry of the rendered timeline, tagged with its display epoch.
#[derive(Debug, Clone)]
pub enum TimelineItem {
    /// An observation, displayed at its own creation epoch.
    Observation { observation: Observation, display_epoch: i64 },
    /// A summary, displayed at the epoch that opens the interval it covers.
    Summary { summary: SessionSummary, display_epoch: i64 },
}

impl TimelineItem {
    /// Epoch the item sorts by.
    #[must_use]
    pub const fn display_epoch(&self) -> i64 {
        match *self {
            Self::Observation { display_epoch, .. } | Self::Summary { display_epoch, .. } => {
                display_epoch
            }
        }
    }

    fn sort_id(&self) -> i64 {
        match self {
            Self::Observation { observation, .. } => observation.id,
            Self::Summary { summary, .. } => summary.id,
        }
    }
}

/// Merges summaries and observations into one ascending timeline.
///
/// A summary "opens" the interval it covers: its display epoch is the
/// `created_at_epoch` of the immediately older summary, so it renders before
/// the observations it summarizes. The most recent summary uses its own
/// epoch. Ordering is ascending by display epoch with a stable secondary by
/// id.
#[must_use]
pub fn build_timeline(
    summaries: &[SessionSummary],
    observations: &[Observation],
) -> Vec<TimelineItem> {
    let mut items: Vec<TimelineItem> = Vec::with_capacity(summaries.len() + observations.len());

    // Summaries arrive newest first from the store; sort ascending first.
    let mut sorted: Vec<&SessionSummary> = summaries.iter().collect();
    sorted.sort_by_key(|s| (s.created_at_epoch, s.id));
    let last = sorted.len().saturating_sub(1);
    for (idx, summary) in sorted.iter().enumerate() {
        let display_epoch = if idx == last || idx == 0 {
            // The most recent summary (and an oldest one with no older
            // neighbor) displays at its own epoch.
            summary.created_at_epoch
        } else {
            sorted[idx - 1].created_at_epoch
        };
        items.push(TimelineItem::Summary { summary: (*summary).clone(), display_epoch });
    }

    for obs in observations {
        items.push(TimelineItem::Observation {
            observation: obs.clone(),
            display_epoch: obs.created_at_epoch,
        });
    }

    items.sort_by_key(|item| (item.display_epoch(), item.sort_id()));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_mem_core::ObservationType;

    fn summary(id: i64, epoch: i64) -> SessionSummary {
        SessionSummary {
            id,
            memory_session_id: format!("mem-{id}"),
            project: "pilot".to_owned(),
            request: Some(format!("request {id}")),
            investigated: None,
            learned: None,
            completed: None,
            next_steps: None,
            created_at_epoch: epoch,
        }
    }

    fn observation(id: i64, epoch: i64) -> Observation {
        Observation {
            id,
            memory_session_id: "mem".to_owned(),
            project: "pilot".to_owned(),
            observation_type: ObservationType::Discovery,
            title: format!("obs {id}"),
            subtitle: None,
            narrative: None,
            facts: vec![],
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            discovery_tokens: 0,
            created_at_epoch: epoch,
        }
    }

    #[test]
    fn middle_summary_opens_the_interval_it_covers() {
        // Three summaries at 100, 200, 300. The middle one covers
        // (100, 200] and displays at 100; the newest uses its own epoch.
        let summaries = vec![summary(3, 300), summary(2, 200), summary(1, 100)];
        let observations = vec![observation(10, 150)];

        let timeline = build_timeline(&summaries, &observations);

        let tagged: Vec<(i64, bool)> = timeline
            .iter()
            .map(|i| (i.display_epoch(), matches!(i, TimelineItem::Summary { .. })))
            .collect();
        // s1@100, s2@100 (opens its interval), obs@150, s3@300.
        assert_eq!(
            tagged,
            vec![(100, true), (100, true), (150, false), (300, true)]
        );
        assert!(matches!(timeline[1], TimelineItem::Summary { ref summary, .. }
            if summary.id == 2));
    }

    #[test]
    fn single_summary_uses_its_own_epoch() {
        let summaries = vec![summary(1, 500)];
        let timeline = build_timeline(&summaries, &[]);
        assert_eq!(timeline[0].display_epoch(), 500);
    }

    #[test]
    fn ordering_is_stable_by_id_within_an_epoch() {
        let observations = vec![observation(12, 100), observation(11, 100)];
        let timeline = build_timeline(&[], &observations);
        let ids: Vec<i64> = timeline
            .iter()
            .map(|i| match i {
                TimelineItem::Observation { observation, .. } => observation.id,
                TimelineItem::Summary { summary, .. } => summary.id,
            })
            .collect();
        assert_eq!(ids, vec![11, 12]);
    }
}
