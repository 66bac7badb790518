//! The resolution decision tree.
//!
//! `decide` is pure and total: given the analysis of the nearest match and the
//! candidate, it always picks exactly one transition. Store effects live in
//! the engine.

use crate::behavior::BehaviorRecord;
use crate::candidate::ValidCandidate;
use crate::drift::{classify, DriftAnalysis};
use crate::signal::DriftType;

/// Transition chosen for a candidate that matched an ACTIVE behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Replace the matched record.
    Supersede {
        forced_by_drift: bool,
        drift_type: DriftType,
    },
    /// Reinforce the matched record in place.
    Reinforce,
    /// Keep the matched record and log a drift signal.
    Ignore { drift_type: DriftType },
}

/// Picks the transition for `candidate` against its nearest match.
///
/// Priority, highest first: signal accumulation, credibility override,
/// field-identical reinforcement, ignore.
#[must_use]
pub fn decide(
    existing: &BehaviorRecord,
    candidate: &ValidCandidate,
    analysis: &DriftAnalysis,
) -> Decision {
    if analysis.accumulation_detected {
        return Decision::Supersede {
            forced_by_drift: true,
            drift_type: classify(existing, candidate),
        };
    }

    if candidate.credibility > analysis.effective() {
        return Decision::Supersede {
            forced_by_drift: false,
            drift_type: classify(existing, candidate),
        };
    }

    if existing.same_fields_as(candidate) {
        return Decision::Reinforce;
    }

    Decision::Ignore {
        drift_type: classify(existing, candidate),
    }
}
