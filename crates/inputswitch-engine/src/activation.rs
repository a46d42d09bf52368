use config::Policy;
use tracing::trace;

use crate::{Engine, EngineEvent, Error, Outcome};

impl Engine {
    /// Evaluate `policy` for a newly activated application.
    ///
    /// Exactly one log entry is recorded unless the outcome is
    /// [`Outcome::Ignored`].
    pub fn on_activation(&mut self, app_id: &str, policy: &Policy) -> Outcome {
        let outcome = self.decide(app_id, policy);
        trace!("activation app_id={} outcome={:?}", app_id, outcome);
        self.flush();
        outcome
    }

    fn decide(&mut self, app_id: &str, policy: &Policy) -> Outcome {
        self.context.current_app_id = app_id.to_string();
        self.pending.push(EngineEvent::ContextChanged);

        if policy.global_lock.active {
            let target = policy.global_lock.source_id.as_str();
            if target.is_empty() {
                return Outcome::Ignored;
            }
            if self.context.current_source_id == target {
                self.log(app_id, target, true, "lock held");
                return Outcome::LockHeld;
            }
            return match self.switch_inner(target) {
                Ok(()) => {
                    self.log(app_id, target, true, "lock applied");
                    Outcome::LockApplied
                }
                Err(err) => {
                    self.log(app_id, target, false, &failure_message(&err, "lock switch failed"));
                    Outcome::LockFailed
                }
            };
        }

        if !policy.enabled {
            return Outcome::Ignored;
        }

        if !policy.filter_allows(app_id) {
            self.refresh_source_keeping_previous();
            let source = self.context.current_source_id.clone();
            self.log(app_id, &source, true, "skipped: outside filter scope");
            return Outcome::SkippedByFilter;
        }

        let Some(mapping) = policy.mapping_for(app_id) else {
            self.refresh_source_keeping_previous();
            let source = self.context.current_source_id.clone();
            self.log(app_id, &source, true, "skipped: no rule configured");
            return Outcome::SkippedNoRule;
        };

        let target = mapping.source_id.as_str();
        match self.switch_inner(target) {
            Ok(()) => {
                self.log(app_id, target, true, "switched");
                Outcome::Switched
            }
            Err(err) => {
                self.log(app_id, target, false, &failure_message(&err, "switch failed"));
                Outcome::SwitchFailed
            }
        }
    }

    /// Re-read the current source; keep the previous value when unreadable.
    fn refresh_source_keeping_previous(&mut self) {
        if let Some(id) = self.sources.current_source_id() {
            self.context.current_source_id = id;
        }
    }
}

/// Message for a failed switch: the recorded error, or `fallback` for a blank target.
fn failure_message(err: &Error, fallback: &str) -> String {
    match err {
        Error::InvalidArgument => fallback.to_string(),
        other => other.to_string(),
    }
}
