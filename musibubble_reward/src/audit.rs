// Append-only audit trail of everything the safety envelope did.
//
// Three kinds of entries, mirroring what an expert reviewing a session
// wants to see: every clamp (with the rule that fired), every change to a
// stored parameter (tagged with whether the envelope or the caller caused
// it), and a running count of notes the envelope had to correct.
//
// Entries are only ever pushed. `clamps_since` lets a caller that
// remembered `clamps().len()` pick out what its own call produced.

use crate::safety::Param;
use serde::{Deserialize, Serialize};

/// One interception: a value that fell outside the active range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampEvent {
    pub param: Param,
    pub original: f64,
    pub clamped: f64,
    /// `"{param}_range_[{min}, {max}]"` for the range that was active.
    pub rule: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// The envelope clamped the requested value.
    Safety,
    /// The requested value was stored as given.
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamChange {
    pub param: Param,
    /// `None` when the parameter had never been set.
    pub from: Option<f64>,
    pub to: f64,
    pub source: ChangeSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    clamps: Vec<ClampEvent>,
    param_changes: Vec<ParamChange>,
    intercepted_notes: usize,
}

impl AuditLog {
    pub fn record_clamp(&mut self, event: ClampEvent) {
        self.clamps.push(event);
    }

    pub fn record_param_change(&mut self, change: ParamChange) {
        self.param_changes.push(change);
    }

    pub fn record_note_interception(&mut self) {
        self.intercepted_notes += 1;
    }

    pub fn clamps(&self) -> &[ClampEvent] {
        &self.clamps
    }

    /// Clamps recorded after the first `start` entries.
    pub fn clamps_since(&self, start: usize) -> &[ClampEvent] {
        self.clamps.get(start..).unwrap_or(&[])
    }

    pub fn param_changes(&self) -> &[ParamChange] {
        &self.param_changes
    }

    pub fn intercepted_notes(&self) -> usize {
        self.intercepted_notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clamp(param: Param, original: f64, clamped: f64) -> ClampEvent {
        ClampEvent {
            param,
            original,
            clamped,
            rule: format!("{}_range_[0, 1]", param.name()),
        }
    }

    #[test]
    fn clamps_since_slices_new_entries() {
        let mut log = AuditLog::default();
        log.record_clamp(clamp(Param::Volume, 2.0, 1.0));
        let mark = log.clamps().len();
        log.record_clamp(clamp(Param::Contrast, 3.0, 1.0));
        assert_eq!(log.clamps_since(mark).len(), 1);
        assert_eq!(log.clamps_since(mark)[0].param, Param::Contrast);
        assert!(log.clamps_since(10).is_empty());
    }

    #[test]
    fn note_interceptions_count() {
        let mut log = AuditLog::default();
        log.record_note_interception();
        log.record_note_interception();
        assert_eq!(log.intercepted_notes(), 2);
    }

    #[test]
    fn serializes_with_param_names() {
        let mut log = AuditLog::default();
        log.record_param_change(ParamChange {
            param: Param::NoteRange,
            from: None,
            to: 60.0,
            source: ChangeSource::User,
        });
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"noteRange\""), "{json}");
        assert!(json.contains("\"user\""), "{json}");
        assert!(json.contains("paramChanges"), "{json}");
    }
}
