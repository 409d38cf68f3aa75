// Safety envelope: the clamping layer every audible parameter passes through.
//
// Each clampable parameter has two ranges: a safe range that is always in
// force, and a wider unsafe range that only applies once an expert has both
// enabled unsafe mode and confirmed it. Any value outside the active range
// is clamped, the clamp is appended to the audit log, and an `Intercepted`
// event is published before the stored value changes. A `ParamChanged`
// event follows only if the stored value actually moved, so re-setting a
// parameter to its current value is silent.
//
// Leaving unsafe mode re-runs every stored value through `set_param`, which
// retroactively tightens anything that was only legal under the wide
// ranges.
//
// The envelope also gates output: it starts muted and only preview mode
// unmutes it. `validate_note` reports the mute flag alongside the corrected
// pitch and velocity so the audio collaborator can honor it.
//
// Listeners are plain closures kept in registration order. Publishing calls
// them synchronously; a panicking listener is caught and logged and the
// remaining listeners still run.
//
// The envelope is an owned value. Callers thread it by `&mut` through
// `pipeline::generate_reward`; nothing here is global.

use crate::audit::{AuditLog, ChangeSource, ClampEvent, ParamChange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;

/// A clampable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Param {
    Tempo,
    Volume,
    Density,
    NoteRange,
    Contrast,
}

impl Param {
    pub const ALL: [Param; 5] = [
        Param::Tempo,
        Param::Volume,
        Param::Density,
        Param::NoteRange,
        Param::Contrast,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::Tempo => "tempo",
            Param::Volume => "volume",
            Param::Density => "density",
            Param::NoteRange => "noteRange",
            Param::Contrast => "contrast",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Param {
    type Err = SafetyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Param::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| SafetyError::UnknownParam(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    /// Unsafe mode was requested without the second confirmation.
    ConfirmationRequired,
    UnknownParam(String),
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmationRequired => write!(f, "unsafe mode requires confirmation"),
            Self::UnknownParam(name) => write!(f, "unknown parameter: {name}"),
        }
    }
}

impl std::error::Error for SafetyError {}

/// Safe and unsafe bounds of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRange {
    pub min: f64,
    pub max: f64,
    pub unsafe_min: f64,
    pub unsafe_max: f64,
}

impl SafetyRange {
    pub const fn new(min: f64, max: f64, unsafe_min: f64, unsafe_max: f64) -> Self {
        SafetyRange {
            min,
            max,
            unsafe_min,
            unsafe_max,
        }
    }
}

/// The full range table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRanges {
    pub tempo: SafetyRange,
    pub volume: SafetyRange,
    pub density: SafetyRange,
    pub note_range: SafetyRange,
    pub contrast: SafetyRange,
}

impl Default for SafetyRanges {
    fn default() -> Self {
        SafetyRanges {
            tempo: SafetyRange::new(120.0, 130.0, 100.0, 140.0),
            volume: SafetyRange::new(0.3, 0.8, 0.0, 1.0),
            density: SafetyRange::new(0.5, 2.0, 0.1, 5.0),
            note_range: SafetyRange::new(48.0, 84.0, 24.0, 108.0),
            contrast: SafetyRange::new(0.0, 0.1, 0.0, 0.5),
        }
    }
}

impl SafetyRanges {
    pub fn get(&self, param: Param) -> SafetyRange {
        match param {
            Param::Tempo => self.tempo,
            Param::Volume => self.volume,
            Param::Density => self.density,
            Param::NoteRange => self.note_range,
            Param::Contrast => self.contrast,
        }
    }
}

/// The active bounds of a parameter together with both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub safe_min: f64,
    pub safe_max: f64,
    pub unsafe_min: f64,
    pub unsafe_max: f64,
}

/// Notification published to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvelopeEvent {
    Intercepted(ClampEvent),
    ParamChanged {
        param: Param,
        old_value: Option<f64>,
        new_value: f64,
        intercepted: bool,
    },
    Warning {
        message: String,
    },
    UnsafeModeChanged {
        enabled: bool,
        confirmed: bool,
    },
    PreviewModeChanged {
        enabled: bool,
        muted: bool,
    },
}

/// Result of passing one note through the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCheck {
    pub midi: u8,
    pub velocity: u8,
    pub intercepted: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeStatus {
    pub unsafe_mode: bool,
    pub unsafe_confirmed: bool,
    pub preview_mode: bool,
    pub muted: bool,
    pub params: BTreeMap<Param, f64>,
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EnvelopeEvent)>;

pub struct SafetyEnvelope {
    ranges: SafetyRanges,
    values: BTreeMap<Param, f64>,
    unsafe_mode: bool,
    unsafe_confirmed: bool,
    preview_mode: bool,
    muted: bool,
    audit: AuditLog,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for SafetyEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SafetyEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafetyEnvelope")
            .field("values", &self.values)
            .field("unsafe_mode", &self.unsafe_mode)
            .field("unsafe_confirmed", &self.unsafe_confirmed)
            .field("preview_mode", &self.preview_mode)
            .field("muted", &self.muted)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SafetyEnvelope {
    /// Envelope with the default range table.
    pub fn new() -> Self {
        Self::with_ranges(SafetyRanges::default())
    }

    /// Envelope with a custom range table. Starting values are stored
    /// as given, without clamping.
    pub fn with_ranges(ranges: SafetyRanges) -> Self {
        let values = BTreeMap::from([
            (Param::Tempo, 130.0),
            (Param::Volume, 0.7),
            (Param::Density, 1.0),
            (Param::Contrast, 0.1),
        ]);
        SafetyEnvelope {
            ranges,
            values,
            unsafe_mode: false,
            unsafe_confirmed: false,
            preview_mode: false,
            muted: true,
            audit: AuditLog::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    // ---- parameters ----

    /// Clamp `value` into the active range of `param`, store it and return
    /// the stored value.
    pub fn set_param(&mut self, param: Param, value: f64) -> f64 {
        let range = self.param_range(param);
        let mut stored = value;
        let mut intercepted = false;

        // NaN is never inside a range; it lands on the lower bound.
        if value.is_nan() || value < range.min || value > range.max {
            stored = if value.is_nan() {
                range.min
            } else {
                value.clamp(range.min, range.max)
            };
            intercepted = true;
            let event = ClampEvent {
                param,
                original: value,
                clamped: stored,
                rule: format!("{}_range_[{}, {}]", param.name(), range.min, range.max),
            };
            log::debug!(
                target: "safety",
                "clamped {} {} -> {} ({})",
                param, value, stored, event.rule
            );
            self.audit.record_clamp(event.clone());
            self.publish(&EnvelopeEvent::Intercepted(event));
        }

        let old = self.values.insert(param, stored);
        if old != Some(stored) {
            self.audit.record_param_change(ParamChange {
                param,
                from: old,
                to: stored,
                source: if intercepted {
                    ChangeSource::Safety
                } else {
                    ChangeSource::User
                },
            });
            self.publish(&EnvelopeEvent::ParamChanged {
                param,
                old_value: old,
                new_value: stored,
                intercepted,
            });
        }
        stored
    }

    /// `set_param` by wire name. Unknown names are logged, reported as a
    /// warning event and returned unchanged.
    pub fn set_param_by_name(&mut self, name: &str, value: f64) -> f64 {
        match name.parse::<Param>() {
            Ok(param) => self.set_param(param, value),
            Err(e) => {
                log::warn!(target: "safety", "{e}; value {value} passed through");
                self.publish(&EnvelopeEvent::Warning {
                    message: e.to_string(),
                });
                value
            }
        }
    }

    pub fn get_param(&self, param: Param) -> Option<f64> {
        self.values.get(&param).copied()
    }

    pub fn param_range(&self, param: Param) -> ParamRange {
        let r = self.ranges.get(param);
        let wide = self.unsafe_active();
        ParamRange {
            min: if wide { r.unsafe_min } else { r.min },
            max: if wide { r.unsafe_max } else { r.max },
            safe_min: r.min,
            safe_max: r.max,
            unsafe_min: r.unsafe_min,
            unsafe_max: r.unsafe_max,
        }
    }

    /// Re-clamp every stored value against the active ranges.
    pub fn revalidate_all_params(&mut self) {
        let stored: Vec<(Param, f64)> = self.values.iter().map(|(p, v)| (*p, *v)).collect();
        for (param, value) in stored {
            self.set_param(param, value);
        }
    }

    // ---- modes ----

    fn unsafe_active(&self) -> bool {
        self.unsafe_mode && self.unsafe_confirmed
    }

    /// Switch the unsafe tier. Enabling needs `confirmed`; disabling
    /// re-clamps all stored values into the safe ranges.
    pub fn set_unsafe_mode(&mut self, enabled: bool, confirmed: bool) -> Result<(), SafetyError> {
        if enabled && !confirmed {
            let err = SafetyError::ConfirmationRequired;
            log::warn!(target: "safety", "{err}");
            self.publish(&EnvelopeEvent::Warning {
                message: err.to_string(),
            });
            return Err(err);
        }
        self.unsafe_mode = enabled;
        self.unsafe_confirmed = confirmed;
        if !enabled {
            self.revalidate_all_params();
        }
        log::info!(target: "safety", "unsafe mode {}", if enabled { "on" } else { "off" });
        self.publish(&EnvelopeEvent::UnsafeModeChanged { enabled, confirmed });
        Ok(())
    }

    /// Preview unmutes the envelope; leaving preview mutes it again.
    pub fn set_preview_mode(&mut self, enabled: bool) {
        self.preview_mode = enabled;
        self.muted = !enabled;
        self.publish(&EnvelopeEvent::PreviewModeChanged {
            enabled,
            muted: self.muted,
        });
    }

    pub fn is_muted(&self) -> bool {
        self.muted && !self.preview_mode
    }

    // ---- notes ----

    /// Clamp a note's pitch into the active note range and its normalized
    /// velocity into the active volume range.
    pub fn validate_note(&mut self, midi: u8, velocity: u8) -> NoteCheck {
        let notes = self.param_range(Param::NoteRange);
        let volume = self.param_range(Param::Volume);
        let mut check = NoteCheck {
            midi,
            velocity,
            intercepted: false,
            muted: self.is_muted(),
        };

        let pitch = midi as f64;
        if pitch < notes.min || pitch > notes.max {
            check.midi = pitch.clamp(notes.min, notes.max).round() as u8;
            check.intercepted = true;
        }

        let level = velocity as f64 / 127.0;
        if level < volume.min || level > volume.max {
            check.velocity = (level.clamp(volume.min, volume.max) * 127.0).round() as u8;
            check.intercepted = true;
        }

        if check.intercepted {
            self.audit.record_note_interception();
        }
        check
    }

    // ---- listeners ----

    pub fn subscribe(&mut self, listener: impl FnMut(&EnvelopeEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether a listener was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn publish(&mut self, event: &EnvelopeEvent) {
        for (id, listener) in &mut self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!(target: "safety", "listener {id:?} panicked; continuing");
            }
        }
    }

    // ---- inspection ----

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn status(&self) -> EnvelopeStatus {
        EnvelopeStatus {
            unsafe_mode: self.unsafe_mode,
            unsafe_confirmed: self.unsafe_confirmed,
            preview_mode: self.preview_mode,
            muted: self.muted,
            params: self.values.clone(),
        }
    }
}
