use std::{
    fmt::{Debug, Display},
    sync::{Arc, Mutex},
};

use ahash::HashSet;
use tracing::{event, Level};

/// The kinds of warnings a [Queue](crate::Queue) can raise. None of them affect the outcome of
/// the call that raised them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WarningKind {
    /// A job was submitted with the removed `expireIn` option.
    DeprecatedExpireIn,
    /// The archive interval is below one minute, so periodic maintenance is disabled.
    MaintenanceDisabled,
    /// The local clock and the database clock disagree by more than a minute.
    ClockSkew,
}

impl WarningKind {
    /// A stable code for this warning.
    pub fn code(&self) -> &'static str {
        match self {
            WarningKind::DeprecatedExpireIn => "slotq-w01",
            WarningKind::MaintenanceDisabled => "slotq-w02",
            WarningKind::ClockSkew => "slotq-w03",
        }
    }

    /// A human-readable description of the warning.
    pub fn message(&self) -> &'static str {
        match self {
            WarningKind::DeprecatedExpireIn => {
                "'expireIn' option detected. This option has been removed. Use expireInSeconds, expireInMinutes or expireInHours."
            }
            WarningKind::MaintenanceDisabled => {
                "Archive interval is set less than 60s. Maintenance processing is disabled."
            }
            WarningKind::ClockSkew => {
                "Clock skew detected between this instance and the database. Singleton windows are computed from the adjusted time."
            }
        }
    }
}

/// A warning delivered to a [Diagnostics] listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    /// What kind of warning this is.
    pub kind: WarningKind,
    /// Extra information about this occurrence, if any.
    pub detail: Option<String>,
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.kind.message())?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

type Listener = Arc<dyn Fn(&Warning) + Send + Sync>;

/// Sink for queue warnings. Each [WarningKind] is delivered once for the life of this object,
/// unless the emitter forces it.
///
/// Every delivered warning is logged through `tracing` and passed to the listener, if one is
/// set.
#[derive(Default)]
pub struct Diagnostics {
    emitted: Mutex<HashSet<WarningKind>>,
    listener: Option<Listener>,
}

impl Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("emitted", &self.emitted)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Diagnostics {
    /// Create a sink that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that also calls `listener` for each delivered warning.
    pub fn with_listener(listener: impl Fn(&Warning) + Send + Sync + 'static) -> Self {
        Diagnostics {
            emitted: Mutex::new(HashSet::default()),
            listener: Some(Arc::new(listener)),
        }
    }

    /// Emit a warning. Returns true if it was delivered, and false if a warning of the same
    /// kind was already delivered and `force` is not set.
    pub fn emit(&self, kind: WarningKind, detail: Option<String>, force: bool) -> bool {
        let first = self
            .emitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);

        if !first && !force {
            return false;
        }

        let warning = Warning { kind, detail };
        event!(Level::WARN, code = kind.code(), %warning);
        if let Some(listener) = &self.listener {
            listener(&warning);
        }

        true
    }

    /// Returns true if a warning of this kind has been delivered.
    pub fn has_emitted(&self, kind: WarningKind) -> bool {
        self.emitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }
}
