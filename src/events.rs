//! Page events
//!
//! Every user interaction the client reacts to, as a value.

use crate::autosave::AutosaveOutcome;
use crate::model::GroupId;
use crate::rows::RowAdded;
use crate::select::SelectOutcome;
use serde::{Deserialize, Serialize};

/// A user interaction on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    /// A watched field of `group` lost focus
    FieldBlurred {
        /// Group holding the field
        group: GroupId,
        /// Raw name of the field that lost focus
        field: String,
        /// Id of the element receiving focus
        #[serde(default)]
        related_target: Option<String>,
    },
    /// An upstream select of `group` changed
    UpstreamSelectionChanged {
        /// Group holding the control
        group: GroupId,
        /// Raw name of the changed control
        control: String,
    },
    /// The add-row control of a repeatable section was activated
    AddRowRequested {
        /// Prefix of the section
        section: String,
    },
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A blur was handled
    Autosave(AutosaveOutcome),
    /// One outcome per cascade watching the control, in registration order
    Selects(Vec<SelectOutcome>),
    /// A row was appended
    RowAdded(RowAdded),
}
