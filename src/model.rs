//! Page model
//!
//! The in-memory stand-in for the rendered page: groups of fields
//! ("fieldsets"), repeatable sections, the final submit control and any
//! notices raised against a group. Handlers read snapshots of a
//! [`FieldGroup`] and write results back through [`Page`].

use crate::address::logical_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the leading "no selection" option
pub const BLANK_LABEL: &str = "---------";

/// Stable identity of a field group within a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Validation marker shown on a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// No marker
    #[default]
    Unset,
    /// Accepted by the server
    Valid,
    /// Rejected by the server
    Invalid,
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Text shown to the user
    pub label: String,
}

impl SelectOption {
    /// Option with the given value and label
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The "no selection" option
    pub fn blank() -> Self {
        Self::new("", BLANK_LABEL)
    }
}

/// Options of a select, blank option first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionList(Vec<SelectOption>);

impl OptionList {
    /// Blank option followed by `options` in the given order
    pub fn with_blank(options: impl IntoIterator<Item = SelectOption>) -> Self {
        let mut list = vec![SelectOption::blank()];
        list.extend(options);
        Self(list)
    }

    /// Just the blank option
    pub fn blank_only() -> Self {
        Self(vec![SelectOption::blank()])
    }

    /// Number of options, blank included
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no options at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Options in display order
    pub fn iter(&self) -> impl Iterator<Item = &SelectOption> {
        self.0.iter()
    }

    /// Whether some option submits `value`
    pub fn contains_value(&self, value: &str) -> bool {
        self.0.iter().any(|o| o.value == value)
    }
}

impl From<Vec<SelectOption>> for OptionList {
    fn from(options: Vec<SelectOption>) -> Self {
        Self(options)
    }
}

/// Current value of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text, hidden, single select or checkbox value
    Single(String),
    /// Multiple select
    Multiple(Vec<String>),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Single(String::new())
    }
}

impl FieldValue {
    /// No value, or only blank ones
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(v) => v.is_empty(),
            FieldValue::Multiple(v) => v.iter().all(|s| s.is_empty()),
        }
    }

    /// Single value, or the first of several
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Single(v) => v,
            FieldValue::Multiple(v) => v.first().map(String::as_str).unwrap_or(""),
        }
    }

    fn cleared(&self) -> Self {
        match self {
            FieldValue::Single(_) => FieldValue::Single(String::new()),
            FieldValue::Multiple(_) => FieldValue::Multiple(Vec::new()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Single(v.to_string())
    }
}

/// Field kinds the client knows how to handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text control
    Text,
    /// Hidden input
    Hidden,
    /// Select list
    Select {
        /// Available options
        #[serde(default)]
        options: OptionList,
        /// Whether several options may be selected
        #[serde(default)]
        multiple: bool,
    },
    /// One checkbox; checkboxes sharing a logical name form a group
    Checkbox {
        /// Whether the box is ticked
        #[serde(default)]
        checked: bool,
    },
}

/// A single input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Raw name, positional prefix included
    pub name: String,
    /// What sort of input this is
    pub kind: FieldKind,
    /// Current value
    #[serde(default)]
    pub value: FieldValue,
    /// Valid/invalid marker
    #[serde(default)]
    pub validity: Validity,
    /// Error text shown under the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Field {
    /// Field without any validation state
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            validity: Validity::Unset,
            error: None,
        }
    }

    /// Text control
    pub fn text(name: impl Into<String>, value: &str) -> Self {
        Self::new(name, FieldKind::Text, value)
    }

    /// Hidden input
    pub fn hidden(name: impl Into<String>, value: &str) -> Self {
        Self::new(name, FieldKind::Hidden, value)
    }

    /// Single select
    pub fn select(name: impl Into<String>, options: OptionList, value: &str) -> Self {
        Self::new(
            name,
            FieldKind::Select {
                options,
                multiple: false,
            },
            value,
        )
    }

    /// Checkbox submitting `value` when ticked
    pub fn checkbox(name: impl Into<String>, value: &str, checked: bool) -> Self {
        Self::new(name, FieldKind::Checkbox { checked }, value)
    }

    /// Name with the row prefix stripped
    pub fn logical_name(&self) -> &str {
        logical_name(&self.name)
    }

    /// Whether this is a checkbox
    pub fn is_checkbox(&self) -> bool {
        matches!(self.kind, FieldKind::Checkbox { .. })
    }

    /// Whether the field carries user content
    pub fn has_content(&self) -> bool {
        match self.kind {
            FieldKind::Checkbox { checked } => checked && !self.value.is_empty(),
            _ => !self.value.is_empty(),
        }
    }

    /// Whether an error is shown
    pub fn has_error(&self) -> bool {
        self.validity == Validity::Invalid || self.error.is_some()
    }

    /// Drop any valid/invalid marker and error text
    pub fn clear_validation(&mut self) {
        self.validity = Validity::Unset;
        self.error = None;
    }

    /// Valid marker, no error text
    pub fn mark_valid(&mut self) {
        self.validity = Validity::Valid;
        self.error = None;
    }

    /// Invalid marker with `message` shown
    pub fn mark_invalid(&mut self, message: impl Into<String>) {
        self.validity = Validity::Invalid;
        self.error = Some(message.into());
    }

    /// Reset what a user would have entered; option lists stay.
    pub fn clear_input(&mut self) {
        match &mut self.kind {
            FieldKind::Checkbox { checked } => *checked = false,
            FieldKind::Hidden => {}
            FieldKind::Text | FieldKind::Select { .. } => self.value = self.value.cleared(),
        }
    }
}

/// Related fields submitted together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    /// Identity within the page
    pub id: GroupId,
    /// Fields in page order
    pub fields: Vec<Field>,
}

impl FieldGroup {
    /// Group of `fields`
    pub fn new(id: GroupId, fields: Vec<Field>) -> Self {
        Self { id, fields }
    }

    /// First field with the given logical name
    pub fn field(&self, logical: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.logical_name() == logical)
    }

    /// Mutable [`FieldGroup::field`]
    pub fn field_mut(&mut self, logical: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.logical_name() == logical)
    }

    /// Value of the first field with the given logical name, empty if absent
    pub fn value_of(&self, logical: &str) -> &str {
        self.field(logical).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Whether any field shows an error
    pub fn has_errors(&self) -> bool {
        self.fields.iter().any(Field::has_error)
    }
}

/// Counters of a repeatable section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementForm {
    /// `<prefix>-TOTAL_FORMS`
    pub total_forms: usize,
    /// `<prefix>-INITIAL_FORMS`, rows that came from the server
    #[serde(default)]
    pub initial_forms: usize,
    /// `<prefix>-MIN_NUM_FORMS`
    #[serde(default)]
    pub min_num_forms: usize,
    /// `<prefix>-MAX_NUM_FORMS`, unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_forms: Option<usize>,
}

/// A section whose rows can be cloned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatableSection {
    /// Row name prefix, e.g. `form`
    pub prefix: String,
    /// Row groups in page order
    pub rows: Vec<GroupId>,
    /// Row counters
    pub management: ManagementForm,
}

/// The page-level final submit control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitControl {
    /// Element id; empty until the client assigns the configured one
    #[serde(default)]
    pub id: String,
    /// Whether the control is disabled
    #[serde(default)]
    pub disabled: bool,
}

/// Which component raised a notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum NoticeSource {
    /// Answer autosave
    Autosave,
    /// Loading the options of a downstream select
    Options {
        /// Logical name of the select
        downstream: String,
    },
}

/// Non-blocking inline notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Group the notice is shown on
    pub group: GroupId,
    /// Component that raised it
    #[serde(flatten)]
    pub source: NoticeSource,
    /// Text shown
    pub message: String,
    /// When it was raised
    pub raised_at: DateTime<Utc>,
}

/// Whole page state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Path of the current location, e.g.
    /// `/authorities/Aberdeen/section/Buildings/questions/`
    pub path: String,
    /// Anti-forgery token of the enclosing form
    #[serde(default)]
    pub anti_forgery_token: String,
    /// Final submit control
    #[serde(default)]
    pub submit: SubmitControl,
    /// Field groups in page order
    #[serde(default)]
    pub groups: Vec<FieldGroup>,
    /// Repeatable sections
    #[serde(default)]
    pub sections: Vec<RepeatableSection>,
    /// Notices currently shown
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl Page {
    /// Empty page at `path`
    pub fn new(
        path: impl Into<String>,
        anti_forgery_token: impl Into<String>,
        submit_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            anti_forgery_token: anti_forgery_token.into(),
            submit: SubmitControl {
                id: submit_id.into(),
                disabled: false,
            },
            groups: Vec::new(),
            sections: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Append a group built from `fields`, returning its id
    pub fn push_group(&mut self, fields: Vec<Field>) -> GroupId {
        let id = self.next_group_id();
        self.groups.push(FieldGroup::new(id, fields));
        id
    }

    /// Add a repeatable section whose rows are `rows`, already on the page
    pub fn push_section(
        &mut self,
        prefix: impl Into<String>,
        rows: Vec<GroupId>,
        max_num_forms: Option<usize>,
    ) {
        let total = rows.len();
        self.sections.push(RepeatableSection {
            prefix: prefix.into(),
            rows,
            management: ManagementForm {
                total_forms: total,
                initial_forms: total,
                min_num_forms: 0,
                max_num_forms,
            },
        });
    }

    /// Id one past the highest in use
    pub fn next_group_id(&self) -> GroupId {
        GroupId(self.groups.iter().map(|g| g.id.0 + 1).max().unwrap_or(0))
    }

    /// Group by id
    pub fn group(&self, id: GroupId) -> Option<&FieldGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Mutable [`Page::group`]
    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut FieldGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    /// Repeatable section by prefix
    pub fn section(&self, prefix: &str) -> Option<&RepeatableSection> {
        self.sections.iter().find(|s| s.prefix == prefix)
    }

    /// Any field anywhere on the page currently showing an error
    pub fn has_errors(&self) -> bool {
        self.groups.iter().any(FieldGroup::has_errors)
    }

    /// Enable the submit control exactly when no error is shown
    pub fn refresh_submit(&mut self) {
        self.submit.disabled = self.has_errors();
    }

    /// Show a notice on `group`
    pub fn raise_notice(
        &mut self,
        group: GroupId,
        source: NoticeSource,
        message: impl Into<String>,
    ) {
        self.notices.push(Notice {
            group,
            source,
            message: message.into(),
            raised_at: Utc::now(),
        });
    }

    /// Drop the notices `source` raised on `group`; others stay
    pub fn clear_notices(&mut self, group: GroupId, source: &NoticeSource) {
        self.notices.retain(|n| n.group != group || &n.source != source);
    }

    /// Notices shown on `group`
    pub fn notices_for(&self, group: GroupId) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.group == group)
    }
}
