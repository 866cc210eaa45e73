//! Crowdsourcer Form Client
//!
//! Client-side behavior of the crowdsourced marking site's forms, without a
//! browser: answer autosave with inline validation, dependent selects and
//! repeatable assignment rows.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            FORM CLIENT                               │
//! │                                                                      │
//! │   PageEvent ──► dispatch ─┬──────────────┬──────────────┐            │
//! │                           │              │              │            │
//! │                 ┌─────────▼────┐ ┌───────▼───────┐ ┌────▼─────────┐  │
//! │                 │  FieldGroup  │ │   Dependent   │ │     Row      │  │
//! │                 │  Autosaver   │ │ SelectLoader  │ │  Replicator  │  │
//! │                 └──────┬───────┘ └───────┬───────┘ └────┬─────────┘  │
//! │                        │                 │              │            │
//! │  ┌─────────────────────▼─────────────────▼──────────────▼─────────┐  │
//! │  │                Page model (Arc<RwLock<Page>>)                  │  │
//! │  └────────────────────────────────────────────────────────────────┘  │
//! │                                                                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐                │
//! │  │  Transport   │  │  Sequencer   │  │    Config    │                │
//! │  │  (reqwest)   │  │ (stale drop) │  │              │                │
//! │  └──────────────┘  └──────────────┘  └──────────────┘                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod address;
pub mod autosave;
pub mod config;
pub mod events;
pub mod model;
pub mod payload;
pub mod protocol;
pub mod rows;
pub mod select;
pub mod sequence;
pub mod transport;

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

pub use address::{AddressError, RowAddress};
pub use autosave::{AutosaveOutcome, FieldGroupAutosaver};
pub use config::{ClientConfig, EmptyResultsPolicy};
pub use events::{EventOutcome, PageEvent};
pub use model::{Field, FieldGroup, GroupId, Page};
pub use rows::{RowAdded, RowReplicator};
pub use select::{CascadeSpec, DependentSelectLoader, SelectOutcome};
pub use transport::{FormTransport, HttpTransport};

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request never got a response
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx response
    #[error("server returned {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },
    /// Body or file was not the expected JSON
    #[error("decode error: {0}")]
    Decode(String),
    /// Unusable configuration
    #[error("config error: {0}")]
    Config(String),
    /// Base URL or endpoint did not parse
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// Reading or writing a file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Field name is not a usable row address
    #[error(transparent)]
    Address(#[from] AddressError),
    /// Event names a group the page does not have
    #[error("no such group: {0}")]
    UnknownGroup(GroupId),
    /// Event names a field outside its group
    #[error("{group} has no field `{field}`")]
    UnknownField {
        /// Group searched
        group: GroupId,
        /// Name not found
        field: String,
    },
    /// No repeatable section with this prefix
    #[error("no repeatable section `{0}`")]
    UnknownSection(String),
    /// Section has no row to copy
    #[error("repeatable section `{0}` has no template row")]
    EmptySection(String),
    /// Group has content but nothing to address the save to
    #[error("{group} has content but no `{field}` to save against")]
    MissingRecordId {
        /// Group being saved
        group: GroupId,
        /// Configured record id field
        field: String,
    },
    /// The next row index is already taken
    #[error("section `{prefix}` already has a row {index}")]
    RowCollision {
        /// Section prefix
        prefix: String,
        /// Index in use
        index: usize,
    },
    /// `MAX_NUM_FORMS` reached
    #[error("section `{prefix}` is limited to {max} rows")]
    RowLimitReached {
        /// Section prefix
        prefix: String,
        /// Row limit
        max: usize,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Routes page events to the three components
pub struct FormClient {
    /// Answer autosave
    pub autosaver: Arc<FieldGroupAutosaver>,
    /// Cascading selects
    pub select_loader: Arc<DependentSelectLoader>,
    /// Repeatable rows
    pub row_replicator: Arc<RowReplicator>,
    /// Configuration
    pub config: Arc<ClientConfig>,
    page: Arc<RwLock<Page>>,
    cascades: Vec<CascadeSpec>,
}

impl FormClient {
    /// Create a client talking HTTP to `config.base_url`
    pub fn new(config: ClientConfig, page: Page) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, page, transport))
    }

    /// Create a client over any transport.
    ///
    /// A page that does not name its submit control gets
    /// `config.submit_control_id`.
    pub fn with_transport(
        config: ClientConfig,
        mut page: Page,
        transport: Arc<dyn FormTransport>,
    ) -> Self {
        if page.submit.id.is_empty() {
            page.submit.id = config.submit_control_id.clone();
        }
        let config = Arc::new(config);
        let page = Arc::new(RwLock::new(page));
        let sequencer = Arc::new(sequence::RequestSequencer::new());

        Self {
            autosaver: Arc::new(FieldGroupAutosaver::new(
                page.clone(),
                config.clone(),
                transport.clone(),
                sequencer.clone(),
            )),
            select_loader: Arc::new(DependentSelectLoader::new(
                page.clone(),
                config.clone(),
                transport,
                sequencer,
            )),
            row_replicator: Arc::new(RowReplicator::new(
                page.clone(),
                config.record_id_field.clone(),
            )),
            config,
            page,
            cascades: CascadeSpec::defaults(),
        }
    }

    /// Replace the registered cascades
    pub fn with_cascades(mut self, cascades: Vec<CascadeSpec>) -> Self {
        self.cascades = cascades;
        self
    }

    /// Snapshot of the current page
    pub fn page(&self) -> Page {
        self.page.read().clone()
    }

    /// Handle one event to completion
    pub async fn dispatch(&self, event: PageEvent) -> Result<EventOutcome> {
        tracing::debug!("dispatching {:?}", event);
        match event {
            PageEvent::FieldBlurred {
                group,
                field,
                related_target,
            } => {
                self.check_field(group, &field)?;
                let outcome = self
                    .autosaver
                    .on_blur(group, related_target.as_deref())
                    .await?;
                Ok(EventOutcome::Autosave(outcome))
            }
            PageEvent::UpstreamSelectionChanged { group, control } => {
                self.check_field(group, &control)?;
                let logical = address::logical_name(&control);
                let mut outcomes = Vec::new();
                for spec in self.cascades.iter().filter(|s| s.watches(logical)) {
                    outcomes.push(self.select_loader.on_change(group, spec).await?);
                }
                if outcomes.is_empty() {
                    tracing::debug!("{}: no cascade watches `{}`", group, logical);
                }
                Ok(EventOutcome::Selects(outcomes))
            }
            PageEvent::AddRowRequested { section } => {
                let added = self.row_replicator.add_row(&section)?;
                Ok(EventOutcome::RowAdded(added))
            }
        }
    }

    /// Handle an event in the background; failures are logged
    pub fn fire(self: &Arc<Self>, event: PageEvent) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.dispatch(event).await {
                tracing::warn!("event failed: {}", e);
            }
        })
    }

    fn check_field(&self, group: GroupId, field: &str) -> Result<()> {
        let page = self.page.read();
        let g = page.group(group).ok_or(ClientError::UnknownGroup(group))?;
        if g.fields.iter().any(|f| f.name == field) {
            Ok(())
        } else {
            Err(ClientError::UnknownField {
                group,
                field: field.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, OptionList, SelectOption, Validity};
    use crate::protocol::{OptionsResponse, ValidationResult};
    use crate::transport::mock::{MockTransport, Recorded, Reply};

    fn answer_page() -> Page {
        let mut page = Page::new(
            "/authorities/Aberdeen/section/Buildings/questions/",
            "T",
            "save_all_answers",
        );
        page.push_group(vec![
            Field::hidden("form-0-question", "5"),
            Field::hidden("form-0-authority", ""),
            Field::text("form-0-value", "yes"),
        ]);
        page
    }

    fn client(page: Page, transport: Arc<MockTransport>) -> FormClient {
        FormClient::with_transport(ClientConfig::default(), page, transport)
    }

    #[tokio::test]
    async fn test_blur_end_to_end() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(Reply::Validation(Ok(ValidationResult::ok())));
        let client = client(answer_page(), transport.clone());

        let outcome = client
            .dispatch(PageEvent::FieldBlurred {
                group: GroupId(0),
                field: "form-0-value".into(),
                related_target: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Autosave(AutosaveOutcome::Saved));

        match &transport.requests()[0] {
            Recorded::Post { body, .. } => {
                assert_eq!(body, "csrfmiddlewaretoken=T&question=5&value=yes")
            }
            other => panic!("unexpected request {:?}", other),
        }
        let page = client.page();
        assert!(page.groups[0].fields.iter().all(|f| f.validity == Validity::Valid));
        assert!(page.groups[0].fields.iter().all(|f| f.error.is_none()));
    }

    #[tokio::test]
    async fn test_change_routes_to_watching_cascade() {
        let mut page = Page::new("/volunteers/3/assign/", "T", "save_all_answers");
        page.push_group(vec![
            Field::hidden("form-0-id", ""),
            Field::select("form-0-section", OptionList::default(), "4"),
            Field::select("form-0-rt", OptionList::default(), "1"),
            Field::hidden("form-0-session", "2"),
            Field::select("form-0-authority", OptionList::blank_only(), ""),
        ]);
        let transport = Arc::new(MockTransport::new());
        transport.reply(Reply::Options(Ok(serde_json::from_value::<OptionsResponse>(
            serde_json::json!({"results": [{"id": 3, "name": "Bath"}]}),
        )
        .unwrap())));
        let client = client(page, transport.clone());

        let outcome = client
            .dispatch(PageEvent::UpstreamSelectionChanged {
                group: GroupId(0),
                control: "form-0-rt".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Selects(vec![SelectOutcome::Replaced { options: 2 }])
        );

        let page = client.page();
        let authority = page.groups[0].field("authority").unwrap();
        assert_eq!(
            authority.kind,
            FieldKind::Select {
                options: OptionList::with_blank(vec![SelectOption::new("3", "Bath")]),
                multiple: false
            }
        );
    }

    #[tokio::test]
    async fn test_unwatched_control_does_nothing() {
        let transport = Arc::new(MockTransport::new());
        let client = client(answer_page(), transport.clone());

        let outcome = client
            .dispatch(PageEvent::UpstreamSelectionChanged {
                group: GroupId(0),
                control: "form-0-value".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Selects(vec![]));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_add_row_event() {
        let mut page = Page::new("/volunteers/3/assign/", "T", "save_all_answers");
        let row = page.push_group(vec![
            Field::hidden("form-0-id", "8"),
            Field::text("form-0-notes", "x"),
        ]);
        page.push_section("form", vec![row], None);
        let client = client(page, Arc::new(MockTransport::new()));

        let outcome = client
            .dispatch(PageEvent::AddRowRequested {
                section: "form".into(),
            })
            .await
            .unwrap();
        match outcome {
            EventOutcome::RowAdded(added) => assert_eq!(added.index, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blur_on_foreign_field_is_rejected() {
        let client = client(answer_page(), Arc::new(MockTransport::new()));
        let err = client
            .dispatch(PageEvent::FieldBlurred {
                group: GroupId(0),
                field: "form-1-value".into(),
                related_target: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnknownField { .. }));
    }

    #[test]
    fn test_demo_scripts_parse() {
        for (page, events) in [
            (
                include_str!("../demos/answer_page.json"),
                include_str!("../demos/answer_events.json"),
            ),
            (
                include_str!("../demos/assignment_page.json"),
                include_str!("../demos/assignment_events.json"),
            ),
        ] {
            let page: Page = serde_json::from_str(page).unwrap();
            let events: Vec<PageEvent> = serde_json::from_str(events).unwrap();
            assert!(!page.groups.is_empty());
            assert_eq!(events.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_fire_runs_in_background() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(Reply::Validation(Ok(ValidationResult::failed([(
            "value",
            "Too short",
        )]))));
        let client = Arc::new(client(answer_page(), transport.clone()));

        client
            .fire(PageEvent::FieldBlurred {
                group: GroupId(0),
                field: "form-0-value".into(),
                related_target: None,
            })
            .await
            .unwrap();

        let page = client.page();
        assert!(page.submit.disabled);
        assert_eq!(page.groups[0].fields[2].error.as_deref(), Some("Too short"));
    }

    #[tokio::test]
    async fn test_unnamed_submit_control_uses_configured_id() {
        let mut page = answer_page();
        page.submit = Default::default();
        let transport = Arc::new(MockTransport::new());
        let client = client(page, transport.clone());
        assert_eq!(client.page().submit.id, "save_all_answers");

        let outcome = client
            .dispatch(PageEvent::FieldBlurred {
                group: GroupId(0),
                field: "form-0-value".into(),
                related_target: Some("save_all_answers".into()),
            })
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Autosave(AutosaveOutcome::Suppressed));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_named_submit_control_is_kept() {
        let config = ClientConfig {
            submit_control_id: "finish".into(),
            ..ClientConfig::default()
        };
        let named = FormClient::with_transport(
            config.clone(),
            answer_page(),
            Arc::new(MockTransport::new()),
        );
        assert_eq!(named.page().submit.id, "save_all_answers");

        let mut page = answer_page();
        page.submit.id.clear();
        let unnamed = FormClient::with_transport(config, page, Arc::new(MockTransport::new()));
        assert_eq!(unnamed.page().submit.id, "finish");
    }
}
