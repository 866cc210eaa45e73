//! Dependent select loading
//!
//! A change to an upstream control queries an options endpoint and
//! rebuilds the downstream select from the results.

use crate::config::{ClientConfig, EmptyResultsPolicy};
use crate::model::{
    FieldKind, FieldValue, GroupId, NoticeSource, OptionList, Page, SelectOption,
};
use crate::protocol::OptionDescriptor;
use crate::sequence::{RequestKey, RequestSequencer};
use crate::transport::FormTransport;
use crate::{ClientError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Maps a field of the group onto a query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    /// Query string key
    pub param: String,
    /// Logical name of the field supplying the value
    pub field: String,
}

impl QueryParam {
    /// `param` taken from the field named `field`
    pub fn new(param: &str, field: &str) -> Self {
        Self {
            param: param.into(),
            field: field.into(),
        }
    }
}

/// One upstream → downstream relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSpec {
    /// Endpoint path, e.g. `/stats/available_questions`
    pub endpoint: String,
    /// Required upstream values; any blank one skips the query
    pub upstream: Vec<QueryParam>,
    /// Reporting period selector, sent as-is
    pub session: Option<QueryParam>,
    /// Sent only when non-empty
    pub record_id: Option<QueryParam>,
    /// Logical name of the select to rebuild
    pub downstream: String,
    /// Descriptor key holding the option label
    pub label_key: String,
}

impl CascadeSpec {
    /// Statistics: section → questions
    pub fn stats_questions() -> Self {
        Self {
            endpoint: "/stats/available_questions".into(),
            upstream: vec![QueryParam::new("s", "question__section")],
            session: Some(QueryParam::new("ms", "session")),
            record_id: None,
            downstream: "question".into(),
            label_key: "number_and_part".into(),
        }
    }

    /// Statistics: question → options
    pub fn stats_options() -> Self {
        Self {
            endpoint: "/stats/available_options".into(),
            upstream: vec![QueryParam::new("q", "question")],
            session: Some(QueryParam::new("ms", "session")),
            record_id: None,
            downstream: "option".into(),
            label_key: "description".into(),
        }
    }

    /// Volunteer assignment: role + section → unassigned authorities
    pub fn volunteer_authorities() -> Self {
        Self {
            endpoint: "/volunteers/available_authorities/".into(),
            upstream: vec![QueryParam::new("rt", "rt"), QueryParam::new("s", "section")],
            session: Some(QueryParam::new("ms", "session")),
            record_id: Some(QueryParam::new("id", "id")),
            downstream: "authority".into(),
            label_key: "name".into(),
        }
    }

    /// The three cascades the site uses
    pub fn defaults() -> Vec<Self> {
        vec![Self::stats_questions(), Self::stats_options(), Self::volunteer_authorities()]
    }

    /// Whether a change to `logical` should trigger this cascade
    pub fn watches(&self, logical: &str) -> bool {
        self.upstream.iter().any(|p| p.field == logical)
    }
}

/// Result of handling one upstream change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// An upstream value was blank; nothing queried
    Skipped,
    /// Downstream rebuilt with this many options, blank included
    Replaced {
        /// Option count after the rebuild
        options: usize,
    },
    /// No results and the list was reset to the blank option
    Cleared,
    /// No results and the previous options were kept
    Unchanged,
    /// A later query for the same select was issued
    Stale,
}

/// Upstream → downstream select loader
pub struct DependentSelectLoader {
    page: Arc<RwLock<Page>>,
    config: Arc<ClientConfig>,
    transport: Arc<dyn FormTransport>,
    sequencer: Arc<RequestSequencer>,
}

impl DependentSelectLoader {
    /// Loader writing into `page`
    pub fn new(
        page: Arc<RwLock<Page>>,
        config: Arc<ClientConfig>,
        transport: Arc<dyn FormTransport>,
        sequencer: Arc<RequestSequencer>,
    ) -> Self {
        Self {
            page,
            config,
            transport,
            sequencer,
        }
    }

    /// Query `spec`'s endpoint for `group` and rebuild its downstream select
    pub async fn on_change(&self, group: GroupId, spec: &CascadeSpec) -> Result<SelectOutcome> {
        let key = RequestKey::Options {
            group,
            downstream: spec.downstream.clone(),
        };
        let source = NoticeSource::Options {
            downstream: spec.downstream.clone(),
        };

        let query = {
            let page = self.page.read();
            let snapshot = page.group(group).ok_or(ClientError::UnknownGroup(group))?;
            if snapshot.field(&spec.downstream).is_none() {
                return Err(ClientError::UnknownField {
                    group,
                    field: spec.downstream.clone(),
                });
            }

            let mut query = Vec::new();
            for upstream in &spec.upstream {
                let value = snapshot.value_of(&upstream.field);
                if value.is_empty() {
                    // an earlier query must not land on a list the user has moved past
                    self.sequencer.issue(key);
                    tracing::debug!(
                        "{}: `{}` is blank, not loading {}",
                        group,
                        upstream.field,
                        spec.downstream
                    );
                    return Ok(SelectOutcome::Skipped);
                }
                query.push((upstream.param.clone(), value.to_string()));
            }
            if let Some(session) = &spec.session {
                let value = snapshot.value_of(&session.field);
                query.push((session.param.clone(), value.to_string()));
            }
            if let Some(record) = &spec.record_id {
                let value = snapshot.value_of(&record.field);
                if !value.is_empty() {
                    query.push((record.param.clone(), value.to_string()));
                }
            }
            query
        };

        let url = self.endpoint(spec, &query)?;
        let ticket = self.sequencer.issue(key);
        tracing::info!(
            "{}: loading {} from {} (request {})",
            group,
            spec.downstream,
            url,
            ticket.seq()
        );

        let response = match self.transport.get_options(&url).await {
            Ok(response) => response,
            Err(e) => {
                if self.sequencer.is_current(&ticket) {
                    tracing::warn!("{}: loading {} failed: {}", group, spec.downstream, e);
                    self.page.write().raise_notice(
                        group,
                        source,
                        format!("Could not load {} choices: {}", spec.downstream, e),
                    );
                }
                return Err(e);
            }
        };

        if !self.sequencer.is_current(&ticket) {
            tracing::warn!(
                "{}: dropping stale {} options (request {})",
                group,
                spec.downstream,
                ticket.seq()
            );
            return Ok(SelectOutcome::Stale);
        }

        let descriptors = response.descriptors(&spec.label_key);
        let mut page = self.page.write();
        page.clear_notices(group, &source);

        if descriptors.is_empty() {
            return Ok(match self.config.empty_results {
                EmptyResultsPolicy::KeepExisting => SelectOutcome::Unchanged,
                EmptyResultsPolicy::Clear => {
                    self.replace_options(&mut page, group, spec, &[]);
                    SelectOutcome::Cleared
                }
            });
        }

        let options = self.replace_options(&mut page, group, spec, &descriptors);
        tracing::debug!("{}: {} now has {} options", group, spec.downstream, options);
        Ok(SelectOutcome::Replaced { options })
    }

    fn endpoint(&self, spec: &CascadeSpec, query: &[(String, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?.join(&spec.endpoint)?;
        url.query_pairs_mut().extend_pairs(query.iter());
        Ok(url)
    }

    /// Blank option then one per descriptor; selection reset to blank
    fn replace_options(
        &self,
        page: &mut Page,
        group: GroupId,
        spec: &CascadeSpec,
        descriptors: &[OptionDescriptor],
    ) -> usize {
        let Some(field) = page
            .group_mut(group)
            .and_then(|g| g.field_mut(&spec.downstream))
        else {
            return 0;
        };

        let blank = SelectOption::new("", self.config.blank_label.clone());
        let list: OptionList = std::iter::once(blank)
            .chain(
                descriptors
                    .iter()
                    .map(|d| SelectOption::new(d.id.clone(), d.label.clone())),
            )
            .collect::<Vec<_>>()
            .into();
        let count = list.len();

        let multiple = match &field.kind {
            FieldKind::Select { multiple, .. } => *multiple,
            _ => false,
        };
        field.kind = FieldKind::Select { options: list, multiple };
        field.value = if multiple {
            FieldValue::Multiple(Vec::new())
        } else {
            FieldValue::Single(String::new())
        };
        count
    }
}
