//! Field group autosave
//!
//! On blur, a group with real content is posted to its record's endpoint
//! and the server's per-field verdict is shown inline. A group without
//! content just has its validation state cleared.

use crate::config::ClientConfig;
use crate::model::{FieldGroup, GroupId, NoticeSource, Page};
use crate::payload::SubmissionPayload;
use crate::protocol::ValidationResult;
use crate::sequence::{RequestKey, RequestSequencer, Ticket};
use crate::transport::FormTransport;
use crate::{ClientError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// Result of handling one blur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// Focus moved onto the enabled submit control
    Suppressed,
    /// No content; validation state cleared, nothing sent
    Cleared,
    /// Server accepted the group
    Saved,
    /// Server rejected the group; logical names now marked invalid
    Rejected {
        /// Logical names of the rejected fields
        invalid: Vec<String>,
    },
    /// A later request for the group was issued; response dropped
    Stale,
}

/// Per-group autosave handler
pub struct FieldGroupAutosaver {
    page: Arc<RwLock<Page>>,
    config: Arc<ClientConfig>,
    transport: Arc<dyn FormTransport>,
    sequencer: Arc<RequestSequencer>,
}

impl FieldGroupAutosaver {
    /// Autosaver writing into `page`
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

    /// Handle a blur inside `group`; `related_target` is the id of the
    /// element receiving focus, if any.
    pub async fn on_blur(
        &self,
        group: GroupId,
        related_target: Option<&str>,
    ) -> Result<AutosaveOutcome> {
        let (snapshot, path, token) = {
            let page = self.page.read();

            if self.config.suppress_blur_onto_submit
                && related_target == Some(page.submit.id.as_str())
                && !page.submit.disabled
            {
                tracing::debug!("{}: blur onto enabled submit control, not saving", group);
                return Ok(AutosaveOutcome::Suppressed);
            }

            let snapshot = page
                .group(group)
                .cloned()
                .ok_or(ClientError::UnknownGroup(group))?;
            (snapshot, page.path.clone(), page.anti_forgery_token.clone())
        };

        if !self.has_content(&snapshot) {
            // supersedes any save still in flight for this group
            self.sequencer.issue(RequestKey::Autosave(group));
            let mut page = self.page.write();
            if let Some(g) = page.group_mut(group) {
                g.fields.iter_mut().for_each(|f| f.clear_validation());
            }
            page.refresh_submit();
            tracing::debug!("{}: no content, cleared validation", group);
            return Ok(AutosaveOutcome::Cleared);
        }

        let record_id = snapshot.value_of(&self.config.record_id_field);
        if record_id.is_empty() {
            return Err(ClientError::MissingRecordId {
                group,
                field: self.config.record_id_field.clone(),
            });
        }

        let url = self.endpoint(&path, record_id)?;
        let payload =
            SubmissionPayload::from_group(&snapshot, &self.config.anti_forgery_field, &token);
        let ticket = self.sequencer.issue(RequestKey::Autosave(group));

        tracing::info!("{}: saving record {} (request {})", group, record_id, ticket.seq());
        tracing::debug!("{}: payload {}", group, payload.encode());

        match self.transport.post_form(&url, &payload).await {
            Ok(result) => Ok(self.apply(group, &ticket, &result)),
            Err(e) => {
                if self.sequencer.is_current(&ticket) {
                    tracing::warn!("{}: autosave failed: {}", group, e);
                    self.page.write().raise_notice(
                        group,
                        NoticeSource::Autosave,
                        format!("Could not save answer: {}", e),
                    );
                } else {
                    tracing::debug!("{}: stale autosave failed: {}", group, e);
                }
                Err(e)
            }
        }
    }

    /// A field other than the identifying ones holds a value
    pub fn has_content(&self, group: &FieldGroup) -> bool {
        group
            .fields
            .iter()
            .any(|f| !self.config.is_identifying(f.logical_name()) && f.has_content())
    }

    /// `<base><page path><record id>/`
    pub fn endpoint(&self, path: &str, record_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)?;
        let path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        url.set_path(&format!("{}{}/", path, record_id));
        Ok(url)
    }

    fn apply(
        &self,
        group: GroupId,
        ticket: &Ticket,
        result: &ValidationResult,
    ) -> AutosaveOutcome {
        if !self.sequencer.is_current(ticket) {
            tracing::warn!(
                "{}: dropping stale autosave response (request {})",
                group,
                ticket.seq()
            );
            return AutosaveOutcome::Stale;
        }

        let mut page = self.page.write();
        page.clear_notices(group, &NoticeSource::Autosave);

        let Some(g) = page.group_mut(group) else {
            // group removed while the request was in flight
            return AutosaveOutcome::Stale;
        };

        if result.success {
            g.fields.iter_mut().for_each(|f| f.mark_valid());
            page.refresh_submit();
            tracing::debug!("{}: saved", group);
            return AutosaveOutcome::Saved;
        }

        let mut invalid = Vec::new();
        for field in g.fields.iter_mut() {
            field.clear_validation();
            match result.error_for(field.logical_name()) {
                Some(message) => {
                    let message = message.to_string();
                    let name = field.logical_name().to_string();
                    field.mark_invalid(message);
                    if !invalid.contains(&name) {
                        invalid.push(name);
                    }
                }
                None => field.mark_valid(),
            }
        }
        page.submit.disabled = true;
        tracing::debug!("{}: rejected, invalid fields {:?}", group, invalid);

        AutosaveOutcome::Rejected { invalid }
    }
}
