//! Repeatable rows

use crate::address::{AddressError, RowAddress};
use crate::model::{FieldGroup, GroupId, Page};
use crate::{ClientError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// A row appended to a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAdded {
    /// Group of the new row
    pub group: GroupId,
    /// Row index in its field names
    pub index: usize,
    /// `TOTAL_FORMS` after the append
    pub total_forms: usize,
}

/// Clones the last row of a repeatable section
pub struct RowReplicator {
    page: Arc<RwLock<Page>>,
    /// Logical name of the per-row record id, blanked in clones
    record_id_field: String,
}

impl RowReplicator {
    /// Replicator over `page`'s sections
    pub fn new(page: Arc<RwLock<Page>>, record_id_field: impl Into<String>) -> Self {
        Self {
            page,
            record_id_field: record_id_field.into(),
        }
    }

    /// Append an empty copy of the section's last row, numbered one past it.
    ///
    /// Every field of the template must be addressed as
    /// `<prefix>-<index>-<name>` for the template's own row; anything else
    /// aborts before the page is touched.
    pub fn add_row(&self, prefix: &str) -> Result<RowAdded> {
        let mut page = self.page.write();

        let section = page
            .section(prefix)
            .ok_or_else(|| ClientError::UnknownSection(prefix.to_string()))?;
        let management = section.management.clone();
        if let Some(max) = management.max_num_forms {
            if management.total_forms >= max {
                return Err(ClientError::RowLimitReached {
                    prefix: prefix.to_string(),
                    max,
                });
            }
        }

        let template_id = *section
            .rows
            .last()
            .ok_or_else(|| ClientError::EmptySection(prefix.to_string()))?;
        let row_ids = section.rows.clone();
        let template = page
            .group(template_id)
            .cloned()
            .ok_or(ClientError::UnknownGroup(template_id))?;

        let index = template_index(&template, prefix)?;
        let next = index
            .checked_add(1)
            .ok_or_else(|| AddressError::IndexOverflow {
                prefix: prefix.to_string(),
                index,
            })?;

        for id in &row_ids {
            let Some(row) = page.group(*id) else { continue };
            if template_index(row, prefix).ok() == Some(next) {
                return Err(ClientError::RowCollision {
                    prefix: prefix.to_string(),
                    index: next,
                });
            }
        }

        let mut clone = FieldGroup::new(
            page.next_group_id(),
            Vec::with_capacity(template.fields.len()),
        );
        for field in &template.fields {
            let address = RowAddress::parse_in(&field.name, prefix, index)?;
            let mut copy = field.clone();
            copy.name = address.with_index(next).to_string();
            copy.clear_validation();
            copy.clear_input();
            if address.name == self.record_id_field {
                copy.value = "".into();
            }
            clone.fields.push(copy);
        }

        let group = clone.id;
        let position = page
            .groups
            .iter()
            .position(|g| g.id == template_id)
            .map(|p| p + 1)
            .unwrap_or(page.groups.len());
        page.groups.insert(position, clone);

        let section = page
            .sections
            .iter_mut()
            .find(|s| s.prefix == prefix)
            .ok_or_else(|| ClientError::UnknownSection(prefix.to_string()))?;
        section.rows.push(group);
        section.management.total_forms += 1;
        let total_forms = section.management.total_forms;

        tracing::info!("{}: added row {} ({} rows)", prefix, next, total_forms);
        Ok(RowAdded {
            group,
            index: next,
            total_forms,
        })
    }
}

/// Row index shared by every field of `row`
fn template_index(row: &FieldGroup, prefix: &str) -> Result<usize> {
    let first = row
        .fields
        .first()
        .ok_or_else(|| ClientError::EmptySection(prefix.to_string()))?;
    let address = RowAddress::parse(&first.name)?;
    for field in &row.fields {
        RowAddress::parse_in(&field.name, prefix, address.index)?;
    }
    Ok(address.index)
}
