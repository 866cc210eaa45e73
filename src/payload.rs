//! Autosave submission payload

use crate::model::{FieldGroup, FieldKind, FieldValue};
use serde::Serialize;

/// Value posted under one logical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PayloadValue {
    /// One `name=value` pair
    Single(String),
    /// One pair per value, possibly none
    List(Vec<String>),
}

/// Ordered logical-name → value mapping of one field group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    entries: Vec<(String, PayloadValue)>,
}

impl SubmissionPayload {
    /// Serialize a group snapshot.
    ///
    /// Text, select and hidden fields contribute their value under their
    /// logical name; empty single values are left out. Checkboxes sharing a
    /// logical name contribute the list of checked values, placed where the
    /// first of them appears. The token always comes first.
    pub fn from_group(group: &FieldGroup, token_field: &str, token: &str) -> Self {
        let mut payload = Self::default();
        payload.set(token_field, PayloadValue::Single(token.to_string()));

        for field in &group.fields {
            let name = field.logical_name();
            match &field.kind {
                FieldKind::Checkbox { checked } => {
                    if payload.get(name).is_none() {
                        payload.set(name, PayloadValue::List(Vec::new()));
                    }
                    if *checked && !field.value.is_empty() {
                        payload.push_to_list(name, field.value.as_str());
                    }
                }
                FieldKind::Text | FieldKind::Hidden | FieldKind::Select { .. } => {
                    match &field.value {
                        FieldValue::Single(v) if v.is_empty() => {}
                        FieldValue::Single(v) => {
                            payload.set(name, PayloadValue::Single(v.clone()))
                        }
                        FieldValue::Multiple(vs) => payload.set(
                            name,
                            PayloadValue::List(
                                vs.iter().filter(|v| !v.is_empty()).cloned().collect(),
                            ),
                        ),
                    }
                }
            }
        }

        payload
    }

    /// Value posted under `name`
    pub fn get(&self, name: &str) -> Option<&PayloadValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Insert or replace, keeping the first position
    pub fn set(&mut self, name: &str, value: PayloadValue) {
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    fn push_to_list(&mut self, name: &str, value: &str) {
        let entry = self.entries.iter_mut().find(|(k, _)| k == name);
        if let Some((_, PayloadValue::List(values))) = entry {
            values.push(value.to_string());
        }
    }

    /// Names in posting order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing would be posted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `application/x-www-form-urlencoded` body; lists become repeated keys.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            match value {
                PayloadValue::Single(v) => {
                    serializer.append_pair(name, v);
                }
                PayloadValue::List(values) => {
                    for v in values {
                        serializer.append_pair(name, v);
                    }
                }
            }
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, GroupId};

    fn single(v: &str) -> PayloadValue {
        PayloadValue::Single(v.into())
    }

    #[test]
    fn test_answer_payload() {
        let group = FieldGroup::new(
            GroupId(0),
            vec![
                Field::hidden("form-0-question", "5"),
                Field::hidden("form-0-authority", ""),
                Field::text("form-0-value", "yes"),
            ],
        );
        let payload = SubmissionPayload::from_group(&group, "csrfmiddlewaretoken", "T");

        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("csrfmiddlewaretoken"), Some(&single("T")));
        assert_eq!(payload.get("question"), Some(&single("5")));
        assert_eq!(payload.get("value"), Some(&single("yes")));
        assert_eq!(payload.get("authority"), None);
        assert_eq!(payload.encode(), "csrfmiddlewaretoken=T&question=5&value=yes");
    }

    #[test]
    fn test_checkbox_group_collected() {
        let group = FieldGroup::new(
            GroupId(0),
            vec![
                Field::hidden("form-0-question", "9"),
                Field::checkbox("form-0-multi_option", "1", true),
                Field::checkbox("form-0-multi_option", "2", false),
                Field::checkbox("form-0-multi_option", "3", true),
                Field::text("form-0-evidence", "see page 4"),
            ],
        );
        let payload = SubmissionPayload::from_group(&group, "csrfmiddlewaretoken", "T");

        assert_eq!(
            payload.get("multi_option"),
            Some(&PayloadValue::List(vec!["1".into(), "3".into()]))
        );
        let names: Vec<_> = payload.names().collect();
        assert_eq!(names, ["csrfmiddlewaretoken", "question", "multi_option", "evidence"]);
        assert_eq!(
            payload.encode(),
            "csrfmiddlewaretoken=T&question=9&multi_option=1&multi_option=3&evidence=see+page+4"
        );
    }

    #[test]
    fn test_unchecked_group_is_empty_list() {
        let group = FieldGroup::new(
            GroupId(0),
            vec![Field::checkbox("form-0-multi_option", "1", false)],
        );
        let payload = SubmissionPayload::from_group(&group, "csrfmiddlewaretoken", "T");
        assert_eq!(payload.get("multi_option"), Some(&PayloadValue::List(vec![])));
        assert_eq!(payload.encode(), "csrfmiddlewaretoken=T");
    }

    #[test]
    fn test_escaping() {
        let group = FieldGroup::new(GroupId(0), vec![Field::text("form-0-notes", "a&b=c")]);
        let payload = SubmissionPayload::from_group(&group, "csrfmiddlewaretoken", "T");
        assert_eq!(payload.encode(), "csrfmiddlewaretoken=T&notes=a%26b%3Dc");
    }
}
