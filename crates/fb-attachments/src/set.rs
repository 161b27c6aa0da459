//! Attachments of a record type
//!
//! An [`AttachmentSet`] runs every phase hook on each member in registration
//! order, around the host's own validate / persist / remove steps.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use fb_core::{Persistable, RecordHost};
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::{AttachmentError, AttachmentResult};
use crate::image_attachment::ImageAttachment;
use crate::lifecycle::{Attachable, Operation};

/// Per-member operations of one pass over a set
#[derive(Debug, Default)]
pub struct SetOperation {
    ops: HashMap<String, Operation>,
}

impl SetOperation {
    /// Operation of the attachment bound to `attribute`
    pub fn get(&self, attribute: &str) -> Option<&Operation> {
        self.ops.get(attribute)
    }

    fn entry(&mut self, attribute: &str) -> &mut Operation {
        self.ops.entry(attribute.to_string()).or_default()
    }
}

/// Named collection of the attachments declared on a record type
#[derive(Clone, Default)]
pub struct AttachmentSet {
    members: IndexMap<String, Arc<dyn Attachable>>,
}

impl std::fmt::Debug for AttachmentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentSet")
            .field("attributes", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attachment under its attribute
    pub fn with(mut self, attachment: impl Attachable + 'static) -> Self {
        self.insert(Arc::new(attachment));
        self
    }

    pub fn insert(&mut self, attachment: Arc<dyn Attachable>) {
        self.members
            .insert(attachment.attribute().to_string(), attachment);
    }

    pub fn get(&self, attribute: &str) -> Option<&Arc<dyn Attachable>> {
        self.members.get(attribute)
    }

    /// The image attachment bound to `attribute`
    pub fn image(&self, attribute: &str) -> Option<&ImageAttachment> {
        self.get(attribute).and_then(|a| a.as_image())
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fresh operation for a save or import pass
    pub fn begin(&self) -> SetOperation {
        SetOperation {
            ops: self
                .members
                .keys()
                .map(|attribute| (attribute.clone(), Operation::new()))
                .collect(),
        }
    }

    fn member(&self, attribute: &str) -> AttachmentResult<&Arc<dyn Attachable>> {
        self.get(attribute).ok_or_else(|| {
            AttachmentError::config(format!("no attachment bound to '{}'", attribute))
        })
    }

    pub fn before_validate(&self, record: &mut dyn RecordHost, ops: &mut SetOperation) {
        for (attribute, member) in &self.members {
            member.before_validate(record, ops.entry(attribute));
        }
    }

    pub fn after_validate(&self, record: &mut dyn RecordHost, ops: &mut SetOperation) {
        for (attribute, member) in &self.members {
            member.after_validate(record, ops.entry(attribute));
        }
    }

    pub async fn before_save(
        &self,
        record: &mut dyn RecordHost,
        ops: &mut SetOperation,
    ) -> AttachmentResult<()> {
        for (attribute, member) in &self.members {
            member.before_save(record, ops.entry(attribute)).await?;
        }
        Ok(())
    }

    pub async fn after_save(
        &self,
        record: &mut dyn RecordHost,
        ops: &mut SetOperation,
    ) -> AttachmentResult<()> {
        for (attribute, member) in &self.members {
            member.after_save(record, ops.entry(attribute)).await?;
        }
        Ok(())
    }

    pub async fn after_delete(&self, record: &mut dyn RecordHost) -> AttachmentResult<()> {
        for member in self.members.values() {
            member.after_delete(record).await?;
        }
        Ok(())
    }

    /// Validate, persist and commit `record`.
    ///
    /// Returns `Ok(false)` when the record is invalid; nothing is written
    /// then.
    #[instrument(skip_all, fields(form = record.form_name()))]
    pub async fn save<R: Persistable>(
        &self,
        record: &mut R,
        ops: &mut SetOperation,
    ) -> AttachmentResult<bool> {
        self.before_validate(record, ops);
        let valid = record.validate();
        self.after_validate(record, ops);
        if !valid {
            debug!("Record invalid, nothing saved");
            return Ok(false);
        }

        self.before_save(record, ops).await?;
        record.persist()?;
        self.after_save(record, ops).await?;
        Ok(true)
    }

    /// Remove `record`, then its files
    #[instrument(skip_all, fields(form = record.form_name()))]
    pub async fn delete<R: Persistable>(&self, record: &mut R) -> AttachmentResult<()> {
        record.remove()?;
        self.after_delete(record).await
    }

    pub async fn upload_from_url(
        &self,
        record: &mut dyn RecordHost,
        ops: &mut SetOperation,
        attribute: &str,
        url: &str,
    ) -> AttachmentResult<bool> {
        self.member(attribute)?
            .upload_from_url(record, ops.entry(attribute), url)
            .await
    }

    pub async fn upload_from_file(
        &self,
        record: &mut dyn RecordHost,
        ops: &mut SetOperation,
        attribute: &str,
        path: &Path,
    ) -> AttachmentResult<bool> {
        self.member(attribute)?
            .upload_from_file(record, ops.entry(attribute), path)
            .await
    }
}
