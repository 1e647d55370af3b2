//! Seam to the external content index
//!
//! Published notes are linked to records in a separate index service. The
//! note service keeps that linkage consistent when notes move or disappear.

use libmarkidea_core::MarkideaError;

/// Operations consumed from the content index
pub trait ContentIndex: Send + Sync {
    /// Id of the record linked to a note, if any
    fn find_by_notebook_and_title(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
    ) -> Result<Option<i64>, MarkideaError>;

    /// Propagate a notebook rename
    fn rename_notebook(&self, username: &str, old_name: &str, new_name: &str) -> Result<(), MarkideaError>;

    /// Drop the record linked to a deleted note
    fn delete_record(&self, username: &str, notebook: &str, title: &str) -> Result<(), MarkideaError>;

    /// Relink a record after its note was moved or renamed
    fn move_record(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        target_notebook: &str,
        target_title: &str,
    ) -> Result<(), MarkideaError>;
}

/// Index for deployments without one: nothing is ever linked
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopContentIndex;

impl ContentIndex for NoopContentIndex {
    fn find_by_notebook_and_title(&self, _: &str, _: &str, _: &str) -> Result<Option<i64>, MarkideaError> {
        Ok(None)
    }

    fn rename_notebook(&self, _: &str, _: &str, _: &str) -> Result<(), MarkideaError> {
        Ok(())
    }

    fn delete_record(&self, _: &str, _: &str, _: &str) -> Result<(), MarkideaError> {
        Ok(())
    }

    fn move_record(&self, _: &str, _: &str, _: &str, _: &str, _: &str) -> Result<(), MarkideaError> {
        Ok(())
    }
}
