use anyhow::Result;
use std::path::Path;

use crate::domain::email::EmailRecord;

/// Ordered, positionally indexed table of fetched emails.
///
/// Every call goes to the backing file; nothing is cached in memory.
pub trait EmailCache {
    fn all(&self) -> Result<Vec<EmailRecord>>;

    /// `None` when `index` is past the end.
    fn by_index(&self, index: usize) -> Result<Option<EmailRecord>> {
        Ok(self.all()?.into_iter().nth(index))
    }

    /// Overwrite the whole table.
    fn replace_all(&self, records: &[EmailRecord]) -> Result<()>;

    fn append_and_persist(&self, records: &[EmailRecord]) -> Result<()> {
        let mut rows = self.all()?;
        rows.extend_from_slice(records);
        self.replace_all(&rows)
    }

    fn path(&self) -> &Path;
}
