use anyhow::Result;

use crate::model::CaseRecord;

/// Destination for normalized records. `upsert` must be idempotent.
pub trait RecordSink {
    fn name(&self) -> &'static str;

    fn upsert(&mut self, record: &CaseRecord) -> Result<()>;

    /// Flush buffered output at the end of a run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;

    /// Keeps every record it is given, in order.
    #[derive(Default)]
    pub struct MemorySink {
        pub records: Vec<CaseRecord>,
        pub fail_on: Option<String>,
    }

    impl RecordSink for MemorySink {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn upsert(&mut self, record: &CaseRecord) -> Result<()> {
            if self.fail_on.as_deref() == Some(record.case_number.as_str()) {
                anyhow::bail!("refusing {}", record.case_number);
            }
            self.records.push(record.clone());
            Ok(())
        }
    }
}
