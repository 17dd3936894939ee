use crate::config::Config;
use crate::error::SheetError;
use crate::pipeline::column_total;
use crate::pipeline::normalize;
use crate::pipeline::summarize;
use crate::pipeline::summary::SummaryError;
use crate::pipeline::summary::SummarySpec;
use crate::pipeline::summary::SummaryTable;
use crate::pipeline::Source;
use crate::table::Table;

/// One interactive session: the configuration and the current working table.
///
/// Each successful ingestion replaces the working table wholesale. Ingestions
/// that yield no data or fail leave it as it was.
#[derive(Clone, Debug, Default)]
pub struct Session {
    config: Config,
    current: Option<Table>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session { config, current: None }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The working table, if one has been ingested.
    pub fn current(&self) -> Option<&Table> {
        self.current.as_ref()
    }

    /// Normalizes `source` and makes the result the working table.
    ///
    /// Returns `Ok(None)` when the input holds nothing to process.
    pub fn ingest(&mut self, source: Source<'_>) -> Result<Option<&Table>, SheetError> {
        match normalize(source, &self.config)? {
            Some(table) => {
                tracing::debug!(rows = table.row_count(), columns = table.column_count(), "replaced working table");
                Ok(Some(&*self.current.insert(table)))
            }
            None => Ok(None),
        }
    }

    /// Summarizes the working table.
    pub fn summarize(&self, spec: &SummarySpec) -> Result<SummaryTable, SheetError> {
        summarize(self.working_table()?, spec, &self.config)
    }

    /// Grand total of one column of the working table.
    pub fn column_total(&self, id: &str) -> Result<f64, SheetError> {
        column_total(self.working_table()?, id, &self.config)
    }

    fn working_table(&self) -> Result<&Table, SummaryError> {
        self.current.as_ref().ok_or(SummaryError::NoWorkingTable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::summary::ColumnSelection;
    use crate::table::Cell;

    #[test]
    fn keeps_table_on_no_data_and_errors() {
        let mut session = Session::default();
        assert!(session.current().is_none());

        session.ingest(Source::Text("a,1\nb,2")).unwrap();
        let before = session.current().cloned();
        assert!(before.is_some());

        assert!(session.ingest(Source::Text("   ")).unwrap().is_none());
        assert_eq!(session.current().cloned(), before);

        assert!(session.ingest(Source::Spreadsheet(b"not a workbook")).is_err());
        assert_eq!(session.current().cloned(), before);
    }

    #[test]
    fn replaces_table_wholesale() {
        let mut session = Session::default();
        session.ingest(Source::Text("a,1\nb,2")).unwrap();
        let table = session.ingest(Source::Text("x\ty\tz")).unwrap().unwrap();
        assert_eq!(table.rows(), [vec![Cell::from("x"), Cell::from("y"), Cell::from("z")]]);
    }

    #[test]
    fn summaries_need_a_table() {
        let session = Session::default();
        let spec = SummarySpec::new(ColumnSelection::new(["Col_0"]), ColumnSelection::new(["Col_1"]));
        let error = session.summarize(&spec).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.to_string(), "No table has been loaded");
        assert!(session.column_total("Col_1").is_err());
    }

    #[test]
    fn summarizes_working_table() {
        let mut session = Session::new(Config::default());
        session.ingest(Source::Text("a,1\nb,2\na,3")).unwrap();
        let spec = SummarySpec::new(ColumnSelection::new(["Col_0"]), ColumnSelection::new(["Col_1"]));
        let summary = session.summarize(&spec).unwrap();
        assert_eq!(
            summary.table().rows(),
            [vec![Cell::from("a"), Cell::Number(4.0)], vec![Cell::from("b"), Cell::Number(2.0)]]
        );
        assert_eq!(session.column_total("Col_1").unwrap(), 6.0);
    }
}
