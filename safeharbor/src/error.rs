/// Failures that abort payload generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SafeHarborError {
    /// The chain is missing from the chain table, or has no asset recovery address.
    #[error("no chain id or asset recovery address defined for chain: {0}")]
    UnmappedChain(String),
    /// The sheet endpoint answered with a web page instead of CSV.
    ///
    /// Google Sheets only serves CSV from the export endpoint:
    /// `https://docs.google.com/spreadsheets/d/{SPREADSHEET_ID}/export?format=csv&gid={SHEET_ID}`
    #[error("received HTML instead of CSV data from {0}, check the URL uses the sheet export format")]
    HtmlInsteadOfCsv(String),
    /// The sheet lacks one of the required columns.
    #[error("CSV is missing the `{0}` column")]
    MissingColumn(&'static str),
}
