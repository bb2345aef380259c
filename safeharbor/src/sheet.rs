//! Contract sheet download and the desired agreement state built from it.

use csv::{ReaderBuilder, Trim};
use eyre::WrapErr;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::SafeHarborError,
    state::{Account, ChainGroups},
};

const ACTIVE: &str = "ACTIVE";
const REQUIRED_COLUMNS: [&str; 3] = ["Chain", "Address", "Status"];

/// One row of the contract sheet. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "Chain")]
    pub chain: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "IsFactory", alias = "isFactory", default)]
    pub is_factory: Option<String>,
}

impl SheetRow {
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE
    }

    pub fn is_factory(&self) -> bool {
        self.is_factory.as_deref() == Some("TRUE")
    }
}

/// Reads the sheet from an `http(s)` URL or from a local file.
pub async fn load(client: &reqwest::Client, source: &str) -> eyre::Result<String> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        client
            .get(source)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .wrap_err_with(|| format!("failed to download CSV from {source}"))?
            .text()
            .await?
    } else {
        std::fs::read_to_string(source)
            .wrap_err_with(|| format!("failed to read CSV file {source}"))?
    };

    if text.to_ascii_lowercase().contains("<!doctype html") {
        return Err(SafeHarborError::HtmlInsteadOfCsv(source.to_string()).into());
    }

    debug!(bytes = text.len(), source, "loaded contract sheet");
    Ok(text)
}

/// Parses the sheet, trimming fields and skipping blank lines.
pub fn parse_rows(text: &str) -> eyre::Result<Vec<SheetRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(SafeHarborError::MissingColumn(column).into());
        }
    }

    reader
        .deserialize::<SheetRow>()
        .enumerate()
        .map(|(line, row)| row.wrap_err_with(|| format!("malformed CSV record {}", line + 1)))
        .collect()
}

/// Groups active rows by chain, keeping sheet order.
pub fn desired_state(rows: &[SheetRow]) -> ChainGroups {
    rows.iter()
        .filter(|row| row.is_active())
        .map(|row| {
            let account = Account::new(row.address.as_str(), row.is_factory());
            (row.chain.as_str(), account)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::state::FACTORY_SCOPE;

    const SHEET: &str = "\
Chain,Address,Status,IsFactory,Notes
ETHEREUM,0x1,ACTIVE,FALSE,vat

BASE,0x2,ACTIVE,TRUE,factory
ETHEREUM,0x3,DEPRECATED,FALSE,
ETHEREUM , 0x4 , ACTIVE , TRUE ,padded
ARBITRUM,0x5,active,FALSE,lowercase status
";

    #[test]
    fn parses_and_trims_rows() {
        let rows = parse_rows(SHEET).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[3],
            SheetRow {
                chain: "ETHEREUM".to_string(),
                address: "0x4".to_string(),
                status: "ACTIVE".to_string(),
                is_factory: Some("TRUE".to_string()),
            }
        );
    }

    #[test]
    fn only_active_rows_are_desired() {
        let state = desired_state(&parse_rows(SHEET).unwrap());

        assert_eq!(state.names().collect::<Vec<_>>(), ["ETHEREUM", "BASE"]);
        assert_eq!(
            state.get("ETHEREUM").unwrap(),
            [Account::new("0x1", false), Account::new("0x4", true)]
        );
        assert_eq!(state.get("BASE").unwrap()[0].scope(), FACTORY_SCOPE);
        assert!(state.get("ARBITRUM").is_none());
    }

    #[test]
    fn factory_flag_is_case_sensitive() {
        let sheet = "Chain,Address,Status,isFactory\nBASE,0x1,ACTIVE,true\nBASE,0x2,ACTIVE,TRUE\n";
        let state = desired_state(&parse_rows(sheet).unwrap());
        assert_eq!(
            state.get("BASE").unwrap(),
            [Account::new("0x1", false), Account::new("0x2", true)]
        );
    }

    #[test]
    fn missing_factory_column_means_plain_contracts() {
        let rows = parse_rows("Chain,Address,Status\nBASE,0x1,ACTIVE\n").unwrap();
        assert!(!rows[0].is_factory());
    }

    #[test]
    fn rejects_sheet_without_status() {
        let err = parse_rows("Chain,Address\nBASE,0x1\n").unwrap_err();
        assert_eq!(
            err.downcast_ref::<SafeHarborError>(),
            Some(&SafeHarborError::MissingColumn("Status"))
        );
    }

    fn sheet_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_sheet_from_file() {
        let file = sheet_file(SHEET);
        let source = file.path().to_str().unwrap();

        let text = load(&reqwest::Client::new(), source).await.unwrap();

        assert_eq!(text, SHEET);
    }

    #[tokio::test]
    async fn rejects_html_page() {
        let file = sheet_file("<!DOCTYPE html>\n<html><body>Sign in</body></html>\n");
        let source = file.path().to_str().unwrap();

        let err = load(&reqwest::Client::new(), source).await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<SafeHarborError>(),
            Some(&SafeHarborError::HtmlInsteadOfCsv(source.to_string()))
        );
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = load(&reqwest::Client::new(), "/nonexistent/contracts.csv")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("/nonexistent/contracts.csv"));
    }
}
