//! Google Sheets `values.append` into a named sheet.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::google::GoogleTokenManager;
use super::{check_status, http_client, GatewayError, SheetGateway, SheetRow};

/// Default Sheets API origin.
pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";

/// Appends rows to `sheet_name` in one spreadsheet.
pub struct SheetsGateway {
    client: reqwest::Client,
    tokens: Arc<GoogleTokenManager>,
    spreadsheet_id: String,
    sheet_name: String,
    api_base: String,
}

impl SheetsGateway {
    /// Create a gateway against [`DEFAULT_SHEETS_API`].
    pub fn new(
        tokens: Arc<GoogleTokenManager>,
        spreadsheet_id: String,
        sheet_name: String,
    ) -> Self {
        Self::with_api_base(tokens, spreadsheet_id, sheet_name, DEFAULT_SHEETS_API)
    }

    /// Create a gateway against a custom API origin.
    pub fn with_api_base(
        tokens: Arc<GoogleTokenManager>,
        spreadsheet_id: String,
        sheet_name: String,
        api_base: &str,
    ) -> Self {
        Self {
            client: http_client(),
            tokens,
            spreadsheet_id,
            sheet_name,
            api_base: api_base.to_owned(),
        }
    }

    /// The append endpoint for the configured sheet.
    ///
    /// Cells are written `RAW`, so submitted text is never evaluated as a
    /// formula.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Parse` when the API origin is not a valid base URL.
    pub fn append_url(&self) -> Result<Url, GatewayError> {
        let range = format!("{}!A:E:append", self.sheet_name);
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| GatewayError::Parse(format!("invalid Sheets API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Parse("Sheets API base cannot hold a path".to_owned()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }
}

#[async_trait]
impl SheetGateway for SheetsGateway {
    #[instrument(skip(self, row))]
    async fn append(&self, row: &SheetRow) -> Result<(), GatewayError> {
        let url = self.append_url()?;
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "values": [row.cells()] }))
            .send()
            .await?;
        check_status(response, &[200]).await?;
        debug!(sheet = %self.sheet_name, "row appended");
        Ok(())
    }
}
