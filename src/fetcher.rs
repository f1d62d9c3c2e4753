use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ExtractionError;
use crate::types::RawRow;

/// Anything that can produce the raw holdings table.
///
/// Implementations own their timeouts: a call must either return rows or
/// fail with [`ExtractionError`] within a bounded time.
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    async fn fetch_raw_rows(&self) -> Result<Vec<RawRow>, ExtractionError>;
}

/// Fetches the fund's holdings page over HTTP and reads the table out of the HTML.
pub struct HtmlTableSource {
    client: reqwest::Client,
    url: String,
    table_body_class: String,
}

impl HtmlTableSource {
    pub fn new(
        url: String,
        table_body_class: String,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("holdings-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url,
            table_body_class,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ExtractionError> {
        Self::new(
            cfg.source_url.clone(),
            cfg.table_body_class.clone(),
            cfg.extract_timeout,
        )
    }
}

#[async_trait]
impl HoldingsSource for HtmlTableSource {
    async fn fetch_raw_rows(&self) -> Result<Vec<RawRow>, ExtractionError> {
        info!("Fetching holdings data from: {}", self.url);

        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractionError::Status(status));
        }
        let body = resp.text().await?;
        debug!(bytes = body.len(), "Holdings page downloaded");

        let rows = parse_holdings_table(&body, &self.table_body_class)?;
        info!(rows = rows.len(), "Extracted {} holdings rows", rows.len());
        Ok(rows)
    }
}

/// Read `tbody.<table_body_class> > tr` rows out of an HTML document.
///
/// Company comes from the first cell's `<span>`, weight from the last cell,
/// row id from the `<tr id>`. Missing pieces become `""` / `"0%"`.
pub fn parse_holdings_table(
    html: &str,
    table_body_class: &str,
) -> Result<Vec<RawRow>, ExtractionError> {
    let document = Html::parse_document(html);

    let tbody = selector(&format!("tbody.{table_body_class}"))?;
    let tr = selector("tr")?;
    let company_cell = selector("td:first-child span")?;
    let percent_cell = selector("td:last-child")?;

    let Some(body) = document.select(&tbody).next() else {
        return Err(ExtractionError::TableNotFound(table_body_class.to_string()));
    };

    let rows: Vec<RawRow> = body
        .select(&tr)
        .enumerate()
        .map(|(ordinal, row)| {
            let company = first_text(&row, &company_cell).unwrap_or_default();
            let percent = first_text(&row, &percent_cell).unwrap_or_else(|| "0%".to_string());
            let row_id = row.value().id().unwrap_or("").to_string();
            RawRow::new(company, percent, row_id, ordinal)
        })
        .collect();

    if rows.is_empty() {
        return Err(ExtractionError::NoRows);
    }
    Ok(rows)
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Selector(format!("{css}: {e}")))
}

fn first_text(row: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    row.select(sel)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
}
