//! OAI-PMH harvesting client.
//!
//! Requests used:
//!   ListRecords: ?verb=ListRecords&metadataPrefix=oai_dc[&set=…]
//!   paging:      ?verb=ListRecords&resumptionToken=…

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, instrument, warn};

use memoria_common::{HttpClient, MemoriaError, RepositoryConfig, Result};

use super::RecordSource;
use crate::models::RawRecord;

/// One ListRecords response.
#[derive(Debug, Default, PartialEq)]
pub struct OaiPage {
    pub records: Vec<RawRecord>,
    pub resumption_token: Option<String>,
}

pub struct OaiClient {
    client: HttpClient,
    base_url: String,
    metadata_prefix: String,
    set: Option<String>,
}

impl OaiClient {
    pub fn new(client: HttpClient, config: &RepositoryConfig) -> Self {
        Self {
            client,
            base_url: config.url.clone(),
            metadata_prefix: config.metadata_prefix.clone(),
            set: config.set.clone(),
        }
    }

    fn params(&self, token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![("verb", "ListRecords".to_string())];
        match token {
            Some(token) => params.push(("resumptionToken", token.to_string())),
            None => {
                params.push(("metadataPrefix", self.metadata_prefix.clone()));
                if let Some(set) = &self.set {
                    params.push(("set", set.clone()));
                }
            }
        }
        params
    }

    /// Fetch and parse a single ListRecords page.
    #[instrument(skip(self))]
    pub async fn list_records_page(&self, token: Option<&str>) -> Result<OaiPage> {
        let xml = self
            .client
            .get(&self.base_url)?
            .query(&self.params(token))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_list_records(&xml)
    }

    /// Harvest every record, following resumption tokens.
    #[instrument(skip(self))]
    pub async fn harvest(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.list_records_page(token.as_deref()).await?;
            debug!(n = page.records.len(), token = ?page.resumption_token, "OAI page received");
            records.extend(page.records);

            if let Some(max) = limit {
                if records.len() >= max {
                    records.truncate(max);
                    break;
                }
            }

            match page.resumption_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    warn!(token = %next, "Repository repeated its resumption token, stopping harvest");
                    break;
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(n = records.len(), "OAI harvest complete");
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for OaiClient {
    async fn records(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        self.harvest(limit).await
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parse an OAI-PMH ListRecords response.
/// `noRecordsMatch` is an empty page; any other OAI error is an `Xml` error.
pub fn parse_list_records(xml: &str) -> Result<OaiPage> {
    let mut page = OaiPage::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine for XML parsing
    let mut current: Option<RawRecord> = None;
    let mut in_header = false;
    let mut in_metadata = false;
    let mut metadata_depth = 0usize;
    let mut field: Option<String> = None;
    let mut error_code: Option<String> = None;
    let mut error_message = String::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                if in_metadata {
                    metadata_depth += 1;
                    if metadata_depth == 2 {
                        field = Some(name);
                        text.clear();
                    }
                    continue;
                }
                match name.as_str() {
                    "record" => current = Some(RawRecord::default()),
                    "header" => {
                        in_header = true;
                        if let Some(ref mut record) = current {
                            let deleted = attribute(e, b"status").as_deref() == Some("deleted");
                            record.header.deleted = Some(deleted);
                        }
                    }
                    "identifier" | "datestamp" if in_header => {
                        field = Some(name);
                        text.clear();
                    }
                    "metadata" => {
                        in_metadata = true;
                        metadata_depth = 0;
                    }
                    "resumptionToken" => text.clear(),
                    "error" => {
                        error_code = Some(attribute(e, b"code").unwrap_or_else(|| "unknown".to_string()));
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if !in_metadata && local_name(e) == "error" {
                    error_code = Some(attribute(e, b"code").unwrap_or_else(|| "unknown".to_string()));
                }
            }
            Ok(Event::Text(ref e)) => {
                let chunk = e
                    .unescape()
                    .map_err(|err| MemoriaError::Xml(err.to_string()))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_metadata {
                    if metadata_depth == 0 {
                        in_metadata = false;
                    } else {
                        if metadata_depth == 2 {
                            if let (Some(key), Some(record)) = (field.take(), current.as_mut()) {
                                record.metadata.entry(key).or_default().push(text.trim().to_string());
                            }
                        }
                        metadata_depth -= 1;
                    }
                    continue;
                }
                match name.as_str() {
                    "identifier" | "datestamp" if in_header => {
                        if let (Some(key), Some(record)) = (field.take(), current.as_mut()) {
                            let value = Some(text.trim().to_string());
                            if key == "identifier" {
                                record.header.identifier = value;
                            } else {
                                record.header.datestamp = value;
                            }
                        }
                    }
                    "header" => in_header = false,
                    "record" => {
                        if let Some(record) = current.take() {
                            page.records.push(record);
                        }
                    }
                    "error" => error_message = text.trim().to_string(),
                    "resumptionToken" => {
                        let token = text.trim();
                        if !token.is_empty() {
                            page.resumption_token = Some(token.to_string());
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MemoriaError::Xml(e.to_string())),
            _ => {}
        }
    }

    match error_code.as_deref() {
        None | Some("noRecordsMatch") => Ok(page),
        Some(code) => Err(MemoriaError::Xml(format!("OAI-PMH error {}: {}", code, error_message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-01-01T00:00:00Z</responseDate>
  <ListRecords>
    <record>
      <header>
        <identifier>oai:biblos.example.org:0b1f4c6e-2a3d-4e5f-8a9b-1c2d3e4f5a6b</identifier>
        <datestamp>2020-05-01T12:00:00Z</datestamp>
        <setSpec>com_theses</setSpec>
      </header>
      <metadata>
        <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"
                   xmlns:dc="http://purl.org/dc/elements/1.1/">
          <dc:title>Les marchés &amp; la finance</dc:title>
          <dc:creator>Tremblay, Marie</dc:creator>
          <dc:creator>Roy, Jean</dc:creator>
          <dc:date>1998</dc:date>
          <dc:identifier>https://biblos.example.org/pdf/1998/a1.pdf</dc:identifier>
        </oai_dc:dc>
      </metadata>
    </record>
    <record>
      <header status="deleted">
        <identifier>oai:biblos.example.org:11111111-2222-3333-4444-555555555555</identifier>
        <datestamp>2021-01-01T00:00:00Z</datestamp>
      </header>
    </record>
    <resumptionToken completeListSize="3" cursor="0">page-2</resumptionToken>
  </ListRecords>
</OAI-PMH>"#;

    #[test]
    fn test_parse_records_and_token() {
        let page = parse_list_records(PAGE).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.resumption_token.as_deref(), Some("page-2"));

        let first = &page.records[0];
        assert_eq!(
            first.header.identifier.as_deref(),
            Some("oai:biblos.example.org:0b1f4c6e-2a3d-4e5f-8a9b-1c2d3e4f5a6b")
        );
        assert_eq!(first.header.deleted, Some(false));
        assert_eq!(first.metadata["title"], vec!["Les marchés & la finance"]);
        assert_eq!(first.metadata["creator"], vec!["Tremblay, Marie", "Roy, Jean"]);
        assert!(!first.metadata.contains_key("publisher"));

        let second = &page.records[1];
        assert_eq!(second.header.deleted, Some(true));
        assert!(second.metadata.is_empty());
    }

    #[test]
    fn test_empty_token_ends_paging() {
        let xml = r#"<OAI-PMH><ListRecords><resumptionToken completeListSize="3" cursor="2"/></ListRecords></OAI-PMH>"#;
        let page = parse_list_records(xml).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.resumption_token, None);
    }

    #[test]
    fn test_no_records_match_is_empty_page() {
        let xml = r#"<OAI-PMH><error code="noRecordsMatch">No matching records</error></OAI-PMH>"#;
        assert_eq!(parse_list_records(xml).unwrap(), OaiPage::default());
    }

    #[test]
    fn test_other_oai_errors_fail() {
        let xml = r#"<OAI-PMH><error code="badArgument">Illegal set</error></OAI-PMH>"#;
        let err = parse_list_records(xml).unwrap_err();
        assert!(err.to_string().contains("badArgument"));
        assert!(err.to_string().contains("Illegal set"));
    }

    #[test]
    fn test_params_switch_to_token() {
        let client = OaiClient::new(
            HttpClient::new(&Default::default()).unwrap(),
            &RepositoryConfig {
                url: "https://repo.example.org/oai".to_string(),
                set: Some("theses".to_string()),
                metadata_prefix: "oai_dc".to_string(),
            },
        );
        let first = client.params(None);
        assert!(first.contains(&("set", "theses".to_string())));
        let next = client.params(Some("abc"));
        assert_eq!(next, vec![("verb", "ListRecords".to_string()), ("resumptionToken", "abc".to_string())]);
    }
}
