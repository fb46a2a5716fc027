//! Etherscan v2 multichain API client.
//!
//! Every request, from any clone of the client, passes through one shared
//! [`RequestPacer`] so the API key's rate limit is respected globally.

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use eyre::{Context, Result, eyre};
use primitives::{
    ContractSource, ExplorerTransaction, TxHistoryQuery, pacer::RequestPacer,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::http_retry::retry_op;

/// Per-request timeout of explorer calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Explorer text for an address without history.
const NO_TRANSACTIONS: &str = "no transactions found";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl Envelope {
    fn into_rows(self) -> Result<Vec<Value>> {
        match self.result {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            _ if self.message.to_lowercase().contains(NO_TRANSACTIONS) => Ok(Vec::new()),
            Value::String(text) => {
                Err(eyre!("explorer error (status {}): {}: {}", self.status, self.message, text))
            }
            other => Err(eyre!("unexpected explorer result: {other}")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawSource {
    source_code: String,
    contract_name: String,
    compiler_version: String,
    optimization_used: String,
    #[serde(rename = "ABI")]
    abi: String,
    license_type: String,
    implementation: String,
    proxy: String,
}

impl RawSource {
    /// `None` for unverified contracts.
    fn into_source(self) -> Option<ContractSource> {
        if self.source_code.is_empty() {
            return None;
        }
        Some(ContractSource {
            source_code: self.source_code,
            contract_name: self.contract_name,
            compiler_version: self.compiler_version,
            optimization_used: self.optimization_used == "1",
            abi: self.abi,
            license_type: self.license_type,
            implementation: self.implementation.parse().ok(),
            is_proxy: self.proxy == "1",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTransaction {
    hash: String,
    block_number: String,
    time_stamp: String,
    from: String,
    to: String,
    value: String,
    gas: String,
    gas_used: String,
    gas_price: String,
    input: String,
    is_error: String,
    #[serde(rename = "txreceipt_status")]
    receipt_status: String,
    function_name: String,
    method_id: String,
    logs: Option<Value>,
}

fn number<T: std::str::FromStr + Default>(raw: &str) -> T {
    raw.parse().unwrap_or_default()
}

impl TryFrom<RawTransaction> for ExplorerTransaction {
    type Error = eyre::Report;

    fn try_from(raw: RawTransaction) -> Result<Self> {
        let hash: B256 = raw.hash.parse().wrap_err_with(|| format!("bad tx hash {}", raw.hash))?;
        let from: Address = raw.from.parse().wrap_err_with(|| format!("bad sender {}", raw.from))?;
        Ok(Self {
            hash,
            block_number: number(&raw.block_number),
            timestamp: number(&raw.time_stamp),
            from,
            to: raw.to.parse().ok(),
            value: U256::from_str_radix(&raw.value, 10).unwrap_or_default(),
            gas: number(&raw.gas),
            gas_used: number(&raw.gas_used),
            gas_price: number(&raw.gas_price),
            input: raw.input,
            is_error: raw.is_error == "1",
            // pre-Byzantium rows carry no receipt status
            succeeded: if raw.receipt_status.is_empty() {
                raw.is_error != "1"
            } else {
                raw.receipt_status == "1"
            },
            function_name: raw.function_name,
            method_id: raw.method_id,
            logs: raw
                .logs
                .map(|logs| logs.as_str().map_or_else(|| logs.to_string(), str::to_owned))
                .unwrap_or_default(),
        })
    }
}

/// Etherscan v2 API client.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: Client,
    base_url: Url,
    api_key: String,
    chain_id: u64,
    pacer: RequestPacer,
}

impl ExplorerClient {
    /// Create a new explorer client sharing `pacer` with every other explorer caller.
    pub fn new(base_url: Url, api_key: String, chain_id: u64, pacer: RequestPacer) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("failed to build explorer http client")?;
        if api_key.is_empty() {
            warn!("No explorer API key configured; requests will be heavily throttled");
        }
        Ok(Self { http, base_url, api_key, chain_id, pacer })
    }

    async fn request(&self, params: &[(&str, String)]) -> Result<Vec<Value>> {
        retry_op(|| async {
            self.pacer.wait().await;
            let chain_id = self.chain_id.to_string();
            let resp = self
                .http
                .get(self.base_url.clone())
                .query(&[("chainid", chain_id.as_str())])
                .query(params)
                .query(&[("apikey", self.api_key.as_str())])
                .send()
                .await?
                .error_for_status()?;
            let envelope: Envelope = resp.json().await.wrap_err("invalid explorer payload")?;
            envelope.into_rows()
        })
        .await
    }

    /// Verified source of `address`, `None` when the contract is not verified.
    pub async fn contract_source(&self, address: Address) -> Result<Option<ContractSource>> {
        let rows = self
            .request(&[
                ("module", "contract".to_owned()),
                ("action", "getsourcecode".to_owned()),
                ("address", format!("{address:#x}")),
            ])
            .await
            .wrap_err_with(|| format!("getsourcecode failed for {address}"))?;

        let Some(first) = rows.into_iter().next() else {
            return Ok(None);
        };
        let raw: RawSource = serde_json::from_value(first).wrap_err("malformed source entry")?;
        Ok(raw.into_source())
    }

    /// One page of the transaction history of `address`.
    ///
    /// Entries that fail to decode are dropped with a debug log.
    pub async fn transactions(
        &self,
        address: Address,
        query: TxHistoryQuery,
    ) -> Result<Vec<ExplorerTransaction>> {
        let rows = self
            .request(&[
                ("module", "account".to_owned()),
                ("action", "txlist".to_owned()),
                ("address", format!("{address:#x}")),
                ("startblock", query.start_block.to_string()),
                ("endblock", query.end_block.to_string()),
                ("page", query.page.to_string()),
                ("offset", query.offset.to_string()),
                ("sort", query.sort.as_str().to_owned()),
            ])
            .await
            .wrap_err_with(|| format!("txlist failed for {address}"))?;

        let txs = rows
            .into_iter()
            .filter_map(|row| {
                let decoded = serde_json::from_value::<RawTransaction>(row)
                    .map_err(eyre::Report::from)
                    .and_then(ExplorerTransaction::try_from);
                decoded.map_err(|e| debug!(error = %e, "skipping undecodable explorer tx")).ok()
            })
            .collect();
        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use primitives::SortOrder;

    const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

    fn client(server: &Server) -> ExplorerClient {
        let url = Url::parse(&format!("{}/v2/api", server.url())).unwrap();
        ExplorerClient::new(url, "key".to_owned(), 56, RequestPacer::new(Duration::ZERO)).unwrap()
    }

    #[tokio::test]
    async fn contract_source_decodes_verified_entry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chainid".into(), "56".into()),
                Matcher::UrlEncoded("module".into(), "contract".into()),
                Matcher::UrlEncoded("action".into(), "getsourcecode".into()),
                Matcher::UrlEncoded("address".into(), CONTRACT.into()),
                Matcher::UrlEncoded("apikey".into(), "key".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"status":"1","message":"OK","result":[{"SourceCode":"contract Agent {}",
                "ABI":"[]","ContractName":"Agent","CompilerVersion":"v0.8.24","OptimizationUsed":"1",
                "LicenseType":"MIT","Proxy":"1","Implementation":"0x2222222222222222222222222222222222222222"}]}"#,
            )
            .create_async()
            .await;

        let source = client(&server)
            .contract_source(CONTRACT.parse().unwrap())
            .await
            .unwrap()
            .expect("verified");
        assert_eq!(source.contract_name, "Agent");
        assert!(source.is_proxy);
        assert!(source.optimization_used);
        assert_eq!(source.implementation, Some(Address::repeat_byte(0x22)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unverified_contract_has_no_source() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"1","message":"OK","result":[{"SourceCode":"","ABI":"Contract source code not verified"}]}"#)
            .create_async()
            .await;

        let source = client(&server).contract_source(CONTRACT.parse().unwrap()).await.unwrap();
        assert!(source.is_none());
    }

    #[tokio::test]
    async fn txlist_decodes_and_coerces_numbers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "txlist".into()),
                Matcher::UrlEncoded("offset".into(), "50".into()),
                Matcher::UrlEncoded("sort".into(), "desc".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"status":"1","message":"OK","result":[
                {{"hash":"0x{h}","blockNumber":"100","timeStamp":"1700000000","from":"{CONTRACT}",
                "to":"","value":"1000","gas":"21000","gasUsed":"20000","gasPrice":"3000000000",
                "input":"0x976a605b","isError":"0","txreceipt_status":"1",
                "functionName":"updateLearningTree(bytes32)","methodId":"0x976a605b",
                "logs":[{{"topics":[]}}]}},
                {{"hash":"0x{h2}","blockNumber":"99","from":"{CONTRACT}","to":"{CONTRACT}",
                "isError":"0","txreceipt_status":"","logs":"0xdeadbeef"}},
                {{"hash":"0x{h3}","blockNumber":"98","from":"{CONTRACT}","to":"{CONTRACT}",
                "isError":"1","txreceipt_status":""}},
                {{"hash":"garbage"}}]}}"#,
                h = "ab".repeat(32),
                h2 = "cd".repeat(32),
                h3 = "ef".repeat(32)
            ))
            .create_async()
            .await;

        let query = TxHistoryQuery { sort: SortOrder::Desc, ..TxHistoryQuery::default() };
        let txs = client(&server).transactions(CONTRACT.parse().unwrap(), query).await.unwrap();
        assert_eq!(txs.len(), 3);
        let tx = &txs[0];
        assert_eq!(tx.block_number, 100);
        assert_eq!(tx.to, None);
        assert_eq!(tx.value, U256::from(1000));
        assert_eq!(tx.gas_used, 20_000);
        assert!(tx.succeeded);
        assert!(tx.function_name.starts_with("updateLearningTree"));
        assert_eq!(tx.logs, r#"[{"topics":[]}]"#);

        // an empty receipt status falls back to the error flag
        assert!(txs[1].succeeded);
        assert!(!txs[2].succeeded);
        assert!(txs[2].is_error);
        // string-valued logs are kept as-is, missing logs are empty
        assert_eq!(txs[1].logs, "0xdeadbeef");
        assert_eq!(txs[2].logs, "");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_history_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"0","message":"No transactions found","result":[]}"#)
            .create_async()
            .await;

        let txs = client(&server)
            .transactions(CONTRACT.parse().unwrap(), TxHistoryQuery::default())
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn api_error_text_surfaces() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .transactions(CONTRACT.parse().unwrap(), TxHistoryQuery::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid API Key"));
    }
}
