//! nfascope extractor
//!
//! Reads the chain over HTTP JSON-RPC and the explorer over its REST API, and exposes both
//! through [`ChainDataProvider`].
use alloy::providers::{Provider, ProviderBuilder};
use alloy_network_primitives::TransactionResponse;
use alloy_primitives::{Address, Bytes, U256};
use alloy_rpc_client::ClientBuilder;
use alloy_rpc_types_eth::{
    Block as RpcBlock, BlockNumberOrTag, Transaction as RpcTransaction, TransactionInput,
    TransactionRequest,
};
use async_trait::async_trait;
use chainio::DefaultProvider;
use derive_more::Debug;
use eyre::{Result, WrapErr};
use network::{ExplorerClient, MetadataClient};
use primitives::{
    ChainBlock, ChainDataProvider, ChainTransaction, ContractSource, ExplorerTransaction,
    TxHistoryQuery, retries::DEFAULT_RETRY_LAYER,
};
use tracing::debug;
use url::Url;

/// JSON-RPC client
#[derive(Debug, Clone)]
pub struct Extractor {
    #[debug(skip)]
    provider: DefaultProvider,
}

impl Extractor {
    /// Create a new extractor. No request is made until the first call.
    pub fn new(rpc_url: Url) -> Self {
        let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(rpc_url);
        let provider = ProviderBuilder::new().connect_client(client);
        Self { provider }
    }

    /// Current chain head.
    pub async fn latest_height(&self) -> Result<u64> {
        self.provider.get_block_number().await.wrap_err("eth_blockNumber failed")
    }

    /// Block `height` with full transactions.
    pub async fn block(&self, height: u64) -> Result<Option<ChainBlock>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(height))
            .full()
            .await
            .wrap_err_with(|| format!("eth_getBlockByNumber({height}) failed"))?;
        Ok(block.map(chain_block))
    }

    /// Native balance in wei.
    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.provider.get_balance(address).await.wrap_err("eth_getBalance failed")
    }

    /// Runtime bytecode at `address`.
    pub async fn code(&self, address: Address) -> Result<Bytes> {
        self.provider.get_code_at(address).await.wrap_err("eth_getCode failed")
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, address: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().to(address).input(TransactionInput::new(data));
        self.provider.call(request).await.wrap_err_with(|| format!("eth_call to {address} failed"))
    }
}

/// Flatten an RPC block into the pipeline's block type.
pub fn chain_block(block: RpcBlock) -> ChainBlock {
    let transactions = block.transactions.txns().map(chain_transaction).collect();
    let header = block.header;
    ChainBlock {
        number: header.number,
        hash: header.hash,
        parent_hash: header.parent_hash,
        miner: header.beneficiary,
        gas_used: header.gas_used,
        gas_limit: header.gas_limit,
        timestamp: header.timestamp,
        transactions,
    }
}

fn chain_transaction(tx: &RpcTransaction) -> ChainTransaction {
    let gas_price = tx
        .effective_gas_price
        .or_else(|| alloy_consensus::Transaction::gas_price(tx))
        .unwrap_or_else(|| alloy_consensus::Transaction::max_fee_per_gas(tx));
    ChainTransaction {
        hash: TransactionResponse::tx_hash(tx),
        from: TransactionResponse::from(tx),
        to: alloy_consensus::Transaction::to(tx),
        value: alloy_consensus::Transaction::value(tx),
        gas: alloy_consensus::Transaction::gas_limit(tx),
        gas_price,
        input: alloy_consensus::Transaction::input(tx).clone(),
    }
}

/// The production [`ChainDataProvider`]: JSON-RPC for chain state, the explorer for
/// verification data and history, plain HTTP for token metadata.
#[derive(Debug, Clone)]
pub struct ChainClient {
    extractor: Extractor,
    explorer: ExplorerClient,
    metadata: MetadataClient,
}

impl ChainClient {
    /// Create a new client from its three parts.
    pub const fn new(extractor: Extractor, explorer: ExplorerClient, metadata: MetadataClient) -> Self {
        Self { extractor, explorer, metadata }
    }
}

#[async_trait]
impl ChainDataProvider for ChainClient {
    async fn latest_height(&self) -> Result<u64> {
        self.extractor.latest_height().await
    }

    async fn block_by_height(&self, height: u64) -> Result<Option<ChainBlock>> {
        self.extractor.block(height).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.extractor.balance(address).await
    }

    async fn runtime_bytecode(&self, address: Address) -> Result<Bytes> {
        self.extractor.code(address).await
    }

    async fn verified_source(&self, address: Address) -> Result<Option<ContractSource>> {
        self.explorer.contract_source(address).await
    }

    async fn transaction_history(
        &self,
        address: Address,
        query: TxHistoryQuery,
    ) -> Result<Vec<ExplorerTransaction>> {
        self.explorer.transactions(address, query).await
    }

    async fn fetch_offchain_metadata(&self, uri: &str) -> Result<Option<serde_json::Value>> {
        let doc = self.metadata.fetch(uri).await;
        if doc.is_none() {
            debug!(uri, "no metadata document");
        }
        Ok(doc)
    }

    async fn call_contract(&self, address: Address, data: Bytes) -> Result<Bytes> {
        self.extractor.call(address, data).await
    }
}
