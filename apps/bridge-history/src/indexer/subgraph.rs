//! GraphQL documents and response shapes of the deposit/withdrawal subgraphs.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{HistoryError, Result};
use crate::model::{
    NodeBlockDeadline, OutgoingMessageState, RawDepositEvent, RawWithdrawalEvent, TokenInfo,
    MAX_TOKEN_DECIMALS,
};

use super::IndexerQuery;

const DEPOSITS_QUERY: &str = r#"query Deposits($where: Deposit_filter!, $first: Int!, $skip: Int!) {
  deposits(where: $where, orderBy: timestamp, orderDirection: desc, first: $first, skip: $skip) {
    id
    sender
    ethValue
    l1Token { id symbol decimals }
    tokenAmount
    timestamp
    transactionHash
    blockCreatedAt
  }
}"#;

const WITHDRAWALS_QUERY: &str = r#"query Withdrawals($where: Withdrawal_filter!, $first: Int!, $skip: Int!) {
  withdrawals(where: $where, orderBy: l2BlockTimestamp, orderDirection: desc, first: $first, skip: $skip) {
    id
    sender
    ethValue
    l1Token { id symbol decimals }
    tokenAmount
    l2BlockTimestamp
    l2TxHash
    l2BlockNum
    l1BlockNum
    position
    outgoingMessageState
    nodeBlockDeadline
  }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    pub query: &'static str,
    pub variables: Value,
}

pub fn deposits_request(query: &IndexerQuery) -> GraphQlRequest {
    GraphQlRequest {
        query: DEPOSITS_QUERY,
        variables: variables(query, "blockCreatedAt", "transactionHash_contains"),
    }
}

pub fn withdrawals_request(query: &IndexerQuery) -> GraphQlRequest {
    GraphQlRequest {
        query: WITHDRAWALS_QUERY,
        variables: variables(query, "l2BlockNum", "l2TxHash_contains"),
    }
}

fn variables(query: &IndexerQuery, block_field: &str, search_field: &str) -> Value {
    let mut filter = Map::new();
    filter.insert("sender".into(), json!(format!("{:#x}", query.address)));
    filter.insert(format!("{block_field}_gte"), json!(query.from_block.to_string()));
    filter.insert(format!("{block_field}_lte"), json!(query.to_block.to_string()));
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        filter.insert(search_field.into(), json!(search.to_lowercase()));
    }

    json!({
        "where": filter,
        "first": query.page_size,
        "skip": query.skip(),
    })
}

#[derive(Debug, Deserialize)]
pub struct DepositsData {
    pub deposits: Vec<SubgraphDeposit>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalsData {
    pub withdrawals: Vec<SubgraphWithdrawal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphToken {
    pub id: String,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphDeposit {
    pub id: String,
    pub sender: String,
    pub eth_value: Option<String>,
    pub l1_token: Option<SubgraphToken>,
    pub token_amount: Option<String>,
    pub timestamp: Option<String>,
    pub transaction_hash: String,
    pub block_created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphWithdrawal {
    pub id: String,
    pub sender: String,
    pub eth_value: Option<String>,
    pub l1_token: Option<SubgraphToken>,
    pub token_amount: Option<String>,
    pub l2_block_timestamp: String,
    pub l2_tx_hash: Option<String>,
    pub l2_block_num: String,
    pub l1_block_num: Option<String>,
    pub position: Option<String>,
    pub outgoing_message_state: OutgoingMessageState,
    pub node_block_deadline: Option<NodeBlockDeadline>,
}

fn parse<T: FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| HistoryError::Decode(format!("invalid {field} {value:?}: {e}")))
}

fn parse_amount(field: &str, value: Option<&str>) -> Result<U256> {
    value.map_or(Ok(U256::ZERO), |v| parse(field, v))
}

impl TryFrom<SubgraphToken> for TokenInfo {
    type Error = HistoryError;

    fn try_from(token: SubgraphToken) -> Result<Self> {
        if let Some(decimals) = token.decimals.filter(|d| *d > MAX_TOKEN_DECIMALS) {
            return Err(HistoryError::Decode(format!(
                "token {} declares {decimals} decimals",
                token.id
            )));
        }
        Ok(TokenInfo {
            address: parse("l1Token.id", &token.id)?,
            symbol: token.symbol,
            decimals: token.decimals,
        })
    }
}

impl TryFrom<SubgraphDeposit> for RawDepositEvent {
    type Error = HistoryError;

    fn try_from(d: SubgraphDeposit) -> Result<Self> {
        let token = d.l1_token.map(TokenInfo::try_from).transpose()?;
        let amount = match token {
            None => parse_amount("ethValue", d.eth_value.as_deref())?,
            Some(_) => parse_amount("tokenAmount", d.token_amount.as_deref())?,
        };

        Ok(RawDepositEvent {
            sender: parse::<Address>("sender", &d.sender)?,
            token,
            amount,
            tx_hash: parse::<B256>("transactionHash", &d.transaction_hash)?,
            block_number: parse("blockCreatedAt", &d.block_created_at)?,
            timestamp: d
                .timestamp
                .as_deref()
                .map(|ts| parse("timestamp", ts))
                .transpose()?,
        })
    }
}

impl TryFrom<SubgraphWithdrawal> for RawWithdrawalEvent {
    type Error = HistoryError;

    fn try_from(w: SubgraphWithdrawal) -> Result<Self> {
        let token = w.l1_token.map(TokenInfo::try_from).transpose()?;
        let amount = match token {
            None => parse_amount("ethValue", w.eth_value.as_deref())?,
            Some(_) => parse_amount("tokenAmount", w.token_amount.as_deref())?,
        };

        Ok(RawWithdrawalEvent {
            sender: parse::<Address>("sender", &w.sender)?,
            token,
            amount,
            l2_tx_hash: w
                .l2_tx_hash
                .as_deref()
                .filter(|h| !h.is_empty())
                .map(|h| parse::<B256>("l2TxHash", h))
                .transpose()?,
            l2_block_number: parse("l2BlockNum", &w.l2_block_num)?,
            l1_block_number: w
                .l1_block_num
                .as_deref()
                .map(|n| parse("l1BlockNum", n))
                .transpose()?,
            timestamp: parse("l2BlockTimestamp", &w.l2_block_timestamp)?,
            unique_id: w.position,
            outgoing_state: w.outgoing_message_state,
            node_block_deadline: w.node_block_deadline,
        })
    }
}
