//! OpenAPI document for the ledger service.

use utoipa::OpenApi;

use crate::domain::ports::DbStatus;
use crate::domain::{Transaction, TransactionKind, TransactionReceipt};
use crate::inbound::http::balance::BalanceResponse;
use crate::inbound::http::transactions::PostTransactionRequest;

/// Aggregated API description served to tooling.
#[derive(OpenApi)]
#[openapi(
    info(title = "tally-ledger", description = "Transaction log and balances"),
    paths(
        crate::inbound::http::transactions::post_transaction,
        crate::inbound::http::transactions::list_transactions,
        crate::inbound::http::balance::get_balance,
        crate::inbound::http::status::get_status,
    ),
    components(schemas(
        Transaction,
        TransactionKind,
        TransactionReceipt,
        PostTransactionRequest,
        BalanceResponse,
        DbStatus,
        tally_core::Error,
        tally_core::ErrorCode,
    )),
    tags(
        (name = "transactions", description = "Posting and history"),
        (name = "balance", description = "Balance reads"),
        (name = "status", description = "Dependency health"),
    )
)]
pub struct ApiDoc;
