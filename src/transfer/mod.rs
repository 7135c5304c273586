mod core;
mod create_endpoint;
mod list_endpoint;
mod transfer_tx;

pub use core::{
    CreateTransferParams, Transfer, UpdateTransferParams, create_transfer, create_transfer_table,
    delete_transfer, get_transfer, list_transfers, list_transfers_from, list_transfers_to,
    update_transfer,
};
pub use create_endpoint::create_transfer_endpoint;
pub use list_endpoint::list_account_transfers_endpoint;
pub use transfer_tx::{TransferTxParams, TransferTxResult};
