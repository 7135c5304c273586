mod core;
mod list_endpoint;

pub use core::{
    CreateEntryParams, Entry, UpdateEntryParams, create_entry, create_entry_table, delete_entry,
    get_entry, list_entries, list_entries_from_account, update_entry,
};
pub use list_endpoint::list_account_entries_endpoint;
