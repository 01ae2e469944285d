//! Tables and their running tabs.

mod state;
mod tab;

pub use state::Availability;
pub use tab::{Settlement, TabChange, Table, TableParts};

use common::TableId;
use thiserror::Error;

/// Errors that can occur when changing a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The requested state change is not allowed from the current state.
    #[error("Invalid transition: cannot move table from {from} to {to}")]
    InvalidTransition {
        from: Availability,
        to: Availability,
    },

    /// The table is archived and cannot change.
    #[error("Table {0} is archived")]
    Archived(TableId),

    /// The table is occupied or holds an open tab.
    #[error("Table is {availability} with {open_sales} open sale(s)")]
    TabOpen {
        availability: Availability,
        open_sales: usize,
    },

    /// The table name is empty.
    #[error("Table name must not be empty")]
    InvalidName,

    /// The running total left the cent range.
    #[error("Running total overflow")]
    Overflow,
}
