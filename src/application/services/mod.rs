//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the `LedgerStore` boundary trait but are themselves
//! concrete structs, not traits.

mod ledger;
mod report;

pub use ledger::{
    DocumentRef, GranteeOutcome, GranteeRequest, LedgerService, NodeEdit, PersonRef,
    StandaloneRequest, TransferRequest, TransferUpdate, DEFAULT_ALLOCATION_SLACK,
};
pub use report::{
    document_label, BreakdownLine, DocumentGrantee, EdgeView, NodeView, PersonTotal,
    ReportService,
};
