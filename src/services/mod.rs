pub mod accounts;
pub mod ledger;
pub mod membership;
pub mod reconciler;
pub mod surveys;
