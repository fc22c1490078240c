//! Repository traits for the account store
//!
//! Services talk to storage exclusively through [`AccountRepository`]. Every
//! read-modify-write of an account runs inside an [`AccountTransaction`]
//! obtained from [`AccountRepository::begin`]: two transactions touching the
//! same account serialize, so concurrent login handlers and the inactivity
//! sweep can never lose each other's updates. Transactions only lock the
//! accounts they read or write, so work on different accounts proceeds in
//! parallel.
//!
//! "Not found" is never an error here; absence is `None` or an empty `Vec`.

pub mod account;
pub mod memory;

pub use account::{AccountRepository, AccountTransaction, UsernameLookup};
pub use memory::{InMemoryAccountRepository, InMemoryAccountTransaction};
