pub mod config;

pub mod executor;

pub mod fallback;

pub mod ledger;

pub mod matchmaker;

pub mod reader;

pub mod reasoner;

pub mod rpc;

pub mod runtime;

pub mod test_helpers;

pub mod timeout;

pub mod turn;

pub mod types;

pub mod validator;

pub mod wallets;

pub mod watcher;
