//! Core domain types and logic.

pub mod ohlcv;
pub mod variable;
pub mod operator;
pub mod compatibility;
pub mod normalization;
pub mod indicator;
pub mod cross_signal;
pub mod condition;
pub mod condition_parser;
pub mod detector;
pub mod snapshot;
pub mod trigger;
pub mod evaluation;
pub mod strategy;
pub mod backtest;
pub mod settings;
pub mod error;
