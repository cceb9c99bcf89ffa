#![cfg(test)]
//! End-to-end behaviour of the fleet services against a simulated network of players.

mod dispatch;
mod lag;
mod scan;
mod support;
