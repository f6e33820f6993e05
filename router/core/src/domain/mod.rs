// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adapter;
pub mod criteria;
pub mod decision_tree;
pub mod error;
pub mod gateway_config;
pub mod request;
pub mod response;
pub mod streaming;
