// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod cfg;
pub mod client;
pub mod codec;
pub mod pool;
pub mod proto;
pub mod utils;
