// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tokio::time::timeout;

use crate::client::error::BoltError;

/// Runs one socket operation under the connection's deadline. A timeout is a
/// transport error: the connection is no longer in a known protocol state.
pub(crate) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
) -> Result<T, BoltError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout(io_timeout, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(BoltError::Io(e)),
        Err(_) => Err(BoltError::Timeout(label)),
    }
}
