//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Client-side errors for the sync upload pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncClientError {
    /// Transport-level failure that exhausted its retries.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with its error envelope. Never retried.
    #[error("server rejected request ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The server answered 2xx with a body we could not interpret.
    #[error("unexpected server response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, SyncClientError>;
