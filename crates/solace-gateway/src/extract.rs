// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query-string / form-encoded parity extractor.
//!
//! Every action accepts GET with a query string and POST with a
//! form-encoded body, so the same handler serves both client types.

use axum::{
    extract::{Form, FromRequest, FromRequestParts, Query, Request},
    http::Method,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// Extracts `T` from the query string on GET/HEAD, from the form body
/// otherwise.
pub struct QueryOrForm<T>(pub T);

impl<S, T> FromRequest<S> for QueryOrForm<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            let (mut parts, _) = req.into_parts();
            let Query(value) = Query::<T>::from_request_parts(&mut parts, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}
