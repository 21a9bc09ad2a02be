//! services/client/src/resource.rs
//!
//! The four generic verbs every data store is built on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use taskflow_core::ports::HttpRequest;
use tracing::warn;

use crate::config::EditMethod;
use crate::error::ClientResult;
use crate::remote::{decode, expect_success, json_body, RemoteClient};
use crate::wire::{DeleteReceipt, Envelope};

#[derive(Clone)]
pub struct ResourceClient {
    remote: Arc<RemoteClient>,
}

impl ResourceClient {
    pub fn new(remote: Arc<RemoteClient>) -> Self {
        Self { remote }
    }

    /// GET `path` and decode the body.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = expect_success(self.remote.send(HttpRequest::get(path)).await?)?;
        decode(&response.body)
    }

    /// POST `payload` as JSON and decode the `{ message, data }` envelope.
    pub async fn create<P, R>(&self, path: &str, payload: &P) -> ClientResult<Envelope<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = HttpRequest::post(path).with_body(json_body(payload)?);
        let response = expect_success(self.remote.send(request).await?)?;
        decode(&response.body)
    }

    /// POST or PUT `payload`, as the endpoint requires.
    pub async fn edit<P, R>(
        &self,
        path: &str,
        payload: &P,
        method: EditMethod,
    ) -> ClientResult<Envelope<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = match method {
            EditMethod::Post => HttpRequest::post(path),
            EditMethod::Put => HttpRequest::put(path),
        }
        .with_body(json_body(payload)?);
        let response = expect_success(self.remote.send(request).await?)?;
        decode(&response.body)
    }

    /// DELETE `path`. Succeeds iff exactly one row was affected.
    pub async fn remove(&self, path: &str) -> ClientResult<bool> {
        Ok(self.remove_counted(path).await? == 1)
    }

    /// DELETE `path` and report the affected-row count.
    pub async fn remove_counted(&self, path: &str) -> ClientResult<u64> {
        let response = expect_success(self.remote.send(HttpRequest::delete(path)).await?)?;
        let receipt: DeleteReceipt = decode(&response.body)?;
        if receipt.rows_affected != 1 {
            warn!(path, rows_affected = receipt.rows_affected, "Delete did not affect exactly one row");
        }
        Ok(receipt.rows_affected)
    }
}
