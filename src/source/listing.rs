//! [`BulkDataSource`] over one remote list method

use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

use super::http::BulkHttpClient;
use super::response::BulkResponse;
use super::{ApiResult, BulkDataSource, BulkInput};
use crate::Filters;

/// Lists records of type `T` through a remote method such as "getCustomers"
pub struct RecordListing<T> {
    client: Arc<BulkHttpClient>,
    method_name: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordListing<T> {
    /// Create a listing for `method_name`
    pub fn new(client: Arc<BulkHttpClient>, method_name: impl Into<String>) -> Self {
        Self {
            client,
            method_name: method_name.into(),
            _record: PhantomData,
        }
    }

    /// Remote method this listing calls
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    fn inputs(&self, bulk_filters: &[Filters]) -> Vec<BulkInput> {
        bulk_filters
            .iter()
            .map(|filters| BulkInput::new(&self.method_name, filters.clone()))
            .collect()
    }
}

#[async_trait]
impl<T> BulkDataSource for RecordListing<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Record = T;

    async fn count(&self, filters: &Filters) -> ApiResult<usize> {
        let response: BulkResponse<IgnoredAny> = self
            .client
            .send_bulk(&self.inputs(std::slice::from_ref(filters)))
            .await?;
        Ok(response.records_total())
    }

    async fn read(
        &self,
        bulk_filters: &[Filters],
        on_item: &mut (dyn FnMut(T) + Send),
    ) -> ApiResult<()> {
        let response: BulkResponse<T> = self.client.send_bulk(&self.inputs(bulk_filters)).await?;

        let mut delivered = 0usize;
        for item in response.items {
            for record in item.records {
                on_item(record);
                delivered += 1;
            }
        }
        trace!(method = %self.method_name, delivered, "Bulk records decoded");
        Ok(())
    }
}
