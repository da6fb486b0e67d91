use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CollectiveId, PayoutMethod, PayoutMethodType};
use crate::loader::{group_by_keys, BatchFn, BatchLoader, LoaderError, LoaderOptions};
use crate::storage::{Field, Filter, PayoutMethodStore};

/// Batch function returning the saved payout methods of each requested collective.
pub struct CollectivePayoutMethodsFetch<S> {
    store: Arc<S>,
    kind: Option<PayoutMethodType>,
}

impl<S> CollectivePayoutMethodsFetch<S> {
    pub fn new(store: Arc<S>, kind: Option<PayoutMethodType>) -> Self {
        Self { store, kind }
    }

    pub fn filter(&self, collective_ids: &[CollectiveId]) -> Filter {
        let filter = Filter::any_of(Field::CollectiveId, collective_ids.iter().copied())
            .and(Filter::eq(Field::IsSaved, true));
        match self.kind {
            Some(kind) => filter.and(Filter::eq(Field::Type, kind)),
            None => filter,
        }
    }
}

#[async_trait]
impl<S> BatchFn for CollectivePayoutMethodsFetch<S>
where
    S: PayoutMethodStore + 'static,
{
    type Key = CollectiveId;
    type Value = Vec<PayoutMethod>;

    async fn load(&self, keys: &[CollectiveId]) -> Result<Vec<Vec<PayoutMethod>>, LoaderError> {
        let payout_methods = self.store.find_payout_methods(&self.filter(keys)).await?;
        Ok(group_by_keys(keys, payout_methods, |payout_method| {
            payout_method.collective_id
        }))
    }
}

pub type CollectivePayoutMethodsLoader<S> = BatchLoader<CollectivePayoutMethodsFetch<S>>;

/// Loader for a collective's saved PayPal payout methods.
pub fn collective_paypal_payout_methods_loader<S>(
    store: Arc<S>,
    options: LoaderOptions,
) -> CollectivePayoutMethodsLoader<S>
where
    S: PayoutMethodStore + 'static,
{
    BatchLoader::with_options(
        CollectivePayoutMethodsFetch::new(store, Some(PayoutMethodType::Paypal)),
        options,
    )
}

/// Loader for all of a collective's saved payout methods.
pub fn collective_payout_methods_loader<S>(
    store: Arc<S>,
    options: LoaderOptions,
) -> CollectivePayoutMethodsLoader<S>
where
    S: PayoutMethodStore + 'static,
{
    BatchLoader::with_options(CollectivePayoutMethodsFetch::new(store, None), options)
}

/// Payout method loaders scoped to a single request.
pub struct PayoutMethodLoaders<S: PayoutMethodStore + 'static> {
    pub paypal_by_collective: CollectivePayoutMethodsLoader<S>,
    pub by_collective: CollectivePayoutMethodsLoader<S>,
}

impl<S: PayoutMethodStore + 'static> PayoutMethodLoaders<S> {
    pub fn new(store: Arc<S>, options: LoaderOptions) -> Self {
        Self {
            paypal_by_collective: collective_paypal_payout_methods_loader(store.clone(), options),
            by_collective: collective_payout_methods_loader(store, options),
        }
    }
}
