//! Batch loaders backing the collective resolvers.

pub mod payout_method;

pub use payout_method::{
    collective_payout_methods_loader, collective_paypal_payout_methods_loader,
    CollectivePayoutMethodsLoader, PayoutMethodLoaders,
};
