//! Scripted payment provider and media store.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use greenbasket_storefront::payments::{
    CreateProviderOrder, PaymentError, PaymentProvider, ProviderOrder, ProviderPayment,
};
use greenbasket_storefront::services::MediaStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type FetchHook = Box<dyn Fn() + Send + Sync>;

/// A provider that answers from a script and counts its calls.
#[derive(Default)]
pub struct MockPaymentProvider {
    payment: Mutex<Option<ProviderPayment>>,
    fetch_hook: Mutex<Option<FetchHook>>,
    created: Mutex<Vec<CreateProviderOrder>>,
    unreachable: AtomicBool,
    fetch_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MockPaymentProvider {
    /// Answer `fetch_payment` with `payment`.
    pub fn script_payment(&self, payment: ProviderPayment) {
        *lock(&self.payment) = Some(payment);
    }

    /// Run `hook` whenever a payment is fetched.
    pub fn on_fetch(&self, hook: impl Fn() + Send + Sync + 'static) {
        *lock(&self.fetch_hook) = Some(Box::new(hook));
    }

    /// Fail every call with a timeout.
    pub fn go_offline(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Requests received by `create_order`, oldest first.
    #[must_use]
    pub fn created_orders(&self) -> Vec<CreateProviderOrder> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_order(
        &self,
        request: &CreateProviderOrder,
    ) -> Result<ProviderOrder, PaymentError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaymentError::Timeout);
        }

        let mut created = lock(&self.created);
        created.push(request.clone());
        Ok(ProviderOrder {
            id: format!("order_test{}", created.len()),
            amount: request.amount,
            currency: request.currency.clone(),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<ProviderPayment, PaymentError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaymentError::Timeout);
        }
        if let Some(hook) = lock(&self.fetch_hook).as_ref() {
            hook();
        }

        lock(&self.payment)
            .clone()
            .filter(|payment| payment.id == payment_id)
            .ok_or_else(|| PaymentError::Api {
                status: 400,
                message: format!("The id provided does not exist: {payment_id}"),
            })
    }
}

/// Media store that only remembers which keys were removed.
#[derive(Debug, Default)]
pub struct RecordingMediaStore {
    removed: Mutex<Vec<String>>,
}

impl RecordingMediaStore {
    #[must_use]
    pub fn removed(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn remove(&self, key: &str) -> io::Result<()> {
        lock(&self.removed).push(key.to_string());
        Ok(())
    }
}
