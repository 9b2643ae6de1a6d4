use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
};

use cleanpay_common::Cents;
use cleanpay_engine::{
    db_types::{Booking, Cleaner, NewCleaner, Payment},
    traits::{MessageError, MessageProvider},
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    // The store directory does not exist on a fresh checkout.
    if let Some(dir) = url.strip_prefix("sqlite://").and_then(|p| Path::new(p).parent()) {
        std::fs::create_dir_all(dir).expect("Error creating test database directory");
    }
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Test database ready at {url}");
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

/// A cleaner in central Cape Town with a generous radius.
pub fn nearby_cleaner(name: &str, rating: f64) -> NewCleaner {
    NewCleaner {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        rating,
        latitude: -33.9249,
        longitude: 18.4241,
        radius_km: 20.0,
        specializations: vec!["standard".to_string(), "deep".to_string()],
    }
}

pub fn booking_amount() -> Cents {
    Cents::from(45_000)
}

/// In-memory [`MessageProvider`] that records every send and can be told to fail.
#[derive(Clone, Default)]
pub struct TestMessenger {
    pub confirmations: Arc<Mutex<Vec<String>>>,
    pub receipts: Arc<Mutex<Vec<String>>>,
    pub notices: Arc<Mutex<Vec<String>>>,
    pub fail_confirmations: Arc<AtomicBool>,
}

impl TestMessenger {
    pub fn confirmation_count(&self) -> usize {
        self.confirmations.lock().unwrap().len()
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.lock().unwrap().len()
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }

    pub fn set_confirmations_failing(&self, failing: bool) {
        self.fail_confirmations.store(failing, Ordering::SeqCst);
    }
}

impl MessageProvider for TestMessenger {
    async fn send_confirmation(&self, booking: &Booking) -> Result<(), MessageError> {
        if self.fail_confirmations.load(Ordering::SeqCst) {
            return Err(MessageError::SendFailure("smtp relay down".to_string()));
        }
        self.confirmations.lock().unwrap().push(booking.booking_id.as_str().to_string());
        Ok(())
    }

    async fn send_receipt(&self, booking: &Booking, _payment: &Payment) -> Result<(), MessageError> {
        self.receipts.lock().unwrap().push(booking.booking_id.as_str().to_string());
        Ok(())
    }

    async fn send_assignment_notice(&self, booking: &Booking, _cleaner: &Cleaner) -> Result<(), MessageError> {
        self.notices.lock().unwrap().push(booking.booking_id.as_str().to_string());
        Ok(())
    }
}
