use std::path::PathBuf;
use std::sync::Arc;

use crate::db::DbPool;
use crate::payment::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub payments: Arc<dyn PaymentGateway>,
    pub invoice_dir: PathBuf,
}
