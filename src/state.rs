use std::path::PathBuf;
use std::sync::Arc;

use crate::barcode::BarcodeRenderer;
use crate::db::{DbPool, OrmConn};
use crate::export::DocumentRenderer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub barcodes: Arc<dyn BarcodeRenderer>,
    pub documents: Arc<dyn DocumentRenderer>,
    pub media_dir: PathBuf,
}
