//! Reference catalogs of universities and departments.
//!
//! Catalogs are read-only snapshots. A refresh swaps the whole snapshot at
//! once, so a turn that already took one keeps seeing consistent data.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use tercih_core::{CatalogItem, TercihError};

use crate::error::ChatError;

/// One consistent view of both catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub universities: Vec<CatalogItem>,
    #[serde(default)]
    pub departments: Vec<CatalogItem>,
}

impl CatalogSnapshot {
    /// Built-in snapshot of well-known Turkish universities and departments.
    pub fn builtin() -> Self {
        let universities = vec![
            CatalogItem::new("İstanbul Teknik Üniversitesi", &["İTÜ"]),
            CatalogItem::new("Orta Doğu Teknik Üniversitesi", &["ODTÜ", "METU"]),
            CatalogItem::new("Boğaziçi Üniversitesi", &["BOUN", "Boğaziçi"]),
            CatalogItem::new("Hacettepe Üniversitesi", &[]),
            CatalogItem::new("Ankara Üniversitesi", &[]),
            CatalogItem::new("İstanbul Üniversitesi", &[]),
            CatalogItem::new("Yıldız Teknik Üniversitesi", &["YTÜ"]),
            CatalogItem::new("Gazi Üniversitesi", &[]),
            CatalogItem::new("Ege Üniversitesi", &[]),
            CatalogItem::new("Dokuz Eylül Üniversitesi", &["DEÜ"]),
            CatalogItem::new("Marmara Üniversitesi", &[]),
            CatalogItem::new("Bilkent Üniversitesi", &[]),
            CatalogItem::new("Koç Üniversitesi", &[]),
            CatalogItem::new("Sabancı Üniversitesi", &[]),
            CatalogItem::new("Gebze Teknik Üniversitesi", &["GTÜ"]),
        ];

        let departments = vec![
            CatalogItem::new("Bilgisayar Mühendisliği", &["bilmuh", "CENG"]),
            CatalogItem::new("Elektrik-Elektronik Mühendisliği", &["EEM"]),
            CatalogItem::new("Makine Mühendisliği", &[]),
            CatalogItem::new("İnşaat Mühendisliği", &[]),
            CatalogItem::new("Endüstri Mühendisliği", &[]),
            CatalogItem::new("Yazılım Mühendisliği", &[]),
            CatalogItem::new("Tıp", &["Tıp Fakültesi"]),
            CatalogItem::new("Hukuk", &["Hukuk Fakültesi"]),
            CatalogItem::new("Psikoloji", &[]),
            CatalogItem::new("İşletme", &[]),
            CatalogItem::new("İktisat", &["Ekonomi"]),
            CatalogItem::new("Mimarlık", &[]),
            CatalogItem::new("Diş Hekimliği", &[]),
            CatalogItem::new("Eczacılık", &[]),
            CatalogItem::new("Matematik", &[]),
            CatalogItem::new("Fizik", &[]),
            CatalogItem::new("Moleküler Biyoloji ve Genetik", &["MBG"]),
        ];

        Self {
            universities,
            departments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.universities.is_empty() && self.departments.is_empty()
    }
}

// =============================================================================
// CatalogProvider
// =============================================================================

/// Supplies the current catalog snapshot.
pub trait CatalogProvider: Send + Sync {
    fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, ChatError>;
}

/// In-memory catalog whose snapshot can be replaced while turns are running.
pub struct StaticCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new(CatalogSnapshot::builtin())
    }
}

impl StaticCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load a snapshot from a JSON file of the form
    /// `{"universities": [...], "departments": [...]}`.
    pub fn from_json_file(path: &Path) -> tercih_core::Result<Self> {
        let snapshot = load_snapshot(path)?;
        Ok(Self::new(snapshot))
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) -> Result<(), ChatError> {
        let mut current = self
            .current
            .write()
            .map_err(|e| ChatError::Internal(format!("catalog lock poisoned: {}", e)))?;
        info!(
            "Catalog replaced: {} universities, {} departments",
            snapshot.universities.len(),
            snapshot.departments.len()
        );
        *current = Arc::new(snapshot);
        Ok(())
    }
}

impl CatalogProvider for StaticCatalog {
    fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, ChatError> {
        let current = self
            .current
            .read()
            .map_err(|e| ChatError::Internal(format!("catalog lock poisoned: {}", e)))?;
        Ok(Arc::clone(&current))
    }
}

/// Read and check a JSON catalog snapshot.
pub fn load_snapshot(path: &Path) -> tercih_core::Result<CatalogSnapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&content)?;
    if snapshot.is_empty() {
        return Err(TercihError::Catalog(format!(
            "{} contains no universities or departments",
            path.display()
        )));
    }
    if let Some(item) = snapshot
        .universities
        .iter()
        .chain(&snapshot.departments)
        .find(|i| i.canonical_name.trim().is_empty())
    {
        return Err(TercihError::Catalog(format!(
            "{} has an entry without a canonical name (aliases: {:?})",
            path.display(),
            item.aliases
        )));
    }
    info!(
        "Catalog loaded from {}: {} universities, {} departments",
        path.display(),
        snapshot.universities.len(),
        snapshot.departments.len()
    );
    Ok(snapshot)
}
