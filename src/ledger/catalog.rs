//! Product catalog.

use std::path::Path;

use base64::Engine;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{Database, Product};
use crate::error::{DatabaseError, LedgerError};

fn device_key(device: &str) -> String {
    device.trim().to_lowercase()
}

fn position_of(products: &[Product], device: &str) -> Option<usize> {
    let key = device_key(device);
    products.iter().position(|p| device_key(&p.device) == key)
}

pub async fn find_product(db: &dyn Database, device: &str) -> Result<Option<Product>, LedgerError> {
    let products = db.load_products().await?;
    Ok(position_of(&products, device).map(|idx| products[idx].clone()))
}

pub async fn add_product(db: &dyn Database, mut product: Product) -> Result<Product, LedgerError> {
    product.device = product.device.trim().to_string();
    if product.device.is_empty() {
        return Err(LedgerError::Validation("device name is required".to_string()));
    }
    if product.unit_price < Decimal::ZERO {
        return Err(LedgerError::Validation(
            "unit price must not be negative".to_string(),
        ));
    }

    let mut products = db.load_products().await?;
    if position_of(&products, &product.device).is_some() {
        return Err(LedgerError::DuplicateProduct(product.device));
    }
    products.push(product.clone());
    db.save_products(&products).await?;
    tracing::info!(device = %product.device, "Added product");
    Ok(product)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub device: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub warranty_years: Option<u32>,
    pub image_path: Option<String>,
    pub image_base64: Option<String>,
}

/// Edit a product. A rename is checked for uniqueness against every other
/// device.
pub async fn update_product(
    db: &dyn Database,
    device: &str,
    update: ProductUpdate,
) -> Result<Product, LedgerError> {
    let mut products = db.load_products().await?;
    let idx = position_of(&products, device)
        .ok_or_else(|| LedgerError::not_found("product", device.trim()))?;

    if let Some(ref renamed) = update.device {
        let renamed = renamed.trim();
        if renamed.is_empty() {
            return Err(LedgerError::Validation("device name is required".to_string()));
        }
        if let Some(other) = position_of(&products, renamed)
            && other != idx
        {
            return Err(LedgerError::DuplicateProduct(renamed.to_string()));
        }
    }
    if update.unit_price.is_some_and(|price| price < Decimal::ZERO) {
        return Err(LedgerError::Validation(
            "unit price must not be negative".to_string(),
        ));
    }

    let product = &mut products[idx];
    if let Some(renamed) = update.device {
        product.device = renamed.trim().to_string();
    }
    if let Some(description) = update.description {
        product.description = description;
    }
    if let Some(price) = update.unit_price {
        product.unit_price = price;
    }
    if let Some(warranty) = update.warranty_years {
        product.warranty_years = warranty;
    }
    if let Some(path) = update.image_path {
        product.image_path = path;
    }
    if let Some(encoded) = update.image_base64 {
        product.image_base64 = encoded;
    }
    let updated = product.clone();

    db.save_products(&products).await?;
    tracing::info!(device = %updated.device, "Updated product");
    Ok(updated)
}

pub async fn delete_product(db: &dyn Database, device: &str) -> Result<Product, LedgerError> {
    let mut products = db.load_products().await?;
    let idx = position_of(&products, device)
        .ok_or_else(|| LedgerError::not_found("product", device.trim()))?;
    let removed = products.remove(idx);
    db.save_products(&products).await?;
    tracing::info!(device = %removed.device, "Deleted product");
    Ok(removed)
}

/// Read a picture into the catalog's base64 column.
pub async fn load_image(path: &Path) -> Result<String, LedgerError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DatabaseError::io(path, e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

/// `data:` URI for a product picture. The type comes from `image_path`,
/// falling back to PNG when it does not name an image.
pub fn image_data_uri(product: &Product) -> Option<String> {
    let encoded = product.image_base64.trim();
    if encoded.is_empty() {
        return None;
    }
    let mime = mime_guess::from_path(product.image_path.trim())
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.to_string())
        .unwrap_or_else(|| "image/png".to_string());
    Some(format!("data:{mime};base64,{encoded}"))
}

/// Case-insensitive substring search over device and description. A blank
/// query returns the whole catalog.
pub async fn search_products(db: &dyn Database, query: &str) -> Result<Vec<Product>, LedgerError> {
    let needle = query.trim().to_lowercase();
    let products = db.load_products().await?;
    if needle.is_empty() {
        return Ok(products);
    }
    Ok(products
        .into_iter()
        .filter(|p| {
            p.device.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::csv::CsvBackend;

    fn product(device: &str, price: Decimal) -> Product {
        Product {
            device: device.to_string(),
            description: format!("{device} for smart homes"),
            unit_price: price,
            warranty_years: 2,
            ..Product::default()
        }
    }

    #[tokio::test]
    async fn device_names_are_unique_ignoring_case_and_spaces() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = CsvBackend::new(dir.path());

        add_product(&db, product("  Smart Switch ", dec!(350)))
            .await
            .expect("add");
        let err = add_product(&db, product("smart switch", dec!(1)))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, LedgerError::DuplicateProduct(_)));

        let found = find_product(&db, "SMART SWITCH").await.expect("find");
        assert_eq!(found.map(|p| p.device), Some("Smart Switch".to_string()));
    }

    #[tokio::test]
    async fn rename_checks_other_devices_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = CsvBackend::new(dir.path());
        add_product(&db, product("Hub", dec!(500))).await.expect("add");
        add_product(&db, product("Sensor", dec!(120))).await.expect("add");

        let renamed = update_product(
            &db,
            "hub",
            ProductUpdate {
                device: Some("HUB".to_string()),
                unit_price: Some(dec!(550)),
                ..ProductUpdate::default()
            },
        )
        .await
        .expect("self rename");
        assert_eq!(renamed.device, "HUB");
        assert_eq!(renamed.unit_price, dec!(550));

        let err = update_product(
            &db,
            "hub",
            ProductUpdate {
                device: Some("sensor".to_string()),
                ..ProductUpdate::default()
            },
        )
        .await
        .expect_err("clash");
        assert!(matches!(err, LedgerError::DuplicateProduct(_)));
    }

    #[tokio::test]
    async fn search_and_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = CsvBackend::new(dir.path());
        add_product(&db, product("Hub", dec!(500))).await.expect("add");
        add_product(&db, product("Motion Sensor", dec!(120))).await.expect("add");

        assert_eq!(search_products(&db, "sensor").await.expect("search").len(), 1);
        assert_eq!(search_products(&db, "SMART").await.expect("search").len(), 2);
        assert_eq!(search_products(&db, " ").await.expect("search").len(), 2);

        delete_product(&db, "hub").await.expect("delete");
        let err = delete_product(&db, "hub").await.expect_err("gone");
        assert!(matches!(err, LedgerError::NotFound { kind: "product", .. }));
    }

    #[tokio::test]
    async fn image_is_stored_as_base64_data_uri() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hub.jpg");
        std::fs::write(&path, b"jpeg").expect("write image");

        let encoded = load_image(&path).await.expect("load image");
        assert_eq!(encoded, "anBlZw==");

        let mut hub = product("Hub", dec!(500));
        hub.image_base64 = encoded;
        hub.image_path = path.display().to_string();
        assert_eq!(
            image_data_uri(&hub).as_deref(),
            Some("data:image/jpeg;base64,anBlZw==")
        );

        hub.image_path = "notes.txt".to_string();
        assert_eq!(
            image_data_uri(&hub).as_deref(),
            Some("data:image/png;base64,anBlZw==")
        );
        assert_eq!(image_data_uri(&product("Sensor", dec!(1))), None);
    }
}
