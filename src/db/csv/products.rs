use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::db::{Product, ProductStore};
use crate::error::DatabaseError;

use super::{CsvBackend, Row, Table, format_amount, parse_amount, parse_count};

pub(super) const PRODUCTS: Table = Table {
    name: "products",
    file: "products.csv",
    columns: &[
        "Device",
        "Description",
        "UnitPrice",
        "Warranty",
        "ImageBase64",
        "ImagePath",
    ],
    required: &["Device"],
};

fn product_from_row(row: &Row) -> Option<Product> {
    let device = row.get("Device");
    if device.is_empty() {
        return None;
    }
    let unit_price = parse_amount(row.get("UnitPrice")).unwrap_or_else(|| {
        tracing::warn!(
            line = row.line,
            device,
            "Unparseable unit price '{}', using 0",
            row.get("UnitPrice")
        );
        Decimal::ZERO
    });
    Some(Product {
        device: device.to_string(),
        description: row.get("Description").to_string(),
        unit_price,
        warranty_years: parse_count(row.get("Warranty")).unwrap_or(0),
        image_base64: row.get("ImageBase64").to_string(),
        image_path: row.get("ImagePath").to_string(),
    })
}

fn product_to_values(product: &Product) -> Vec<String> {
    vec![
        product.device.clone(),
        product.description.clone(),
        format_amount(product.unit_price),
        product.warranty_years.to_string(),
        product.image_base64.clone(),
        product.image_path.clone(),
    ]
}

#[async_trait]
impl ProductStore for CsvBackend {
    async fn load_products(&self) -> Result<Vec<Product>, DatabaseError> {
        let mut state = self.products.lock().await;
        let rows = self.read_rows(&PRODUCTS, &mut state).await?;
        Ok(rows.iter().filter_map(product_from_row).collect())
    }

    async fn save_products(&self, products: &[Product]) -> Result<(), DatabaseError> {
        let mut state = self.products.lock().await;
        let rows: Vec<Vec<String>> = products.iter().map(product_to_values).collect();
        self.write_rows(&PRODUCTS, &mut state, &rows).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn loads_catalog_exported_from_spreadsheet() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("products.csv"),
            "Device,Description,UnitPrice,Warranty\n\
             Smart Switch,2-gang touch,350.0,2.0\n\
             ,orphan row,10,1\n\
             Hub,,abc,\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        let products = backend.load_products().await.expect("load");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].unit_price, dec!(350));
        assert_eq!(products[0].warranty_years, 2);
        assert_eq!(products[1].device, "Hub");
        assert_eq!(products[1].unit_price, Decimal::ZERO);
        assert_eq!(products[1].image_path, "");
    }
}
