use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use std::collections::BTreeMap;

use crate::{
    dto::reports::{
        DailySalesReport, InventoryExportKind, InventoryReport, InventorySubset,
        MonthlySalesQuery, PerformanceReport, PerformanceVariant, ProductPerformance, SaleRow,
        SalesBucket, SalesRangeQuery, SalesReport, SalesSeries,
    },
    entity::{
        categories::Entity as Categories,
        order_items::Entity as OrderItems,
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProductCol, Entity as Products},
    },
    error::AppResult,
    export::{Cell, Sheet, csv_bytes, format_cents},
    models::{ORDER_COMPLETED, Order, Product},
    response::{ApiResponse, Meta},
    services::{catalog_service::product_from_entity, order_service::order_from_entity},
    state::AppState,
};

const TOP_N: usize = 10;
const DEFAULT_RANGE_DAYS: i64 = 30;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Completed orders in a date range: revenue total and order count.
/// Defaults to the trailing 30 days.
pub async fn sales_report(
    state: &AppState,
    query: SalesRangeQuery,
) -> AppResult<ApiResponse<SalesReport>> {
    let end_date = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
    let start_date = query
        .start_date
        .unwrap_or(end_date - Duration::days(DEFAULT_RANGE_DAYS));

    let orders = completed_orders_between(state, start_date, end_date).await?;
    let total_sales_cents: i64 = orders.iter().map(|o| o.total_amount_cents).sum();
    let order_count = orders.len() as i64;

    Ok(ApiResponse::success(
        "Sales report",
        SalesReport {
            start_date,
            end_date,
            total_sales_cents,
            order_count,
            orders,
        },
        Some(Meta::empty()),
    ))
}

pub async fn daily_sales(state: &AppState) -> AppResult<ApiResponse<DailySalesReport>> {
    let today = Utc::now().date_naive();
    let orders = completed_orders_between(state, today, today).await?;
    let total_sales_cents: i64 = orders.iter().map(|o| o.total_amount_cents).sum();
    let order_count = orders.len() as i64;

    Ok(ApiResponse::success(
        "Daily sales",
        DailySalesReport {
            date: today,
            total_sales_cents,
            order_count,
            orders,
        },
        Some(Meta::empty()),
    ))
}

pub async fn monthly_sales(
    state: &AppState,
    query: MonthlySalesQuery,
) -> AppResult<ApiResponse<SalesSeries>> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let rows = completed_sale_rows(state).await?;
    let buckets = bucket_monthly(&rows, year);
    Ok(ApiResponse::success(
        format!("Monthly sales {year}"),
        SalesSeries { buckets },
        Some(Meta::empty()),
    ))
}

pub async fn yearly_sales(state: &AppState) -> AppResult<ApiResponse<SalesSeries>> {
    let rows = completed_sale_rows(state).await?;
    let buckets = bucket_yearly(&rows);
    Ok(ApiResponse::success(
        "Yearly sales",
        SalesSeries { buckets },
        Some(Meta::empty()),
    ))
}

/// Full product list ascending by stock, plus the low-stock and
/// out-of-stock subsets with their inventory value.
pub async fn inventory_report(state: &AppState) -> AppResult<ApiResponse<InventoryReport>> {
    let products: Vec<Product> = Products::find()
        .order_by_asc(ProductCol::Stock)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let report = build_inventory_report(products);
    Ok(ApiResponse::success(
        "Inventory report",
        report,
        Some(Meta::empty()),
    ))
}

pub async fn product_performance(
    state: &AppState,
    variant: PerformanceVariant,
) -> AppResult<ApiResponse<PerformanceReport>> {
    let rows = performance_rows(state).await?;
    let products = rank_performance(rows, variant);
    Ok(ApiResponse::success(
        "Product performance",
        PerformanceReport { products },
        Some(Meta::empty()),
    ))
}

/// All orders, newest first: the rows behind `sales_report.csv` and the
/// spreadsheet export.
pub async fn export_sales_csv(state: &AppState) -> AppResult<(String, Vec<u8>)> {
    let orders = all_orders_desc(state).await?;
    let rows: Vec<Vec<String>> = orders
        .iter()
        .map(|o| {
            vec![
                o.order_number.clone(),
                o.customer_name.clone(),
                o.created_at.format("%Y-%m-%d").to_string(),
                format_cents(o.total_amount_cents),
                status_display(&o.status).to_string(),
            ]
        })
        .collect();
    let bytes = csv_bytes(
        &["Order Number", "Customer", "Date", "Amount", "Status"],
        &rows,
    )?;
    Ok(("sales_report.csv".to_string(), bytes))
}

pub async fn export_sales_sheet(state: &AppState) -> AppResult<(String, Vec<u8>)> {
    let orders = all_orders_desc(state).await?;
    let sheet = sales_sheet(&orders);
    let bytes = state.documents.render(&sheet)?;
    let filename = format!("sales_report.{}", state.documents.extension());
    Ok((filename, bytes))
}

pub async fn export_inventory_csv(
    state: &AppState,
    kind: InventoryExportKind,
) -> AppResult<(String, Vec<u8>)> {
    let products: Vec<Product> = Products::find()
        .order_by_asc(ProductCol::Stock)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();
    let report = build_inventory_report(products);

    let (subset, filename) = match kind {
        InventoryExportKind::LowStock => (&report.low_stock, "low_stock_report.csv"),
        InventoryExportKind::OutOfStock => (&report.out_of_stock, "out_of_stock_report.csv"),
    };

    let names = category_names(state).await?;
    let rows: Vec<Vec<String>> = subset
        .products
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.category_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_default(),
                p.stock.to_string(),
                p.min_stock_level.to_string(),
                format_cents(p.price_cents),
                p.stock_status().to_string(),
            ]
        })
        .collect();

    let bytes = csv_bytes(
        &["Product", "Category", "Current Stock", "Min Stock", "Price", "Status"],
        &rows,
    )?;
    Ok((filename.to_string(), bytes))
}

pub async fn export_performance_csv(
    state: &AppState,
    variant: PerformanceVariant,
) -> AppResult<(String, Vec<u8>)> {
    let rows = performance_rows(state).await?;
    let products = rank_performance(rows, variant);

    let filename = match variant {
        PerformanceVariant::Performance => "product_performance.csv",
        PerformanceVariant::Top => "top_selling_products.csv",
        PerformanceVariant::Low => "low_performing_products.csv",
    };

    let records: Vec<Vec<String>> = products
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.category.clone(),
                p.total_sold.to_string(),
                format_cents(p.total_revenue_cents),
                format_cents(p.average_price_cents()),
                p.stock.to_string(),
            ]
        })
        .collect();

    let bytes = csv_bytes(
        &["Product", "Category", "Units Sold", "Total Revenue", "Average Price", "Current Stock"],
        &records,
    )?;
    Ok((filename.to_string(), bytes))
}

// ---- pure aggregation ----

pub fn bucket_monthly(rows: &[SaleRow], year: i32) -> Vec<SalesBucket> {
    let mut by_month: BTreeMap<u32, (i64, i64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.created_at.year() == year) {
        let entry = by_month.entry(row.created_at.month()).or_default();
        entry.0 += row.total_amount_cents;
        entry.1 += 1;
    }
    by_month
        .into_iter()
        .map(|(month, (cents, count))| SalesBucket {
            label: MONTH_NAMES[(month - 1) as usize].to_string(),
            total_sales: crate::export::cents_to_dollars(cents),
            order_count: count,
        })
        .collect()
}

pub fn bucket_yearly(rows: &[SaleRow]) -> Vec<SalesBucket> {
    let mut by_year: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
    for row in rows {
        let entry = by_year.entry(row.created_at.year()).or_default();
        entry.0 += row.total_amount_cents;
        entry.1 += 1;
    }
    by_year
        .into_iter()
        .map(|(year, (cents, count))| SalesBucket {
            label: year.to_string(),
            total_sales: crate::export::cents_to_dollars(cents),
            order_count: count,
        })
        .collect()
}

pub fn build_inventory_report(products: Vec<Product>) -> InventoryReport {
    // Low stock means short of the minimum but not yet empty; empty rows
    // belong to the out-of-stock subset.
    let low: Vec<Product> = products
        .iter()
        .filter(|p| p.stock > 0 && p.is_low_stock())
        .cloned()
        .collect();
    let out: Vec<Product> = products.iter().filter(|p| p.stock == 0).cloned().collect();

    let low_value = inventory_value(&low);
    InventoryReport {
        products,
        low_stock: InventorySubset {
            products: low,
            total_value_cents: low_value,
        },
        out_of_stock: InventorySubset {
            products: out,
            // stock is zero for every row, so the value is zero by definition
            total_value_cents: 0,
        },
    }
}

fn inventory_value(products: &[Product]) -> i64 {
    products
        .iter()
        .map(|p| p.stock as i64 * p.price_cents)
        .sum()
}

pub fn rank_performance(
    mut rows: Vec<ProductPerformance>,
    variant: PerformanceVariant,
) -> Vec<ProductPerformance> {
    match variant {
        PerformanceVariant::Performance => {
            rows.sort_by(|a, b| b.total_revenue_cents.cmp(&a.total_revenue_cents));
            rows
        }
        PerformanceVariant::Top => {
            rows.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
            rows.truncate(TOP_N);
            rows
        }
        PerformanceVariant::Low => {
            rows.sort_by(|a, b| a.total_revenue_cents.cmp(&b.total_revenue_cents));
            rows.truncate(TOP_N);
            rows
        }
    }
}

pub fn sales_sheet(orders: &[Order]) -> Sheet {
    let mut sheet = Sheet::new(
        "Sales Report",
        &["Order Number", "Customer", "Date", "Amount", "Status"],
    );
    for o in orders {
        sheet.push_row(vec![
            Cell::Text(o.order_number.clone()),
            Cell::Text(o.customer_name.clone()),
            Cell::Text(o.created_at.format("%Y-%m-%d").to_string()),
            Cell::Currency(o.total_amount_cents),
            Cell::Text(status_display(&o.status).to_string()),
        ]);
    }
    sheet
}

fn status_display(status: &str) -> &str {
    match status {
        "pending" => "Pending",
        "completed" => "Completed",
        "cancelled" => "Cancelled",
        other => other,
    }
}

// ---- queries ----

async fn completed_orders_between(
    state: &AppState,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<Order>> {
    let start_at: DateTime<Utc> = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end_at: DateTime<Utc> = (end + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();

    let orders = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Status.eq(ORDER_COMPLETED))
                .add(OrderCol::CreatedAt.gte(start_at))
                .add(OrderCol::CreatedAt.lt(end_at)),
        )
        .order_by_asc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();
    Ok(orders)
}

async fn completed_sale_rows(state: &AppState) -> AppResult<Vec<SaleRow>> {
    let rows = Orders::find()
        .filter(OrderCol::Status.eq(ORDER_COMPLETED))
        .order_by_asc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|o| SaleRow {
            created_at: o.created_at.with_timezone(&Utc),
            total_amount_cents: o.total_amount_cents,
        })
        .collect();
    Ok(rows)
}

async fn all_orders_desc(state: &AppState) -> AppResult<Vec<Order>> {
    let orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();
    Ok(orders)
}

async fn category_names(
    state: &AppState,
) -> AppResult<std::collections::HashMap<uuid::Uuid, String>> {
    let names = Categories::find()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    Ok(names)
}

/// Per-product sold units and revenue over every order item on record,
/// whatever the state of the owning order.
async fn performance_rows(state: &AppState) -> AppResult<Vec<ProductPerformance>> {
    let products = Products::find()
        .find_also_related(Categories)
        .all(&state.orm)
        .await?;
    let items = OrderItems::find().all(&state.orm).await?;

    let mut sold: BTreeMap<uuid::Uuid, (i64, i64)> = BTreeMap::new();
    for item in items {
        let entry = sold.entry(item.product_id).or_default();
        entry.0 += item.quantity as i64;
        entry.1 += item.total_cents;
    }
    let rows = products
        .into_iter()
        .map(|(p, category)| {
            let (total_sold, total_revenue_cents) = sold.get(&p.id).copied().unwrap_or((0, 0));
            ProductPerformance {
                product_id: p.id,
                name: p.name,
                category: category.map(|c| c.name).unwrap_or_default(),
                total_sold,
                total_revenue_cents,
                stock: p.stock,
            }
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn sale(y: i32, m: u32, d: u32, cents: i64) -> SaleRow {
        SaleRow {
            created_at: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            total_amount_cents: cents,
        }
    }

    fn product(name: &str, stock: i32, min: i32, price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            barcode: "000000000001".into(),
            name: name.into(),
            description: String::new(),
            category_id: None,
            price_cents: price,
            stock,
            min_stock_level: min,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn perf(name: &str, sold: i64, revenue: i64) -> ProductPerformance {
        ProductPerformance {
            product_id: Uuid::new_v4(),
            name: name.into(),
            category: String::new(),
            total_sold: sold,
            total_revenue_cents: revenue,
            stock: 0,
        }
    }

    #[test]
    fn monthly_buckets_are_chronological_and_filtered_by_year() {
        let rows = vec![
            sale(2025, 3, 2, 1000),
            sale(2025, 1, 15, 500),
            sale(2025, 3, 9, 250),
            sale(2024, 3, 9, 9999),
        ];
        let buckets = bucket_monthly(&rows, 2025);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "January");
        assert_eq!(buckets[0].total_sales, 5.0);
        assert_eq!(buckets[0].order_count, 1);
        assert_eq!(buckets[1].label, "March");
        assert_eq!(buckets[1].total_sales, 12.5);
        assert_eq!(buckets[1].order_count, 2);
    }

    #[test]
    fn yearly_buckets_ascend() {
        let rows = vec![sale(2025, 6, 1, 100), sale(2023, 6, 1, 300)];
        let buckets = bucket_yearly(&rows);
        assert_eq!(buckets[0].label, "2023");
        assert_eq!(buckets[1].label, "2025");
    }

    #[test]
    fn inventory_subsets_and_values() {
        let report = build_inventory_report(vec![
            product("empty", 0, 5, 200),
            product("short", 2, 5, 150),
            product("at-minimum", 5, 5, 100),
            product("healthy", 20, 5, 50),
        ]);
        assert_eq!(report.low_stock.products.len(), 1);
        assert_eq!(report.low_stock.products[0].name, "short");
        assert_eq!(report.low_stock.total_value_cents, 300);
        assert_eq!(report.out_of_stock.products.len(), 1);
        assert_eq!(report.out_of_stock.total_value_cents, 0);
    }

    #[test]
    fn performance_variants_sort_and_truncate() {
        let mut rows = Vec::new();
        for i in 0..12i64 {
            rows.push(perf(&format!("p{i}"), i, i * 100));
        }

        let all = rank_performance(rows.clone(), PerformanceVariant::Performance);
        assert_eq!(all.len(), 12);
        assert_eq!(all[0].total_revenue_cents, 1100);

        let top = rank_performance(rows.clone(), PerformanceVariant::Top);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].total_sold, 11);

        let low = rank_performance(rows, PerformanceVariant::Low);
        assert_eq!(low.len(), 10);
        assert_eq!(low[0].total_revenue_cents, 0);
    }

    #[test]
    fn average_price_guards_division_by_zero() {
        assert_eq!(perf("unsold", 0, 0).average_price_cents(), 0);
        assert_eq!(perf("sold", 4, 1000).average_price_cents(), 250);
    }

    #[test]
    fn sales_sheet_shape() {
        let sheet = sales_sheet(&[]);
        assert_eq!(sheet.headers.len(), 5);
        assert_eq!(sheet.title, "Sales Report");
    }
}
