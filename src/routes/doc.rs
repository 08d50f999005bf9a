use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth as auth_dto,
        orders as order_dto,
        products as product_dto,
        reports as report_dto,
    },
    models::{Category, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, categories, health, orders, params, products, reports},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::register_staff,
        auth::staff_list,
        categories::list_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::lookup_by_barcode,
        products::regenerate_barcode,
        products::export_catalog,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::add_item,
        orders::remove_item,
        orders::complete_order,
        orders::cancel_order,
        orders::invoice,
        reports::sales,
        reports::daily_sales,
        reports::monthly_sales,
        reports::yearly_sales,
        reports::inventory,
        reports::product_performance,
        reports::export_sales_csv,
        reports::export_sales_sheet,
        reports::export_inventory_csv,
        reports::export_performance_csv,
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Order,
            OrderItem,
            auth_dto::RegisterRequest,
            auth_dto::LoginRequest,
            auth_dto::LoginResponse,
            auth_dto::StaffList,
            product_dto::CreateProductRequest,
            product_dto::UpdateProductRequest,
            product_dto::CategoryRequest,
            product_dto::ProductList,
            product_dto::CategoryList,
            product_dto::BarcodeLookup,
            order_dto::CreateOrderRequest,
            order_dto::AddItemRequest,
            order_dto::OrderList,
            order_dto::OrderWithItems,
            report_dto::SalesReport,
            report_dto::DailySalesReport,
            report_dto::SalesBucket,
            report_dto::SalesSeries,
            report_dto::InventorySubset,
            report_dto::InventoryReport,
            report_dto::ProductPerformance,
            report_dto::PerformanceReport,
            params::Pagination,
            Meta,
            ApiResponse<Product>,
            ApiResponse<Order>,
            ApiResponse<order_dto::OrderWithItems>,
            ApiResponse<report_dto::SalesReport>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and staff management"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Products", description = "Catalog and barcode endpoints"),
        (name = "Orders", description = "Order entry and lifecycle"),
        (name = "Reports", description = "Sales and inventory reporting"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
