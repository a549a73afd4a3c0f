//! Dashboard overview figures and the sidebar navigation.
use std::collections::HashMap;

use serde::Serialize;

use santorini_common::{Category, ProductSummary};

pub const COMING_SOON_PATH: &str = "/dashboard/coming-soon";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub products: usize,
}

/// Headline numbers for the dashboard home page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub total_products: usize,
    pub active_products: usize,
    pub inactive_products: usize,
    pub total_categories: usize,
    /// Mean base price over all products; zero for an empty catalog
    pub average_price: f64,
    /// Most populated category first, ties by name
    pub per_category: Vec<CategoryCount>,
}

impl DashboardOverview {
    pub fn build(products: &[ProductSummary], categories: &[Category]) -> Self {
        let active_products = products.iter().filter(|p| p.is_active).count();
        let average_price = if products.is_empty() {
            0.0
        } else {
            products.iter().map(|p| p.base_price).sum::<f64>() / products.len() as f64
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for product in products {
            *counts.entry(product.category.as_str()).or_default() += 1;
        }
        let mut per_category: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, products)| CategoryCount { category: category.to_string(), products })
            .collect();
        per_category.sort_by(|a, b| b.products.cmp(&a.products).then_with(|| a.category.cmp(&b.category)));

        Self {
            total_products: products.len(),
            active_products,
            inactive_products: products.len() - active_products,
            total_categories: categories.len(),
            average_price,
            per_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub title: &'static str,
    pub url: &'static str,
    pub coming_soon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavGroup {
    pub title: &'static str,
    pub items: Vec<NavItem>,
}

fn item(title: &'static str, url: &'static str) -> NavItem {
    NavItem { title, url, coming_soon: false }
}

fn coming_soon(title: &'static str) -> NavItem {
    NavItem { title, url: COMING_SOON_PATH, coming_soon: true }
}

/// Sidebar entries
pub fn navigation() -> Vec<NavGroup> {
    vec![
        NavGroup {
            title: "General",
            items: vec![item("Dashboard", "/"), item("Products", "/products")],
        },
        NavGroup {
            title: "Management",
            items: vec![coming_soon("Invoice"), coming_soon("Users")],
        },
    ]
}
