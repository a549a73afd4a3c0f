// =============
// tests/integration/catalog_flow_tests.rs
// =============
//! Catalog listing, caching and the staged product save.
use std::time::Duration;

use axum::http::StatusCode;
use santorini_admin::catalog::service::{
    CREATE_FAILED, TRANSLATIONS_FAILED, UPDATE_FAILED, UPLOAD_FAILED,
};
use santorini_admin::catalog::{ImageUpload, ProductDraft};
use santorini_admin::config::Settings;
use santorini_admin::dashboard::DashboardOverview;
use santorini_admin::error::AppError;
use santorini_common::{CategoryId, Locale};

use crate::test_utils::TestApp;

fn menu_app() -> TestApp {
    let app = TestApp::new();
    app.backend.seed_menu();
    app
}

async fn category(app: &TestApp, slug: &str) -> CategoryId {
    app.state
        .catalog
        .categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.slug == slug)
        .unwrap()
        .id
}

fn draft(category_id: CategoryId, slug: &str) -> ProductDraft {
    ProductDraft {
        vietnamese_name: "Trà sữa matcha".into(),
        english_name: "Matcha milk tea".into(),
        slug: slug.into(),
        category_id: Some(category_id),
        base_price: 48000.0,
        english_description: Some("Uji matcha with fresh milk".into()),
        ..ProductDraft::default()
    }
}

fn png() -> ImageUpload {
    ImageUpload {
        file_name: "Matcha.PNG".into(),
        content_type: "image/png".into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

fn stage(err: &AppError) -> &'static str {
    match err {
        AppError::SaveFailed { stage, .. } => *stage,
        other => panic!("expected a staged save failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lists_follow_locale() {
    let app = menu_app();
    let products = app.state.catalog.products().await.unwrap();
    assert_eq!(products.len(), 3);
    // newest first
    assert_eq!(products[0].slug, "tra-sua-truyen-thong");
    assert_eq!(products[0].name.as_deref(), Some("Trà sữa truyền thống"));
    assert_eq!(products[0].category, "Trà sữa");

    let mut settings = Settings::default();
    settings.catalog.locale = Locale::En;
    let english = TestApp::with_settings(settings);
    english.backend.seed_menu();
    let products = english.state.catalog.products().await.unwrap();
    assert_eq!(products[0].name.as_deref(), Some("Classic milk tea"));
    assert_eq!(products[0].category, "Milk tea");
    let categories = english.state.catalog.categories().await.unwrap();
    assert!(categories.iter().any(|c| c.name.as_deref() == Some("Fruit tea")));
}

#[tokio::test]
async fn test_create_with_image_then_edit() {
    let app = menu_app();
    let milk = category(&app, "milk-tea").await;
    let catalog = &app.state.catalog;

    let saved = catalog
        .save_product(None, &draft(milk, "tra-sua-matcha"), Some(png()))
        .await
        .unwrap();
    assert!(saved.created);
    let url = saved.image_url.clone().unwrap();
    let path = url.split("/products/").nth(1).unwrap();
    assert!(path.starts_with("milk-tea/"));
    assert!(path.ends_with(".png"));
    assert_eq!(app.backend.object("products", path), Some(("image/png".to_string(), 4)));

    let form = catalog.edit_form(saved.id).await.unwrap();
    assert_eq!(form.english_name, "Matcha milk tea");
    assert_eq!(form.english_description.as_deref(), Some("Uji matcha with fresh milk"));
    assert_eq!(form.vietnamese_description, None);
    assert_eq!(form.image_url.as_deref(), Some(url.as_str()));

    // saving without a new file keeps the stored image
    let mut edited = form.clone();
    edited.active = false;
    let updated = catalog.save_product(Some(saved.id), &edited, None).await.unwrap();
    assert!(!updated.created);
    assert_eq!(updated.image_url, saved.image_url);
    assert_eq!(app.backend.object_count(), 1);

    let detail = catalog.product(saved.id).await.unwrap();
    assert!(!detail.is_active);
    assert_eq!(detail.translations.len(), 2);
}

#[tokio::test]
async fn test_saving_invalidates_product_list() {
    let app = menu_app();
    let fruit = category(&app, "fruit-tea").await;
    let catalog = &app.state.catalog;
    assert_eq!(catalog.products().await.unwrap().len(), 3);

    catalog.save_product(None, &draft(fruit, "tra-chanh"), None).await.unwrap();
    let products = catalog.products().await.unwrap();
    assert_eq!(products.len(), 4);
    assert_eq!(products[0].slug, "tra-chanh");
}

#[tokio::test(start_paused = true)]
async fn test_category_list_is_cached_until_stale_or_refreshed() {
    let app = menu_app();
    let catalog = &app.state.catalog;
    assert_eq!(catalog.categories().await.unwrap().len(), 2);

    app.backend.add_category("coffee", "Cà phê", "Coffee");
    assert_eq!(catalog.categories().await.unwrap().len(), 2);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(catalog.categories().await.unwrap().len(), 3);

    app.backend.add_category("smoothie", "Sinh tố", "Smoothie");
    catalog.refresh();
    assert_eq!(catalog.categories().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_upload_failure_stops_the_save() {
    let app = menu_app();
    let milk = category(&app, "milk-tea").await;
    app.backend.fail_uploads(true);

    let err = app
        .state
        .catalog
        .save_product(None, &draft(milk, "tra-sua-matcha"), Some(png()))
        .await
        .unwrap_err();
    assert_eq!(stage(&err), UPLOAD_FAILED);
    assert_eq!(err.sanitized_message(), UPLOAD_FAILED);

    app.state.catalog.refresh();
    assert_eq!(app.state.catalog.products().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_duplicate_slug_fails_at_create() {
    let app = menu_app();
    let fruit = category(&app, "fruit-tea").await;
    let err = app
        .state
        .catalog
        .save_product(None, &draft(fruit, "tra-vai"), None)
        .await
        .unwrap_err();
    assert_eq!(stage(&err), CREATE_FAILED);
}

#[tokio::test]
async fn test_update_of_missing_product_fails_at_update() {
    let app = menu_app();
    let fruit = category(&app, "fruit-tea").await;
    let err = app
        .state
        .catalog
        .save_product(Some(uuid::Uuid::new_v4()), &draft(fruit, "tra-chanh"), None)
        .await
        .unwrap_err();
    assert_eq!(stage(&err), UPDATE_FAILED);
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_translation_failure_leaves_row_behind() {
    let app = menu_app();
    let fruit = category(&app, "fruit-tea").await;
    app.backend.fail_translations(true);

    let err = app
        .state
        .catalog
        .save_product(None, &draft(fruit, "tra-chanh"), None)
        .await
        .unwrap_err();
    assert_eq!(stage(&err), TRANSLATIONS_FAILED);

    // the product row was written before the translations step failed
    app.state.catalog.refresh();
    let products = app.state.catalog.products().await.unwrap();
    let orphan = products.iter().find(|p| p.slug == "tra-chanh").unwrap();
    assert!(orphan.name.is_none());

    // retrying as an update completes the save
    app.backend.fail_translations(false);
    let saved = app
        .state
        .catalog
        .save_product(Some(orphan.id), &draft(fruit, "tra-chanh"), None)
        .await
        .unwrap();
    assert_eq!(saved.id, orphan.id);
    let form = app.state.catalog.edit_form(orphan.id).await.unwrap();
    assert_eq!(form.vietnamese_name, "Trà sữa matcha");
}

#[tokio::test]
async fn test_validation_runs_before_any_write() {
    let app = menu_app();
    let mut bad = draft(uuid::Uuid::new_v4(), "Not A Slug");
    bad.base_price = -5.0;
    let err = app
        .state
        .catalog
        .save_product(None, &bad, Some(png()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VAL_001");
    assert_eq!(app.backend.object_count(), 0);

    let oversized = ImageUpload { bytes: vec![0; 5 * 1024 * 1024 + 1], ..png() };
    let milk = category(&app, "milk-tea").await;
    let err = app
        .state
        .catalog
        .save_product(None, &draft(milk, "tra-sua-matcha"), Some(oversized))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.object_count(), 0);
}

#[tokio::test]
async fn test_dashboard_overview_of_seeded_menu() {
    let app = menu_app();
    let products = app.state.catalog.products().await.unwrap();
    let categories = app.state.catalog.categories().await.unwrap();
    let overview = DashboardOverview::build(&products, &categories);

    assert_eq!(overview.total_products, 3);
    assert_eq!(overview.active_products, 3);
    assert_eq!(overview.total_categories, 2);
    assert!((overview.average_price - 40666.666).abs() < 0.01);
    assert_eq!(overview.per_category[0].category, "Trà trái cây");
    assert_eq!(overview.per_category[0].products, 2);
}
