//! Driver tests against a real Chromium.
//!
//! Run with:
//! ```bash
//! export RUNEBATTLE_USE_REAL_CHROME=1
//! export RUNEBATTLE_CHROME=/usr/bin/google-chrome  # optional
//! cargo test -p cdp-adapter --test real_browser -- --nocapture
//! ```

use cdp_adapter::{AdapterErrorKind, BrowserDriver, CdpConfig, ChromiumDriver, TeardownReport};
use std::env;
use std::time::Duration;

fn should_run_real_tests() -> bool {
    env::var("RUNEBATTLE_USE_REAL_CHROME")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn test_config() -> CdpConfig {
    CdpConfig {
        headless: true,
        ..CdpConfig::default()
    }
}

const PAGE: &str = "data:text/html,<div id='camp-scene' class='scene active'>\
<button id='rest-btn' onclick=\"console.log('[EVENT] rest');this.remove()\">rest</button></div>\
<select id='dev-enemy-select'><option value=''></option><option value='wolf'>wolf</option></select>";

#[tokio::test]
async fn launch_query_click_and_close() {
    if !should_run_real_tests() {
        println!("Skipping real browser test (RUNEBATTLE_USE_REAL_CHROME not set)");
        return;
    }

    let driver = ChromiumDriver::launch(&test_config())
        .await
        .expect("launch chromium");
    driver.navigate(PAGE).await.expect("navigate");
    driver
        .wait_for_selector("#camp-scene.active", Duration::from_secs(5))
        .await
        .expect("camp marker");

    let rest = driver
        .query_selector("#rest-btn")
        .await
        .expect("query")
        .expect("rest button present");
    assert!(driver.is_visible(&rest).await.expect("visibility"));
    driver.click(&rest).await.expect("click");

    let err = driver.click(&rest).await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::StaleHandle);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let lines = driver.drain_console();
    assert!(lines.iter().any(|line| line == "[EVENT] rest"), "{lines:?}");
    assert!(driver.query_selector("#rest-btn").await.unwrap().is_none());

    let select = driver
        .query_selector("#dev-enemy-select")
        .await
        .unwrap()
        .expect("select present");
    driver.select_option(&select, "wolf").await.expect("select wolf");
    let select = driver
        .query_selector("#dev-enemy-select")
        .await
        .unwrap()
        .expect("select present");
    let err = driver.select_option(&select, "dragon").await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::OptionNotFound);

    assert_ne!(driver.close().await, TeardownReport::Abandoned);
}

#[tokio::test]
async fn invalid_url_is_a_navigation_error() {
    if !should_run_real_tests() {
        println!("Skipping real browser test (RUNEBATTLE_USE_REAL_CHROME not set)");
        return;
    }

    let driver = ChromiumDriver::launch(&test_config())
        .await
        .expect("launch chromium");
    let err = driver.navigate("not a url").await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Navigation);
    driver.close().await;
}
