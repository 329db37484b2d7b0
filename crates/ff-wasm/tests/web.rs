//! Browser tests; run with `wasm-pack test --headless --firefox crates/ff-wasm`.

#![cfg(target_arch = "wasm32")]

use ff_core::selectors::BLOCKED_ATTR;
use ff_core::{Dom, Engine, MemoryStore, Settings, SettingsStore};
use ff_wasm::chrome_store::{object_from_js, ChromeSyncStore};
use ff_wasm::web_dom::WebDom;
use serde_json::json;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const POST: &str = r#"<div data-testid="cellInnerDiv"><article data-testid="tweet">
<div data-testid="Tweet-User-Avatar"><img src="/a.png"></div>
<div data-testid="User-Name"><a href="/alice" role="link"><span dir="auto">Alice 🇫🇷</span></a></div>
<div data-testid="tweetText" dir="auto">bonjour</div>
</article></div>"#;

fn page(markup: &str) -> WebDom {
    let document = web_sys::window().unwrap().document().unwrap();
    document.body().unwrap().set_inner_html(markup);
    WebDom::new(document).unwrap()
}

fn article(dom: &WebDom) -> web_sys::Node {
    dom.document()
        .query_selector("article")
        .unwrap()
        .unwrap()
        .into()
}

#[wasm_bindgen_test]
fn test_masks_and_restores_live_post() {
    let mut dom = page(POST);
    let settings = Settings {
        selected_flags: vec!["🇫🇷".into()],
        ..Settings::default()
    };
    let mut engine = Engine::new(MemoryStore::with_settings(&settings).unwrap());

    let report = engine.full_sweep(&mut dom);
    assert_eq!(report.blocked, 1);
    let post = article(&dom);
    assert_eq!(dom.attribute(&post, BLOCKED_ATTR).as_deref(), Some("flags"));

    let store = engine.teardown(&mut dom);
    assert_eq!(store.get_all().unwrap().flag_block_counts["🇫🇷"], 1);
    assert!(dom.attribute(&post, BLOCKED_ATTR).is_none());
    assert!(dom.document().body().unwrap().inner_html().contains("Alice 🇫🇷"));
}

#[wasm_bindgen_test]
fn test_remote_changes_reach_the_mirror() {
    let mut store = ChromeSyncStore::new(Default::default());
    let rx = store.subscribe();

    let changes = js_sys::JSON::parse(r#"{"blockedUsers": {"newValue": ["bob"]}, "x": {"oldValue": 1}}"#).unwrap();
    store.apply_remote(object_from_js(&changes).unwrap());

    assert_eq!(store.get_all().unwrap().blocked_users, vec!["bob"]);
    let keys: Vec<String> = rx.try_iter().map(|change| change.key).collect();
    assert_eq!(keys, vec!["blockedUsers"]);
}

#[wasm_bindgen_test]
fn test_object_from_js_rejects_nothing() {
    assert!(object_from_js(&JsValue::UNDEFINED).unwrap().is_empty());
    let map = object_from_js(&js_sys::JSON::parse(r#"{"handlingMode": "block"}"#).unwrap()).unwrap();
    assert_eq!(map["handlingMode"], json!("block"));
}

#[wasm_bindgen_test]
fn test_search_flags_exports_objects() {
    let results = js_sys::Array::from(&ff_wasm::search_flags("japan"));
    assert_eq!(results.length(), 1);
    let emoji = js_sys::Reflect::get(&results.get(0), &"emoji".into()).unwrap();
    assert_eq!(emoji.as_string().as_deref(), Some("🇯🇵"));
}
