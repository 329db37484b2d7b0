//! WebAssembly bindings for FlagFilter
//!
//! The content script's loader reads `chrome.storage.sync`, then calls
//! [`start`] with the items. From there the engine owns the page: a
//! `MutationObserver` on the body feeds it mutation records and a capture
//! phase click listener routes clicks on injected controls to it. The loader
//! forwards `chrome.storage.onChanged` events to [`on_storage_changed`].

pub mod chrome_store;
pub mod console_log;
pub mod web_dom;

use std::cell::RefCell;

use ff_core::dom::{MutationKind, MutationRecord};
use ff_core::{transform, Dom, Engine};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlInputElement, MutationObserver, MutationObserverInit, Node};

use chrome_store::{ChromeSyncStore, SYNC_AREA};
use web_dom::WebDom;

struct Runtime {
    engine: Engine<ChromeSyncStore>,
    dom: WebDom,
    observer: MutationObserver,
    _on_mutations: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    on_click: Closure<dyn FnMut(Event)>,
}

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Start filtering the current page. `items` is the result of
/// `chrome.storage.sync.get(null)`. If the document has no body yet, startup
/// is deferred to `DOMContentLoaded`.
#[wasm_bindgen]
pub fn start(items: JsValue, log_level: Option<String>) -> Result<(), JsValue> {
    console_log::init(console_log::parse_level(log_level.as_deref().unwrap_or("warn")));

    if is_running() {
        return Err(js_error("FlagFilter is already running on this page"));
    }

    let items = chrome_store::object_from_js(&items).map_err(js_error)?;
    let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
    let document = window.document().ok_or_else(|| js_error("no document"))?;

    let Some(dom) = WebDom::new(document.clone()) else {
        log::debug!("no body yet, waiting for DOMContentLoaded");
        let deferred = Closure::once_into_js(move || {
            let Some(dom) = WebDom::new(document) else {
                log::warn!("document still has no body");
                return;
            };
            if let Err(e) = boot(dom, ChromeSyncStore::new(items)) {
                log::error!("startup failed: {:?}", e);
            }
        });
        return window
            .add_event_listener_with_callback("DOMContentLoaded", deferred.unchecked_ref());
    };

    boot(dom, ChromeSyncStore::new(items))
}

fn boot(mut dom: WebDom, store: ChromeSyncStore) -> Result<(), JsValue> {
    let mut engine = Engine::new(store);
    let report = engine.full_sweep(&mut dom);
    log::info!(
        "initial sweep: {} posts, {} blocked, {} pending",
        report.examined,
        report.blocked,
        report.pending
    );

    let on_mutations = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        |records: js_sys::Array, _observer: MutationObserver| {
            let records: Vec<MutationRecord<Node>> = records
                .iter()
                .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
                .filter_map(|record| convert_record(&record))
                .collect();
            with_runtime(|rt| {
                rt.engine.handle_mutations(&mut rt.dom, &records);
            });
        },
    );

    let on_click = Closure::<dyn FnMut(Event)>::new(|event: Event| {
        let Some(target) = event.target().and_then(|t| t.dyn_into::<Node>().ok()) else {
            return;
        };
        with_runtime(|rt| {
            let resolved = transform::resolve_control(&rt.dom, &target, |_, node| {
                node.dyn_ref::<HtmlInputElement>().map(|input| input.value())
            });
            if let Some((post, action)) = resolved {
                event.prevent_default();
                event.stop_propagation();
                rt.engine.handle_control(&mut rt.dom, &post, action);
            }
        });
    });

    let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_character_data(true);
    let root = dom.root();
    observer.observe_with_options(&root, &init)?;
    root.add_event_listener_with_callback_and_bool("click", on_click.as_ref().unchecked_ref(), true)?;

    RUNTIME.with(|cell| {
        *cell.borrow_mut() = Some(Runtime {
            engine,
            dom,
            observer,
            _on_mutations: on_mutations,
            on_click,
        });
    });
    Ok(())
}

/// Run `f` against the live runtime. Does nothing when stopped or when the
/// runtime is already borrowed further up the stack.
fn with_runtime(f: impl FnOnce(&mut Runtime)) {
    RUNTIME.with(|cell| {
        let Ok(mut guard) = cell.try_borrow_mut() else {
            log::debug!("runtime busy, event dropped");
            return;
        };
        if let Some(rt) = guard.as_mut() {
            f(rt);
        }
    });
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<Node>> {
    let target = record.target()?;
    let nodes = |list: web_sys::NodeList| -> Vec<Node> {
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    };
    match record.type_().as_str() {
        "childList" => Some(MutationRecord {
            kind: MutationKind::ChildList,
            target,
            added: nodes(record.added_nodes()),
            removed: nodes(record.removed_nodes()),
        }),
        "characterData" => Some(MutationRecord::character_data(target)),
        _ => None,
    }
}

/// Restore every post and detach from the page.
#[wasm_bindgen]
pub fn stop() {
    let runtime = RUNTIME.with(|cell| cell.borrow_mut().take());
    let Some(mut rt) = runtime else {
        return;
    };

    rt.observer.disconnect();
    let root = rt.dom.root();
    if let Err(e) =
        root.remove_event_listener_with_callback_and_bool("click", rt.on_click.as_ref().unchecked_ref(), true)
    {
        log::debug!("failed to remove click listener: {:?}", e);
    }
    rt.engine.teardown(&mut rt.dom);
    log::info!("stopped");
}

#[wasm_bindgen(js_name = isRunning)]
pub fn is_running() -> bool {
    RUNTIME.with(|cell| cell.try_borrow().map(|rt| rt.is_some()).unwrap_or(true))
}

// =============================================================================
// Settings
// =============================================================================

/// Forward a `chrome.storage.onChanged` event. Changes to areas other than
/// `sync` are ignored. Returns true if the change made the engine
/// reclassify the page.
#[wasm_bindgen(js_name = onStorageChanged)]
pub fn on_storage_changed(changes: JsValue, area: String) -> Result<bool, JsValue> {
    if area != SYNC_AREA {
        return Ok(false);
    }
    let changes = chrome_store::object_from_js(&changes).map_err(js_error)?;

    let mut rerun = false;
    with_runtime(|rt| {
        rt.engine.store_mut().apply_remote(changes);
        rerun = rt.engine.pump_settings(&mut rt.dom);
    });
    Ok(rerun)
}

// =============================================================================
// Catalog
// =============================================================================

/// Search the flag catalog: `[{code, name, emoji}]`.
#[wasm_bindgen(js_name = searchFlags)]
pub fn search_flags(term: &str) -> JsValue {
    let results = js_sys::Array::new();
    for option in ff_catalog::search(term) {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"code".into(), &JsValue::from_str(&option.code));
        let _ = js_sys::Reflect::set(&entry, &"name".into(), &JsValue::from_str(&option.name));
        let _ = js_sys::Reflect::set(&entry, &"emoji".into(), &JsValue::from_str(&option.emoji));
        results.push(&entry);
    }
    results.into()
}
