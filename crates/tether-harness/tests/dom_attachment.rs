#![forbid(unsafe_code)]

//! Attaching and detaching instance elements, with and without effects.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tether::prelude::*;
use tether_harness::{EventLog, Fixture, assert_markup};

// ============================================================================
// Placement
// ============================================================================

#[test]
fn append_to_places_element_and_defers_callback() {
    let fx = Fixture::new();
    let log = EventLog::new();
    let app = fx.mount("app");
    let vm = fx.vm(Options::new().tag("p")).unwrap();

    assert_eq!(vm.append_to("#app", log.callback("done")).unwrap(), TransitionCode::Skip);
    assert_markup!(fx.doc(), app, r#"<div id="app"><p></p></div>"#);
    assert!(log.is_empty());

    fx.tick();
    assert_eq!(log.take(), vec!["done"]);
}

#[test]
fn before_and_after_build_sibling_order() {
    let fx = Fixture::new();
    let list = fx.mount("list");
    let doc = fx.doc();
    let anchor = doc.create_element("hr");
    doc.append_child(list, anchor).unwrap();

    let vm = |tag: &str| fx.vm(Options::new().tag(tag)).unwrap();
    let (a, b, c) = (vm("a"), vm("b"), vm("i"));
    a.before(anchor, None).unwrap();
    b.after(anchor, None).unwrap();
    c.after("#list > hr", None).unwrap();

    assert_markup!(doc, list, r#"<div id="list"><a></a><hr></hr><i></i><b></b></div>"#);
}

#[test]
fn moving_an_attached_element() {
    let fx = Fixture::new();
    let from = fx.mount("from");
    let to = fx.mount("to");
    let vm = fx.vm(Options::new().tag("span")).unwrap();

    vm.append_to(from, None).unwrap();
    vm.append_to(to, None).unwrap();
    assert_markup!(fx.doc(), from, r#"<div id="from"></div>"#);
    assert_markup!(fx.doc(), to, r#"<div id="to"><span></span></div>"#);
}

#[test]
fn remove_detached_element_is_harmless() {
    let fx = Fixture::new();
    let log = EventLog::new();
    let vm = fx.vm(Options::new()).unwrap();

    assert_eq!(vm.remove(log.callback("removed")).unwrap(), TransitionCode::Skip);
    fx.tick();
    assert_eq!(log.take(), vec!["removed"]);
    assert_eq!(fx.doc().parent_node(vm.el().unwrap()), None);
}

#[test]
fn bad_targets_are_errors() {
    let fx = Fixture::new();
    let vm = fx.vm(Options::new()).unwrap();
    assert!(matches!(
        vm.append_to("#missing", None),
        Err(VmError::Dom(DomError::NotFound(_)))
    ));
    let orphan = fx.doc().create_element("div");
    assert_eq!(vm.after(orphan, None), Err(VmError::Dom(DomError::NoParent(orphan))));
    assert_eq!(fx.doc().parent_node(vm.el().unwrap()), None);
}

// ============================================================================
// Effects
// ============================================================================

#[test]
fn transition_attribute_uses_css_classes() {
    let fx = Fixture::new();
    let app = fx.mount("app");
    let vm = fx.vm(Options::new()).unwrap();
    let el = vm.el().unwrap();
    let doc = fx.doc();
    doc.set_attribute(el, "v-transition", "slide").unwrap();

    assert_eq!(vm.append_to(app, None).unwrap(), TransitionCode::CssEnter);
    assert!(doc.has_class(el, "slide-enter"));
    fx.tick();
    assert!(!doc.has_class(el, "slide-enter"));

    assert_eq!(vm.remove(None).unwrap(), TransitionCode::CssLeave);
    assert!(doc.has_class(el, "slide-leave"));
    assert!(doc.is_connected(el));
    fx.tick();
    assert!(!doc.is_connected(el));
}

#[test]
fn empty_transition_attribute_uses_configured_classes() {
    let fx = Fixture::with_config(Config::default().with_transition_classes("in", "out"));
    let app = fx.mount("app");
    let vm = fx.vm(Options::new()).unwrap();
    let el = vm.el().unwrap();
    fx.doc().set_attribute(el, "v-transition", "").unwrap();

    vm.append_to(app, None).unwrap();
    assert_eq!(fx.doc().classes(el), vec!["in"]);
}

#[test]
fn css_leave_of_detached_element_skips() {
    let fx = Fixture::new();
    let vm = fx.vm(Options::new().effect(TransitionEffect::css("fade"))).unwrap();
    assert_eq!(vm.remove(None).unwrap(), TransitionCode::CssSkip);
    assert!(!fx.doc().has_class(vm.el().unwrap(), "fade-leave"));
}

#[test]
fn js_effect_controls_completion() {
    let fx = Fixture::new();
    let app = fx.mount("app");
    let held: Rc<RefCell<Option<Done>>> = Rc::default();
    let slot = Rc::clone(&held);
    let effect = JsEffect::new().on_enter(move |_, done| *slot.borrow_mut() = Some(done));
    let vm = fx
        .vm(Options::new().register_effect("slow", effect).hook(
            LifecycleHook::Attached,
            |vm| vm.set("attached", json!(true)).unwrap(),
        ))
        .unwrap();
    let el = vm.el().unwrap();
    fx.doc().set_attribute(el, "v-effect", "slow").unwrap();

    assert_eq!(vm.append_to(app, None).unwrap(), TransitionCode::JsEnter);
    assert!(!fx.doc().is_connected(el), "waits for the effect");
    assert_eq!(vm.get("attached"), None);

    let done = held.borrow_mut().take().unwrap();
    done.finish().unwrap();
    assert!(fx.doc().is_connected(el));
    assert_eq!(vm.get("attached"), Some(json!(true)));

    assert_eq!(vm.remove(None).unwrap(), TransitionCode::JsSkipLeave);
    assert!(!fx.doc().is_connected(el));
}

#[test]
fn unknown_effect_id_skips() {
    let fx = Fixture::new();
    let app = fx.mount("app");
    let vm = fx.vm(Options::new()).unwrap();
    fx.doc().set_attribute(vm.el().unwrap(), "v-effect", "nope").unwrap();
    assert_eq!(vm.append_to(app, None).unwrap(), TransitionCode::JsSkip);
    assert!(fx.doc().is_connected(vm.el().unwrap()));
}

#[test]
fn attaching_during_compile_skips_effects() {
    let fx = Fixture::new();
    let app = fx.mount("app");
    let codes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&codes);
    let vm = fx
        .vm(Options::new()
            .effect(TransitionEffect::css("fade"))
            .hook(LifecycleHook::Ready, move |vm| {
                sink.borrow_mut().push(vm.append_to(app, None).unwrap());
            }))
        .unwrap();
    assert_eq!(*codes.borrow(), vec![TransitionCode::Init]);
    assert!(fx.doc().classes(vm.el().unwrap()).is_empty());
}
