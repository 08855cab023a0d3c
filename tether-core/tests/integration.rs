//! Integration Tests for the Binding Runtime
//!
//! These tests drive complete view models over an in-memory document and
//! verify that data, templates and user input stay in sync.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use tether_core::expr::{self, compile, compile_or_noop};
use tether_core::reactive::{observe, Mutation, ReactiveContext};
use tether_core::{
    Array, Config, Dom, Error, ExprError, MemoryDom, NodeId, Object, Options, Scope, Value,
    ViewModel, Watcher,
};

fn mount(markup: &str, options: Options) -> (Rc<MemoryDom>, ViewModel) {
    let dom = Rc::new(MemoryDom::new());
    let root = dom.root_with(markup);
    let vm = ViewModel::new(dom.clone(), root, options).unwrap();
    (dom, vm)
}

fn texts(dom: &MemoryDom, root: NodeId, tag: &str) -> Vec<String> {
    dom.elements_by_tag(root, tag)
        .into_iter()
        .map(|node| dom.text(node))
        .collect()
}

fn array(vm: &ViewModel, path: &str) -> Array {
    vm.get(path).as_array().cloned().unwrap()
}

fn counter() -> (Rc<Cell<usize>>, impl Fn(&ViewModel, &Value, &Value)) {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    (calls, move |_: &ViewModel, _: &Value, _: &Value| seen.set(seen.get() + 1))
}

// ----------------------------------------------------------------------------
// Reactivity
// ----------------------------------------------------------------------------

/// Test that a write re-evaluates each reader exactly once, and an equal
/// write re-evaluates nothing.
#[test]
fn set_reevaluates_readers_once() {
    let data = Object::from_pairs([("count", 1)]);
    observe(&Value::Object(data.clone()));

    let reader = data.clone();
    let watcher = Watcher::new(
        "count",
        move || reader.get("count"),
        |_: &Value, _: &Value, _: Option<&Mutation>| {},
    );
    assert_eq!(watcher.run_count(), 1);

    data.set("count", Value::from(2));
    assert_eq!(watcher.run_count(), 2);

    // Same value: no notification
    data.set("count", Value::from(2));
    assert_eq!(watcher.run_count(), 2);
}

/// Test that a property read only by an earlier evaluation no longer
/// triggers the callback.
#[test]
fn stale_dependencies_do_not_fire() {
    let (_, vm) = mount(
        "",
        Options::new().data(json!({ "useA": true, "a": 1, "b": 2 })),
    );
    let (calls, callback) = counter();
    vm.watch("useA ? a : b", false, callback);

    vm.set("useA", false);
    assert_eq!(calls.get(), 1);

    // `a` was read before the switch but not after it
    vm.set("a", 10);
    assert_eq!(calls.get(), 1);

    vm.set("b", 20);
    assert_eq!(calls.get(), 2);
}

/// Test that a value written to a dotted path reads back unchanged.
#[test]
fn set_then_get_round_trips() {
    let (_, vm) = mount("", Options::new().data(json!({ "a": { "b": 0 } })));
    vm.set("a.b", "x");
    assert_eq!(vm.get("a.b"), Value::str("x"));

    vm.set("list", json!([1, 2]));
    vm.set("list.1", 5);
    assert_eq!(vm.get_copy("list").to_json(), json!([1, 5]));
}

/// Test that a copy is detached from the live data.
#[test]
fn get_copy_is_a_snapshot() {
    let (_, vm) = mount("", Options::new().data(json!({ "user": { "name": "ada" } })));
    let copy = vm.get_copy("user");
    vm.set("user.name", "grace");
    assert_eq!(copy.to_json(), json!({ "name": "ada" }));
}

/// Test that destroy may be repeated and reset_all restores every key.
#[test]
fn destroy_twice_and_reset_all() {
    let (_, vm) = mount(
        "<p>{{ title }}</p>",
        Options::new().data(json!({ "title": "t", "items": [1, 2], "nested": { "x": 1 } })),
    );
    vm.set("title", "changed");
    array(&vm, "items").push([Value::from(3)]);
    vm.set("nested.x", 9);
    vm.set("extra", true);

    vm.reset_all();
    assert_eq!(vm.get_copy("title").to_json(), json!("t"));
    assert_eq!(vm.get_copy("items").to_json(), json!([1, 2]));
    assert_eq!(vm.get_copy("nested").to_json(), json!({ "x": 1 }));

    vm.destroy();
    vm.destroy();
    assert!(vm.is_destroyed());
}

/// Test that construction rejects a scope that is not an object.
#[test]
fn construction_errors_are_returned() {
    let dom = Rc::new(MemoryDom::new());
    let root = dom.root_with("");
    let result = ViewModel::new(dom.clone(), root, Options::new().data(json!("nope")));
    assert!(matches!(result, Err(Error::InvalidScope("string"))));

    let comment = dom.create_comment("x");
    let result = ViewModel::new(dom, comment, Options::new());
    assert!(matches!(result, Err(Error::InvalidRoot)));
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

/// Test that member access and addition evaluate against a scope.
#[test]
fn expression_evaluates_against_scope() {
    let data = Value::from(json!({ "a": 1, "b": { "c": 2 } }));
    observe(&data);
    let scope = Scope::root(data.as_object().cloned().unwrap());

    let getter = compile("a + b.c").unwrap();
    assert_eq!(getter.get(&scope), Value::from(3));
}

/// Test that statement keywords are rejected without panicking.
#[test]
fn disallowed_keyword_degrades_to_undefined() {
    assert!(matches!(
        compile("let a = 1"),
        Err(ExprError::DisallowedKeyword(_))
    ));

    let scope = Scope::root(Object::new());
    assert_eq!(compile_or_noop("let a = 1").get(&scope), Value::Undefined);
}

/// Test that a broken binding leaves the rest of the template working.
#[test]
fn broken_binding_leaves_siblings_alone() {
    let (dom, vm) = mount(
        r#"<p v-text="let x = 1">keep</p><span>{{ msg }}</span><i v-nope="1">i</i>"#,
        Options::new().data(json!({ "msg": "ok" })),
    );
    assert_eq!(texts(&dom, vm.root(), "span"), vec!["ok"]);
    let italic = dom.elements_by_tag(vm.root(), "i")[0];
    assert!(!dom.has_attribute(italic, "v-nope"));
}

// ----------------------------------------------------------------------------
// Watches
// ----------------------------------------------------------------------------

/// Test that a shallow watch ignores nested mutation while a deep watch
/// sees it, and the item's own binding still updates.
#[test]
fn shallow_and_deep_watch() {
    let (dom, vm) = mount(
        r#"<ul><li v-for="item in items">{{ item.text }}</li></ul>"#,
        Options::new().data(json!({ "items": [{ "text": "a" }] })),
    );
    let (shallow, shallow_cb) = counter();
    let (deep, deep_cb) = counter();
    vm.watch("items", false, shallow_cb);
    vm.watch("items", true, deep_cb);

    vm.set("items.0.text", "b");

    assert_eq!(shallow.get(), 0);
    assert_eq!(deep.get(), 1);
    assert_eq!(texts(&dom, vm.root(), "li"), vec!["b"]);
}

/// Test that declarative watches receive the instance and both values.
#[test]
fn declarative_watch_receives_values() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let (_, vm) = mount(
        "",
        Options::new()
            .data(json!({ "n": 1 }))
            .watch("n", false, move |vm, new, old| {
                log.borrow_mut()
                    .push((new.to_display_string(), old.to_display_string(), vm.get("n")));
            }),
    );
    vm.set("n", 2);
    assert_eq!(
        *seen.borrow(),
        vec![("2".to_string(), "1".to_string(), Value::from(2))]
    );
}

// ----------------------------------------------------------------------------
// Lists
// ----------------------------------------------------------------------------

/// Test that push appends exactly one block and leaves the others in place.
#[test]
fn push_appends_one_block() {
    let (dom, vm) = mount(
        r#"<ul><li v-for="n in items">{{ n }}</li></ul>"#,
        Options::new().data(json!({ "items": [1, 2, 3] })),
    );
    let before = dom.elements_by_tag(vm.root(), "li");

    array(&vm, "items").push([Value::from(4)]);

    let after = dom.elements_by_tag(vm.root(), "li");
    assert_eq!(after.len(), 4);
    assert_eq!(&after[..3], &before[..]);
    assert_eq!(dom.text(after[3]), "4");
}

/// Test that splice removes exactly the spliced block and rewrites indexes.
#[test]
fn splice_removes_one_block_and_reindexes() {
    let (dom, vm) = mount(
        r#"<ul><li v-for="n in items">{{ $index }}-{{ n }}</li></ul>"#,
        Options::new().data(json!({ "items": [1, 2, 3] })),
    );
    let before = dom.elements_by_tag(vm.root(), "li");

    array(&vm, "items").splice(1, 1, []);

    let after = dom.elements_by_tag(vm.root(), "li");
    assert_eq!(after, vec![before[0], before[2]]);
    assert_eq!(texts(&dom, vm.root(), "li"), vec!["0-1", "1-3"]);
}

/// Test that item handlers see the item and its current index.
#[test]
fn list_item_events_use_item_scope() {
    let removed = Rc::new(RefCell::new(Vec::new()));
    let log = removed.clone();
    let (dom, vm) = mount(
        r#"<ul><li v-for="(todo, i) in todos"><button v-on:click="remove(todo, i)">x</button>{{ todo }}</li></ul>"#,
        Options::new()
            .data(json!({ "todos": ["a", "b", "c"] }))
            .method("remove", move |vm, args| {
                log.borrow_mut().push(args[0].to_display_string());
                if let Some(todos) = vm.get("todos").as_array() {
                    todos.splice(args[1].to_number() as isize, 1, []);
                }
                Value::Undefined
            }),
    );

    let buttons = dom.elements_by_tag(vm.root(), "button");
    dom.click(buttons[1]);
    assert_eq!(texts(&dom, vm.root(), "li"), vec!["xa", "xc"]);

    // The third item moved to index 1
    let buttons = dom.elements_by_tag(vm.root(), "button");
    dom.click(buttons[1]);
    assert_eq!(texts(&dom, vm.root(), "li"), vec!["xa"]);
    assert_eq!(*removed.borrow(), vec!["b", "c"]);
}

/// Test that insert and remove hooks run for structural blocks.
#[test]
fn structural_hooks_run() {
    let inserted = Rc::new(Cell::new(0));
    let removed = Rc::new(Cell::new(0));
    let (on_insert, on_remove) = (inserted.clone(), removed.clone());
    let (_, vm) = mount(
        r#"<ul><li v-for="n in items">{{ n }}</li></ul>"#,
        Options::new()
            .data(json!({ "items": [1, 2] }))
            .on_insert(move |_, _| on_insert.set(on_insert.get() + 1))
            .on_remove(move |_, _| on_remove.set(on_remove.get() + 1)),
    );
    assert_eq!(inserted.get(), 2);

    array(&vm, "items").pop();
    assert_eq!(removed.get(), 1);
}

// ----------------------------------------------------------------------------
// Two-way binding
// ----------------------------------------------------------------------------

/// Test the text input round trip: input to model, model to input.
#[test]
fn text_input_round_trip() {
    let (dom, vm) = mount(
        r#"<input v-model="name"><p>{{ name }}</p>"#,
        Options::new().data(json!({ "name": "abc" })),
    );
    let input = dom.elements_by_tag(vm.root(), "input")[0];
    assert_eq!(dom.value(input), "abc");

    dom.type_text(input, "xyz");
    assert_eq!(vm.get("name"), Value::str("xyz"));
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["xyz"]);

    vm.set("name", "qrs");
    assert_eq!(dom.value(input), "qrs");
}

/// Test that typing is ignored while an input method is composing and
/// commits once composition ends.
#[test]
fn composition_defers_commit() {
    let (dom, vm) = mount(
        r#"<input v-model="q">"#,
        Options::new().data(json!({ "q": "" })),
    );
    let input = dom.elements_by_tag(vm.root(), "input")[0];

    dom.fire(input, "compositionstart");
    dom.type_text(input, "か");
    assert_eq!(vm.get("q"), Value::str(""));

    dom.fire(input, "compositionend");
    assert_eq!(vm.get("q"), Value::str("か"));
}

/// Test that a directive whose update writes back to its own expression
/// sees the written value once the running update returns.
#[test]
fn write_back_from_update_is_not_lost() {
    let dom = Rc::new(MemoryDom::new());
    let root = dom.root_with(r#"<input v-model="n" v-upper="n">"#);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let typist = dom.clone();
    let record = seen.clone();
    let options = Options::new()
        .data(json!({ "n": "" }))
        .directive("upper", move |_, node, new, _| {
            let text = new.to_display_string();
            record.borrow_mut().push(text.clone());
            let upper = text.to_uppercase();
            if upper != text {
                // Simulated user input re-enters this directive
                typist.type_text(node, &upper);
            }
        });
    let vm = ViewModel::new(dom.clone(), root, options).unwrap();
    let input = dom.elements_by_tag(root, "input")[0];

    vm.set("n", "abc");
    assert_eq!(vm.get("n"), Value::str("ABC"));
    assert_eq!(dom.value(input), "ABC");
    assert_eq!(seen.borrow().last().map(String::as_str), Some("ABC"));
}

/// Test that number and trim coerce committed input.
#[test]
fn model_modifiers_coerce() {
    let (dom, vm) = mount(
        r#"<input v-model.number="age"><input v-model.trim="name">"#,
        Options::new().data(json!({ "age": 1, "name": "" })),
    );
    let inputs = dom.elements_by_tag(vm.root(), "input");
    dom.type_text(inputs[0], "42");
    dom.type_text(inputs[1], "  ada ");
    assert_eq!(vm.get("age"), Value::from(42));
    assert_eq!(vm.get("name"), Value::str("ada"));
}

/// Test that lazy binding commits on change only.
#[test]
fn lazy_model_waits_for_change() {
    let (dom, vm) = mount(
        r#"<input v-model.lazy="q">"#,
        Options::new().data(json!({ "q": "" })),
    );
    let input = dom.elements_by_tag(vm.root(), "input")[0];
    dom.type_text(input, "typed");
    assert_eq!(vm.get("q"), Value::str(""));
    dom.change_value(input, "typed");
    assert_eq!(vm.get("q"), Value::str("typed"));
}

/// Test that a debounced binding commits once after a burst of input.
#[test]
fn debounced_model_collapses_bursts() {
    let (dom, vm) = mount(
        r#"<input v-model.debounce.100="q">"#,
        Options::new().data(json!({ "q": "" })),
    );
    let (commits, callback) = counter();
    vm.watch("q", false, callback);

    let input = dom.elements_by_tag(vm.root(), "input")[0];
    dom.type_text(input, "a");
    dom.advance(50);
    dom.type_text(input, "ab");
    dom.advance(50);
    assert_eq!(commits.get(), 0);
    assert_eq!(dom.pending_timers(), 1);

    dom.advance(60);
    assert_eq!(commits.get(), 1);
    assert_eq!(vm.get("q"), Value::str("ab"));
}

/// Test that checkboxes bind to a boolean or collect into an array.
#[test]
fn checkbox_bindings() {
    let (dom, vm) = mount(
        r#"<input type="checkbox" v-model="agree"><input type="checkbox" value="red" v-model="colors"><input type="checkbox" value="blue" v-model="colors">"#,
        Options::new().data(json!({ "agree": false, "colors": ["blue"] })),
    );
    let boxes = dom.elements_by_tag(vm.root(), "input");
    assert!(!dom.checked(boxes[1]));
    assert!(dom.checked(boxes[2]));

    dom.click(boxes[0]);
    assert_eq!(vm.get("agree"), Value::Bool(true));

    dom.click(boxes[1]);
    dom.click(boxes[2]);
    assert_eq!(vm.get_copy("colors").to_json(), json!(["red"]));

    vm.set("agree", false);
    assert!(!dom.checked(boxes[0]));
}

/// Test that radios select by value and write the chosen value back.
#[test]
fn radio_bindings() {
    let (dom, vm) = mount(
        r#"<input type="radio" value="a" v-model="pick"><input type="radio" value="b" v-model="pick">"#,
        Options::new().data(json!({ "pick": "a" })),
    );
    let radios = dom.elements_by_tag(vm.root(), "input");
    assert!(dom.checked(radios[0]));

    dom.click(radios[1]);
    assert_eq!(vm.get("pick"), Value::str("b"));

    vm.set("pick", "a");
    assert!(dom.checked(radios[0]));
    assert!(!dom.checked(radios[1]));
}

/// Test that single and multiple selects render and collect choices.
#[test]
fn select_bindings() {
    let (dom, vm) = mount(
        r#"<select v-model="one"><option value="x">X</option><option value="y">Y</option></select><select multiple v-model="many"><option value="x">X</option><option value="y">Y</option><option value="z">Z</option></select>"#,
        Options::new().data(json!({ "one": "y", "many": ["x", "z"] })),
    );
    let selects = dom.elements_by_tag(vm.root(), "select");
    assert_eq!(dom.value(selects[0]), "y");
    let options = dom.elements_by_tag(selects[1], "option");
    let chosen: Vec<bool> = options.iter().map(|option| dom.selected(*option)).collect();
    assert_eq!(chosen, vec![true, false, true]);

    dom.choose(selects[1], &["y"]);
    assert_eq!(vm.get_copy("many").to_json(), json!(["y"]));
}

/// Test that a model bound to a non-assignable expression is read-only.
#[test]
fn unassignable_model_is_read_only() {
    let (dom, vm) = mount(
        r#"<input v-model="a + b">"#,
        Options::new().data(json!({ "a": 1, "b": 2 })),
    );
    let input = dom.elements_by_tag(vm.root(), "input")[0];
    assert_eq!(dom.value(input), "3");
    dom.type_text(input, "7");
    assert_eq!(vm.get("a"), Value::from(1));
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Test that `$event` is substituted and key modifiers filter events.
#[test]
fn event_arguments_and_key_filters() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let (dom, vm) = mount(
        r#"<input v-on:keyup.enter="submit(label, $event)">"#,
        Options::new()
            .data(json!({ "label": "go" }))
            .method("submit", move |_, args| {
                let event_type = args[1]
                    .as_object()
                    .map(|event| event.get_untracked("type").to_display_string())
                    .unwrap_or_default();
                log.borrow_mut().push(format!("{}:{}", args[0].to_display_string(), event_type));
                Value::Undefined
            }),
    );
    let input = dom.elements_by_tag(vm.root(), "input")[0];
    dom.fire_key(input, "keyup", 65);
    dom.fire_key(input, "keyup", 13);
    assert_eq!(*seen.borrow(), vec!["go:keyup"]);
}

/// Test that replacing the handler function rebinds the listener.
#[test]
fn handler_swap_rebinds_listener() {
    let hits = Rc::new(RefCell::new(Vec::new()));
    let (first, second) = (hits.clone(), hits.clone());
    let (dom, vm) = mount(
        r#"<button v-on:click="handler">b</button>"#,
        Options::new()
            .method("one", move |_, _| {
                first.borrow_mut().push(1);
                Value::Undefined
            })
            .method("two", move |_, _| {
                second.borrow_mut().push(2);
                Value::Undefined
            }),
    );
    vm.set("handler", vm.get("one"));
    let button = dom.elements_by_tag(vm.root(), "button")[0];
    dom.click(button);

    vm.set("handler", vm.get("two"));
    dom.click(button);

    assert_eq!(*hits.borrow(), vec![1, 2]);
    assert_eq!(dom.listener_count(), 1);
}

/// Test that the object form binds several events at once.
#[test]
fn object_form_binds_many_events() {
    let (dom, vm) = mount(
        r#"<div v-on="{ click: inc, dblclick: inc }">d</div>"#,
        Options::new()
            .data(json!({ "n": 0 }))
            .method("inc", |vm, _| {
                vm.set("n", vm.get("n").to_number() + 1.0);
                Value::Undefined
            }),
    );
    let div = dom.elements_by_tag(vm.root(), "div")[0];
    dom.fire(div, "click");
    dom.fire(div, "dblclick");
    assert_eq!(vm.get("n"), Value::from(2));
}

// ----------------------------------------------------------------------------
// Other directives
// ----------------------------------------------------------------------------

/// Test conditional rendering with an else branch.
#[test]
fn conditional_branches() {
    let (dom, vm) = mount(
        r#"<p v-if="user">hi {{ user.name }}</p><p v-else>sign in</p>"#,
        Options::new().data(json!({ "user": null })),
    );
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["sign in"]);

    vm.set("user", json!({ "name": "ada" }));
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["hi ada"]);

    vm.set("user.name", "grace");
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["hi grace"]);
}

/// Test attribute, class, style and visibility bindings.
#[test]
fn attribute_and_visibility_bindings() {
    let (dom, vm) = mount(
        r#"<a v-bind:href="url" v-bind:class="{ active: on }" v-show="visible">link</a>"#,
        Options::new().data(json!({ "url": "/a", "on": false, "visible": true })),
    );
    let link = dom.elements_by_tag(vm.root(), "a")[0];
    assert_eq!(dom.get_attribute(link, "href").as_deref(), Some("/a"));
    assert!(!dom.has_class(link, "active"));

    vm.set_many(json!({ "url": "/b", "on": true, "visible": false }));
    assert_eq!(dom.get_attribute(link, "href").as_deref(), Some("/b"));
    assert!(dom.has_class(link, "active"));
    assert_eq!(dom.get_attribute(link, "style").as_deref(), Some("display: none"));

    vm.set("visible", true);
    assert!(!dom.has_attribute(link, "style"));
}

/// Test triple-brace interpolation renders markup.
#[test]
fn html_interpolation() {
    let (dom, vm) = mount(
        r#"<div>{{{ markup }}}</div>"#,
        Options::new().data(json!({ "markup": "<b>bold</b>" })),
    );
    assert_eq!(texts(&dom, vm.root(), "b"), vec!["bold"]);

    vm.set("markup", "<i>it</i>");
    assert!(dom.elements_by_tag(vm.root(), "b").is_empty());
    assert_eq!(texts(&dom, vm.root(), "i"), vec!["it"]);
}

/// Test element references and custom directives.
#[test]
fn element_refs_and_custom_directives() {
    let (dom, vm) = mount(
        r#"<span v-el="label" v-upper="word"></span>"#,
        Options::new()
            .data(json!({ "word": "hey" }))
            .directive("upper", |dom, node, new, _| {
                dom.set_text(node, &new.to_display_string().to_uppercase());
            }),
    );
    let span = vm.element("label").unwrap();
    assert_eq!(dom.text(span), "HEY");

    vm.set("word", "yo");
    assert_eq!(dom.text(span), "YO");

    vm.destroy();
    assert_eq!(vm.element("label"), None);
}

/// Test that computed properties follow their inputs.
#[test]
fn computed_properties_render() {
    let (dom, vm) = mount(
        "<p>{{ full }}</p>",
        Options::new()
            .data(json!({ "first": "Ada", "last": "Lovelace" }))
            .computed("full", |vm| {
                Value::from(format!(
                    "{} {}",
                    vm.get("first").to_display_string(),
                    vm.get("last").to_display_string()
                ))
            }),
    );
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["Ada Lovelace"]);
    vm.set("last", "Byron");
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["Ada Byron"]);
}

/// Test that a custom prefix and deferred mounting are honoured.
#[test]
fn config_prefix_and_lazy_mount() {
    let config = Config::from_json(r#"{ "prefix": "t-", "lazy": true }"#).unwrap();
    let (dom, vm) = mount(
        r#"<p t-text="msg">raw</p>"#,
        Options::new().data(json!({ "msg": "bound" })).config(config),
    );
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["raw"]);
    vm.mount();
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["bound"]);
}

/// Test that destroy detaches every listener and watcher.
#[test]
fn destroy_releases_bindings() {
    let (dom, vm) = mount(
        r#"<input v-model="q"><button v-on:click="go">b</button><p>{{ q }}</p>"#,
        Options::new()
            .data(json!({ "q": "a" }))
            .method("go", |_, _| Value::Undefined),
    );
    assert!(dom.listener_count() > 0);
    vm.destroy();
    assert_eq!(dom.listener_count(), 0);

    vm.set("q", "b");
    assert_eq!(texts(&dom, vm.root(), "p"), vec!["a"]);
}

/// Test that reads outside any evaluation are not tracked.
#[test]
fn untracked_reads_collect_nothing() {
    let (_, vm) = mount("", Options::new().data(json!({ "x": 1 })));
    assert!(!ReactiveContext::is_active());
    let value = ReactiveContext::untracked(|| vm.get("x"));
    assert_eq!(value, Value::from(1));
    assert!(expr::parse("x +").is_err());
}
