//! Tether Core
//!
//! This crate provides the runtime for the Tether two-way data binding
//! library. It implements:
//!
//! - Reactive data (observed objects and lists, watchers, computed properties)
//! - An expression compiler for binding source text
//! - Declarative directives (`v-text`, `v-model`, `v-on`, `v-for`, ...)
//! - A template compiler that walks a DOM subtree and installs directives
//! - In-place list reconciliation driven by array mutations
//!
//! All document access goes through the [`Dom`] trait; [`MemoryDom`] is a
//! complete in-memory document used for headless rendering and tests.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Deps, watchers and observed containers
//! - `expr`: Lexer, parser and evaluator for binding expressions
//! - `dom`: The document boundary and its in-memory implementation
//! - `directive`: One parser per directive kind
//! - `compiler`: Template walking and block rendering
//! - `vm`: The public [`ViewModel`] API
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use serde_json::json;
//! use tether_core::{MemoryDom, Options, ViewModel};
//!
//! let dom = Rc::new(MemoryDom::new());
//! let root = dom.root_with(r#"<input v-model="name"><p>Hello {{ name }}</p>"#);
//!
//! let vm = ViewModel::new(dom.clone(), root, Options::new().data(json!({ "name": "Ada" })))?;
//!
//! // Writes re-render every binding that reads the path
//! vm.set("name", "Grace");
//! assert_eq!(dom.text(root), "Hello Grace");
//!
//! // User input flows back into the data
//! let input = dom.elements_by_tag(root, "input")[0];
//! dom.type_text(input, "Linus");
//! assert_eq!(vm.get("name"), "Linus".into());
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod expr;
pub mod reactive;
pub mod scope;
pub mod value;

mod compiler;
mod directive;
mod vm;

pub use compiler::CustomDirective;
pub use config::Config;
pub use directive::Descriptor;
pub use dom::{Dom, Event, MemoryDom, NodeId, NodeKind};
pub use error::{Error, ExprError, Result};
pub use reactive::{Array, Computed, Object, Watcher};
pub use scope::Scope;
pub use value::{Function, Value};
pub use vm::{ComputedGetter, LifecycleHook, Method, Options, ViewModel, WatchCallback, WatchHandle};
