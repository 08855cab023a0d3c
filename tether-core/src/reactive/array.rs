//! Observable Lists
//!
//! An [`Array`] is a shared, ordered list whose in-place mutations are
//! announced through its observer's container dep. Only the mutating
//! operations are intercepted; reads go through plain accessors.
//!
//! Every mutation performs the operation, observes any inserted items, then
//! notifies with a [`Mutation`] describing what happened, which is what lets
//! a list renderer patch instead of rebuilding.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

use super::observer::{depend_container, observe, ArrayMethod, Mutation, Observer};
use super::subscriber::next_container_id;

/// A shared handle to an observable list.
#[derive(Clone)]
pub struct Array {
    inner: Rc<ArrayInner>,
}

struct ArrayInner {
    id: u64,
    items: RefCell<Vec<Value>>,
    observer: OnceCell<Observer>,
}

impl Array {
    /// Create an empty, unobserved list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                id: next_container_id(),
                items: RefCell::new(items),
                observer: OnceCell::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn observer(&self) -> Option<&Observer> {
        self.inner.observer.get()
    }

    pub(crate) fn attach_observer(&self) -> bool {
        self.inner.observer.set(Observer::new()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register the container dep with the evaluating watcher.
    pub fn depend(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }

    /// Read an item; a container item registers its own container dep.
    pub fn get(&self, index: usize) -> Value {
        let value = self.get_untracked(index);
        depend_container(&value);
        value
    }

    pub fn get_untracked(&self, index: usize) -> Value {
        self.inner
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn to_vec_untracked(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Position of the first item strictly equal to `value`.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.inner.items.borrow().iter().position(|item| item == value)
    }

    fn announce(&self, method: ArrayMethod, args: Vec<Value>, inserted: &[Value]) {
        let Some(observer) = self.observer() else {
            return;
        };
        for item in inserted {
            observe(item);
        }
        let mutation = Mutation {
            array_id: self.id(),
            method,
            args,
        };
        observer.dep().before_notify();
        observer.dep().notify(Some(&mutation));
    }

    /// Append items. Returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let items: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut list = self.inner.items.borrow_mut();
            list.extend(items.iter().cloned());
            list.len()
        };
        self.announce(ArrayMethod::Push, items.clone(), &items);
        len
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Value {
        let popped = self.inner.items.borrow_mut().pop();
        match popped {
            Some(value) => {
                self.announce(ArrayMethod::Pop, Vec::new(), &[]);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Value {
        let shifted = {
            let mut list = self.inner.items.borrow_mut();
            if list.is_empty() {
                None
            } else {
                Some(list.remove(0))
            }
        };
        match shifted {
            Some(value) => {
                self.announce(ArrayMethod::Shift, Vec::new(), &[]);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Prepend items. Returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let items: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut list = self.inner.items.borrow_mut();
            list.splice(0..0, items.iter().cloned());
            list.len()
        };
        self.announce(ArrayMethod::Unshift, items.clone(), &items);
        len
    }

    /// Remove `delete_count` items at `start` and insert `items` there.
    ///
    /// A negative `start` counts from the end. Returns the removed items.
    pub fn splice(
        &self,
        start: isize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let items: Vec<Value> = items.into_iter().collect();
        let (start, removed) = {
            let mut list = self.inner.items.borrow_mut();
            let len = list.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (start as usize).min(len)
            };
            let end = start + delete_count.min(len - start);
            let removed: Vec<Value> = list.splice(start..end, items.iter().cloned()).collect();
            (start, removed)
        };

        let mut args = Vec::with_capacity(items.len() + 2);
        args.push(Value::from(start));
        args.push(Value::from(removed.len()));
        args.extend(items.iter().cloned());
        self.announce(ArrayMethod::Splice, args, &items);
        removed
    }

    /// Sort in place: numerically when every item is a number, otherwise by
    /// string form.
    pub fn sort(&self) {
        let numeric = self
            .inner
            .items
            .borrow()
            .iter()
            .all(|item| matches!(item, Value::Number(_)));
        if numeric {
            self.sort_by(|a, b| {
                a.to_number()
                    .partial_cmp(&b.to_number())
                    .unwrap_or(Ordering::Equal)
            });
        } else {
            self.sort_by(|a, b| a.to_js_string().cmp(&b.to_js_string()));
        }
    }

    /// Sort in place with a comparator.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.inner.items.borrow_mut().sort_by(compare);
        self.announce(ArrayMethod::Sort, Vec::new(), &[]);
    }

    pub fn reverse(&self) {
        self.inner.items.borrow_mut().reverse();
        self.announce(ArrayMethod::Reverse, Vec::new(), &[]);
    }

    /// Replace the item at `index`. An index past the end appends.
    ///
    /// Reported as a one-item `splice`.
    pub fn set_index(&self, index: usize, value: Value) {
        let len = self.len();
        if index >= len {
            self.splice(len as isize, 0, [value]);
        } else if self.get_untracked(index) != value {
            self.splice(index as isize, 1, [value]);
        }
    }

    /// Remove the first item strictly equal to `value`.
    ///
    /// Reported as a one-item `splice`.
    pub fn remove_value(&self, value: &Value) -> Option<Value> {
        let index = self.index_of(value)?;
        self.splice(index as isize, 1, []).into_iter().next()
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({})", Value::Array(self.clone()).to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Watcher;

    fn numbers(items: &[i32]) -> Array {
        let arr = Array::from_vec(items.iter().map(|n| Value::from(*n)).collect());
        observe(&Value::Array(arr.clone()));
        arr
    }

    fn contents(arr: &Array) -> Vec<f64> {
        arr.to_vec_untracked().iter().map(Value::to_number).collect()
    }

    fn record_mutations(arr: &Array) -> (Watcher, Rc<RefCell<Vec<(ArrayMethod, Vec<Value>)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let reader = arr.clone();
        let watcher = Watcher::new(
            "list",
            move || {
                reader.depend();
                Value::Array(reader.clone())
            },
            move |_, _, mutation| {
                if let Some(m) = mutation {
                    log_clone.borrow_mut().push((m.method, m.args.clone()));
                }
            },
        );
        (watcher, log)
    }

    #[test]
    fn push_pop_shift_unshift() {
        let arr = numbers(&[1, 2, 3]);
        assert_eq!(arr.push([Value::from(4)]), 4);
        assert_eq!(arr.pop(), Value::from(4));
        assert_eq!(arr.shift(), Value::from(1));
        assert_eq!(arr.unshift([Value::from(0)]), 3);
        assert_eq!(contents(&arr), vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn mutations_are_announced() {
        let arr = numbers(&[1, 2, 3]);
        let (_watcher, log) = record_mutations(&arr);

        arr.push([Value::from(4)]);
        arr.splice(1, 1, []);
        arr.reverse();

        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], (ArrayMethod::Push, vec![Value::from(4)]));
        assert_eq!(
            log[1],
            (ArrayMethod::Splice, vec![Value::from(1), Value::from(1)])
        );
        assert_eq!(log[2].0, ArrayMethod::Reverse);
    }

    #[test]
    fn splice_clamps_bounds() {
        let arr = numbers(&[1, 2, 3]);
        let removed = arr.splice(-1, 10, [Value::from(9)]);
        assert_eq!(removed, vec![Value::from(3)]);
        assert_eq!(contents(&arr), vec![1.0, 2.0, 9.0]);

        let removed = arr.splice(10, 1, []);
        assert!(removed.is_empty());
    }

    #[test]
    fn set_index_is_bounded() {
        let arr = numbers(&[1, 2]);
        arr.set_index(0, Value::from(5));
        arr.set_index(7, Value::from(6));
        assert_eq!(contents(&arr), vec![5.0, 2.0, 6.0]);
    }

    #[test]
    fn remove_value_reports_splice() {
        let arr = numbers(&[1, 2, 3]);
        let (_watcher, log) = record_mutations(&arr);

        assert_eq!(arr.remove_value(&Value::from(2)), Some(Value::from(2)));
        assert_eq!(arr.remove_value(&Value::from(42)), None);
        assert_eq!(contents(&arr), vec![1.0, 3.0]);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].0, ArrayMethod::Splice);
    }

    #[test]
    fn pushed_items_are_observed() {
        let arr = numbers(&[]);
        arr.push([Value::from(crate::reactive::Object::new())]);
        assert!(crate::reactive::is_observed(&arr.get_untracked(0)));
    }

    #[test]
    fn default_sort_is_numeric_for_numbers() {
        let arr = numbers(&[10, 9, 1]);
        arr.sort();
        assert_eq!(contents(&arr), vec![1.0, 9.0, 10.0]);
    }
}
