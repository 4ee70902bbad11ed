//! Single-threaded publish/subscribe containers used to wire editor components.
//!
//! Observers are reference-counted closures; identity is pointer identity, so
//! subscribing the same `Observer` twice is a no-op and unsubscribing an
//! unknown one does nothing. Notification iterates over a snapshot of the
//! observer list, which keeps re-entrant subscribe/unsubscribe calls safe.

use std::cell::{OnceCell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

/// Callback registered on an observable.
pub type Observer<T> = Rc<dyn Fn(&T)>;

type Getter<T> = Box<dyn Fn(&T) -> T>;
type Setter<T> = Box<dyn Fn(&mut T, T)>;

/// Wraps a closure as an [`Observer`].
///
/// Keep the returned handle around when the observer must be unsubscribed
/// later.
///
/// # Example
/// ```
/// use editor::observable::{ObservableProperty, observer};
///
/// let volume = ObservableProperty::new(3);
/// let print = observer(|value: &i32| println!("volume {value}"));
/// volume.subscribe(print.clone());
/// volume.set(4);
/// volume.unsubscribe(&print);
/// ```
pub fn observer<T, F>(f: F) -> Observer<T>
where
    F: Fn(&T) + 'static,
{
    Rc::new(f)
}

/// Anything observers can attach to.
pub trait Subscribable<T> {
    fn subscribe(&self, observer: Observer<T>);
    fn unsubscribe(&self, observer: &Observer<T>);
}

struct ObserverList<T> {
    observers: RefCell<Vec<Observer<T>>>,
}

impl<T> ObserverList<T> {
    fn new() -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, observer: Observer<T>) {
        let mut observers = self.observers.borrow_mut();
        if observers.iter().any(|known| Rc::ptr_eq(known, &observer)) {
            return;
        }
        observers.push(observer);
    }

    fn remove(&self, observer: &Observer<T>) {
        self.observers
            .borrow_mut()
            .retain(|known| !Rc::ptr_eq(known, observer));
    }

    fn snapshot(&self) -> Vec<Observer<T>> {
        self.observers.borrow().clone()
    }

    fn len(&self) -> usize {
        self.observers.borrow().len()
    }
}

struct PropertyCell<T> {
    value: RefCell<T>,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
    observers: ObserverList<T>,
    label: RefCell<Option<String>>,
}

impl<T: Clone> PropertyCell<T> {
    fn get(&self) -> T {
        let value = self.value.borrow();
        match &self.getter {
            Some(getter) => getter(&value),
            None => value.clone(),
        }
    }
}

impl<T> Subscribable<T> for PropertyCell<T> {
    fn subscribe(&self, observer: Observer<T>) {
        self.observers.add(observer);
    }

    fn unsubscribe(&self, observer: &Observer<T>) {
        self.observers.remove(observer);
    }
}

/// Value container that notifies observers when its visible value changes.
///
/// An optional setter routes every write (for clamping or derivation) and an
/// optional getter derives the visible value from the stored one. Observers
/// are notified only when the visible value read back after the write differs
/// from the one read before it.
pub struct ObservableProperty<T> {
    cell: Rc<PropertyCell<T>>,
    read_only: OnceCell<ReadOnlyProperty<T>>,
}

impl<T> ObservableProperty<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    pub fn new(initial: T) -> Self {
        Self::from_parts(initial, None, None)
    }

    /// Creates a property whose writes go through `setter`.
    ///
    /// # Example
    /// ```
    /// use editor::observable::ObservableProperty;
    ///
    /// let percent = ObservableProperty::with_setter(50, |stored: &mut i32, value| {
    ///     *stored = value.clamp(0, 100);
    /// });
    /// percent.set(250);
    /// assert_eq!(percent.get(), 100);
    /// ```
    pub fn with_setter(initial: T, setter: impl Fn(&mut T, T) + 'static) -> Self {
        Self::from_parts(initial, None, Some(Box::new(setter)))
    }

    /// Creates a property whose visible value is derived by `getter`.
    pub fn with_getter(initial: T, getter: impl Fn(&T) -> T + 'static) -> Self {
        Self::from_parts(initial, Some(Box::new(getter)), None)
    }

    pub fn with_accessors(
        initial: T,
        getter: impl Fn(&T) -> T + 'static,
        setter: impl Fn(&mut T, T) + 'static,
    ) -> Self {
        Self::from_parts(initial, Some(Box::new(getter)), Some(Box::new(setter)))
    }

    fn from_parts(initial: T, getter: Option<Getter<T>>, setter: Option<Setter<T>>) -> Self {
        Self {
            cell: Rc::new(PropertyCell {
                value: RefCell::new(initial),
                getter,
                setter,
                observers: ObserverList::new(),
                label: RefCell::new(None),
            }),
            read_only: OnceCell::new(),
        }
    }

    /// Tags the property so every notification is traced with `tag`.
    pub fn log_with(self, tag: impl Into<String>) -> Self {
        *self.cell.label.borrow_mut() = Some(tag.into());
        self
    }

    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn set(&self, new_value: T) {
        let old = self.cell.get();
        {
            let mut stored = self.cell.value.borrow_mut();
            match &self.cell.setter {
                Some(setter) => setter(&mut stored, new_value),
                None => *stored = new_value,
            }
        }
        let updated = self.cell.get();
        if old == updated {
            return;
        }

        let observers = self.cell.observers.snapshot();
        if let Some(tag) = self.cell.label.borrow().as_deref() {
            trace!(
                tag,
                old = ?old,
                new = ?updated,
                observers = observers.len(),
                "property updated"
            );
        }
        for observer in observers {
            observer(&updated);
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) {
        self.cell.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Observer<T>) {
        self.cell.unsubscribe(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.cell.observers.len()
    }

    /// Returns the read-only view, created on first use.
    pub fn as_read_only(&self) -> ReadOnlyProperty<T> {
        self.read_only
            .get_or_init(|| ReadOnlyProperty {
                cell: Rc::clone(&self.cell),
            })
            .clone()
    }
}

impl<T> Debug for ObservableProperty<T>
where
    T: Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableProperty")
            .field("value", &self.cell.get())
            .field("observers", &self.cell.observers.len())
            .finish()
    }
}

/// Live view of an [`ObservableProperty`] without write access.
pub struct ReadOnlyProperty<T> {
    cell: Rc<PropertyCell<T>>,
}

impl<T> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Clone> ReadOnlyProperty<T> {
    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn subscribe(&self, observer: Observer<T>) {
        self.cell.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Observer<T>) {
        self.cell.unsubscribe(observer);
    }

    /// Returns true when both views observe the same property.
    pub fn same_source(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

struct EmitterCell<T> {
    observers: ObserverList<T>,
    label: RefCell<Option<String>>,
}

impl<T> Subscribable<T> for EmitterCell<T> {
    fn subscribe(&self, observer: Observer<T>) {
        self.observers.add(observer);
    }

    fn unsubscribe(&self, observer: &Observer<T>) {
        self.observers.remove(observer);
    }
}

/// Value-less event source; `emit` calls every observer in subscription order.
pub struct ObservableEmitter<T> {
    cell: Rc<EmitterCell<T>>,
    read_only: OnceCell<ReadOnlyEmitter<T>>,
}

impl<T: Debug + 'static> ObservableEmitter<T> {
    pub fn new() -> Self {
        Self {
            cell: Rc::new(EmitterCell {
                observers: ObserverList::new(),
                label: RefCell::new(None),
            }),
            read_only: OnceCell::new(),
        }
    }

    pub fn log_with(self, tag: impl Into<String>) -> Self {
        *self.cell.label.borrow_mut() = Some(tag.into());
        self
    }

    pub fn emit(&self, payload: T) {
        let observers = self.cell.observers.snapshot();
        if let Some(tag) = self.cell.label.borrow().as_deref() {
            trace!(tag, payload = ?payload, observers = observers.len(), "emitting");
        }
        for observer in observers {
            observer(&payload);
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) {
        self.cell.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Observer<T>) {
        self.cell.unsubscribe(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.cell.observers.len()
    }

    pub fn as_read_only(&self) -> ReadOnlyEmitter<T> {
        self.read_only
            .get_or_init(|| ReadOnlyEmitter {
                source: Rc::clone(&self.cell) as Rc<dyn Subscribable<T>>,
            })
            .clone()
    }
}

impl<T: Debug + 'static> Default for ObservableEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribe-only handle on an emitter, with value-mapping views.
pub struct ReadOnlyEmitter<T> {
    source: Rc<dyn Subscribable<T>>,
}

impl<T> Clone for ReadOnlyEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T: 'static> ReadOnlyEmitter<T> {
    pub fn subscribe(&self, observer: Observer<T>) {
        self.source.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Observer<T>) {
        self.source.unsubscribe(observer);
    }

    /// Read-only view delivering `map(payload)` to its observers.
    pub fn map<U: 'static>(&self, map: impl Fn(&T) -> U + 'static) -> ReadOnlyEmitter<U> {
        self.map_writable(map).as_read_only()
    }

    /// Mapped view that its owner can also emit through.
    pub fn map_writable<U: 'static>(
        &self,
        map: impl Fn(&T) -> U + 'static,
    ) -> MappedEmitter<T, U> {
        MappedEmitter {
            cell: Rc::new(MappedCell {
                source: self.clone(),
                adapter: Rc::new(map),
                mappings: RefCell::new(Vec::new()),
            }),
            read_only: OnceCell::new(),
        }
    }
}

struct ObserverMapping<S, T> {
    original: Observer<T>,
    adapted: Observer<S>,
}

struct MappedCell<S, T> {
    source: ReadOnlyEmitter<S>,
    adapter: Rc<dyn Fn(&S) -> T>,
    mappings: RefCell<Vec<ObserverMapping<S, T>>>,
}

impl<S: 'static, T: 'static> Subscribable<T> for MappedCell<S, T> {
    fn subscribe(&self, observer: Observer<T>) {
        if self
            .mappings
            .borrow()
            .iter()
            .any(|mapping| Rc::ptr_eq(&mapping.original, &observer))
        {
            return;
        }

        let adapter = Rc::clone(&self.adapter);
        let original = Rc::clone(&observer);
        let adapted: Observer<S> = Rc::new(move |value: &S| original(&adapter(value)));
        self.mappings.borrow_mut().push(ObserverMapping {
            original: observer,
            adapted: Rc::clone(&adapted),
        });
        self.source.subscribe(adapted);
    }

    fn unsubscribe(&self, observer: &Observer<T>) {
        let removed = {
            let mut mappings = self.mappings.borrow_mut();
            mappings
                .iter()
                .position(|mapping| Rc::ptr_eq(&mapping.original, observer))
                .map(|index| mappings.remove(index))
        };
        if let Some(mapping) = removed {
            self.source.unsubscribe(&mapping.adapted);
        }
    }
}

/// Emitter view over a source emitter with a transform.
///
/// Each subscriber installs its own adapted listener on the source. The owner
/// can push a source value through the transform (`emit_mapped`) or hand an
/// already-mapped value straight to the subscribers (`emit_direct`).
pub struct MappedEmitter<S, T> {
    cell: Rc<MappedCell<S, T>>,
    read_only: OnceCell<ReadOnlyEmitter<T>>,
}

impl<S: 'static, T: 'static> MappedEmitter<S, T> {
    pub fn subscribe(&self, observer: Observer<T>) {
        self.cell.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Observer<T>) {
        self.cell.unsubscribe(observer);
    }

    pub fn emit_direct(&self, value: T) {
        let originals: Vec<Observer<T>> = self
            .cell
            .mappings
            .borrow()
            .iter()
            .map(|mapping| Rc::clone(&mapping.original))
            .collect();
        for observer in originals {
            observer(&value);
        }
    }

    pub fn emit_mapped(&self, value: S) {
        let adapted: Vec<Observer<S>> = self
            .cell
            .mappings
            .borrow()
            .iter()
            .map(|mapping| Rc::clone(&mapping.adapted))
            .collect();
        for observer in adapted {
            observer(&value);
        }
    }

    pub fn as_read_only(&self) -> ReadOnlyEmitter<T> {
        self.read_only
            .get_or_init(|| ReadOnlyEmitter {
                source: Rc::clone(&self.cell) as Rc<dyn Subscribable<T>>,
            })
            .clone()
    }
}
