use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    context::Context,
    diagnostics::{error, ErrorKind, Result},
    runtime::{EvalConfig, Interpreter},
    value::{dereference, to_bool, to_int, Value},
};

pub type ObjectRef = Rc<dyn Object>;

/// Capability protocol connecting script values to the evaluator and to
/// host extensions. Every operation is optional; unsupported ones report
/// `operation_not_supported`.
pub trait Object {
    /// Current value of the object. Self-representing objects (arrays with
    /// more than one element, instances, functions) return themselves.
    fn get(self: Rc<Self>) -> Result<Value>;

    /// Instantiates a new object (classes, prototypes).
    fn create(&self) -> Result<Value> {
        Err(error(ErrorKind::OperationNotSupported, "create"))
    }

    fn set(&self, _value: Value) -> Result<()> {
        Err(error(ErrorKind::OperationNotSupported, "assignment"))
    }

    /// Invokes the object with a params value: Empty, a scalar, or an array.
    fn call(self: Rc<Self>, _params: Value) -> Result<Value> {
        Err(error(ErrorKind::OperationNotSupported, "call"))
    }

    /// Member access (`object.name`).
    fn item(self: Rc<Self>, _name: &str) -> Result<Value> {
        Err(error(ErrorKind::OperationNotSupported, "member access"))
    }

    /// Subscript access (`object[index]`), yielding a bound element proxy.
    fn index(self: Rc<Self>, _index: Value) -> Result<Value> {
        Err(error(ErrorKind::OperationNotSupported, "index"))
    }

    fn print(&self) -> String {
        "[object]".to_owned()
    }

    fn as_array(self: Rc<Self>) -> Option<Rc<Array>> {
        None
    }
}

/// Coerces a value into a shared array: arrays pass through, Empty becomes
/// an empty array, anything else a one-element array.
pub fn to_array(value: &Value) -> Rc<Array> {
    match value {
        Value::Empty => Rc::new(Array::new()),
        Value::Object(object) => match object.clone().as_array() {
            Some(array) => array,
            None => Rc::new(Array::from_items(vec![value.clone()])),
        },
        other => Rc::new(Array::from_items(vec![other.clone()])),
    }
}

fn expect_object(value: &Value) -> Result<ObjectRef> {
    match value {
        Value::Object(object) => Ok(object.clone()),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

/// Mutable named cell. Anything the evaluator can assign to lives in one.
pub struct Variable {
    value: RefCell<Value>,
}

impl Variable {
    pub fn new(value: Value) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    fn inner_object(&self) -> Result<ObjectRef> {
        expect_object(&self.value.borrow())
    }
}

impl Object for Variable {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(self.value.borrow().clone())
    }

    fn set(&self, value: Value) -> Result<()> {
        *self.value.borrow_mut() = value;
        Ok(())
    }

    fn create(&self) -> Result<Value> {
        self.inner_object()?.create()
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        self.inner_object()?.call(params)
    }

    fn item(self: Rc<Self>, name: &str) -> Result<Value> {
        self.inner_object()?.item(name)
    }

    fn index(self: Rc<Self>, index: Value) -> Result<Value> {
        // Subscripting a scalar cell converts it to an array in place.
        let target = match self.inner_object() {
            Ok(object) => object,
            Err(_) => {
                let current = self.value.borrow().clone();
                let array = to_array(&current);
                *self.value.borrow_mut() = Value::Object(array.clone());
                array
            }
        };
        target.index(index)
    }

    fn print(&self) -> String {
        self.value.borrow().to_string()
    }
}

/// Shared growable array with collapsing reads.
pub struct Array {
    items: RefCell<Vec<Value>>,
}

impl Array {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
        }
    }

    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(items),
        }
    }

    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    pub fn items_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.items.borrow_mut()
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for Array {
    fn get(self: Rc<Self>) -> Result<Value> {
        let len = self.items.borrow().len();
        match len {
            0 => Ok(Value::Empty),
            1 => Ok(self.items.borrow()[0].clone()),
            _ => Ok(Value::Object(self)),
        }
    }

    fn index(self: Rc<Self>, index: Value) -> Result<Value> {
        let position = to_int(&index)?;
        if position < 0 {
            return Err(error(ErrorKind::RuntimeError, "negative index"));
        }
        let position = position as usize;
        {
            let mut items = self.items.borrow_mut();
            if items.len() < position {
                items.resize(position, Value::Empty);
            }
        }
        Ok(Value::object(Indexer {
            array: self,
            position,
        }))
    }

    fn print(&self) -> String {
        let items = self.items.borrow();
        let mut text = String::from("[");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                text.push_str("; ");
            }
            text.push_str(&item.to_string());
        }
        text.push(']');
        text
    }

    fn as_array(self: Rc<Self>) -> Option<Rc<Array>> {
        Some(self)
    }
}

/// Element proxy bound to an array position; writes through and grows the
/// backing store on assignment.
pub struct Indexer {
    array: Rc<Array>,
    position: usize,
}

impl Indexer {
    fn entry(&self) -> Result<Value> {
        self.array
            .items()
            .get(self.position)
            .cloned()
            .ok_or_else(|| error(ErrorKind::RuntimeError, "index out of bounds"))
    }

    fn entry_object(&self) -> Result<ObjectRef> {
        expect_object(&self.entry()?)
    }
}

impl Object for Indexer {
    fn get(self: Rc<Self>) -> Result<Value> {
        self.entry()
    }

    fn set(&self, value: Value) -> Result<()> {
        let mut items = self.array.items_mut();
        if items.len() <= self.position {
            items.resize(self.position + 1, Value::Empty);
        }
        items[self.position] = value;
        Ok(())
    }

    fn create(&self) -> Result<Value> {
        self.entry_object()?.create()
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        self.entry_object()?.call(params)
    }

    fn item(self: Rc<Self>, name: &str) -> Result<Value> {
        self.entry_object()?.item(name)
    }

    fn index(self: Rc<Self>, index: Value) -> Result<Value> {
        self.entry_object()?.index(index)
    }

    fn print(&self) -> String {
        self.entry().map(|v| v.to_string()).unwrap_or_default()
    }
}

/// Ordered string-keyed map; reading a missing key vivifies Empty.
pub struct AssocArray {
    entries: RefCell<IndexMap<String, Value>>,
}

impl AssocArray {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(IndexMap::new()),
        }
    }
}

impl Default for AssocArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for AssocArray {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn create(&self) -> Result<Value> {
        Ok(Value::object(AssocArray::new()))
    }

    fn item(self: Rc<Self>, name: &str) -> Result<Value> {
        Ok(Value::object(AssocEntry {
            map: self,
            key: name.to_owned(),
        }))
    }

    fn index(self: Rc<Self>, index: Value) -> Result<Value> {
        let key = index.to_string();
        Ok(Value::object(AssocEntry { map: self, key }))
    }

    fn print(&self) -> String {
        let entries = self.entries.borrow();
        let mut text = String::from("[");
        for (i, (key, value)) in entries.iter().enumerate() {
            if i > 0 {
                text.push_str("; ");
            }
            text.push_str(key);
            text.push_str(" => ");
            text.push_str(&value.to_string());
        }
        text.push(']');
        text
    }
}

/// Entry proxy bound to an associative key.
pub struct AssocEntry {
    map: Rc<AssocArray>,
    key: String,
}

impl AssocEntry {
    fn entry(&self) -> Value {
        self.map
            .entries
            .borrow_mut()
            .entry(self.key.clone())
            .or_insert(Value::Empty)
            .clone()
    }

    fn entry_object(&self) -> Result<ObjectRef> {
        expect_object(&self.entry())
    }
}

impl Object for AssocEntry {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(self.entry())
    }

    fn set(&self, value: Value) -> Result<()> {
        self.map.entries.borrow_mut().insert(self.key.clone(), value);
        Ok(())
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        self.entry_object()?.call(params)
    }

    fn item(self: Rc<Self>, name: &str) -> Result<Value> {
        self.entry_object()?.item(name)
    }

    fn index(self: Rc<Self>, index: Value) -> Result<Value> {
        self.entry_object()?.index(index)
    }

    fn print(&self) -> String {
        self.entry().to_string()
    }
}

/// Binds call parameters into a fresh interpreter frame: no declared names
/// installs the whole params value as `@`, a single declared name takes the
/// params value whole, and multi-parameter lists spread an array whose
/// length must match the declared count.
pub(crate) fn bind_params(
    interpreter: &mut Interpreter,
    args: &[String],
    params: Value,
) -> Result<()> {
    if args.is_empty() {
        interpreter.bind("@", params);
        return Ok(());
    }
    // A single declared parameter takes the params value whole, arrays
    // included; only multi-parameter functions spread.
    if args.len() == 1 {
        interpreter.bind(args[0].clone(), params);
        return Ok(());
    }
    let array = to_array(&params);
    let items = array.items();
    if items.len() != args.len() {
        return Err(error(
            ErrorKind::BadParamCount,
            format!("expected {} parameters, got {}", args.len(), items.len()),
        ));
    }
    for (name, value) in args.iter().zip(items.iter()) {
        interpreter.bind(name.clone(), value.clone());
    }
    Ok(())
}

/// Script-defined function: argument names, raw body text and the captured
/// context snapshot taken at the definition site.
pub struct UserFunction {
    args: Vec<String>,
    body: String,
    context: Context,
    config: EvalConfig,
}

impl UserFunction {
    pub(crate) fn new(args: Vec<String>, body: String, context: Context, config: EvalConfig) -> Self {
        Self {
            args,
            body,
            context,
            config,
        }
    }
}

impl Object for UserFunction {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        let mut interpreter =
            Interpreter::with_context(Context::from_base(&self.context), self.config);
        bind_params(&mut interpreter, &self.args, params)?;
        interpreter.exec_body(&self.body)
    }
}

/// Script-defined class. `call` stores constructor parameters and returns
/// the class, `new` then instantiates.
pub struct UserClass {
    args: Vec<String>,
    body: String,
    context: Context,
    config: EvalConfig,
    params: RefCell<Value>,
}

impl UserClass {
    pub(crate) fn new(args: Vec<String>, body: String, context: Context, config: EvalConfig) -> Self {
        Self {
            args,
            body,
            context,
            config,
            params: RefCell::new(Value::Empty),
        }
    }
}

impl Object for UserClass {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        *self.params.borrow_mut() = params;
        Ok(Value::Object(self))
    }

    fn create(&self) -> Result<Value> {
        let instance = Instance::new(
            &self.body,
            &self.context,
            &self.args,
            self.params.borrow().clone(),
            self.config,
        )?;
        Ok(Value::object(instance))
    }
}

/// Live class instance owning a persistent nested interpreter; member
/// access re-evaluates the member name inside it.
pub struct Instance {
    interpreter: RefCell<Interpreter>,
}

impl Instance {
    fn new(
        body: &str,
        context: &Context,
        args: &[String],
        params: Value,
        config: EvalConfig,
    ) -> Result<Self> {
        let mut interpreter = Interpreter::with_context(Context::from_base(context), config);
        bind_params(&mut interpreter, args, params)?;
        interpreter.exec_body(body)?;
        Ok(Self {
            interpreter: RefCell::new(interpreter),
        })
    }
}

impl Object for Instance {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn item(self: Rc<Self>, name: &str) -> Result<Value> {
        self.interpreter.borrow_mut().eval(name)
    }
}

pub const VARIADIC: usize = usize::MAX;

/// Native function exposed to scripts. A single array param spreads into
/// the argument list; `VARIADIC` accepts any count.
pub struct BuiltinFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: fn(&[Value]) -> Result<Value>,
}

impl Object for BuiltinFunction {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        if let Value::Object(object) = &params {
            if let Some(array) = object.clone().as_array() {
                let items = array.items().clone();
                if self.arity != VARIADIC && items.len() != self.arity {
                    return Err(error(ErrorKind::BadParamCount, self.name));
                }
                return (self.callback)(&items);
            }
        }
        if params.is_empty() && (self.arity == 0 || self.arity == VARIADIC) {
            (self.callback)(&[])
        } else if self.arity == VARIADIC || self.arity == 1 {
            (self.callback)(&[params])
        } else {
            Err(error(ErrorKind::BadParamCount, self.name))
        }
    }

    fn print(&self) -> String {
        format!("[{}()]", self.name)
    }
}

/// `fold(f)`: left fold, seeding with the first element.
pub struct Fold {
    pub func: ObjectRef,
}

impl Object for Fold {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        let items = to_array(&params).items().clone();
        let mut iter = items.into_iter();
        let Some(mut accumulator) = iter.next() else {
            return Ok(Value::Empty);
        };
        for item in iter {
            let pair = Value::object(Array::from_items(vec![accumulator, item]));
            accumulator = self.func.clone().call(pair)?;
        }
        Ok(accumulator)
    }
}

/// `map(f)`: element-wise application.
pub struct MapFn {
    pub func: ObjectRef,
}

impl Object for MapFn {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        let items = to_array(&params).items().clone();
        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            let mut value = self.func.clone().call(item)?;
            dereference(&mut value)?;
            mapped.push(value);
        }
        Ok(Value::object(Array::from_items(mapped)))
    }
}

/// `filter(f)`: keeps elements whose image is truthy.
pub struct Filter {
    pub func: ObjectRef,
}

impl Object for Filter {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        let items = to_array(&params).items().clone();
        let mut kept = Vec::new();
        for item in items {
            let mut image = self.func.clone().call(item.clone())?;
            dereference(&mut image)?;
            if to_bool(&image)? {
                kept.push(item);
            }
        }
        Ok(Value::object(Array::from_items(kept)))
    }
}

/// `f·g`: right-to-left composition, `(f·g)(x) = f(g(x))`.
pub struct Compose {
    pub outer: ObjectRef,
    pub inner: ObjectRef,
}

impl Object for Compose {
    fn get(self: Rc<Self>) -> Result<Value> {
        Ok(Value::Object(self))
    }

    fn call(self: Rc<Self>, params: Value) -> Result<Value> {
        let mut inner = self.inner.clone().call(params)?;
        dereference(&mut inner)?;
        self.outer.clone().call(inner)
    }
}
