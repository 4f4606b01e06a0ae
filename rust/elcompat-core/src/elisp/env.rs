//! Lexical environment frames.
//!
//! A frame holds the bindings introduced by one `let`, lambda call or loop
//! and points at its parent.  Closures keep the frame they were created in,
//! so `setq` on a captured variable is seen by every holder of that frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::value::Value;

#[derive(Clone)]
pub struct Env(Rc<Frame>);

struct Frame {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Env {
    /// The empty top-level environment.
    pub fn root() -> Self {
        Env(Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// A fresh frame whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Env(Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn child_with(&self, bindings: Vec<(String, Value)>) -> Self {
        let env = self.child();
        {
            let mut vars = env.0.vars.borrow_mut();
            vars.extend(bindings);
        }
        env
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.0.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Look `name` up through the frame chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(value) = env.0.vars.borrow().get(name) {
                return Some(value.clone());
            }
            frame = env.0.parent.as_ref();
        }
        None
    }

    /// Whether this very frame (not a parent) binds `name`.
    pub fn binds_locally(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    /// Overwrite the nearest existing binding of `name`.  Returns false when
    /// no frame binds it.
    pub fn set_existing(&self, name: &str, value: Value) -> bool {
        let mut frame = Some(self);
        while let Some(env) = frame {
            let mut vars = env.0.vars.borrow_mut();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(vars);
            frame = env.0.parent.as_ref();
        }
        false
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut frame = self.0.parent.as_ref();
        while let Some(env) = frame {
            depth += 1;
            frame = env.0.parent.as_ref();
        }
        write!(f, "#<env depth={depth}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_frames_shadow_and_fall_back() {
        let root = Env::root();
        root.define("x", Value::Int(1));
        let inner = root.child_with(vec![("y".into(), Value::Int(2))]);
        assert_eq!(inner.lookup("x"), Some(Value::Int(1)));
        assert_eq!(inner.lookup("y"), Some(Value::Int(2)));
        assert_eq!(root.lookup("y"), None);

        inner.define("x", Value::Int(10));
        assert_eq!(inner.lookup("x"), Some(Value::Int(10)));
        assert_eq!(root.lookup("x"), Some(Value::Int(1)));
    }

    #[test]
    fn set_existing_updates_the_binding_frame() {
        let root = Env::root();
        root.define("n", Value::Int(0));
        let closure_env = root.child();
        assert!(closure_env.set_existing("n", Value::Int(5)));
        assert_eq!(root.lookup("n"), Some(Value::Int(5)));
        assert!(!closure_env.set_existing("missing", Value::Nil));
    }
}
